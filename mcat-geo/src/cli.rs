//! Définition et implémentation des commandes CLI
//!
//! - `extract`: .g01 → GeoJSON sur S3, URL présignées sur stdout
//! - `refresh`: .g01 → cache PostGIS
//! - `serve`: API HTTP sur le cache

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::{info, warn};

use ras_geometry::FeatureClass;

use crate::config::{AppConfig, ProjectManifest};
use crate::export::pool::{create_pool, test_connection};
use crate::export::reproject;
use crate::pipeline::validate::FeatureCollectionRequest;
use crate::pipeline::Pipeline;
use crate::report::RefreshStatus;
use crate::server;

#[derive(Subcommand)]
pub enum Commands {
    /// Extract feature classes from a .g01 file and publish them as GeoJSON on S3
    Extract {
        /// Validity of the presigned URLs, in days (0 to 7)
        #[arg(long = "url-exp-days", allow_negative_numbers = true)]
        url_exp_days: i64,

        /// S3 key of the .g01 geometry file
        #[arg(long = "g01-key")]
        g01_key: String,

        /// Source projection: wktUSACEProj, wktUSACEProjAlt or WktUSACEProjFt37_5
        #[arg(long)]
        projection: String,

        /// Destination bucket
        #[arg(long)]
        bucket: String,

        /// Destination prefix for the GeoJSON objects
        #[arg(long = "output-prefix", default_value = "")]
        output_prefix: String,

        /// Comma-separated list of elements: all, mesh, breakline, twodarea
        #[arg(long = "geo-elements", value_delimiter = ',', required = true)]
        geo_elements: Vec<String>,
    },

    /// Refresh the PostGIS feature cache from a .g01 file
    Refresh {
        /// S3 key of the .g01 geometry file (in AWS_S3_BUCKET)
        #[arg(long)]
        key: String,

        /// Source projection
        #[arg(long)]
        projection: String,

        /// Refresh a single class (breakline, mesh, twodarea)
        #[arg(long)]
        class: Option<String>,

        /// Cache catalog JSON file
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Save the refresh report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Serve cached features over HTTP
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:5600", env = "MCAT_BIND")]
        bind: SocketAddr,

        /// Project manifest JSON: models refreshed at startup
        #[arg(long)]
        project: Option<PathBuf>,

        /// Cache catalog JSON file
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn load_config(catalog: Option<&Path>) -> Result<AppConfig> {
    if !reproject::is_available() {
        warn!("Built without the 'reproject' feature: only EPSG:4326 sources can be read");
    }
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    match catalog {
        Some(path) => config.with_catalog_file(path),
        None => Ok(config),
    }
}

async fn pipeline_with_cache(config: &AppConfig) -> Result<Pipeline> {
    let pool = create_pool(&config.database).await?;
    test_connection(&pool).await?;
    Ok(Pipeline::from_config(config, Some(pool)))
}

/// Exécute la commande extract et affiche le résultat JSON
pub async fn cmd_extract(
    url_exp_days: i64,
    g01_key: String,
    projection: String,
    bucket: String,
    output_prefix: String,
    geo_elements: Vec<String>,
) -> Result<()> {
    let config = load_config(None)?;
    let pipeline = Pipeline::from_config(&config, None);

    let request = FeatureCollectionRequest {
        source_key: g01_key,
        projection,
        requested_classes: geo_elements
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect(),
        destination_bucket: bucket,
        destination_prefix: output_prefix,
        url_expiry_days: url_exp_days,
    };

    let output = pipeline.extract_and_publish(&request).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Exécute la commande refresh
pub async fn cmd_refresh(
    key: &str,
    projection: &str,
    class: Option<&str>,
    catalog: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(catalog)?;
    let pipeline = pipeline_with_cache(&config).await?;

    if let Some(class) = class {
        let class: FeatureClass = class
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        if class == FeatureClass::Other {
            bail!("Class 'other' is not cached");
        }
        let outcome = pipeline.refresh_class(key, projection, class).await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let report = pipeline.refresh_cache(key, projection).await?;
    report.display();

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to save report to {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    if report.status == RefreshStatus::Failed {
        bail!("Refresh failed for every class: {}", report.summary());
    }
    Ok(())
}

/// Exécute la commande serve
pub async fn cmd_serve(
    bind: SocketAddr,
    project: Option<&Path>,
    catalog: Option<&Path>,
) -> Result<()> {
    let config = load_config(catalog)?;
    let manifest = project.map(ProjectManifest::load).transpose()?;

    let pool = create_pool(&config.database).await?;
    let pipeline = Arc::new(Pipeline::from_config(&config, Some(pool)));

    server::serve(bind, pipeline, manifest).await
}
