//! Orchestration: extraction → filtre → conversion → publication, et
//! rafraîchissement du cache.
//!
//! `Pipeline` assemble les quatre points d'extension (stockage, source de
//! géométrie, convertisseur, cache optionnel). Chaque point d'entrée est
//! borné par un délai.

pub mod filter;
pub mod refresh;
pub mod source;
pub mod validate;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool_postgres::Pool;
use futures::future::join_all;
use geojson::FeatureCollection;
use serde::Serialize;
use tracing::{info, instrument, warn};

use ras_geometry::FeatureClass;

use crate::config::{AppConfig, CacheCatalog, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::{PipelineError, ValidationError};
use crate::export::geojson::{build_collection, build_collections, GeometryConverter, WkbConverter};
use crate::export::postgres::{FeatureCache, PostgresCache};
use crate::export::publish::{publish_collections, PublishOutput};
use crate::export::storage::{ArtifactStore, S3Store};
use crate::report::{ClassOutcome, RefreshReport};

use filter::filter_features;
use refresh::{ClassRefresher, REFRESH_CLASSES};
use source::{fetch_features, FeatureRecord, G01Source, GeometrySource, Projection};
use validate::{check_refresh, check_request, check_source_exists, FeatureCollectionRequest};

/// Délai de la sonde base de données
const DB_PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Référence spatiale des géométries du cache
const CACHE_SRS: &str = "EPSG:4326";

/// État des dépendances externes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub database_healthy: bool,
    pub s3_connection_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.database_healthy && self.s3_connection_healthy
    }
}

/// Pipeline d'extraction et de cache
pub struct Pipeline {
    store: Arc<dyn ArtifactStore>,
    source: Arc<dyn GeometrySource>,
    converter: Arc<dyn GeometryConverter>,
    cache: Option<Arc<dyn FeatureCache>>,
    catalog: CacheCatalog,
    source_bucket: Option<String>,
    deadline: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        source: Arc<dyn GeometrySource>,
        converter: Arc<dyn GeometryConverter>,
    ) -> Self {
        Self {
            store,
            source,
            converter,
            cache: None,
            catalog: CacheCatalog::default(),
            source_bucket: None,
            deadline: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn FeatureCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_catalog(mut self, catalog: CacheCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Bucket des fichiers sources (sinon, le bucket de destination de la requête)
    pub fn with_source_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.source_bucket = Some(bucket.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Assemble le pipeline S3 / .g01 / geozero, avec cache si un pool est fourni
    pub fn from_config(config: &AppConfig, pool: Option<Pool>) -> Self {
        let store: Arc<dyn ArtifactStore> = Arc::new(S3Store::new(config.storage.clone()));
        let source = Arc::new(G01Source::new(Arc::clone(&store)));

        let mut pipeline = Self::new(store, source, Arc::new(WkbConverter))
            .with_catalog(config.catalog.clone())
            .with_deadline(config.request_timeout);
        if let Some(pool) = pool {
            pipeline = pipeline.with_cache(Arc::new(PostgresCache::new(pool)));
        }
        if let Some(bucket) = &config.storage.bucket {
            pipeline = pipeline.with_source_bucket(bucket.clone());
        }
        pipeline
    }

    async fn within_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| PipelineError::Timeout(self.deadline))?
    }

    fn cache(&self) -> Result<&dyn FeatureCache, PipelineError> {
        self.cache.as_deref().ok_or(PipelineError::CacheUnavailable)
    }

    /// Extrait les classes demandées et publie une collection GeoJSON par groupe
    #[instrument(skip_all, fields(key = %req.source_key, projection = %req.projection))]
    pub async fn extract_and_publish(
        &self,
        req: &FeatureCollectionRequest,
    ) -> Result<PublishOutput, PipelineError> {
        self.within_deadline(self.run_extract(req)).await
    }

    async fn run_extract(
        &self,
        req: &FeatureCollectionRequest,
    ) -> Result<PublishOutput, PipelineError> {
        let projection = check_request(req)?;
        let bucket = self
            .source_bucket
            .as_deref()
            .unwrap_or(&req.destination_bucket);
        check_source_exists(self.store.as_ref(), bucket, &req.source_key).await?;

        let features =
            fetch_features(self.source.as_ref(), bucket, &req.source_key, projection).await?;
        let groups = filter_features(&features, &req.requested_classes)?;
        let collections =
            build_collections(&groups, self.converter.as_ref(), projection.name())?;

        let uploads = publish_collections(
            self.store.as_ref(),
            &req.destination_bucket,
            &req.destination_prefix,
            &req.source_key,
            req.url_expiry_days,
            &collections,
        )
        .await?;

        info!(collections = uploads.len(), "Extraction published");
        Ok(PublishOutput::from_uploads(&uploads))
    }

    /// Rafraîchit les trois classes en parallèle; une classe en échec
    /// n'empêche pas les autres
    #[instrument(skip(self))]
    pub async fn refresh_cache(
        &self,
        key: &str,
        projection: &str,
    ) -> Result<RefreshReport, PipelineError> {
        self.within_deadline(self.run_refresh(key, projection)).await
    }

    async fn run_refresh(&self, key: &str, projection: &str) -> Result<RefreshReport, PipelineError> {
        let start = Instant::now();
        let projection = check_refresh(key, projection)?;
        let cache = self.cache()?;

        // Les trois classes attendent la même lecture de la source
        let refreshers: Vec<_> = REFRESH_CLASSES
            .into_iter()
            .map(|class| ClassRefresher::new(cache, &self.catalog, key, class))
            .collect();
        let features = self.fetch_for_refresh(key, projection).await?;

        let features = &features;
        let outcomes = join_all(refreshers.into_iter().map(|mut refresher| async move {
            let result = refresher.run(features).await;
            refresher.into_outcome(result)
        }))
        .await;

        let mut report = RefreshReport::new(key, projection.name());
        for outcome in outcomes {
            report.record(outcome);
        }
        report.set_duration(start.elapsed());
        report.finalize();

        info!(summary = %report.summary(), status = ?report.status, "Cache refreshed");
        Ok(report)
    }

    /// Rafraîchit une seule classe; son échec est une erreur
    #[instrument(skip(self))]
    pub async fn refresh_class(
        &self,
        key: &str,
        projection: &str,
        class: FeatureClass,
    ) -> Result<ClassOutcome, PipelineError> {
        self.within_deadline(async {
            let projection = check_refresh(key, projection)?;
            let cache = self.cache()?;

            let mut refresher = ClassRefresher::new(cache, &self.catalog, key, class);
            let features = refresher
                .fetch(self.fetch_for_refresh(key, projection))
                .await?;
            refresher.run(&features).await?;
            Ok(refresher.into_outcome(Ok(())))
        })
        .await
    }

    async fn fetch_for_refresh(
        &self,
        key: &str,
        projection: Projection,
    ) -> Result<ras_geometry::ByClass<FeatureRecord>, PipelineError> {
        let bucket = self
            .source_bucket
            .as_deref()
            .ok_or(ValidationError::MissingBucket)?;
        check_source_exists(self.store.as_ref(), bucket, key).await?;
        fetch_features(self.source.as_ref(), bucket, key, projection).await
    }

    /// Collection GeoJSON d'une classe lue depuis le cache
    #[instrument(skip(self))]
    pub async fn cached_collection(
        &self,
        class: FeatureClass,
        source_file: Option<&str>,
    ) -> Result<FeatureCollection, PipelineError> {
        self.within_deadline(async {
            let cache = self.cache()?;
            let mut records = Vec::new();
            for target in self.catalog.tables(class) {
                let rows = cache
                    .read(&self.catalog.schema, target, source_file)
                    .await
                    .map_err(PipelineError::CacheRead)?;
                records.extend(rows.into_iter().map(|row| FeatureRecord {
                    feature_class: class,
                    feature_name: row.feature_name,
                    raw_geometry: row.geometry,
                    source_file: row.source_file,
                }));
            }
            build_collection(&records, self.converter.as_ref(), CACHE_SRS)
        })
        .await
    }

    /// Sonde la base (3 s) et le stockage
    pub async fn health(&self) -> HealthReport {
        let mut messages = Vec::new();

        let database_healthy = match &self.cache {
            Some(cache) => match tokio::time::timeout(DB_PING_TIMEOUT, cache.ping()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    messages.push(format!("database: {}", e));
                    false
                }
                Err(_) => {
                    messages.push("database: ping timed out".to_string());
                    false
                }
            },
            None => {
                messages.push("database: not configured".to_string());
                false
            }
        };

        let s3_connection_healthy = match self.store.health_check().await {
            Ok(()) => true,
            Err(e) => {
                messages.push(format!("s3: {}", e));
                false
            }
        };

        if !messages.is_empty() {
            warn!(messages = ?messages, "Health check failed");
        }

        HealthReport {
            database_healthy,
            s3_connection_healthy,
            message: (!messages.is_empty()).then(|| messages.join("; ")),
        }
    }
}
