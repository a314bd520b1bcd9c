//! Point d'entrée CLI pour mcat-geo

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use mcat_geo::cli::{self, Commands};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Extraire les géométries HEC-RAS vers GeoJSON (S3) et le cache PostGIS
#[derive(Parser)]
#[command(name = "mcat-geo")]
#[command(author, version)]
#[command(about = "Extraire les géométries de modèles HEC-RAS vers GeoJSON sur S3 et PostGIS")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Logs au format JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.log_json);

    match cli.command {
        Commands::Extract {
            url_exp_days,
            g01_key,
            projection,
            bucket,
            output_prefix,
            geo_elements,
        } => {
            info!(key = %g01_key, bucket = %bucket, "Extraction vers S3");
            cli::cmd_extract(
                url_exp_days,
                g01_key,
                projection,
                bucket,
                output_prefix,
                geo_elements,
            )
            .await?;
        }
        Commands::Refresh {
            key,
            projection,
            class,
            catalog,
            report,
        } => {
            info!(key = %key, class = ?class, "Rafraîchissement du cache");
            cli::cmd_refresh(
                &key,
                &projection,
                class.as_deref(),
                catalog.as_deref(),
                report.as_deref(),
            )
            .await?;
        }
        Commands::Serve {
            bind,
            project,
            catalog,
        } => {
            cli::cmd_serve(bind, project.as_deref(), catalog.as_deref()).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool, json: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout est réservé au résultat JSON de `extract`
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
