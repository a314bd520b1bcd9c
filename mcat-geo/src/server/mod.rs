//! Mode serveur HTTP (axum)
//!
//! Sert les features du cache, déclenche les rafraîchissements par classe et
//! expose une sonde de santé.

pub mod error;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::ProjectManifest;
use crate::pipeline::Pipeline;

pub use error::ApiError;
pub use state::AppState;

/// Routes du service
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/mcat/break_line", get(handlers::break_line))
        .route("/mcat/mesh_line", get(handlers::mesh_line))
        .route("/mcat/twod_area", get(handlers::twod_area))
        .route("/mcat/refresh_break_line", patch(handlers::refresh_break_line))
        .route("/mcat/refresh_mesh_line", patch(handlers::refresh_mesh_line))
        .route("/mcat/refresh_twod_area", patch(handlers::refresh_twod_area))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Lance le serveur; avec un manifeste, rafraîchit ses modèles en tâche de fond
pub async fn serve(
    bind: SocketAddr,
    pipeline: Arc<Pipeline>,
    manifest: Option<ProjectManifest>,
) -> Result<()> {
    if let Some(manifest) = manifest {
        tokio::spawn(startup_refresh(Arc::clone(&pipeline), manifest));
    }

    let app = router(AppState::new(pipeline));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    info!(addr = %bind, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    info!("Server stopped");
    Ok(())
}

/// Rafraîchit chaque modèle du manifeste; les erreurs sont journalisées
pub async fn startup_refresh(pipeline: Arc<Pipeline>, manifest: ProjectManifest) {
    info!(models = manifest.models.len(), "Refreshing project models");

    for model in &manifest.models {
        match pipeline
            .refresh_cache(&model.geometry_file, &model.projection)
            .await
        {
            Ok(report) => info!(model = %model.name, summary = %report.summary(), "Model refreshed"),
            Err(e) => error!(model = %model.name, error = %e, "Model refresh failed"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
