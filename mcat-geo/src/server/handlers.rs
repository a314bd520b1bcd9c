//! Handlers HTTP

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use geojson::FeatureCollection;
use serde::Deserialize;
use tracing::info;

use ras_geometry::FeatureClass;

use crate::pipeline::HealthReport;
use crate::report::ClassOutcome;
use crate::server::error::ApiError;
use crate::server::state::AppState;

/// Filtre optionnel sur le fichier source
#[derive(Debug, Default, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

/// Corps des routes de rafraîchissement
#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    pub key: String,
    pub projection: String,
}

/// Santé de la base et du stockage
pub async fn ping(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.pipeline.health().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

async fn cached(
    state: &AppState,
    class: FeatureClass,
    query: KeyQuery,
) -> Result<Json<FeatureCollection>, ApiError> {
    let key = query.key.as_deref().filter(|k| !k.is_empty());
    let collection = state.pipeline.cached_collection(class, key).await?;
    Ok(Json(collection))
}

pub async fn break_line(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<FeatureCollection>, ApiError> {
    cached(&state, FeatureClass::Breakline, query).await
}

pub async fn mesh_line(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<FeatureCollection>, ApiError> {
    cached(&state, FeatureClass::Mesh, query).await
}

pub async fn twod_area(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<FeatureCollection>, ApiError> {
    cached(&state, FeatureClass::TwoDArea, query).await
}

async fn refresh(
    state: &AppState,
    class: FeatureClass,
    body: RefreshBody,
) -> Result<Json<ClassOutcome>, ApiError> {
    let outcome = state
        .pipeline
        .refresh_class(&body.key, &body.projection, class)
        .await?;
    info!(class = %class, key = %body.key, upserted = outcome.upserted, "Refresh request served");
    Ok(Json(outcome))
}

pub async fn refresh_break_line(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<ClassOutcome>, ApiError> {
    refresh(&state, FeatureClass::Breakline, body).await
}

pub async fn refresh_mesh_line(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<ClassOutcome>, ApiError> {
    refresh(&state, FeatureClass::Mesh, body).await
}

pub async fn refresh_twod_area(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<ClassOutcome>, ApiError> {
    refresh(&state, FeatureClass::TwoDArea, body).await
}
