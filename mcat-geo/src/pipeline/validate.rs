//! Validation des requêtes
//!
//! Les contrôles structurels s'exécutent dans l'ordre et s'arrêtent à la
//! première erreur; la sonde d'existence sur S3 vient toujours en dernier.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, ValidationError};
use crate::export::storage::ArtifactStore;
use crate::pipeline::source::Projection;

/// Extension attendue des fichiers de géométrie
pub const SOURCE_EXTENSION: &str = "g01";

/// Limite de validité d'une URL présignée SigV4
pub const MAX_URL_EXPIRY_DAYS: i64 = 7;

/// Sentinelle demandant toutes les classes
pub const ALL_ELEMENTS: &str = "all";

/// Éléments acceptés dans `requested_classes`
pub const ALLOWED_ELEMENTS: [&str; 4] = [ALL_ELEMENTS, "mesh", "breakline", "twodarea"];

/// Requête d'extraction et de publication
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureCollectionRequest {
    pub source_key: String,
    pub projection: String,
    pub requested_classes: Vec<String>,
    pub destination_bucket: String,
    #[serde(default)]
    pub destination_prefix: String,
    pub url_expiry_days: i64,
}

/// Contrôles structurels d'une requête d'extraction
pub fn check_request(req: &FeatureCollectionRequest) -> Result<Projection, ValidationError> {
    let projection = check_key_and_projection(&req.source_key, &req.projection)?;

    if req.requested_classes.is_empty() {
        return Err(ValidationError::NoClassesRequested);
    }
    if let Some(invalid) = req
        .requested_classes
        .iter()
        .find(|c| !ALLOWED_ELEMENTS.contains(&c.as_str()))
    {
        return Err(ValidationError::InvalidElement(invalid.clone()));
    }

    check_extension(&req.source_key)?;

    if req.destination_bucket.trim().is_empty() {
        return Err(ValidationError::MissingBucket);
    }
    if !(0..=MAX_URL_EXPIRY_DAYS).contains(&req.url_expiry_days) {
        return Err(ValidationError::InvalidExpiry(req.url_expiry_days));
    }

    Ok(projection)
}

/// Contrôles structurels d'une requête de rafraîchissement du cache
pub fn check_refresh(key: &str, projection: &str) -> Result<Projection, ValidationError> {
    let projection = check_key_and_projection(key, projection)?;
    check_extension(key)?;
    Ok(projection)
}

fn check_key_and_projection(key: &str, projection: &str) -> Result<Projection, ValidationError> {
    if key.trim().is_empty() {
        return Err(ValidationError::MissingParameter("key"));
    }
    if projection.trim().is_empty() {
        return Err(ValidationError::MissingParameter("projection"));
    }
    projection.parse()
}

fn check_extension(key: &str) -> Result<(), ValidationError> {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == SOURCE_EXTENSION => Ok(()),
        _ => Err(ValidationError::WrongExtension {
            key: key.to_string(),
            expected: SOURCE_EXTENSION,
        }),
    }
}

/// Sonde d'existence du fichier source
pub async fn check_source_exists(
    store: &dyn ArtifactStore,
    bucket: &str,
    key: &str,
) -> Result<(), PipelineError> {
    if store.exists(bucket, key).await? {
        Ok(())
    } else {
        Err(ValidationError::SourceNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
        .into())
    }
}
