//! Types d'erreurs du pipeline
//!
//! Chaque couche a son enum (`StorageError`, `SourceError`, `CacheError`,
//! `ConversionError`); `PipelineError` est l'erreur des points d'entrée.

use std::time::Duration;

use thiserror::Error;

/// Requête rejetée avant toute I/O (sauf `SourceNotFound`, issue de la sonde d'existence)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`{0}` must be provided")]
    MissingParameter(&'static str),

    #[error(
        "unknown projection '{0}': expected one of wktUSACEProj, wktUSACEProjAlt, WktUSACEProjFt37_5"
    )]
    UnknownProjection(String),

    #[error("at least one geo element must be requested")]
    NoClassesRequested,

    #[error("invalid geo element '{0}': allowed elements are all, mesh, breakline, twodarea")]
    InvalidElement(String),

    #[error("file must have a .{expected} extension, got: '{key}'")]
    WrongExtension { key: String, expected: &'static str },

    #[error("destination bucket must be provided")]
    MissingBucket,

    #[error("url expiry must be between 0 and 7 days, got {0}")]
    InvalidExpiry(i64),

    #[error("the provided object does not exist in bucket {bucket}: {key}")]
    SourceNotFound { bucket: String, key: String },
}

/// Erreurs du stockage objet
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create S3 client for bucket {bucket}: {reason}")]
    Client { bucket: String, reason: String },

    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage request failed for s3://{bucket}/{key}: {reason}")]
    Request {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("No default bucket configured (AWS_S3_BUCKET)")]
    NoDefaultBucket,
}

/// Erreurs de lecture d'un fichier de géométrie
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Parse(#[from] ras_geometry::GeometryError),

    #[error("Reprojection failed: {0}")]
    Reproject(String),

    #[error("Failed to encode {feature} as WKB: {reason}")]
    Encode { feature: String, reason: String },

    #[error("Geometry task failed: {0}")]
    Task(String),
}

/// Erreur de conversion WKB → GeoJSON
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ConversionError {
    pub reason: String,
}

impl ConversionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Erreurs du cache PostGIS
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Database query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("{0}")]
    Backend(String),
}

/// Erreur d'un point d'entrée du pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to read geometry from {key}: {source}")]
    SourceRead {
        key: String,
        #[source]
        source: SourceError,
    },

    #[error("Invalid geo element provided: {0}")]
    InvalidElement(String),

    #[error("Failed to convert feature {feature} to GeoJSON: {reason}")]
    Conversion { feature: String, reason: String },

    #[error("Failed to publish {key}: {reason}")]
    Publish { key: String, reason: String },

    #[error("Error calling {procedure} for feature {feature}: {reason}")]
    CacheWrite {
        procedure: String,
        feature: String,
        reason: String,
    },

    #[error("Cache query failed: {0}")]
    CacheRead(#[source] CacheError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Feature cache is not configured")]
    CacheUnavailable,

    #[error("Request exceeded its deadline of {0:?}")]
    Timeout(Duration),
}

impl PipelineError {
    /// Erreur imputable à la requête (et non au système)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_) | PipelineError::InvalidElement(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::WrongExtension {
            key: "model.g02".into(),
            expected: "g01",
        };
        assert_eq!(
            err.to_string(),
            "file must have a .g01 extension, got: 'model.g02'"
        );
        assert!(ValidationError::InvalidExpiry(8).to_string().contains("got 8"));
    }

    #[test]
    fn test_is_validation() {
        assert!(PipelineError::from(ValidationError::MissingBucket).is_validation());
        assert!(PipelineError::InvalidElement("x".into()).is_validation());
        assert!(!PipelineError::CacheUnavailable.is_validation());
    }
}
