//! Publication des collections GeoJSON sur S3 avec URL présignées

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use geojson::FeatureCollection;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::export::storage::{s3_uri, ArtifactStore, GEOJSON_CONTENT_TYPE};

const SECONDS_PER_DAY: u64 = 86_400;

/// Un artefact publié
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub presigned_url: String,
    pub storage_uri: String,
    /// Clé de sortie (id de classe ou nom de feature maillage)
    pub title: String,
}

/// Lien de téléchargement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    #[serde(rename = "Href")]
    pub href: String,
    pub rel: String,
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

/// Référence à un artefact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRef {
    pub href: String,
    pub title: String,
}

/// Résultat d'une extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishOutput {
    pub links: Vec<Link>,
    pub results: Vec<ResultRef>,
}

impl PublishOutput {
    pub fn from_uploads(uploads: &[UploadResult]) -> Self {
        Self {
            links: uploads
                .iter()
                .map(|u| Link {
                    href: u.presigned_url.clone(),
                    rel: "presigned-url".to_string(),
                    title: u.storage_uri.clone(),
                    media_type: GEOJSON_CONTENT_TYPE.to_string(),
                })
                .collect(),
            results: uploads
                .iter()
                .map(|u| ResultRef {
                    href: u.storage_uri.clone(),
                    title: u.title.clone(),
                })
                .collect(),
        }
    }
}

/// Clé d'objet `{prefix}/{nom du fichier source sans extension}_{key}.geojson`
pub fn object_key(prefix: &str, source_key: &str, key: &str) -> String {
    let base = Path::new(source_key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_key);
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("{}_{}.geojson", base, key)
    } else {
        format!("{}/{}_{}.geojson", prefix, base, key)
    }
}

/// Durée de validité; la validation garantit `0..=7`
pub fn expiry_duration(days: i64) -> Duration {
    Duration::from_secs(days.max(0) as u64 * SECONDS_PER_DAY)
}

/// Sérialise, envoie et signe chaque collection, dans l'ordre des clés.
///
/// Tout échec interrompt les envois restants; les objets déjà écrits restent.
pub async fn publish_collections(
    store: &dyn ArtifactStore,
    bucket: &str,
    prefix: &str,
    source_key: &str,
    url_expiry_days: i64,
    collections: &BTreeMap<String, FeatureCollection>,
) -> Result<Vec<UploadResult>, PipelineError> {
    let expires_in = expiry_duration(url_expiry_days);
    let mut uploads = Vec::with_capacity(collections.len());

    for (key, collection) in collections {
        let object = object_key(prefix, source_key, key);
        let publish_error = |reason: String| PipelineError::Publish {
            key: object.clone(),
            reason,
        };

        let body = serde_json::to_vec(collection).map_err(|e| publish_error(e.to_string()))?;
        debug!(object = %object, size = body.len(), "Uploading collection");

        store
            .put(bucket, &object, Bytes::from(body), GEOJSON_CONTENT_TYPE)
            .await
            .map_err(|e| publish_error(e.to_string()))?;

        let presigned_url = store
            .presign_get(bucket, &object, expires_in)
            .await
            .map_err(|e| publish_error(e.to_string()))?;

        uploads.push(UploadResult {
            presigned_url,
            storage_uri: s3_uri(bucket, &object),
            title: key.clone(),
        });
    }

    info!(bucket = %bucket, count = uploads.len(), "Published collections");
    Ok(uploads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key() {
        assert_eq!(
            object_key("out", "models/site_a.g01", "breakline"),
            "out/site_a_breakline.geojson"
        );
        assert_eq!(
            object_key("out/", "site_a.g01", "mesh_voronoi"),
            "out/site_a_mesh_voronoi.geojson"
        );
        assert_eq!(object_key("", "site_a.g01", "twodarea"), "site_a_twodarea.geojson");
    }

    #[test]
    fn test_expiry_duration() {
        assert_eq!(expiry_duration(0), Duration::ZERO);
        assert_eq!(expiry_duration(1), Duration::from_secs(86_400));
        assert_eq!(expiry_duration(7), Duration::from_secs(604_800));
    }

    #[test]
    fn test_publish_output_shape() {
        let output = PublishOutput::from_uploads(&[UploadResult {
            presigned_url: "https://example/signed".into(),
            storage_uri: "s3://b/out/site_a_breakline.geojson".into(),
            title: "breakline".into(),
        }]);
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "links": [{
                    "Href": "https://example/signed",
                    "rel": "presigned-url",
                    "title": "s3://b/out/site_a_breakline.geojson",
                    "type": "application/geo+json"
                }],
                "results": [{
                    "href": "s3://b/out/site_a_breakline.geojson",
                    "title": "breakline"
                }]
            })
        );
    }
}
