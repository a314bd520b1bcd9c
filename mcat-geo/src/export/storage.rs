//! Stockage objet S3 (existence, lecture, écriture, URL présignées)

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{ClientOptions, ObjectStore};
use tracing::{debug, instrument};

use crate::config::StorageConfig;
use crate::error::StorageError;

/// Type MIME des artefacts GeoJSON
pub const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

/// Stockage d'artefacts adressé par (bucket, clé)
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// L'objet existe-t-il ? Une erreur signale un stockage injoignable.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// URL GET présignée valable `expires_in`
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;

    /// Vérifie l'accès au bucket par défaut
    async fn health_check(&self) -> Result<(), StorageError>;
}

/// Clients partagés, par bucket et type de contenu par défaut
type ClientKey = (String, Option<String>);

/// Client S3 (AWS ou compatible) basé sur `object_store`
///
/// Chaque client garde son pool de connexions HTTP; ils sont créés à la
/// première utilisation puis réutilisés par toutes les requêtes.
pub struct S3Store {
    config: StorageConfig,
    clients: Mutex<HashMap<ClientKey, Arc<AmazonS3>>>,
}

impl S3Store {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Client pour un bucket; `content_type` fixe le type des objets écrits
    fn client(&self, bucket: &str, content_type: Option<&str>) -> Result<Arc<AmazonS3>, StorageError> {
        let key = (bucket.to_string(), content_type.map(str::to_string));
        let mut clients = self.clients.lock().map_err(|_| StorageError::Client {
            bucket: bucket.to_string(),
            reason: "client cache poisoned".to_string(),
        })?;
        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(self.build_client(bucket, content_type)?);
        debug!(bucket, content_type, "Created S3 client");
        clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    fn build_client(&self, bucket: &str, content_type: Option<&str>) -> Result<AmazonS3, StorageError> {
        let mut options =
            ClientOptions::new().with_content_type_for_suffix("geojson", GEOJSON_CONTENT_TYPE);
        if let Some(content_type) = content_type {
            options = options.with_default_content_type(content_type);
        }

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&self.config.region)
            .with_access_key_id(&self.config.access_key_id)
            .with_secret_access_key(&self.config.secret_access_key)
            .with_client_options(options);

        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if self.config.allow_http {
            builder = builder.with_allow_http(true);
        }

        builder.build().map_err(|e| StorageError::Client {
            bucket: bucket.to_string(),
            reason: e.to_string(),
        })
    }
}

fn request_error(bucket: &str, key: &str, e: object_store::Error) -> StorageError {
    match e {
        object_store::Error::NotFound { .. } => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        other => StorageError::Request {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let store = self.client(bucket, None)?;
        match store.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(request_error(bucket, key, e)),
        }
    }

    #[instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let store = self.client(bucket, None)?;
        let location = Path::from(key);

        let result = store
            .get(&location)
            .await
            .map_err(|e| request_error(bucket, key, e))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| request_error(bucket, key, e))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    #[instrument(skip(self, body), fields(bucket = %bucket, key = %key))]
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let store = self.client(bucket, Some(content_type))?;
        debug!(size = body.len(), content_type, "Writing object");

        store
            .put(&Path::from(key), body)
            .await
            .map_err(|e| request_error(bucket, key, e))?;
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let store = self.client(bucket, None)?;
        let url = store
            .signed_url(reqwest::Method::GET, &Path::from(key), expires_in)
            .await
            .map_err(|e| request_error(bucket, key, e))?;
        Ok(url.to_string())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let bucket = self
            .config
            .bucket
            .as_deref()
            .ok_or(StorageError::NoDefaultBucket)?;
        let store = self.client(bucket, None)?;

        let mut stream = store.list(None);
        stream
            .try_next()
            .await
            .map_err(|e| request_error(bucket, "", e))?;
        Ok(())
    }
}

/// URI `s3://bucket/key`
pub fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}
