//! Doublures en mémoire pour les tests du pipeline et du serveur
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use geo::{Geometry, LineString, Point};

use mcat_geo::config::CacheTarget;
use mcat_geo::error::{CacheError, SourceError, StorageError};
use mcat_geo::export::geojson::WkbConverter;
use mcat_geo::export::postgres::{CacheRow, FeatureCache};
use mcat_geo::export::storage::ArtifactStore;
use mcat_geo::pipeline::source::{FeatureRecord, GeometrySource};
use mcat_geo::Pipeline;
use ras_geometry::{ByClass, FeatureClass};

pub const SOURCE_BUCKET: &str = "models";
pub const SOURCE_KEY: &str = "models/site_a.g01";

/// Stockage objet en mémoire, journalise chaque appel
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<(String, String), (Bytes, String)>>,
    pub calls: AtomicUsize,
    pub presigned: Mutex<Vec<Duration>>,
    pub fail_put: bool,
    pub unhealthy: bool,
}

impl MemoryStore {
    pub fn with_object(bucket: &str, key: &str) -> Self {
        let store = Self::default();
        store.insert(bucket, key, Bytes::from_static(b"Geom Title=Test\n"));
        store
    }

    pub fn insert(&self, bucket: &str, key: &str, body: Bytes) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            (body, "application/octet-stream".to_string()),
        );
    }

    /// Objets écrits par le pipeline (hors fichiers sources)
    pub fn uploaded(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (_, content_type))| content_type == "application/geo+json")
            .map(|((bucket, key), _)| (bucket.clone(), key.clone()))
            .collect();
        keys.sort();
        keys
    }

    pub fn object_json(&self, bucket: &str, key: &str) -> serde_json::Value {
        let objects = self.objects.lock().unwrap();
        let (body, _) = &objects[&(bucket.to_string(), key.to_string())];
        serde_json::from_slice(body).unwrap()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(body, _)| body.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put {
            return Err(StorageError::Request {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "access denied".to_string(),
            });
        }
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            (body, content_type.to_string()),
        );
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.presigned.lock().unwrap().push(expires_in);
        Ok(format!(
            "https://{}.s3.test/{}?X-Amz-Expires={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        if self.unhealthy {
            Err(StorageError::NoDefaultBucket)
        } else {
            Ok(())
        }
    }
}

/// Source de géométrie renvoyant des features préparées
pub struct FakeSource {
    pub features: ByClass<FeatureRecord>,
    pub reads: AtomicUsize,
    pub delay: Option<Duration>,
}

impl FakeSource {
    pub fn new(features: ByClass<FeatureRecord>) -> Self {
        Self {
            features,
            reads: AtomicUsize::new(0),
            delay: None,
        }
    }
}

#[async_trait]
impl GeometrySource for FakeSource {
    async fn read(
        &self,
        _bucket: &str,
        _key: &str,
        _source_wkt: &str,
    ) -> Result<ByClass<FeatureRecord>, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.features.clone())
    }
}

/// Cache en mémoire: une entrée par (table, fichier source, nom)
#[derive(Default)]
pub struct MemoryCache {
    pub rows: Mutex<BTreeMap<(String, String, String), Vec<u8>>>,
    pub upserts: AtomicUsize,
    /// Procédure qui échoue systématiquement
    pub failing_procedure: Option<String>,
    pub down: bool,
}

impl MemoryCache {
    pub fn snapshot(&self) -> BTreeMap<(String, String, String), Vec<u8>> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeatureCache for MemoryCache {
    async fn upsert(
        &self,
        _schema: &str,
        target: &CacheTarget,
        source_file: &str,
        feature_name: &str,
        wkb: &[u8],
    ) -> Result<(), CacheError> {
        if self.failing_procedure.as_deref() == Some(target.procedure.as_str()) {
            return Err(CacheError::Backend(format!(
                "procedure {} failed",
                target.procedure
            )));
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().insert(
            (
                target.table.clone(),
                source_file.to_string(),
                feature_name.to_string(),
            ),
            wkb.to_vec(),
        );
        Ok(())
    }

    async fn read(
        &self,
        _schema: &str,
        target: &CacheTarget,
        source_file: Option<&str>,
    ) -> Result<Vec<CacheRow>, CacheError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((table, source, _), _)| {
                table == &target.table && source_file.map_or(true, |s| s == source)
            })
            .map(|((_, source, name), wkb)| CacheRow {
                source_file: source.clone(),
                feature_name: name.clone(),
                geometry: wkb.clone(),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        if self.down {
            Err(CacheError::Backend("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn point_wkb(x: f64, y: f64) -> Vec<u8> {
    wkb::geom_to_wkb(&Geometry::Point(Point::new(x, y))).unwrap()
}

pub fn line_wkb(coords: &[(f64, f64)]) -> Vec<u8> {
    wkb::geom_to_wkb(&Geometry::LineString(LineString::from(coords.to_vec()))).unwrap()
}

pub fn record(class: FeatureClass, name: &str, wkb: Vec<u8>) -> FeatureRecord {
    FeatureRecord {
        feature_class: class,
        feature_name: name.to_string(),
        raw_geometry: wkb,
        source_file: SOURCE_KEY.to_string(),
    }
}

/// Trois lignes de rupture, deux features maillage, une zone 2D
pub fn site_a_features() -> ByClass<FeatureRecord> {
    let mut features = ByClass::new();
    for (i, name) in ["Levee North", "Levee South", "Road"].iter().enumerate() {
        let x = -81.6 + i as f64 * 0.01;
        features.push(
            FeatureClass::Breakline,
            record(
                FeatureClass::Breakline,
                name,
                line_wkb(&[(x, 38.3), (x + 0.005, 38.31)]),
            ),
        );
    }
    features.push(
        FeatureClass::Mesh,
        record(
            FeatureClass::Mesh,
            "mesh_voronoi",
            line_wkb(&[(-81.6, 38.3), (-81.59, 38.3)]),
        ),
    );
    features.push(
        FeatureClass::Mesh,
        record(
            FeatureClass::Mesh,
            "mesh_perimeter",
            line_wkb(&[(-81.61, 38.29), (-81.58, 38.29)]),
        ),
    );
    features.push(
        FeatureClass::TwoDArea,
        record(FeatureClass::TwoDArea, "Main 2D", point_wkb(-81.6, 38.3)),
    );
    features
}

/// Pipeline complet sur doublures
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub source: Arc<FakeSource>,
    pub cache: Arc<MemoryCache>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new(store: MemoryStore, source: FakeSource, cache: MemoryCache) -> Self {
        let store = Arc::new(store);
        let source = Arc::new(source);
        let cache = Arc::new(cache);
        let pipeline = Pipeline::new(store.clone(), source.clone(), Arc::new(WkbConverter))
            .with_cache(cache.clone())
            .with_source_bucket(SOURCE_BUCKET);
        Self {
            store,
            source,
            cache,
            pipeline,
        }
    }

    pub fn site_a() -> Self {
        Self::new(
            MemoryStore::with_object(SOURCE_BUCKET, SOURCE_KEY),
            FakeSource::new(site_a_features()),
            MemoryCache::default(),
        )
    }
}
