//! Modules d'export (GeoJSON, S3, PostgreSQL)

pub mod geojson;
pub mod pool;
pub mod postgres;
pub mod publish;
pub mod reproject;
pub mod storage;

pub use reproject::Reprojector;
