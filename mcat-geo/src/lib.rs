//! # mcat-geo
//!
//! Extraction des géométries de modèles HEC-RAS (.g01) vers GeoJSON sur S3,
//! et cache PostGIS des mêmes features.
//!
//! ## Features
//!
//! - Extraction par classe (maillage, lignes de rupture, zones 2D) reprojetée en EPSG:4326
//! - Publication GeoJSON sur S3 avec URL présignées
//! - Cache PostGIS alimenté par procédures stockées
//! - API HTTP de lecture du cache
//!
//! ## Usage CLI
//!
//! ```bash
//! # Extraction vers S3
//! mcat-geo extract --g01-key models/site_a.g01 --projection wktUSACEProj \
//!     --bucket out-bucket --output-prefix out --geo-elements breakline,mesh --url-exp-days 1
//!
//! # Rafraîchissement du cache
//! mcat-geo refresh --key models/site_a.g01 --projection wktUSACEProj
//!
//! # Serveur
//! mcat-geo serve --bind 0.0.0.0:5600 --project project.json
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod server;

pub use config::AppConfig;
pub use error::{PipelineError, ValidationError};
pub use export::pool::{create_pool, DatabaseConfig};
pub use pipeline::Pipeline;
pub use report::{RefreshReport, RefreshStatus};
