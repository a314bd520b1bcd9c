//! # ras-geometry
//!
//! Lecteur pour les fichiers de géométrie texte HEC-RAS (`.g01`, `.g02`, ...).
//!
//! ## Features
//!
//! - Lecture des zones de stockage, zones d'écoulement 2D et lignes de rupture
//! - Coordonnées à largeur fixe (16 caractères) ou séparées par des espaces
//! - Décodage Windows-1252 avec `encoding_rs`
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ras_geometry::{parse_file, FeatureClass};
//! use std::path::Path;
//!
//! let result = parse_file(Path::new("model.g01"))?;
//! println!("Titre: {}", result.title);
//!
//! for (class, features) in result.features.non_empty() {
//!     println!("{}: {} features", class, features.len());
//! }
//! ```

pub mod error;
pub mod geometry;
pub mod parser;
pub mod types;

pub use error::GeometryError;
pub use geometry::{MESH_PERIMETER, MESH_POINTS};
pub use types::{ByClass, FeatureClass, ParseResult, VectorFeature};

use std::path::Path;

/// Parse le contenu brut d'un fichier .g01.
///
/// # Errors
///
/// Retourne `GeometryError::InvalidFormat` si l'en-tête `Geom Title=` est absent.
/// Les entités invalides sont ignorées et listées dans `ParseResult::errors`.
pub fn parse(data: &[u8]) -> Result<ParseResult, GeometryError> {
    let content = decode(data);

    let mut errors = Vec::new();
    let parsed = parser::g01::parse(&content, &mut errors);

    let Some(title) = parsed.title.clone() else {
        return Err(GeometryError::InvalidFormat(
            "missing 'Geom Title=' header".to_string(),
        ));
    };

    let features = geometry::build_features(&parsed, &mut errors);

    Ok(ParseResult {
        title,
        program_version: parsed.program_version,
        features,
        errors,
    })
}

/// Lit et parse un fichier .g01 depuis le disque
pub fn parse_file(path: &Path) -> Result<ParseResult, GeometryError> {
    let data = std::fs::read(path)?;
    parse(&data)
}

/// Les fichiers HEC-RAS sont écrits en Windows-1252
fn decode(data: &[u8]) -> String {
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(data);
    decoded.into_owned()
}
