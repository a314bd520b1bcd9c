//! Types d'erreurs pour le crate ras-geometry

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'un fichier de géométrie HEC-RAS
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Erreur d'I/O lors de la lecture du fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Le contenu n'est pas un fichier de géométrie HEC-RAS
    #[error("Invalid geometry file: {0}")]
    InvalidFormat(String),

    /// Erreur de parsing à une ligne donnée
    #[error("Parse error at line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    /// Géométrie invalide pour une entité nommée
    #[error("Invalid geometry for {name}: {reason}")]
    InvalidGeometry { name: String, reason: String },
}

impl GeometryError {
    /// Crée une erreur de parsing avec contexte (ligne 1-based)
    pub fn parse_error(line: usize, reason: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
