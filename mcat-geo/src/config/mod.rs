//! Configuration du système
//!
//! `AppConfig` est chargée une fois au démarrage (variables d'environnement,
//! `.env` via dotenvy), puis passée par référence au pipeline.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use ras_geometry::FeatureClass;

use crate::export::pool::DatabaseConfig;

/// Délai par défaut d'une requête (secondes)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Schéma par défaut des tables et procédures du cache
pub const DEFAULT_SCHEMA: &str = "mcat";

/// Configuration principale
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub request_timeout: Duration,
    pub catalog: CacheCatalog,
}

/// Accès au stockage objet S3
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// Bucket des fichiers sources (`AWS_S3_BUCKET`)
    pub bucket: Option<String>,
    /// Endpoint compatible S3 (MinIO, ...)
    pub endpoint: Option<String>,
    pub allow_http: bool,
}

impl StorageConfig {
    fn from_vars(get: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            access_key_id: required(get, "AWS_ACCESS_KEY_ID")?,
            secret_access_key: required(get, "AWS_SECRET_ACCESS_KEY")?,
            region: required(get, "AWS_REGION")?,
            bucket: optional(get, "AWS_S3_BUCKET"),
            endpoint: optional(get, "AWS_ENDPOINT"),
            allow_http: optional(get, "AWS_ALLOW_HTTP")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

impl AppConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Charge la configuration depuis une source de variables quelconque
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let storage = StorageConfig::from_vars(&get)?;
        let database = DatabaseConfig::from_vars(&get);

        let request_timeout = match optional(&get, "REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid REQUEST_TIMEOUT_SECS: {}", raw))?;
                if secs == 0 {
                    bail!("REQUEST_TIMEOUT_SECS must be greater than 0");
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let mut catalog = CacheCatalog::default();
        if let Some(schema) = optional(&get, "MCAT_SCHEMA") {
            catalog.schema = schema;
        }
        catalog.validate()?;

        Ok(Self {
            storage,
            database,
            request_timeout,
            catalog,
        })
    }

    /// Remplace le catalogue par celui d'un fichier JSON.
    ///
    /// `MCAT_SCHEMA` garde la priorité s'il est défini.
    pub fn with_catalog_file(mut self, path: &Path) -> Result<Self> {
        let mut catalog = CacheCatalog::load(path)?;
        if let Ok(schema) = std::env::var("MCAT_SCHEMA") {
            if !schema.trim().is_empty() {
                catalog.schema = schema;
            }
        }
        catalog.validate()?;
        self.catalog = catalog;
        Ok(self)
    }
}

fn optional(get: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    get(name).filter(|v| !v.trim().is_empty())
}

fn required(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    optional(get, name).with_context(|| format!("Missing environment variable {}", name))
}

/// Procédure d'upsert et table de lecture pour une famille de features
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheTarget {
    /// Procédure `(text, text, geometry)` idempotente sur (fichier, nom)
    pub procedure: String,
    /// Table lue par le mode serveur (`s3_key`, `feature_name`, `geom`)
    pub table: String,
}

impl CacheTarget {
    pub fn new(procedure: &str, table: &str) -> Self {
        Self {
            procedure: procedure.to_string(),
            table: table.to_string(),
        }
    }
}

/// Catalogue des cibles du cache.
///
/// Seules les features maillage listées dans `mesh` sont mises en cache:
/// chaque nom correspond à une table dont le type géométrique est fixé.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheCatalog {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub breakline: CacheTarget,
    pub twodarea: CacheTarget,
    #[serde(default = "default_mesh_targets")]
    pub mesh: BTreeMap<String, CacheTarget>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_mesh_targets() -> BTreeMap<String, CacheTarget> {
    BTreeMap::from([(
        "mesh_voronoi".to_string(),
        CacheTarget::new("insert_mesh_line", "mesh_line"),
    )])
}

impl Default for CacheCatalog {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            breakline: CacheTarget::new("insert_break_line", "break_line"),
            twodarea: CacheTarget::new("insert_twod_area", "twod_area"),
            mesh: default_mesh_targets(),
        }
    }
}

impl CacheCatalog {
    /// Charge un catalogue depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read catalog file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse catalog JSON")
    }

    /// Cible d'une feature, `None` si elle n'est pas mise en cache
    pub fn target(&self, class: FeatureClass, feature_name: &str) -> Option<&CacheTarget> {
        match class {
            FeatureClass::Breakline => Some(&self.breakline),
            FeatureClass::TwoDArea => Some(&self.twodarea),
            FeatureClass::Mesh => self.mesh.get(feature_name),
            FeatureClass::Other => None,
        }
    }

    /// Tables à lire pour servir une classe
    pub fn tables(&self, class: FeatureClass) -> Vec<&CacheTarget> {
        match class {
            FeatureClass::Breakline => vec![&self.breakline],
            FeatureClass::TwoDArea => vec![&self.twodarea],
            FeatureClass::Mesh => {
                let mut targets: Vec<&CacheTarget> = Vec::new();
                for target in self.mesh.values() {
                    if !targets.iter().any(|t| t.table == target.table) {
                        targets.push(target);
                    }
                }
                targets
            }
            FeatureClass::Other => Vec::new(),
        }
    }

    /// Vérifie que les noms sont des identifiants SQL simples (ils sont interpolés)
    pub fn validate(&self) -> Result<()> {
        let mut names = vec![&self.schema];
        for target in [&self.breakline, &self.twodarea]
            .into_iter()
            .chain(self.mesh.values())
        {
            names.push(&target.procedure);
            names.push(&target.table);
        }
        for name in names {
            if !is_sql_identifier(name) {
                bail!("Invalid SQL identifier in cache catalog: '{}'", name);
            }
        }
        Ok(())
    }
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Manifeste de projet: modèles à rafraîchir au démarrage du serveur
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectManifest {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

/// Un modèle hydraulique du projet
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelEntry {
    pub name: String,
    /// Clé S3 du fichier .g01
    pub geometry_file: String,
    /// Nom de projection (`wktUSACEProj`, ...)
    pub projection: String,
}

impl ProjectManifest {
    /// Charge un manifeste depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read project manifest: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse project manifest JSON")
    }
}
