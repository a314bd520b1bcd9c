//! Cache PostGIS des features
//!
//! L'écriture passe par des procédures stockées idempotentes sur
//! (fichier source, nom de feature); la lecture sert le mode serveur.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tracing::{debug, instrument};

use crate::config::CacheTarget;
use crate::error::CacheError;
use crate::export::pool::test_connection;

/// Une ligne du cache, géométrie en WKB EPSG:4326
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRow {
    pub source_file: String,
    pub feature_name: String,
    pub geometry: Vec<u8>,
}

/// Cache relationnel des features
#[async_trait]
pub trait FeatureCache: Send + Sync {
    /// Appelle la procédure de `target` pour une feature
    async fn upsert(
        &self,
        schema: &str,
        target: &CacheTarget,
        source_file: &str,
        feature_name: &str,
        wkb: &[u8],
    ) -> Result<(), CacheError>;

    /// Lit la table de `target`, éventuellement restreinte à un fichier source
    async fn read(
        &self,
        schema: &str,
        target: &CacheTarget,
        source_file: Option<&str>,
    ) -> Result<Vec<CacheRow>, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

/// Appel d'une procédure d'upsert
pub fn upsert_sql(schema: &str, procedure: &str) -> String {
    format!(
        "CALL {}.{}($1, $2, ST_SetSRID(ST_GeomFromWKB($3), 4326))",
        schema, procedure
    )
}

/// Lecture d'une table du cache
pub fn select_sql(schema: &str, table: &str, by_source: bool) -> String {
    let mut sql = format!(
        "SELECT s3_key, feature_name, ST_AsBinary(geom) FROM {}.{}",
        schema, table
    );
    if by_source {
        sql.push_str(" WHERE s3_key = $1");
    }
    sql.push_str(" ORDER BY s3_key, feature_name");
    sql
}

/// Cache sur un pool deadpool-postgres
#[derive(Clone)]
pub struct PostgresCache {
    pool: Pool,
}

impl PostgresCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeatureCache for PostgresCache {
    #[instrument(skip(self, wkb), fields(procedure = %target.procedure, size = wkb.len()))]
    async fn upsert(
        &self,
        schema: &str,
        target: &CacheTarget,
        source_file: &str,
        feature_name: &str,
        wkb: &[u8],
    ) -> Result<(), CacheError> {
        let client = self.pool.get().await?;
        let sql = upsert_sql(schema, &target.procedure);
        client
            .execute(&sql, &[&source_file, &feature_name, &wkb])
            .await?;
        debug!("Upserted feature");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %target.table))]
    async fn read(
        &self,
        schema: &str,
        target: &CacheTarget,
        source_file: Option<&str>,
    ) -> Result<Vec<CacheRow>, CacheError> {
        let client = self.pool.get().await?;
        let sql = select_sql(schema, &target.table, source_file.is_some());
        let rows = match source_file {
            Some(key) => client.query(&sql, &[&key]).await?,
            None => client.query(&sql, &[]).await?,
        };

        let rows = rows
            .iter()
            .map(|row| -> Result<CacheRow, CacheError> {
                Ok(CacheRow {
                    source_file: row.try_get(0)?,
                    feature_name: row.try_get(1)?,
                    geometry: row.try_get(2)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = rows.len(), "Read cached features");
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        test_connection(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_sql() {
        assert_eq!(
            upsert_sql("mcat", "insert_break_line"),
            "CALL mcat.insert_break_line($1, $2, ST_SetSRID(ST_GeomFromWKB($3), 4326))"
        );
    }

    #[test]
    fn test_select_sql() {
        assert_eq!(
            select_sql("mcat", "twod_area", false),
            "SELECT s3_key, feature_name, ST_AsBinary(geom) FROM mcat.twod_area ORDER BY s3_key, feature_name"
        );
        assert!(select_sql("mcat", "mesh_line", true).contains("WHERE s3_key = $1"));
    }
}
