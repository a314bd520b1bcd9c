//! Tests d'intégration PostgreSQL
//!
//! Ces tests nécessitent une base PostGIS disponible.
//! Configuration via variables d'environnement:
//! - PGHOST, PGPORT, PGUSER, PGPASSWORD, PGDATABASE
//!
//! Exécution:
//! ```bash
//! docker run -d --name postgis-test -e POSTGRES_PASSWORD=test -p 5432:5432 postgis/postgis
//! PGPASSWORD=test PGDATABASE=postgres cargo test --test postgres_integration -- --ignored
//! ```

use anyhow::Result;
use deadpool_postgres::Pool;

use mcat_geo::config::CacheCatalog;
use mcat_geo::export::pool::{create_pool, DatabaseConfig};
use mcat_geo::export::postgres::{FeatureCache, PostgresCache};

const SCHEMA: &str = "mcat_test";

async fn create_test_pool() -> Result<Pool> {
    create_pool(&DatabaseConfig::from_env()).await
}

/// Schéma, tables et procédures d'upsert du cache
async fn setup_test_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;

    client
        .batch_execute(&format!(
            r#"
            CREATE EXTENSION IF NOT EXISTS postgis;
            DROP SCHEMA IF EXISTS {s} CASCADE;
            CREATE SCHEMA {s};

            CREATE TABLE {s}.break_line (
                s3_key TEXT NOT NULL,
                feature_name TEXT NOT NULL,
                geom geometry(LineString, 4326),
                PRIMARY KEY (s3_key, feature_name)
            );

            CREATE TABLE {s}.twod_area (
                s3_key TEXT NOT NULL,
                feature_name TEXT NOT NULL,
                geom geometry(Polygon, 4326),
                PRIMARY KEY (s3_key, feature_name)
            );

            CREATE PROCEDURE {s}.insert_break_line(key TEXT, name TEXT, g geometry)
            LANGUAGE SQL AS $$
                INSERT INTO {s}.break_line (s3_key, feature_name, geom) VALUES (key, name, g)
                ON CONFLICT (s3_key, feature_name) DO UPDATE SET geom = EXCLUDED.geom
            $$;

            CREATE PROCEDURE {s}.insert_twod_area(key TEXT, name TEXT, g geometry)
            LANGUAGE SQL AS $$
                INSERT INTO {s}.twod_area (s3_key, feature_name, geom) VALUES (key, name, g)
                ON CONFLICT (s3_key, feature_name) DO UPDATE SET geom = EXCLUDED.geom
            $$;
            "#,
            s = SCHEMA
        ))
        .await?;

    Ok(())
}

fn line_wkb() -> Vec<u8> {
    let line = geo::Geometry::LineString(geo::LineString::from(vec![(-81.6, 38.3), (-81.5, 38.4)]));
    wkb::geom_to_wkb(&line).unwrap()
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_database_connection() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    let cache = PostgresCache::new(pool);
    cache.ping().await.expect("Ping failed");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_upsert_is_idempotent() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    setup_test_schema(&pool).await.expect("Failed to setup schema");

    let catalog = CacheCatalog::default();
    let cache = PostgresCache::new(pool);

    for _ in 0..2 {
        cache
            .upsert(SCHEMA, &catalog.breakline, "models/site_a.g01", "Levee", &line_wkb())
            .await
            .expect("Upsert failed");
    }

    let rows = cache
        .read(SCHEMA, &catalog.breakline, Some("models/site_a.g01"))
        .await
        .expect("Read failed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].feature_name, "Levee");
    assert_eq!(rows[0].geometry, line_wkb());

    let other = cache
        .read(SCHEMA, &catalog.breakline, Some("models/other.g01"))
        .await
        .expect("Read failed");
    assert!(other.is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_upsert_rejects_wrong_geometry_type() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    setup_test_schema(&pool).await.expect("Failed to setup schema");

    let catalog = CacheCatalog::default();
    let cache = PostgresCache::new(pool);

    // Une ligne dans une table de polygones
    let result = cache
        .upsert(SCHEMA, &catalog.twodarea, "models/site_a.g01", "Main 2D", &line_wkb())
        .await;
    assert!(result.is_err());
}
