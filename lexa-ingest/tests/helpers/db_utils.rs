//! Database Test Utilities

use anyhow::Result;
use lexa_ingest::{IngestionPipeline, PipelineConfig};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create temporary test database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_lexa.db");

    let pool = lexa_common::db::init_database(&db_path).await?;

    Ok((temp_dir, pool))
}

/// Pipeline over a test database with a small batch size
pub fn create_test_pipeline(pool: SqlitePool, batch_size: usize) -> IngestionPipeline {
    let config = PipelineConfig {
        batch_size,
        ..PipelineConfig::default()
    };
    IngestionPipeline::new(pool, config)
}

/// Row count of a table
pub async fn count_rows(pool: &SqlitePool, table_name: &str) -> i64 {
    let query = format!("SELECT COUNT(*) FROM {}", table_name);
    sqlx::query_scalar(&query).fetch_one(pool).await.unwrap()
}
