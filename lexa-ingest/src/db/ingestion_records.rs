//! Ingestion record persistence
//!
//! Audit rows are written outside batch transactions and go through
//! `retry_on_lock`, so a busy database delays the bookkeeping instead of losing it.

use chrono::{DateTime, Utc};
use lexa_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{from_json, max_lock_wait_ms, parse_uuid, to_json};
use crate::models::{IngestionRecord, DEFAULT_MAX_ERROR_LOG};
use crate::utils::retry_on_lock;

/// Insert or update the full record
pub async fn save_record(pool: &SqlitePool, record: &IngestionRecord) -> Result<()> {
    // Prepare all data before touching the database
    let guid = record.guid.to_string();
    let source_type = record.source_type.as_str();
    let status = record.status.as_str();
    let errors = to_json(&record.errors)?;
    let started_at = record.started_at.to_rfc3339();
    let completed_at = record.completed_at.map(|dt| dt.to_rfc3339());

    let max_wait_ms = max_lock_wait_ms(pool).await?;

    retry_on_lock("save_ingestion_record", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO ingestion_records (
                guid, source_type, source_name, file_path, status,
                records_processed, records_created, records_updated,
                records_skipped, records_failed, errors, error_message,
                started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                status = excluded.status,
                records_processed = excluded.records_processed,
                records_created = excluded.records_created,
                records_updated = excluded.records_updated,
                records_skipped = excluded.records_skipped,
                records_failed = excluded.records_failed,
                errors = excluded.errors,
                error_message = excluded.error_message,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(&guid)
        .bind(source_type)
        .bind(&record.source_name)
        .bind(&record.file_path)
        .bind(status)
        .bind(record.records_processed as i64)
        .bind(record.records_created as i64)
        .bind(record.records_updated as i64)
        .bind(record.records_skipped as i64)
        .bind(record.records_failed as i64)
        .bind(&errors)
        .bind(&record.error_message)
        .bind(&started_at)
        .bind(&completed_at)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

pub async fn load_record(pool: &SqlitePool, record_id: Uuid) -> Result<Option<IngestionRecord>> {
    let row = sqlx::query(
        r#"
        SELECT guid, source_type, source_name, file_path, status,
               records_processed, records_created, records_updated,
               records_skipped, records_failed, errors, error_message,
               started_at, completed_at
        FROM ingestion_records
        WHERE guid = ?
        "#,
    )
    .bind(record_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let completed_at: Option<String> = row.get("completed_at");
    let record = IngestionRecord {
        guid: parse_uuid(row.get::<String, _>("guid").as_str())?,
        source_type: row.get::<String, _>("source_type").parse()?,
        source_name: row.get("source_name"),
        file_path: row.get("file_path"),
        status: row.get::<String, _>("status").parse()?,
        records_processed: row.get::<i64, _>("records_processed") as u64,
        records_created: row.get::<i64, _>("records_created") as u64,
        records_updated: row.get::<i64, _>("records_updated") as u64,
        records_skipped: row.get::<i64, _>("records_skipped") as u64,
        records_failed: row.get::<i64, _>("records_failed") as u64,
        errors: from_json(row.get::<String, _>("errors").as_str())?,
        error_message: row.get("error_message"),
        started_at: parse_timestamp(row.get::<String, _>("started_at").as_str())?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        // The cap is a run setting and is not persisted
        max_errors: DEFAULT_MAX_ERROR_LOG,
    };

    Ok(Some(record))
}

/// Most recent runs first
pub async fn list_records(pool: &SqlitePool, limit: i64) -> Result<Vec<IngestionRecord>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT guid FROM ingestion_records ORDER BY started_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = load_record(pool, parse_uuid(&id)?).await? {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunStatus, SourceType};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        lexa_common::db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_save_twice_updates_in_place() {
        let pool = pool().await;
        let mut record = IngestionRecord::new(SourceType::Corpus, "ud_test", "/data/test.conllu", 10);
        save_record(&pool, &record).await.unwrap();

        record.transition_to(RunStatus::Running).unwrap();
        record.add_created(5);
        record.add_failure("line 12: bad field count");
        record.complete().unwrap();
        save_record(&pool, &record).await.unwrap();

        let loaded = load_record(&pool, record.guid).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.records_processed, 6);
        assert_eq!(loaded.records_created, 5);
        assert_eq!(loaded.errors, vec!["line 12: bad field count"]);
        assert_eq!(
            loaded.completed_at.map(|t| t.timestamp()),
            record.completed_at.map(|t| t.timestamp())
        );

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingestion_records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_missing_record() {
        let pool = pool().await;
        assert!(load_record(&pool, Uuid::new_v4()).await.unwrap().is_none());
        assert!(list_records(&pool, 10).await.unwrap().is_empty());
    }
}
