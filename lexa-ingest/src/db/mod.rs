//! Storage repositories for ingested records
//!
//! Writes staged inside a batch take a `&mut SqliteConnection` from the batch
//! transaction; reads and the audit record go through the pool. Ids are stored
//! as UUID strings in `guid TEXT` columns.

pub mod ingestion_records;
pub mod lemmas;
pub mod mappings;
pub mod patterns;
pub mod sentences;

use lexa_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Settings key bounding lock retries
pub const MAX_LOCK_WAIT_SETTING: &str = "ingest_max_lock_wait_ms";

const DEFAULT_MAX_LOCK_WAIT_MS: i64 = 5000;

/// Retry budget for lock contention, from the settings table
pub async fn max_lock_wait_ms(pool: &SqlitePool) -> Result<u64> {
    let value = lexa_common::db::get_setting_i64(pool, MAX_LOCK_WAIT_SETTING, DEFAULT_MAX_LOCK_WAIT_MS).await?;
    Ok(value.max(0) as u64)
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid stored id '{}': {}", value, e)))
}

pub(crate) fn to_json(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Internal(format!("Failed to serialize: {}", e)))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    serde_json::from_str(value).map_err(|e| Error::Internal(format!("Failed to deserialize: {}", e)))
}
