//! External id mappings
//!
//! (source_name, external_id, entity_type) → internal id. This table is what
//! makes repeated runs over the same source idempotent.

use lexa_common::db::{EntityType, ExternalIdMapping};
use lexa_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::parse_uuid;

pub async fn insert_mapping(conn: &mut SqliteConnection, mapping: &ExternalIdMapping) -> Result<()> {
    sqlx::query(
        "INSERT INTO external_id_mappings (source_name, external_id, entity_type, internal_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&mapping.source_name)
    .bind(&mapping.external_id)
    .bind(mapping.entity_type.as_str())
    .bind(mapping.internal_id.to_string())
    .execute(conn)
    .await?;

    Ok(())
}

/// external_id → internal id for one source and entity type
pub async fn load_mappings(
    pool: &SqlitePool,
    source_name: &str,
    entity_type: EntityType,
) -> Result<HashMap<String, Uuid>> {
    let rows = sqlx::query(
        "SELECT external_id, internal_id FROM external_id_mappings WHERE source_name = ? AND entity_type = ?",
    )
    .bind(source_name)
    .bind(entity_type.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id = parse_uuid(row.get::<String, _>("internal_id").as_str())?;
            Ok((row.get::<String, _>("external_id"), id))
        })
        .collect()
}

pub async fn find_mapping(
    pool: &SqlitePool,
    source_name: &str,
    external_id: &str,
    entity_type: EntityType,
) -> Result<Option<Uuid>> {
    let id: Option<String> = sqlx::query_scalar(
        "SELECT internal_id FROM external_id_mappings WHERE source_name = ? AND external_id = ? AND entity_type = ?",
    )
    .bind(source_name)
    .bind(external_id)
    .bind(entity_type.as_str())
    .fetch_optional(pool)
    .await?;

    id.as_deref().map(parse_uuid).transpose()
}

pub async fn count_mappings(pool: &SqlitePool, source_name: &str) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM external_id_mappings WHERE source_name = ?")
        .bind(source_name)
        .fetch_one(pool)
        .await?)
}
