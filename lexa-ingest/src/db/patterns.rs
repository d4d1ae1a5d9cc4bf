//! Pattern storage
//!
//! Patterns are append-only. The (language, pattern_type) uniqueness constraint
//! is enforced by the schema; the run cache keeps a run from creating one twice.

use lexa_common::db::Pattern;
use lexa_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{from_json, parse_uuid, to_json};

pub async fn insert_pattern(conn: &mut SqliteConnection, pattern: &Pattern) -> Result<()> {
    let features = to_json(&pattern.features)?;

    sqlx::query(
        "INSERT INTO patterns (guid, language, pattern_type, features, difficulty) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(pattern.guid.to_string())
    .bind(&pattern.language)
    .bind(&pattern.pattern_type)
    .bind(features)
    .bind(pattern.difficulty as i64)
    .execute(conn)
    .await?;

    Ok(())
}

/// pattern_type → id for every pattern of a language
pub async fn load_pattern_ids(pool: &SqlitePool, language: &str) -> Result<HashMap<String, Uuid>> {
    let rows = sqlx::query("SELECT guid, pattern_type FROM patterns WHERE language = ?")
        .bind(language)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let id = parse_uuid(row.get::<String, _>("guid").as_str())?;
            Ok((row.get::<String, _>("pattern_type"), id))
        })
        .collect()
}

pub async fn find_pattern(pool: &SqlitePool, language: &str, pattern_type: &str) -> Result<Option<Pattern>> {
    let row = sqlx::query(
        "SELECT guid, language, pattern_type, features, difficulty FROM patterns WHERE language = ? AND pattern_type = ?",
    )
    .bind(language)
    .bind(pattern_type)
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        Ok(Pattern {
            guid: parse_uuid(row.get::<String, _>("guid").as_str())?,
            language: row.get("language"),
            pattern_type: row.get("pattern_type"),
            features: from_json(row.get::<String, _>("features").as_str())?,
            difficulty: row.get::<i64, _>("difficulty") as u8,
        })
    })
    .transpose()
}

pub async fn count_patterns(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM patterns").fetch_one(pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_insert_load_and_duplicate_rejection() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        lexa_common::db::init_schema(&pool).await.unwrap();

        let pattern = Pattern {
            guid: Uuid::new_v4(),
            language: "ru".into(),
            pattern_type: "noun_nom_sing_fem".into(),
            features: serde_json::json!({"Case": "Nom", "Number": "Sing", "Gender": "Fem"}),
            difficulty: 4,
        };

        let mut conn = pool.acquire().await.unwrap();
        insert_pattern(&mut conn, &pattern).await.unwrap();
        let duplicate = Pattern { guid: Uuid::new_v4(), ..pattern.clone() };
        assert!(insert_pattern(&mut conn, &duplicate).await.is_err());
        drop(conn);

        let ids = load_pattern_ids(&pool, "ru").await.unwrap();
        assert_eq!(ids.get("noun_nom_sing_fem"), Some(&pattern.guid));
        assert!(load_pattern_ids(&pool, "es").await.unwrap().is_empty());

        let found = find_pattern(&pool, "ru", "noun_nom_sing_fem").await.unwrap();
        assert_eq!(found, Some(pattern));
    }
}
