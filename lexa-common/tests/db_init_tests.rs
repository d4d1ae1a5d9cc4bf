//! Integration tests for database initialization
//!
//! Covers automatic database creation, idempotent re-opening, default settings
//! and the uniqueness constraints downstream engines rely on.

use lexa_common::db::init::{get_setting_i64, init_database};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("lexa.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("lexa.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    // Second open re-runs every CREATE ... IF NOT EXISTS
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("lexa.db")).await.unwrap();

    let wait = get_setting_i64(&pool, "ingest_max_lock_wait_ms", -1).await.unwrap();
    assert_eq!(wait, 5000);

    let missing = get_setting_i64(&pool, "no_such_setting", 7).await.unwrap();
    assert_eq!(missing, 7);
}

#[tokio::test]
async fn test_null_setting_reset_to_default() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("lexa.db");
    let pool = init_database(&db_path).await.unwrap();

    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'ingest_max_lock_wait_ms'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let wait = get_setting_i64(&pool, "ingest_max_lock_wait_ms", -1).await.unwrap();
    assert_eq!(wait, 5000);
}

#[tokio::test]
async fn test_pattern_uniqueness_per_language() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("lexa.db")).await.unwrap();

    let insert = "INSERT INTO patterns (guid, language, pattern_type, difficulty) VALUES (?, ?, ?, 3)";

    sqlx::query(insert).bind("p1").bind("ru").bind("noun_nom_sing_fem").execute(&pool).await.unwrap();
    // Same key in another language is a different pattern
    sqlx::query(insert).bind("p2").bind("uk").bind("noun_nom_sing_fem").execute(&pool).await.unwrap();

    let duplicate = sqlx::query(insert)
        .bind("p3")
        .bind("ru")
        .bind("noun_nom_sing_fem")
        .execute(&pool)
        .await;
    assert!(duplicate.is_err(), "Duplicate (language, pattern_type) must be rejected");
}

#[tokio::test]
async fn test_external_id_mapping_triple_is_unique() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("lexa.db")).await.unwrap();

    let insert = "INSERT INTO external_id_mappings (source_name, external_id, entity_type, internal_id) VALUES (?, ?, ?, ?)";

    sqlx::query(insert).bind("ud").bind("s1").bind("sentence").bind("a").execute(&pool).await.unwrap();
    sqlx::query(insert).bind("ud").bind("s1").bind("lemma").bind("b").execute(&pool).await.unwrap();

    let duplicate = sqlx::query(insert)
        .bind("ud")
        .bind("s1")
        .bind("sentence")
        .bind("c")
        .execute(&pool)
        .await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_complexity_score_range_enforced() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("lexa.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO sentences (guid, text, language, complexity_score, source) VALUES ('x', 'Hi', 'en', 11, 'test')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Scores outside [1, 10] must be rejected");
}
