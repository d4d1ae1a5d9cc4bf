//! Database initialization
//!
//! Opens (or creates) the corpus store and brings the schema up to date. Every
//! statement is idempotent, so this runs on each startup.

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let path = db_path
        .to_str()
        .ok_or_else(|| Error::Config(format!("Invalid database path: {}", db_path.display())))?;

    // Per-connection settings: every pooled connection enforces foreign keys.
    // WAL lets readers (downstream consumers) proceed while a run commits batches
    let options = SqliteConnectOptions::from_str(path)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(250));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables, indexes and default settings on an open pool
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_settings_table(pool).await?;
    create_sentences_table(pool).await?;
    create_patterns_table(pool).await?;
    create_sentence_patterns_table(pool).await?;
    create_lemmas_table(pool).await?;
    create_inflections_table(pool).await?;
    create_external_id_mappings_table(pool).await?;
    create_ingestion_records_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the sentences table
///
/// `complexity_score` is the 1-10 teaching difficulty consumed by curriculum sequencing.
pub async fn create_sentences_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sentences (
            guid TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            language TEXT NOT NULL,
            translation TEXT,
            complexity_score INTEGER NOT NULL CHECK (complexity_score BETWEEN 1 AND 10),
            source TEXT NOT NULL,
            extra_data TEXT NOT NULL DEFAULT '{}',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sentences_language_text ON sentences(language, text)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the patterns table
///
/// Patterns are append-only and unique per (language, pattern_type).
pub async fn create_patterns_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS patterns (
            guid TEXT PRIMARY KEY,
            language TEXT NOT NULL,
            pattern_type TEXT NOT NULL,
            features TEXT NOT NULL DEFAULT '{}',
            difficulty INTEGER NOT NULL CHECK (difficulty BETWEEN 1 AND 10),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(language, pattern_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the sentence_patterns linking table
pub async fn create_sentence_patterns_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sentence_patterns (
            sentence_id TEXT NOT NULL REFERENCES sentences(guid) ON DELETE CASCADE,
            pattern_id TEXT NOT NULL REFERENCES patterns(guid),
            position INTEGER NOT NULL CHECK (position >= 0),
            PRIMARY KEY (sentence_id, pattern_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sentence_patterns_pattern ON sentence_patterns(pattern_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the lemmas table
pub async fn create_lemmas_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lemmas (
            guid TEXT PRIMARY KEY,
            language TEXT NOT NULL,
            lemma TEXT NOT NULL,
            part_of_speech TEXT NOT NULL,
            definitions TEXT NOT NULL DEFAULT '[]',
            etymology TEXT,
            pronunciation TEXT,
            gender TEXT,
            aspect TEXT,
            source TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lemmas_language_lemma ON lemmas(language, lemma)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the inflections table
pub async fn create_inflections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inflections (
            guid TEXT PRIMARY KEY,
            lemma_id TEXT NOT NULL REFERENCES lemmas(guid) ON DELETE CASCADE,
            form TEXT NOT NULL,
            grammatical_case TEXT,
            number TEXT,
            person TEXT,
            tense TEXT,
            gender TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_inflections_lemma ON inflections(lemma_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the external_id_mappings table
///
/// The (source_name, external_id, entity_type) key is the only idempotency
/// mechanism across repeated runs.
pub async fn create_external_id_mappings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS external_id_mappings (
            source_name TEXT NOT NULL,
            external_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            internal_id TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (source_name, external_id, entity_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the ingestion_records audit table
pub async fn create_ingestion_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestion_records (
            guid TEXT PRIMARY KEY,
            source_type TEXT NOT NULL CHECK (source_type IN ('corpus', 'sentence_pairs', 'dictionary')),
            source_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'running', 'completed', 'failed')),
            records_processed INTEGER NOT NULL DEFAULT 0,
            records_created INTEGER NOT NULL DEFAULT 0,
            records_updated INTEGER NOT NULL DEFAULT 0,
            records_skipped INTEGER NOT NULL DEFAULT 0,
            records_failed INTEGER NOT NULL DEFAULT 0,
            errors TEXT NOT NULL DEFAULT '[]',
            error_message TEXT,
            started_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "ingest_max_lock_wait_ms", "5000").await?;
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = ?"
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    match value {
        None => {
            // INSERT OR IGNORE tolerates two processes initializing at once
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;

            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;

            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}

/// Read an integer setting, falling back to `default` when missing or unparseable
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<Option<String>> = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = ?"
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(value
        .flatten()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default))
}
