//! Sentence and sentence-pattern storage

use lexa_common::db::{Sentence, SentencePattern};
use lexa_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{from_json, parse_uuid, to_json};

/// Existing sentence found by its text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEntry {
    pub sentence_id: Uuid,
    pub has_translation: bool,
}

pub async fn insert_sentence(conn: &mut SqliteConnection, sentence: &Sentence) -> Result<()> {
    let extra_data = to_json(&sentence.extra_data)?;

    sqlx::query(
        r#"
        INSERT INTO sentences (guid, text, language, translation, complexity_score, source, extra_data)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(sentence.guid.to_string())
    .bind(&sentence.text)
    .bind(&sentence.language)
    .bind(&sentence.translation)
    .bind(sentence.complexity_score as i64)
    .bind(&sentence.source)
    .bind(extra_data)
    .execute(conn)
    .await?;

    Ok(())
}

/// Attach a translation to an existing sentence
pub async fn set_translation(conn: &mut SqliteConnection, sentence_id: Uuid, translation: &str) -> Result<()> {
    sqlx::query("UPDATE sentences SET translation = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?")
        .bind(translation)
        .bind(sentence_id.to_string())
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn insert_sentence_pattern(conn: &mut SqliteConnection, link: &SentencePattern) -> Result<()> {
    sqlx::query("INSERT INTO sentence_patterns (sentence_id, pattern_id, position) VALUES (?, ?, ?)")
        .bind(link.sentence_id.to_string())
        .bind(link.pattern_id.to_string())
        .bind(link.position as i64)
        .execute(conn)
        .await?;

    Ok(())
}

/// Text → sentence index for one language, used to reconcile translations
///
/// When a text occurs more than once, a translated row wins.
pub async fn load_text_index(pool: &SqlitePool, language: &str) -> Result<HashMap<String, TextEntry>> {
    let rows = sqlx::query("SELECT guid, text, translation IS NOT NULL AS translated FROM sentences WHERE language = ?")
        .bind(language)
        .fetch_all(pool)
        .await?;

    let mut index: HashMap<String, TextEntry> = HashMap::with_capacity(rows.len());
    for row in rows {
        let entry = TextEntry {
            sentence_id: parse_uuid(row.get::<String, _>("guid").as_str())?,
            has_translation: row.get::<bool, _>("translated"),
        };
        let text: String = row.get("text");
        match index.get(&text) {
            Some(existing) if existing.has_translation => {}
            _ => {
                index.insert(text, entry);
            }
        }
    }

    Ok(index)
}

pub async fn get_sentence(pool: &SqlitePool, sentence_id: Uuid) -> Result<Option<Sentence>> {
    let row = sqlx::query(
        r#"
        SELECT guid, text, language, translation, complexity_score, source, extra_data
        FROM sentences
        WHERE guid = ?
        "#,
    )
    .bind(sentence_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        Ok(Sentence {
            guid: parse_uuid(row.get::<String, _>("guid").as_str())?,
            text: row.get("text"),
            language: row.get("language"),
            translation: row.get("translation"),
            complexity_score: row.get::<i64, _>("complexity_score") as u8,
            source: row.get("source"),
            extra_data: from_json(row.get::<String, _>("extra_data").as_str())?,
        })
    })
    .transpose()
}

/// Pattern links of a sentence, in position order
pub async fn patterns_for_sentence(pool: &SqlitePool, sentence_id: Uuid) -> Result<Vec<SentencePattern>> {
    let rows = sqlx::query(
        "SELECT sentence_id, pattern_id, position FROM sentence_patterns WHERE sentence_id = ? ORDER BY position",
    )
    .bind(sentence_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(SentencePattern {
                sentence_id: parse_uuid(row.get::<String, _>("sentence_id").as_str())?,
                pattern_id: parse_uuid(row.get::<String, _>("pattern_id").as_str())?,
                position: row.get::<i64, _>("position") as u32,
            })
        })
        .collect()
}

pub async fn count_sentences(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM sentences").fetch_one(pool).await?)
}

pub async fn count_sentence_patterns(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM sentence_patterns").fetch_one(pool).await?)
}
