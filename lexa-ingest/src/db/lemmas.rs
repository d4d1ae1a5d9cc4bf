//! Lemma and inflection storage

use lexa_common::db::{Inflection, Lemma};
use lexa_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_uuid, to_json};

pub async fn insert_lemma(conn: &mut SqliteConnection, lemma: &Lemma) -> Result<()> {
    let definitions = to_json(&lemma.definitions)?;

    sqlx::query(
        r#"
        INSERT INTO lemmas (
            guid, language, lemma, part_of_speech, definitions,
            etymology, pronunciation, gender, aspect, source
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(lemma.guid.to_string())
    .bind(&lemma.language)
    .bind(&lemma.lemma)
    .bind(&lemma.part_of_speech)
    .bind(definitions)
    .bind(&lemma.etymology)
    .bind(&lemma.pronunciation)
    .bind(&lemma.gender)
    .bind(&lemma.aspect)
    .bind(&lemma.source)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn insert_inflection(conn: &mut SqliteConnection, inflection: &Inflection) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO inflections (guid, lemma_id, form, grammatical_case, number, person, tense, gender)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(inflection.guid.to_string())
    .bind(inflection.lemma_id.to_string())
    .bind(&inflection.form)
    .bind(&inflection.grammatical_case)
    .bind(&inflection.number)
    .bind(&inflection.person)
    .bind(&inflection.tense)
    .bind(&inflection.gender)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn get_lemma(pool: &SqlitePool, lemma_id: Uuid) -> Result<Option<Lemma>> {
    let row = sqlx::query(
        r#"
        SELECT guid, language, lemma, part_of_speech, definitions,
               etymology, pronunciation, gender, aspect, source
        FROM lemmas
        WHERE guid = ?
        "#,
    )
    .bind(lemma_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        Ok(Lemma {
            guid: parse_uuid(row.get::<String, _>("guid").as_str())?,
            language: row.get("language"),
            lemma: row.get("lemma"),
            part_of_speech: row.get("part_of_speech"),
            definitions: from_json(row.get::<String, _>("definitions").as_str())?,
            etymology: row.get("etymology"),
            pronunciation: row.get("pronunciation"),
            gender: row.get("gender"),
            aspect: row.get("aspect"),
            source: row.get("source"),
        })
    })
    .transpose()
}

/// Inflections of a lemma in insertion (grid) order
pub async fn inflections_for_lemma(pool: &SqlitePool, lemma_id: Uuid) -> Result<Vec<Inflection>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, lemma_id, form, grammatical_case, number, person, tense, gender
        FROM inflections
        WHERE lemma_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(lemma_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(Inflection {
                guid: parse_uuid(row.get::<String, _>("guid").as_str())?,
                lemma_id: parse_uuid(row.get::<String, _>("lemma_id").as_str())?,
                form: row.get("form"),
                grammatical_case: row.get("grammatical_case"),
                number: row.get("number"),
                person: row.get("person"),
                tense: row.get("tense"),
                gender: row.get("gender"),
            })
        })
        .collect()
}

pub async fn count_lemmas(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM lemmas").fetch_one(pool).await?)
}

pub async fn count_inflections(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM inflections").fetch_one(pool).await?)
}
