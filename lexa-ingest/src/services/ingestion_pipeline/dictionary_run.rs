//! Dictionary dump run

use lexa_common::db::{EntityType, ExternalIdMapping, Inflection, Lemma};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{blocking, BatchOutcome, DictionaryOptions, IngestionPipeline, RunControl};
use crate::db::{lemmas, mappings};
use crate::error::{IngestError, IngestResult};
use crate::models::IngestionRecord;
use crate::parsers::{DictionaryEntry, DumpReader};
use crate::services::RunCache;
use crate::utils::{begin_monitored, retry_on_lock};

#[derive(Debug, Default)]
struct DictionaryBatch {
    lemmas: Vec<Lemma>,
    inflections: Vec<Inflection>,
    mappings: Vec<ExternalIdMapping>,
}

fn lemma_rows(entry: DictionaryEntry, options: &DictionaryOptions) -> (Lemma, Vec<Inflection>) {
    let lemma = Lemma {
        guid: Uuid::new_v4(),
        language: options.language.clone(),
        lemma: entry.title,
        part_of_speech: entry.part_of_speech,
        definitions: entry.definitions,
        etymology: entry.etymology,
        pronunciation: entry.pronunciation,
        gender: entry.gender,
        aspect: entry.aspect,
        source: options.source_name.clone(),
    };

    let inflections = entry
        .inflections
        .into_iter()
        .map(|form| Inflection {
            guid: Uuid::new_v4(),
            lemma_id: lemma.guid,
            form: form.form,
            grammatical_case: form.case,
            number: form.number,
            person: form.person,
            tense: form.tense,
            gender: form.gender,
        })
        .collect();

    (lemma, inflections)
}

fn plan_batch(
    entries: Vec<DictionaryEntry>,
    options: &DictionaryOptions,
    cache: &mut RunCache,
) -> (DictionaryBatch, BatchOutcome) {
    let mut batch = DictionaryBatch::default();
    let mut outcome = BatchOutcome::default();

    for entry in entries {
        let key = entry.mapping_key();
        if cache.mapped(EntityType::Lemma, &key).is_some() {
            outcome.skipped += 1;
            continue;
        }

        let (lemma, inflections) = lemma_rows(entry, options);
        cache.record_mapping(EntityType::Lemma, key.clone(), lemma.guid);
        batch.mappings.push(ExternalIdMapping {
            source_name: options.source_name.clone(),
            external_id: key,
            entity_type: EntityType::Lemma,
            internal_id: lemma.guid,
        });
        batch.lemmas.push(lemma);
        batch.inflections.extend(inflections);
        outcome.created += 1;
    }

    (batch, outcome)
}

async fn write_batch(conn: &mut SqliteConnection, batch: &DictionaryBatch) -> lexa_common::Result<()> {
    for lemma in &batch.lemmas {
        lemmas::insert_lemma(conn, lemma).await?;
    }
    for inflection in &batch.inflections {
        lemmas::insert_inflection(conn, inflection).await?;
    }
    for mapping in &batch.mappings {
        mappings::insert_mapping(conn, mapping).await?;
    }
    Ok(())
}

impl IngestionPipeline {
    pub(super) async fn run_dictionary(
        &self,
        record: &mut IngestionRecord,
        options: &DictionaryOptions,
        control: &RunControl,
    ) -> IngestResult<()> {
        let path = options.path.clone();
        let language = options.language.clone();
        let mut reader = blocking(move || Ok(DumpReader::open(&path, &language)?)).await?;

        let max_wait_ms = self.mark_running(record).await?;
        let mut cache = RunCache::preload_dictionary(&self.pool, &options.source_name).await?;

        let pool = &self.pool;
        let batch_size = self.config.batch_size;
        let mut batch_no = 0;
        loop {
            control.check_cancelled()?;

            let (returned, pulled) = blocking(move || {
                let entries: Result<Vec<_>, _> = reader.by_ref().take(batch_size).collect();
                Ok((reader, entries))
            })
            .await?;
            reader = returned;
            let entries = pulled?;
            if entries.is_empty() {
                break;
            }
            batch_no += 1;

            let (batch, outcome) = plan_batch(entries, options, &mut cache);
            if !batch.lemmas.is_empty() {
                retry_on_lock("dictionary_run::commit_batch", max_wait_ms, || async {
                    let mut tx = begin_monitored(pool, "dictionary_run::commit_batch").await?;
                    write_batch(tx.conn()?, &batch).await?;
                    tx.commit().await
                })
                .await?;
            }

            self.commit_outcome(record, control, batch_no, outcome, None);
        }

        let stats = reader.stats();
        tracing::info!(
            run_id = %record.guid,
            pages = stats.pages,
            entries = stats.entries,
            namespaced = stats.namespaced,
            redirects = stats.redirects,
            oversized = stats.oversized,
            without_language = stats.without_language,
            undecodable = stats.undecodable,
            unrecognized_tables = stats.unrecognized_tables,
            "Dictionary dump finished"
        );

        if stats.pages == 0 {
            return Err(IngestError::Format(format!(
                "{} holds no <page> elements; not a MediaWiki export",
                options.path.display()
            )));
        }

        Ok(())
    }
}
