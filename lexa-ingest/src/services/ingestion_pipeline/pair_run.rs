//! Bilingual sentence-pair run
//!
//! Each pair resolves three ways: its mapping already exists (skip), its source
//! text matches a stored sentence (attach the translation when missing), or it
//! becomes a new sentence. Pairs are streamed; nothing is scored against a corpus.

use lexa_common::db::{EntityType, ExternalIdMapping, Sentence};
use serde_json::json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{blocking, BatchOutcome, IngestionPipeline, PairOptions, RunControl};
use crate::db::sentences::TextEntry;
use crate::db::{mappings, sentences};
use crate::error::IngestResult;
use crate::models::IngestionRecord;
use crate::parsers::{PairStream, SentencePair};
use crate::services::{ComplexityScorer, RunCache};
use crate::utils::{begin_monitored, retry_on_lock};

#[derive(Debug, Default)]
struct PairBatch {
    sentences: Vec<Sentence>,
    /// (existing sentence, translation to attach)
    translations: Vec<(Uuid, String)>,
    mappings: Vec<ExternalIdMapping>,
}

impl PairBatch {
    fn is_empty(&self) -> bool {
        self.sentences.is_empty() && self.translations.is_empty() && self.mappings.is_empty()
    }
}

fn plan_batch(
    pairs: &[SentencePair],
    options: &PairOptions,
    cache: &mut RunCache,
    scorer: &ComplexityScorer,
) -> (PairBatch, BatchOutcome) {
    let mut batch = PairBatch::default();
    let mut outcome = BatchOutcome::default();

    for pair in pairs {
        let key = pair.mapping_key();
        if cache.mapped(EntityType::Sentence, &key).is_some() {
            outcome.skipped += 1;
            continue;
        }

        let sentence_id = match cache.text_entry(&pair.source_text) {
            Some(entry) if !entry.has_translation => {
                batch
                    .translations
                    .push((entry.sentence_id, pair.target_text.clone()));
                cache.mark_translated(&pair.source_text);
                outcome.updated += 1;
                entry.sentence_id
            }
            Some(entry) => {
                // Already translated; only the mapping is new
                outcome.skipped += 1;
                entry.sentence_id
            }
            None => {
                let mut sentence = Sentence::new(
                    pair.source_text.clone(),
                    options.source_language.clone(),
                    Some(pair.target_text.clone()),
                    scorer.score_text(&pair.source_text),
                    options.source_name.clone(),
                );
                sentence.extra_data = json!({
                    "source_id": pair.source_id,
                    "target_id": pair.target_id,
                    "target_language": options.target_language,
                });
                cache.insert_text(
                    pair.source_text.clone(),
                    TextEntry {
                        sentence_id: sentence.guid,
                        has_translation: true,
                    },
                );
                let sentence_id = sentence.guid;
                batch.sentences.push(sentence);
                outcome.created += 1;
                sentence_id
            }
        };

        cache.record_mapping(EntityType::Sentence, key.clone(), sentence_id);
        batch.mappings.push(ExternalIdMapping {
            source_name: options.source_name.clone(),
            external_id: key,
            entity_type: EntityType::Sentence,
            internal_id: sentence_id,
        });
    }

    (batch, outcome)
}

async fn write_batch(conn: &mut SqliteConnection, batch: &PairBatch) -> lexa_common::Result<()> {
    for sentence in &batch.sentences {
        sentences::insert_sentence(conn, sentence).await?;
    }
    for (sentence_id, translation) in &batch.translations {
        sentences::set_translation(conn, *sentence_id, translation).await?;
    }
    for mapping in &batch.mappings {
        mappings::insert_mapping(conn, mapping).await?;
    }
    Ok(())
}

impl IngestionPipeline {
    pub(super) async fn run_pairs(
        &self,
        record: &mut IngestionRecord,
        options: &PairOptions,
        control: &RunControl,
    ) -> IngestResult<()> {
        let stream_options = options.clone();
        let mut stream = blocking(move || {
            Ok(PairStream::open(
                &stream_options.sentences_path,
                &stream_options.links_path,
                &stream_options.source_language,
                &stream_options.target_language,
                stream_options.limit,
            )?)
        })
        .await?;

        let max_wait_ms = self.mark_running(record).await?;
        let mut cache =
            RunCache::preload_pairs(&self.pool, &options.source_name, &options.source_language).await?;
        let scorer = ComplexityScorer::uncalibrated(self.config.common_lemma_rank);

        tracing::info!(
            run_id = %record.guid,
            indexed = stream.indexed(),
            known_pairs = cache.mapping_count(),
            "Sentence index built"
        );

        let pool = &self.pool;
        let batch_size = self.config.batch_size;
        let mut batch_no = 0;
        loop {
            control.check_cancelled()?;

            let (returned, pulled) = blocking(move || {
                let pairs: Result<Vec<_>, _> = stream.by_ref().take(batch_size).collect();
                Ok((stream, pairs))
            })
            .await?;
            stream = returned;
            let pending = pulled?;
            if pending.is_empty() {
                break;
            }
            batch_no += 1;

            let (batch, outcome) = plan_batch(&pending, options, &mut cache, &scorer);
            if !batch.is_empty() {
                retry_on_lock("pair_run::commit_batch", max_wait_ms, || async {
                    let mut tx = begin_monitored(pool, "pair_run::commit_batch").await?;
                    write_batch(tx.conn()?, &batch).await?;
                    tx.commit().await
                })
                .await?;
            }

            self.commit_outcome(record, control, batch_no, outcome, None);
        }

        let stats = stream.stats();
        tracing::info!(
            run_id = %record.guid,
            links_read = stats.links_read,
            link_rows_skipped = stats.link_rows_skipped,
            sentence_rows_skipped = stats.sentence_rows_skipped,
            pairs = stats.pairs,
            "Pair stream finished"
        );

        Ok(())
    }
}
