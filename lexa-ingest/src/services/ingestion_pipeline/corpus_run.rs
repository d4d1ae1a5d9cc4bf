//! Treebank run
//!
//! The whole file is read up front: the scorer needs corpus-wide pattern and
//! lemma frequencies before the first sentence is scored.

use lexa_common::db::{EntityType, ExternalIdMapping, Pattern, Sentence, SentencePattern};
use serde_json::{json, Map, Value};
use sqlx::SqliteConnection;
use std::path::Path;

use super::{blocking, BatchOutcome, CorpusOptions, IngestionPipeline, RunControl};
use crate::db::{mappings, patterns, sentences};
use crate::error::{IngestError, IngestResult};
use crate::models::IngestionRecord;
use crate::parsers::{BlockError, ConlluError, ConlluFile, Features, ParsedSentence};
use crate::services::{ComplexityScorer, RunCache};
use crate::utils::{begin_monitored, retry_on_lock};

/// Rows one batch writes, in dependency order
#[derive(Debug, Default)]
struct CorpusBatch {
    patterns: Vec<Pattern>,
    sentences: Vec<Sentence>,
    links: Vec<SentencePattern>,
    mappings: Vec<ExternalIdMapping>,
}

impl CorpusBatch {
    fn is_empty(&self) -> bool {
        self.sentences.is_empty() && self.patterns.is_empty()
    }
}

/// `sent_id`, or the 1-based block ordinal when the block has none
fn external_id(sent_id: Option<&str>, ordinal: usize) -> String {
    match sent_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("#{}", ordinal),
    }
}

fn features_json(features: &Features) -> Value {
    Value::Object(
        features
            .known()
            .into_iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect::<Map<_, _>>(),
    )
}

/// Stage one batch against the cache
fn plan_batch(
    items: &[CorpusItem],
    options: &CorpusOptions,
    cache: &mut RunCache,
    scorer: &mut ComplexityScorer,
) -> (CorpusBatch, BatchOutcome) {
    let mut batch = CorpusBatch::default();
    let mut outcome = BatchOutcome::default();

    for (ordinal, item) in items {
        let sentence = match item {
            Ok(sentence) => sentence,
            Err(err) => {
                let id = external_id(err.sent_id.as_deref(), *ordinal);
                outcome.failures.push(format!("Sentence {}: {}", id, err));
                continue;
            }
        };

        let id = external_id(sentence.sent_id.as_deref(), *ordinal);
        if cache.mapped(EntityType::Sentence, &id).is_some() {
            outcome.skipped += 1;
            continue;
        }

        if sentence.words().next().is_none() {
            outcome
                .failures
                .push(format!("Sentence {}: block has no word tokens", id));
            continue;
        }

        let mut entity = Sentence::new(
            sentence.text.clone(),
            options.language.clone(),
            None,
            scorer.score(sentence),
            options.source_name.clone(),
        );
        entity.extra_data = json!({
            "sent_id": id,
            "metadata": sentence.metadata,
        });

        for (position, key) in sentence.patterns() {
            let pattern_id = match cache.pattern_id(&options.language, &key) {
                Some(pattern_id) => pattern_id,
                None => {
                    let features = &sentence.tokens[position as usize].features;
                    let pattern = Pattern {
                        guid: uuid::Uuid::new_v4(),
                        language: options.language.clone(),
                        difficulty: scorer.estimate_pattern_difficulty(&key, features),
                        features: features_json(features),
                        pattern_type: key,
                    };
                    cache.insert_pattern(&options.language, &pattern.pattern_type, pattern.guid);
                    let pattern_id = pattern.guid;
                    batch.patterns.push(pattern);
                    pattern_id
                }
            };

            batch.links.push(SentencePattern {
                sentence_id: entity.guid,
                pattern_id,
                position,
            });
        }

        cache.record_mapping(EntityType::Sentence, id.clone(), entity.guid);
        batch.mappings.push(ExternalIdMapping {
            source_name: options.source_name.clone(),
            external_id: id,
            entity_type: EntityType::Sentence,
            internal_id: entity.guid,
        });
        batch.sentences.push(entity);
        outcome.created += 1;
    }

    (batch, outcome)
}

type CorpusItem = (usize, Result<ParsedSentence, BlockError>);

/// Read every block and calibrate the scorer on the well-formed ones
fn read_corpus(path: &Path, common_lemma_rank: usize) -> IngestResult<(Vec<CorpusItem>, ComplexityScorer)> {
    let file = ConlluFile::new(path);
    let reader = file
        .sentences()
        .map_err(|e| IngestError::Resource(format!("Cannot open {}: {}", path.display(), e)))?;

    let mut items = Vec::new();
    for (idx, item) in reader.enumerate() {
        if let Err(BlockError { error: ConlluError::Io(e), .. }) = &item {
            return Err(IngestError::Resource(format!(
                "Read of {} failed: {}",
                path.display(),
                e
            )));
        }
        items.push((idx + 1, item));
    }

    let scorer = ComplexityScorer::from_corpus(
        items.iter().filter_map(|(_, item)| item.as_ref().ok()),
        common_lemma_rank,
    );

    Ok((items, scorer))
}

async fn write_batch(conn: &mut SqliteConnection, batch: &CorpusBatch) -> lexa_common::Result<()> {
    for pattern in &batch.patterns {
        patterns::insert_pattern(conn, pattern).await?;
    }
    for sentence in &batch.sentences {
        sentences::insert_sentence(conn, sentence).await?;
    }
    for link in &batch.links {
        sentences::insert_sentence_pattern(conn, link).await?;
    }
    for mapping in &batch.mappings {
        mappings::insert_mapping(conn, mapping).await?;
    }
    Ok(())
}

impl IngestionPipeline {
    pub(super) async fn run_corpus(
        &self,
        record: &mut IngestionRecord,
        options: &CorpusOptions,
        control: &RunControl,
    ) -> IngestResult<()> {
        let path = options.path.clone();
        let common_lemma_rank = self.config.common_lemma_rank;
        let (items, mut scorer) = blocking(move || read_corpus(&path, common_lemma_rank)).await?;

        let max_wait_ms = self.mark_running(record).await?;
        let mut cache = RunCache::preload_corpus(&self.pool, &options.source_name, &options.language).await?;

        let total = items.len();
        tracing::info!(
            run_id = %record.guid,
            blocks = total,
            malformed = items.iter().filter(|(_, item)| item.is_err()).count(),
            known_sentences = cache.mapping_count(),
            known_patterns = cache.pattern_count(),
            "Corpus parsed"
        );

        let pool = &self.pool;
        for (batch_idx, chunk) in items.chunks(self.config.batch_size).enumerate() {
            control.check_cancelled()?;

            let (batch, outcome) = plan_batch(chunk, options, &mut cache, &mut scorer);
            if !batch.is_empty() {
                retry_on_lock("corpus_run::commit_batch", max_wait_ms, || async {
                    let mut tx = begin_monitored(pool, "corpus_run::commit_batch").await?;
                    write_batch(tx.conn()?, &batch).await?;
                    tx.commit().await
                })
                .await?;
            }

            self.commit_outcome(record, control, batch_idx + 1, outcome, Some(total));
        }

        Ok(())
    }
}
