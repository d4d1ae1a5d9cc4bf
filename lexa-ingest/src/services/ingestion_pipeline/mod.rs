//! Ingestion pipeline orchestrator
//!
//! One run per invocation, backed by one ingestion record:
//! `pending → running → {completed | failed}`.
//!
//! # Run shape
//! - Open the source while the record is still pending; a missing file or an
//!   unsupported language fails the run before any batch.
//! - Preload the run cache, then walk the source in batches. Each batch is
//!   planned in memory against the cache and written in one transaction.
//! - Batch counters reach the record only after their commit, so a failed
//!   batch leaves no trace beyond the run's failure message.
//! - The record's terminal state is saved exactly once, on every exit path.
//!
//! The pool is never queried while a batch transaction is open, so a
//! single-connection pool is enough.

use lexa_common::config::IngestSettings;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::db::ingestion_records::save_record;
use crate::db::max_lock_wait_ms;
use crate::error::{IngestError, IngestResult};
use crate::models::{IngestionRecord, RunStatus, SourceType};

mod corpus_run;
mod dictionary_run;
mod pair_run;

/// Run file-bound parsing work on the blocking pool
async fn blocking<T, F>(work: F) -> IngestResult<T>
where
    F: FnOnce() -> IngestResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Progress hook called after each committed batch with `(processed, total)`;
/// `total` is `None` for streamed sources
pub type ProgressCallback = Arc<dyn Fn(usize, Option<usize>) + Send + Sync>;

/// Cancellation and progress reporting for one run
#[derive(Clone, Default)]
pub struct RunControl {
    pub cancel: CancellationToken,
    pub progress: Option<ProgressCallback>,
}

impl RunControl {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel, progress: None }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn check_cancelled(&self) -> IngestResult<()> {
        if self.cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        Ok(())
    }

    fn report(&self, processed: usize, total: Option<usize>) {
        if let Some(progress) = &self.progress {
            progress(processed, total);
        }
    }
}

impl std::fmt::Debug for RunControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunControl")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Items per transaction
    pub batch_size: usize,
    /// Lemma rank at or below which a lemma counts as common
    pub common_lemma_rank: usize,
    /// Cap on per-item errors kept on the record
    pub max_error_log: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&IngestSettings::default())
    }
}

impl From<&IngestSettings> for PipelineConfig {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            common_lemma_rank: settings.common_lemma_rank,
            max_error_log: settings.max_error_log,
        }
    }
}

/// Dependency-annotated treebank run
#[derive(Debug, Clone)]
pub struct CorpusOptions {
    pub path: PathBuf,
    /// Language code stored on sentences and patterns, e.g. `ru`
    pub language: String,
    /// Source tag and mapping namespace, e.g. `ud_russian_syntagrus`
    pub source_name: String,
}

/// Bilingual sentence-pair run
#[derive(Debug, Clone)]
pub struct PairOptions {
    pub sentences_path: PathBuf,
    pub links_path: PathBuf,
    /// Language of the stored sentence text
    pub source_language: String,
    /// Language of the attached translation
    pub target_language: String,
    pub source_name: String,
    /// Stop after this many pairs
    pub limit: Option<usize>,
}

/// Dictionary dump run
#[derive(Debug, Clone)]
pub struct DictionaryOptions {
    pub path: PathBuf,
    pub language: String,
    pub source_name: String,
}

/// Counter deltas of one committed batch
#[derive(Debug, Default)]
pub(crate) struct BatchOutcome {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failures: Vec<String>,
}

impl BatchOutcome {
    fn items(&self) -> usize {
        (self.created + self.updated + self.skipped) as usize + self.failures.len()
    }

    fn apply(self, record: &mut IngestionRecord) {
        record.add_created(self.created);
        record.add_updated(self.updated);
        record.add_skipped(self.skipped);
        for failure in self.failures {
            record.add_failure(failure);
        }
    }
}

/// Ingestion pipeline over one database
pub struct IngestionPipeline {
    pool: SqlitePool,
    config: PipelineConfig,
}

impl IngestionPipeline {
    pub fn new(pool: SqlitePool, config: PipelineConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingest a CoNLL-U treebank
    pub async fn ingest_corpus(
        &self,
        options: &CorpusOptions,
        control: &RunControl,
    ) -> IngestResult<IngestionRecord> {
        let mut record = self
            .start_run(SourceType::Corpus, &options.source_name, &options.path)
            .await?;
        let outcome = self.run_corpus(&mut record, options, control).await;
        self.finish_run(record, outcome).await
    }

    /// Ingest bilingual sentence pairs, reconciling translations into existing sentences
    pub async fn ingest_sentence_pairs(
        &self,
        options: &PairOptions,
        control: &RunControl,
    ) -> IngestResult<IngestionRecord> {
        let mut record = self
            .start_run(SourceType::SentencePairs, &options.source_name, &options.sentences_path)
            .await?;
        let outcome = self.run_pairs(&mut record, options, control).await;
        self.finish_run(record, outcome).await
    }

    /// Ingest dictionary entries for one language from a dump
    pub async fn ingest_dictionary(
        &self,
        options: &DictionaryOptions,
        control: &RunControl,
    ) -> IngestResult<IngestionRecord> {
        let mut record = self
            .start_run(SourceType::Dictionary, &options.source_name, &options.path)
            .await?;
        let outcome = self.run_dictionary(&mut record, options, control).await;
        self.finish_run(record, outcome).await
    }

    /// Create and persist the pending record
    async fn start_run(
        &self,
        source_type: SourceType,
        source_name: &str,
        path: &std::path::Path,
    ) -> IngestResult<IngestionRecord> {
        let record = IngestionRecord::new(
            source_type,
            source_name,
            path.display().to_string(),
            self.config.max_error_log,
        );
        save_record(&self.pool, &record).await?;

        tracing::info!(
            run_id = %record.guid,
            source_type = %source_type,
            source = source_name,
            path = %path.display(),
            "Ingestion run created"
        );

        Ok(record)
    }

    /// Source opened; move to running
    async fn mark_running(&self, record: &mut IngestionRecord) -> IngestResult<u64> {
        record.transition_to(RunStatus::Running)?;
        save_record(&self.pool, record).await?;
        Ok(max_lock_wait_ms(&self.pool).await?)
    }

    /// Apply a committed batch to the record and report progress
    fn commit_outcome(
        &self,
        record: &mut IngestionRecord,
        control: &RunControl,
        batch: usize,
        outcome: BatchOutcome,
        total: Option<usize>,
    ) {
        let items = outcome.items();
        outcome.apply(record);

        tracing::debug!(
            run_id = %record.guid,
            batch,
            items,
            processed = record.records_processed,
            failed = record.records_failed,
            "Batch committed"
        );

        control.report(record.records_processed as usize, total);
    }

    /// Persist the terminal state; failures come back wrapped with the record
    async fn finish_run(
        &self,
        record: IngestionRecord,
        outcome: IngestResult<()>,
    ) -> IngestResult<IngestionRecord> {
        if let Err(err) = outcome {
            return self.fail_run(record, err).await;
        }

        let mut completed = record.clone();
        completed.complete()?;
        if let Err(err) = save_record(&self.pool, &completed).await {
            return self.fail_run(record, err.into()).await;
        }

        tracing::info!(
            run_id = %completed.guid,
            processed = completed.records_processed,
            created = completed.records_created,
            updated = completed.records_updated,
            skipped = completed.records_skipped,
            failed = completed.records_failed,
            "Ingestion run completed"
        );

        Ok(completed)
    }

    async fn fail_run(&self, mut record: IngestionRecord, err: IngestError) -> IngestResult<IngestionRecord> {
        let message = match &err {
            IngestError::Cancelled => "Cancelled by request before completion".to_string(),
            other => other.to_string(),
        };
        record.fail(message)?;

        if let Err(save_err) = save_record(&self.pool, &record).await {
            tracing::error!(
                run_id = %record.guid,
                error = %save_err,
                "Failed to persist failed ingestion record"
            );
        }

        if err.is_cancelled() {
            tracing::warn!(
                run_id = %record.guid,
                processed = record.records_processed,
                "Ingestion run cancelled"
            );
        } else {
            tracing::error!(
                run_id = %record.guid,
                processed = record.records_processed,
                error = %err,
                "Ingestion run failed"
            );
        }

        Err(IngestError::RunFailed {
            record: Box::new(record),
            source: Box::new(err),
        })
    }
}
