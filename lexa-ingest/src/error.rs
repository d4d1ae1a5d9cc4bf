//! Error types for lexa-ingest
//!
//! Per-item format problems never surface here; they are counted on the
//! ingestion record. `IngestError` covers what ends a run.

use crate::models::IngestionRecord;
use crate::parsers::{TatoebaError, WiktionaryError};
use thiserror::Error;

/// Run-level ingestion error
#[derive(Debug, Error)]
pub enum IngestError {
    /// Source missing or unreadable, or an unsupported language; fatal before any batch
    #[error("Resource error: {0}")]
    Resource(String),

    /// Source content that cannot be processed at all
    #[error("Format error: {0}")]
    Format(String),

    /// Storage failure; the in-flight batch was rolled back
    #[error("Persistence error: {0}")]
    Persistence(#[from] lexa_common::Error),

    /// A blocking parse task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Cancellation token fired between batches
    #[error("Run cancelled")]
    Cancelled,

    /// A run ended in `failed`; carries the finalized record
    #[error("Ingestion run {} failed: {source}", .record.guid)]
    RunFailed {
        record: Box<IngestionRecord>,
        source: Box<IngestError>,
    },
}

impl IngestError {
    /// Finalized record of a failed run
    pub fn record(&self) -> Option<&IngestionRecord> {
        match self {
            IngestError::RunFailed { record, .. } => Some(record.as_ref()),
            _ => None,
        }
    }

    /// Underlying cause, unwrapping a failed-run wrapper
    pub fn cause(&self) -> &IngestError {
        match self {
            IngestError::RunFailed { source, .. } => source.cause(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause(), IngestError::Cancelled)
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Resource(err.to_string())
    }
}

impl From<TatoebaError> for IngestError {
    fn from(err: TatoebaError) -> Self {
        IngestError::Resource(err.to_string())
    }
}

impl From<WiktionaryError> for IngestError {
    fn from(err: WiktionaryError) -> Self {
        IngestError::Resource(err.to_string())
    }
}

/// Result type for run entry points
pub type IngestResult<T> = Result<T, IngestError>;
