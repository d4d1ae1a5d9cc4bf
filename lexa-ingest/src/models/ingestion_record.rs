//! Ingestion run audit record
//!
//! One record per run. Status moves `pending → running → {completed | failed}`;
//! a pending run may also fail directly when its source cannot be opened.

use chrono::{DateTime, Utc};
use lexa_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default cap on per-item errors kept on the record
pub const DEFAULT_MAX_ERROR_LOG: usize = 100;

/// Kind of source a run ingests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Corpus,
    SentencePairs,
    Dictionary,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Corpus => "corpus",
            SourceType::SentencePairs => "sentence_pairs",
            SourceType::Dictionary => "dictionary",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "corpus" => Ok(SourceType::Corpus),
            "sentence_pairs" => Ok(SourceType::SentencePairs),
            "dictionary" => Ok(SourceType::Dictionary),
            other => Err(Error::InvalidInput(format!("Unknown source type: {}", other))),
        }
    }
}

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown run status: {}", other))),
        }
    }
}

/// Audit row for one ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRecord {
    pub guid: Uuid,
    pub source_type: SourceType,
    pub source_name: String,
    pub file_path: String,
    pub status: RunStatus,

    /// Always created + updated + skipped + failed
    pub records_processed: u64,
    pub records_created: u64,
    pub records_updated: u64,
    pub records_skipped: u64,
    pub records_failed: u64,

    /// Per-item errors, capped
    pub errors: Vec<String>,
    /// Reason the run failed
    pub error_message: Option<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip, default = "default_max_errors")]
    pub(crate) max_errors: usize,
}

fn default_max_errors() -> usize {
    DEFAULT_MAX_ERROR_LOG
}

impl IngestionRecord {
    pub fn new(
        source_type: SourceType,
        source_name: impl Into<String>,
        file_path: impl Into<String>,
        max_errors: usize,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            source_type,
            source_name: source_name.into(),
            file_path: file_path.into(),
            status: RunStatus::Pending,
            records_processed: 0,
            records_created: 0,
            records_updated: 0,
            records_skipped: 0,
            records_failed: 0,
            errors: Vec::new(),
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
            max_errors,
        }
    }

    /// Move to a new status; illegal transitions are rejected
    pub fn transition_to(&mut self, next: RunStatus) -> Result<(), Error> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidInput(format!(
                "Ingestion record {} cannot move from {} to {}",
                self.guid, self.status, next
            )));
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), Error> {
        self.transition_to(RunStatus::Completed)
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), Error> {
        self.transition_to(RunStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub fn add_created(&mut self, n: u64) {
        self.records_created += n;
        self.records_processed += n;
    }

    pub fn add_updated(&mut self, n: u64) {
        self.records_updated += n;
        self.records_processed += n;
    }

    pub fn add_skipped(&mut self, n: u64) {
        self.records_skipped += n;
        self.records_processed += n;
    }

    /// Count a failed item; the message is kept while the log has room
    pub fn add_failure(&mut self, message: impl Into<String>) {
        self.records_failed += 1;
        self.records_processed += 1;
        if self.errors.len() < self.max_errors {
            self.errors.push(message.into());
        }
    }
}
