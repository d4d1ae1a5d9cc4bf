//! Data models for lexa-ingest

pub mod ingestion_record;

pub use ingestion_record::{IngestionRecord, RunStatus, SourceType, DEFAULT_MAX_ERROR_LOG};
