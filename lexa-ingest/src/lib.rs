//! lexa-ingest library interface
//!
//! Parses treebanks, bilingual sentence-pair exports and dictionary dumps into
//! the normalized corpus store. `IngestionPipeline` is the entry point; the
//! parsers and the scorer are usable on their own.

pub mod db;
pub mod error;
pub mod models;
pub mod parsers;
pub mod services;
pub mod utils;

pub use crate::error::{IngestError, IngestResult};
pub use crate::models::{IngestionRecord, RunStatus, SourceType};
pub use crate::services::{
    ComplexityScorer, CorpusOptions, DictionaryOptions, IngestionPipeline, PairOptions,
    PipelineConfig, ProgressCallback, RunControl,
};
