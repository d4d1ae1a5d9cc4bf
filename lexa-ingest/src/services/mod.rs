//! Ingestion services
//!
//! - `complexity_scorer`: 1-10 teaching difficulty per sentence
//! - `run_cache`: per-run dedup and pattern-id cache
//! - `ingestion_pipeline`: run orchestration over the three source types

pub mod complexity_scorer;
pub mod ingestion_pipeline;
pub mod run_cache;

pub use complexity_scorer::{ComplexityScorer, ScoreBreakdown, DEFAULT_COMMON_LEMMA_RANK};
pub use ingestion_pipeline::{
    CorpusOptions, DictionaryOptions, IngestionPipeline, PairOptions, PipelineConfig,
    ProgressCallback, RunControl,
};
pub use run_cache::RunCache;
