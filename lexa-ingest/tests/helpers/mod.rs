//! Test Helper Utilities
//!
//! Shared utilities for testing lexa-ingest

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;

// Re-export commonly used items
pub use db_utils::{count_rows, create_test_db, create_test_pipeline};
pub use fixtures::{conllu_sentence, malformed_sentence, write_conllu, write_dump, write_tatoeba};
