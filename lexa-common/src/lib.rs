//! # Lexa Common Library
//!
//! Shared code for the Lexa corpus tooling including:
//! - Error and result types
//! - Bootstrap configuration loading and root folder resolution
//! - SQLite bootstrap and the normalized corpus schema
//! - Persisted entity record shapes consumed by downstream engines

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
