//! Per-run lookup cache
//!
//! Preloaded once when a run starts and mutated in memory while batches are
//! staged: new pattern ids are cached as soon as they are assigned, so a pattern
//! seen twice in one batch is created once. Never persisted. A failed batch
//! fails the whole run, so entries staged for it are dropped with the cache.

use lexa_common::db::EntityType;
use lexa_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::{mappings, patterns, sentences, sentences::TextEntry};

/// Lookup state owned by exactly one ingestion run
#[derive(Debug, Default)]
pub struct RunCache {
    source_name: String,
    /// (language, pattern_type) → pattern id
    patterns: HashMap<(String, String), Uuid>,
    /// (entity type, external id) → internal id
    mappings: HashMap<(EntityType, String), Uuid>,
    /// sentence text → existing sentence, for translation reconciliation
    texts: HashMap<String, TextEntry>,
}

impl RunCache {
    /// Empty cache for a source
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            ..Default::default()
        }
    }

    /// Corpus runs: existing patterns of the language and sentence mappings of the source
    pub async fn preload_corpus(pool: &SqlitePool, source_name: &str, language: &str) -> Result<Self> {
        let mut cache = Self::new(source_name);
        cache.load_patterns(pool, language).await?;
        cache.load_mappings(pool, EntityType::Sentence).await?;
        cache.log_loaded();
        Ok(cache)
    }

    /// Pair runs: sentence mappings of the source and the text index of the source language
    pub async fn preload_pairs(pool: &SqlitePool, source_name: &str, language: &str) -> Result<Self> {
        let mut cache = Self::new(source_name);
        cache.load_mappings(pool, EntityType::Sentence).await?;
        cache.texts = sentences::load_text_index(pool, language).await?;
        cache.log_loaded();
        Ok(cache)
    }

    /// Dictionary runs: lemma mappings of the source
    pub async fn preload_dictionary(pool: &SqlitePool, source_name: &str) -> Result<Self> {
        let mut cache = Self::new(source_name);
        cache.load_mappings(pool, EntityType::Lemma).await?;
        cache.log_loaded();
        Ok(cache)
    }

    async fn load_patterns(&mut self, pool: &SqlitePool, language: &str) -> Result<()> {
        let ids = patterns::load_pattern_ids(pool, language).await?;
        self.patterns.extend(
            ids.into_iter()
                .map(|(pattern_type, id)| ((language.to_string(), pattern_type), id)),
        );
        Ok(())
    }

    async fn load_mappings(&mut self, pool: &SqlitePool, entity_type: EntityType) -> Result<()> {
        let ids = mappings::load_mappings(pool, &self.source_name, entity_type).await?;
        self.mappings
            .extend(ids.into_iter().map(|(external_id, id)| ((entity_type, external_id), id)));
        Ok(())
    }

    fn log_loaded(&self) {
        tracing::debug!(
            source = %self.source_name,
            patterns = self.patterns.len(),
            mappings = self.mappings.len(),
            texts = self.texts.len(),
            "Run cache preloaded"
        );
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Internal id an external id of this source already maps to
    pub fn mapped(&self, entity_type: EntityType, external_id: &str) -> Option<Uuid> {
        self.mappings.get(&(entity_type, external_id.to_string())).copied()
    }

    pub fn record_mapping(&mut self, entity_type: EntityType, external_id: impl Into<String>, internal_id: Uuid) {
        self.mappings.insert((entity_type, external_id.into()), internal_id);
    }

    pub fn pattern_id(&self, language: &str, pattern_type: &str) -> Option<Uuid> {
        self.patterns
            .get(&(language.to_string(), pattern_type.to_string()))
            .copied()
    }

    pub fn insert_pattern(&mut self, language: &str, pattern_type: &str, id: Uuid) {
        self.patterns
            .insert((language.to_string(), pattern_type.to_string()), id);
    }

    pub fn text_entry(&self, text: &str) -> Option<TextEntry> {
        self.texts.get(text).copied()
    }

    pub fn insert_text(&mut self, text: impl Into<String>, entry: TextEntry) {
        self.texts.insert(text.into(), entry);
    }

    /// Note that the sentence behind `text` now carries a translation
    pub fn mark_translated(&mut self, text: &str) {
        if let Some(entry) = self.texts.get_mut(text) {
            entry.has_translation = true;
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }
}
