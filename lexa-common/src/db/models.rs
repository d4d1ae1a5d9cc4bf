//! Persisted record shapes
//!
//! These are the rows downstream engines read. Ingestion creates them; nothing in
//! this workspace mutates a Pattern after creation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lowest valid complexity score / pattern difficulty
pub const MIN_SCORE: u8 = 1;
/// Highest valid complexity score / pattern difficulty
pub const MAX_SCORE: u8 = 10;

/// A teaching sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub guid: Uuid,
    pub text: String,
    pub language: String,
    pub translation: Option<String>,
    /// Always within [1, 10]
    pub complexity_score: u8,
    /// Source tag, e.g. `ud_russian_syntagrus` or `tatoeba`
    pub source: String,
    /// Free-form metadata carried from the source
    pub extra_data: serde_json::Value,
}

impl Sentence {
    /// Create a new sentence with a fresh id; the score is clamped into range
    pub fn new(
        text: String,
        language: String,
        translation: Option<String>,
        complexity_score: u8,
        source: String,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            text,
            language,
            translation,
            complexity_score: complexity_score.clamp(MIN_SCORE, MAX_SCORE),
            source,
            extra_data: serde_json::Value::Object(Default::default()),
        }
    }
}

/// A grammatical pattern, unique per (language, pattern_type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub guid: Uuid,
    pub language: String,
    /// Derived pattern key, e.g. `noun_nom_sing_fem`
    pub pattern_type: String,
    /// Feature breakdown the key was derived from
    pub features: serde_json::Value,
    /// Estimated difficulty in [1, 10]
    pub difficulty: u8,
}

/// Link between a sentence and a pattern occurring at a token position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePattern {
    pub sentence_id: Uuid,
    pub pattern_id: Uuid,
    /// Zero-based index of the token within the sentence
    pub position: u32,
}

/// A dictionary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lemma {
    pub guid: Uuid,
    pub language: String,
    pub lemma: String,
    pub part_of_speech: String,
    pub definitions: Vec<String>,
    pub etymology: Option<String>,
    pub pronunciation: Option<String>,
    pub gender: Option<String>,
    pub aspect: Option<String>,
    pub source: String,
}

/// One inflected surface form of a lemma
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inflection {
    pub guid: Uuid,
    pub lemma_id: Uuid,
    pub form: String,
    pub grammatical_case: Option<String>,
    pub number: Option<String>,
    pub person: Option<String>,
    pub tense: Option<String>,
    pub gender: Option<String>,
}

/// Kind of entity an external id maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Sentence,
    Lemma,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Sentence => "sentence",
            EntityType::Lemma => "lemma",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentence" => Ok(EntityType::Sentence),
            "lemma" => Ok(EntityType::Lemma),
            other => Err(crate::Error::InvalidInput(format!("Unknown entity type: {}", other))),
        }
    }
}

/// (source_name, external_id, entity_type) → internal id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdMapping {
    pub source_name: String,
    pub external_id: String,
    pub entity_type: EntityType,
    pub internal_id: Uuid,
}
