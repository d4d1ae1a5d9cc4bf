//! Morphological feature bag
//!
//! Universal Dependencies features the pipeline reasons about get a named slot;
//! anything else lands in `other`, so new annotation features pass through intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// UD feature names with a dedicated slot, in canonical order
pub const KNOWN_FEATURES: [&str; 8] = [
    "Case", "Number", "Gender", "Tense", "Person", "Aspect", "Mood", "Voice",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tense: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Features without a dedicated slot
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, String>,
}

impl Features {
    /// Parse a FEATS column (`Key=Val|Key=Val` or `_`)
    pub fn parse(column: &str) -> Self {
        let mut features = Features::default();
        for (key, value) in super::conllu::parse_key_values(column) {
            features.set(&key, value);
        }
        features
    }

    /// Store a value under its UD feature name
    pub fn set(&mut self, key: &str, value: String) {
        match key {
            "Case" => self.case = Some(value),
            "Number" => self.number = Some(value),
            "Gender" => self.gender = Some(value),
            "Tense" => self.tense = Some(value),
            "Person" => self.person = Some(value),
            "Aspect" => self.aspect = Some(value),
            "Mood" => self.mood = Some(value),
            "Voice" => self.voice = Some(value),
            _ => {
                self.other.insert(key.to_string(), value);
            }
        }
    }

    /// Look up any feature by its UD name
    pub fn get(&self, key: &str) -> Option<&str> {
        let slot = match key {
            "Case" => &self.case,
            "Number" => &self.number,
            "Gender" => &self.gender,
            "Tense" => &self.tense,
            "Person" => &self.person,
            "Aspect" => &self.aspect,
            "Mood" => &self.mood,
            "Voice" => &self.voice,
            _ => return self.other.get(key).map(String::as_str),
        };
        slot.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        KNOWN_FEATURES.iter().all(|k| self.get(k).is_none()) && self.other.is_empty()
    }

    /// Known features only, for a pattern's feature breakdown
    pub fn known(&self) -> BTreeMap<&'static str, &str> {
        KNOWN_FEATURES
            .iter()
            .filter_map(|k| self.get(k).map(|v| (*k, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_keys() {
        let f = Features::parse("Animacy=Anim|Case=Nom|Gender=Fem|Number=Sing");
        assert_eq!(f.case.as_deref(), Some("Nom"));
        assert_eq!(f.gender.as_deref(), Some("Fem"));
        assert_eq!(f.get("Animacy"), Some("Anim"));
        assert_eq!(f.known().len(), 3);
    }

    #[test]
    fn test_empty_marker() {
        assert!(Features::parse("_").is_empty());
        assert!(Features::parse("").is_empty());
    }

    #[test]
    fn test_serializes_only_present_slots() {
        let f = Features::parse("Case=Gen|Polarity=Neg");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json, serde_json::json!({"case": "Gen", "other": {"Polarity": "Neg"}}));
    }
}
