//! Sentence complexity scoring
//!
//! Rates a parsed sentence 1-10 for teaching difficulty from five bounded
//! sub-scores. Pattern rarity and vocabulary are calibrated against frequency
//! tables built from the whole corpus in a pre-pass.
//!
//! # Sub-scores
//! - **Length** (0-2): word count; ≤5 → 0, ≤10 → 0.5, ≤15 → 1.0, ≤20 → 1.5, else 2.0
//! - **Pattern rarity** (0-3): distinct patterns with rarity > 0.8, capped at 3
//! - **Vocabulary** (0-2): share of lemmas outside the top-N most frequent;
//!   ≥0.5 → 2.0, ≥0.3 → 1.0, ≥0.1 → 0.5
//! - **Case diversity** (0-2): distinct cases; ≥5 → 2.0, ≥4 → 1.5, ≥3 → 1.0, ≥2 → 0.5
//! - **Verb complexity** (0-2): +1.0 per subjunctive/conditional mood, +0.5 per
//!   passive voice, +0.5 per pluperfect/future tense
//!
//! # Rescaling
//! `score = clamp(round(raw / RAW_MAX × 10 + 1), 1, 10)` where `RAW_MAX` is the
//! sum of the sub-score maxima.
//!
//! Rarity is `1 - freq / max_freq`, with frequency measured as pattern occurrences
//! per corpus sentence. Without calibration every pattern is maximally rare and
//! every lemma counts as common.

use crate::parsers::{Features, ParsedSentence, Token};
use lexa_common::db::{MAX_SCORE, MIN_SCORE};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

pub const LENGTH_MAX: f64 = 2.0;
pub const RARITY_MAX: f64 = 3.0;
pub const VOCABULARY_MAX: f64 = 2.0;
pub const CASE_DIVERSITY_MAX: f64 = 2.0;
pub const VERB_COMPLEXITY_MAX: f64 = 2.0;

/// Highest possible raw score
pub const RAW_MAX: f64 =
    LENGTH_MAX + RARITY_MAX + VOCABULARY_MAX + CASE_DIVERSITY_MAX + VERB_COMPLEXITY_MAX;

/// Patterns above this rarity count toward the rarity sub-score
const RARE_THRESHOLD: f64 = 0.8;

/// Default size of the "common vocabulary" band
pub const DEFAULT_COMMON_LEMMA_RANK: usize = 1000;

/// The five sub-scores behind one complexity score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub length: f64,
    pub pattern_rarity: f64,
    pub vocabulary: f64,
    pub case_diversity: f64,
    pub verb_complexity: f64,
}

impl ScoreBreakdown {
    pub fn raw(&self) -> f64 {
        self.length + self.pattern_rarity + self.vocabulary + self.case_diversity + self.verb_complexity
    }

    /// Rescaled 1-10 score
    pub fn score(&self) -> u8 {
        rescale(self.raw())
    }
}

fn rescale(raw: f64) -> u8 {
    let scaled = (raw / RAW_MAX * 10.0 + 1.0).round();
    scaled.clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
}

fn length_score(words: usize) -> f64 {
    match words {
        0..=5 => 0.0,
        6..=10 => 0.5,
        11..=15 => 1.0,
        16..=20 => 1.5,
        _ => LENGTH_MAX,
    }
}

/// Words that count toward length and vocabulary
fn counted_words(sentence: &ParsedSentence) -> impl Iterator<Item = &Token> {
    sentence
        .words()
        .filter(|t| t.upos.as_deref() != Some("PUNCT"))
}

fn lemma_key(token: &Token) -> Option<String> {
    token.lemma.as_deref().map(str::to_lowercase)
}

/// Complexity scorer with optional corpus calibration
#[derive(Debug, Clone)]
pub struct ComplexityScorer {
    pattern_frequency: HashMap<String, f64>,
    max_frequency: f64,
    /// 1 = most frequent lemma
    lemma_ranks: HashMap<String, usize>,
    common_lemma_rank: usize,
    calibrated: bool,
    rarity_cache: HashMap<String, f64>,
}

impl Default for ComplexityScorer {
    fn default() -> Self {
        Self::uncalibrated(DEFAULT_COMMON_LEMMA_RANK)
    }
}

impl ComplexityScorer {
    pub fn uncalibrated(common_lemma_rank: usize) -> Self {
        Self {
            pattern_frequency: HashMap::new(),
            max_frequency: 0.0,
            lemma_ranks: HashMap::new(),
            common_lemma_rank,
            calibrated: false,
            rarity_cache: HashMap::new(),
        }
    }

    /// Build frequency tables from a whole corpus
    pub fn from_corpus<'a>(
        sentences: impl IntoIterator<Item = &'a ParsedSentence>,
        common_lemma_rank: usize,
    ) -> Self {
        let mut pattern_counts: HashMap<String, usize> = HashMap::new();
        let mut lemma_counts: HashMap<String, usize> = HashMap::new();
        let mut sentence_count = 0usize;

        for sentence in sentences {
            sentence_count += 1;
            for (_, key) in sentence.patterns() {
                *pattern_counts.entry(key).or_default() += 1;
            }
            for lemma in counted_words(sentence).filter_map(lemma_key) {
                *lemma_counts.entry(lemma).or_default() += 1;
            }
        }

        let total = sentence_count.max(1) as f64;
        let pattern_frequency: HashMap<String, f64> = pattern_counts
            .into_iter()
            .map(|(key, count)| (key, count as f64 / total))
            .collect();
        let max_frequency = pattern_frequency.values().copied().fold(0.0, f64::max);

        let mut by_count: Vec<(String, usize)> = lemma_counts.into_iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let lemma_ranks = by_count
            .into_iter()
            .enumerate()
            .map(|(idx, (lemma, _))| (lemma, idx + 1))
            .collect::<HashMap<_, _>>();

        debug!(
            sentences = sentence_count,
            patterns = pattern_frequency.len(),
            lemmas = lemma_ranks.len(),
            "Calibrated complexity scorer"
        );

        Self {
            pattern_frequency,
            max_frequency,
            lemma_ranks,
            common_lemma_rank,
            calibrated: true,
            rarity_cache: HashMap::new(),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Occurrences per corpus sentence; 0 when unseen
    pub fn pattern_frequency(&self, key: &str) -> f64 {
        self.pattern_frequency.get(key).copied().unwrap_or(0.0)
    }

    pub fn lemma_rank(&self, lemma: &str) -> Option<usize> {
        self.lemma_ranks.get(&lemma.to_lowercase()).copied()
    }

    /// Rarity in [0, 1]; memoized per key
    pub fn rarity(&mut self, key: &str) -> f64 {
        if let Some(rarity) = self.rarity_cache.get(key) {
            return *rarity;
        }

        let rarity = match self.pattern_frequency.get(key) {
            Some(freq) if self.max_frequency > 0.0 => 1.0 - freq / self.max_frequency,
            _ => 1.0,
        };
        self.rarity_cache.insert(key.to_string(), rarity);
        rarity
    }

    fn is_common(&self, lemma: &str) -> bool {
        if !self.calibrated {
            return true;
        }
        self.lemma_ranks
            .get(lemma)
            .is_some_and(|rank| *rank <= self.common_lemma_rank)
    }

    pub fn breakdown(&mut self, sentence: &ParsedSentence) -> ScoreBreakdown {
        let words = counted_words(sentence).count();

        let keys: BTreeSet<String> = sentence.patterns().into_iter().map(|(_, key)| key).collect();
        let rare = keys
            .iter()
            .filter(|key| self.rarity(key) > RARE_THRESHOLD)
            .count();

        let lemmas: Vec<String> = counted_words(sentence).filter_map(lemma_key).collect();
        let vocabulary = if lemmas.is_empty() {
            0.0
        } else {
            let uncommon = lemmas.iter().filter(|l| !self.is_common(l)).count();
            match uncommon as f64 / lemmas.len() as f64 {
                share if share >= 0.5 => 2.0,
                share if share >= 0.3 => 1.0,
                share if share >= 0.1 => 0.5,
                _ => 0.0,
            }
        };

        let cases: BTreeSet<&str> = sentence
            .words()
            .filter_map(|t| t.features.case.as_deref())
            .collect();
        let case_diversity = match cases.len() {
            n if n >= 5 => 2.0,
            4 => 1.5,
            3 => 1.0,
            2 => 0.5,
            _ => 0.0,
        };

        let verb_complexity = sentence
            .words()
            .map(|t| verb_weight(&t.features))
            .sum::<f64>()
            .min(VERB_COMPLEXITY_MAX);

        ScoreBreakdown {
            length: length_score(words),
            pattern_rarity: (rare as f64).min(RARITY_MAX),
            vocabulary,
            case_diversity,
            verb_complexity,
        }
    }

    /// 1-10 complexity score
    pub fn score(&mut self, sentence: &ParsedSentence) -> u8 {
        self.breakdown(sentence).score()
    }

    /// Score untokenized text on length alone
    pub fn score_text(&self, text: &str) -> u8 {
        let words = text
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphanumeric))
            .count();
        ScoreBreakdown {
            length: length_score(words),
            ..Default::default()
        }
        .score()
    }

    /// Difficulty 1-10 for a new pattern from its rarity and feature count
    pub fn estimate_pattern_difficulty(&mut self, key: &str, features: &Features) -> u8 {
        let rarity = self.rarity(key);
        let feature_count = features.known().len().min(3) as f64;
        let estimate = 1.0 + (rarity * 6.0).round() + feature_count;
        estimate.clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
    }
}

fn verb_weight(features: &Features) -> f64 {
    let mut weight = 0.0;
    if matches!(features.mood.as_deref(), Some("Sub") | Some("Cnd")) {
        weight += 1.0;
    }
    if features.voice.as_deref() == Some("Pass") {
        weight += 0.5;
    }
    if matches!(features.tense.as_deref(), Some("Pqp") | Some("Fut")) {
        weight += 0.5;
    }
    weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::conllu::parse_str;

    const CORPUS: &str = "\
# sent_id = s1
# text = Мама мыла раму.
1\tМама\tмама\tNOUN\t_\tCase=Nom|Gender=Fem|Number=Sing\t2\tnsubj\t_\t_
2\tмыла\tмыть\tVERB\t_\tAspect=Imp|Mood=Ind|Number=Sing|Tense=Past|Voice=Act\t0\troot\t_\t_
3\tраму\tрама\tNOUN\t_\tCase=Acc|Gender=Fem|Number=Sing\t2\tobj\t_\t_
4\t.\t.\tPUNCT\t_\t_\t2\tpunct\t_\t_

# sent_id = s2
1-2\tdel\t_\t_\t_\t_\t_\t_\t_\t_
1\tde\tde\tADP\t_\t_\t3\tcase\t_\t_
2\tel\tel\tDET\t_\tGender=Masc|Number=Sing\t3\tdet\t_\t_
3\tmar\tmar\tNOUN\t_\tGender=Masc|Number=Sing\t0\troot\t_\t_
";

    fn corpus() -> Vec<ParsedSentence> {
        parse_str(CORPUS).into_iter().map(Result::unwrap).collect()
    }

    #[test]
    fn test_raw_max_is_sum_of_maxima() {
        assert_eq!(RAW_MAX, 11.0);
        let full = ScoreBreakdown {
            length: LENGTH_MAX,
            pattern_rarity: RARITY_MAX,
            vocabulary: VOCABULARY_MAX,
            case_diversity: CASE_DIVERSITY_MAX,
            verb_complexity: VERB_COMPLEXITY_MAX,
        };
        assert_eq!(full.score(), 10);
        assert_eq!(ScoreBreakdown::default().score(), 1);
    }

    #[test]
    fn test_length_thresholds() {
        assert_eq!(length_score(5), 0.0);
        assert_eq!(length_score(6), 0.5);
        assert_eq!(length_score(15), 1.0);
        assert_eq!(length_score(20), 1.5);
        assert_eq!(length_score(21), 2.0);
    }

    #[test]
    fn test_uncalibrated_scorer_treats_patterns_as_rare() {
        let sentences = corpus();
        let mut scorer = ComplexityScorer::default();
        let breakdown = scorer.breakdown(&sentences[0]);

        assert_eq!(breakdown.length, 0.0);
        assert_eq!(breakdown.pattern_rarity, 3.0);
        assert_eq!(breakdown.vocabulary, 0.0);
        assert_eq!(breakdown.case_diversity, 0.5);
        assert_eq!(breakdown.verb_complexity, 0.0);
        // 3.5 / 11 * 10 + 1 = 4.18
        assert_eq!(breakdown.score(), 4);
    }

    #[test]
    fn test_calibrated_frequencies() {
        let sentences = corpus();
        let mut scorer = ComplexityScorer::from_corpus(&sentences, 1000);

        assert!(scorer.is_calibrated());
        assert_eq!(scorer.pattern_frequency("noun_nom_sing_fem"), 0.5);
        assert_eq!(scorer.rarity("noun_nom_sing_fem"), 0.0);
        assert_eq!(scorer.rarity("noun_gen_plur_neut"), 1.0);
        // Ties broken lexicographically
        assert_eq!(scorer.lemma_rank("de"), Some(1));
        assert_eq!(scorer.lemma_rank("мама"), Some(4));
        assert_eq!(scorer.lemma_rank("."), None);

        assert_eq!(scorer.score(&sentences[0]), 1);
    }

    #[test]
    fn test_vocabulary_outside_common_band() {
        let sentences = corpus();
        let mut scorer = ComplexityScorer::from_corpus(&sentences, 1);
        assert_eq!(scorer.breakdown(&sentences[0]).vocabulary, 2.0);
    }

    #[test]
    fn test_rarity_is_memoized() {
        let mut scorer = ComplexityScorer::from_corpus(&corpus(), 1000);
        let first = scorer.rarity("det_sing_masc");
        let second = scorer.rarity("det_sing_masc");
        assert_eq!(first, second);
        assert_eq!(scorer.rarity_cache.len(), 1);
    }

    #[test]
    fn test_verb_complexity_is_capped() {
        let input = "\
1\tx\tx\tVERB\t_\tMood=Sub|Tense=Fut|Voice=Pass\t0\troot\t_\t_
2\ty\ty\tVERB\t_\tMood=Cnd\t1\tconj\t_\t_
";
        let sentence = parse_str(input).remove(0).unwrap();
        let breakdown = ComplexityScorer::default().breakdown(&sentence);
        assert_eq!(breakdown.verb_complexity, 2.0);
    }

    #[test]
    fn test_case_diversity_steps() {
        let cases = ["Nom", "Gen", "Dat", "Acc", "Ins"];
        let lines: Vec<String> = cases
            .iter()
            .enumerate()
            .map(|(i, case)| format!("{}\tw\tw\tNOUN\t_\tCase={}\t0\troot\t_\t_", i + 1, case))
            .collect();
        let sentence = parse_str(&lines.join("\n")).remove(0).unwrap();
        assert_eq!(ComplexityScorer::default().breakdown(&sentence).case_diversity, 2.0);
    }

    #[test]
    fn test_score_text_uses_length_only() {
        let scorer = ComplexityScorer::default();
        assert_eq!(scorer.score_text("Я читаю."), 1);
        let long = vec!["слово"; 25].join(" ");
        assert_eq!(scorer.score_text(&long), 3);
        assert_eq!(scorer.score_text(" - "), 1);
    }

    #[test]
    fn test_pattern_difficulty_estimate() {
        let features = Features::parse("Case=Nom|Gender=Fem|Number=Sing");
        let mut uncalibrated = ComplexityScorer::default();
        assert_eq!(uncalibrated.estimate_pattern_difficulty("noun_nom_sing_fem", &features), 10);

        let mut calibrated = ComplexityScorer::from_corpus(&corpus(), 1000);
        assert_eq!(calibrated.estimate_pattern_difficulty("noun_nom_sing_fem", &features), 4);
        assert_eq!(calibrated.estimate_pattern_difficulty("noun", &Features::default()), 7);
    }

    #[test]
    fn test_scores_stay_in_range_for_own_corpus() {
        let sentences = corpus();
        let mut scorer = ComplexityScorer::from_corpus(&sentences, 1);
        for sentence in &sentences {
            let score = scorer.score(sentence);
            assert!((MIN_SCORE..=MAX_SCORE).contains(&score));
        }
    }
}
