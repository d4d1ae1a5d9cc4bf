//! Tatoeba sentence-pair export reader
//!
//! Two tab-separated files:
//! - `sentences.csv` / `sentences_detailed.csv`: `id lang text [username added modified]`
//! - `links.csv`: `source_id target_id`
//!
//! Languages in the export are ISO-639-3 codes. Callers may pass 2-letter codes,
//! which are normalized through a fixed table.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Tatoeba export errors
#[derive(Debug, Error)]
pub enum TatoebaError {
    #[error("Unsupported language code: {0}")]
    UnsupportedLanguage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// ISO-639-1 to the ISO-639-3 code Tatoeba uses
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("en", "eng"),
    ("es", "spa"),
    ("fr", "fra"),
    ("de", "deu"),
    ("it", "ita"),
    ("pt", "por"),
    ("ru", "rus"),
    ("ja", "jpn"),
    ("zh", "cmn"),
    ("ko", "kor"),
    ("nl", "nld"),
    ("pl", "pol"),
    ("tr", "tur"),
    ("ar", "ara"),
    ("uk", "ukr"),
    ("cs", "ces"),
    ("sv", "swe"),
    ("la", "lat"),
    ("el", "ell"),
];

/// Normalize a language code to the export's 3-letter form
pub fn normalize_language(code: &str) -> Result<String, TatoebaError> {
    let code = code.trim().to_ascii_lowercase();
    if let Some((_, iso3)) = LANGUAGE_CODES.iter().find(|(iso1, _)| *iso1 == code) {
        return Ok(iso3.to_string());
    }
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_lowercase()) {
        return Ok(code);
    }
    Err(TatoebaError::UnsupportedLanguage(code))
}

/// One sentence row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TatoebaSentence {
    pub id: u64,
    pub language: String,
    pub text: String,
}

/// A linked sentence in the source language and its translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePair {
    pub source_id: u64,
    pub source_text: String,
    pub source_lang: String,
    pub target_id: u64,
    pub target_text: String,
    pub target_lang: String,
}

impl SentencePair {
    /// Direction-independent external id: both link rows of a pair share it
    pub fn mapping_key(&self) -> String {
        format!("{}:{}", self.source_id, self.target_id)
    }

    /// Orient two linked sentences; `None` unless one is in each language
    fn orient(a: &TatoebaSentence, b: &TatoebaSentence, source: &str, target: &str) -> Option<Self> {
        let (src, tgt) = if a.language == source && b.language == target {
            (a, b)
        } else if b.language == source && a.language == target {
            (b, a)
        } else {
            return None;
        };

        Some(Self {
            source_id: src.id,
            source_text: src.text.clone(),
            source_lang: src.language.clone(),
            target_id: tgt.id,
            target_text: tgt.text.clone(),
            target_lang: tgt.language.clone(),
        })
    }
}

/// Row counters for one read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub sentences_indexed: usize,
    /// Short, unparseable or empty sentence rows
    pub sentence_rows_skipped: usize,
    pub links_read: usize,
    pub link_rows_skipped: usize,
    pub pairs: usize,
}

fn strip_bom(line: &str) -> &str {
    line.strip_prefix('\u{feff}').unwrap_or(line)
}

fn parse_sentence_row(line: &str) -> Option<TatoebaSentence> {
    let mut fields = strip_bom(line).split('\t');
    let id = fields.next()?.trim().parse::<u64>().ok()?;
    let language = fields.next()?.trim();
    let text = fields.next()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(TatoebaSentence {
        id,
        language: language.to_string(),
        text: text.to_string(),
    })
}

fn parse_link_row(line: &str) -> Option<(u64, u64)> {
    let mut fields = strip_bom(line).split('\t');
    let a = fields.next()?.trim().parse::<u64>().ok()?;
    let b = fields.next()?.trim().parse::<u64>().ok()?;
    Some((a, b))
}

enum Row {
    Text,
    /// Not valid UTF-8; the bytes were consumed through the newline
    Undecodable,
}

fn read_row<R: BufRead>(reader: &mut R, buf: &mut String) -> std::io::Result<Option<Row>> {
    buf.clear();
    match reader.read_line(buf) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(Row::Text)),
        Err(e) if e.kind() == ErrorKind::InvalidData => Ok(Some(Row::Undecodable)),
        Err(e) => Err(e),
    }
}

fn is_blank(row: &Row, line: &str) -> bool {
    matches!(row, Row::Text) && line.trim().is_empty()
}

/// Index sentence rows, keeping only those `keep` accepts
fn index_sentences<R: BufRead>(
    mut reader: R,
    stats: &mut ReadStats,
    keep: impl Fn(&TatoebaSentence) -> bool,
) -> Result<HashMap<u64, TatoebaSentence>, TatoebaError> {
    let mut sentences_by_id = HashMap::new();
    let mut buf = String::new();

    while let Some(row) = read_row(&mut reader, &mut buf)? {
        let line = buf.trim_end_matches(['\n', '\r']);
        if is_blank(&row, line) {
            continue;
        }
        let parsed = match row {
            Row::Text => parse_sentence_row(line),
            Row::Undecodable => None,
        };
        let Some(sentence) = parsed else {
            stats.sentence_rows_skipped += 1;
            continue;
        };
        if keep(&sentence) {
            stats.sentences_indexed += 1;
            sentences_by_id.insert(sentence.id, sentence);
        }
    }

    Ok(sentences_by_id)
}

/// Next parseable link row; `Ok(None)` at end of input
fn next_link<R: BufRead>(reader: &mut R, buf: &mut String, stats: &mut ReadStats) -> std::io::Result<Option<(u64, u64)>> {
    while let Some(row) = read_row(reader, buf)? {
        let line = buf.trim_end();
        if is_blank(&row, line) {
            continue;
        }
        let parsed = match row {
            Row::Text => parse_link_row(line),
            Row::Undecodable => None,
        };
        match parsed {
            Some(link) => {
                stats.links_read += 1;
                return Ok(Some(link));
            }
            None => stats.link_rows_skipped += 1,
        }
    }
    Ok(None)
}

/// Whole export in memory
#[derive(Debug, Default)]
pub struct TatoebaCorpus {
    sentences: HashMap<u64, TatoebaSentence>,
    links: Vec<(u64, u64)>,
    stats: ReadStats,
}

impl TatoebaCorpus {
    pub fn load(sentences_path: &Path, links_path: &Path) -> Result<Self, TatoebaError> {
        let sentences = BufReader::new(File::open(sentences_path)?);
        let links = BufReader::new(File::open(links_path)?);
        Self::from_readers(sentences, links)
    }

    pub fn from_readers(sentences: impl BufRead, mut links: impl BufRead) -> Result<Self, TatoebaError> {
        let mut stats = ReadStats::default();
        let sentences = index_sentences(sentences, &mut stats, |_| true)?;

        let mut pairs = Vec::new();
        let mut buf = String::new();
        while let Some(link) = next_link(&mut links, &mut buf, &mut stats)? {
            pairs.push(link);
        }

        info!(
            sentences = sentences.len(),
            links = pairs.len(),
            "Loaded Tatoeba export"
        );

        Ok(Self {
            sentences,
            links: pairs,
            stats,
        })
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn sentence(&self, id: u64) -> Option<&TatoebaSentence> {
        self.sentences.get(&id)
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// All pairs between the two languages, one per link row
    pub fn pairs(&self, source: &str, target: &str) -> Result<Vec<SentencePair>, TatoebaError> {
        let source = normalize_language(source)?;
        let target = normalize_language(target)?;

        Ok(self
            .links
            .iter()
            .filter_map(|(a, b)| {
                let a = self.sentences.get(a)?;
                let b = self.sentences.get(b)?;
                SentencePair::orient(a, b, &source, &target)
            })
            .collect())
    }
}

/// Two-pass streaming reader
///
/// Pass one indexes only sentences in the two requested languages; pass two walks
/// the link file and resolves both endpoints against that index.
pub struct PairStream<L> {
    index: HashMap<u64, TatoebaSentence>,
    links: L,
    buf: String,
    source: String,
    target: String,
    limit: Option<usize>,
    stats: ReadStats,
    finished: bool,
}

impl PairStream<BufReader<File>> {
    pub fn open(
        sentences_path: &Path,
        links_path: &Path,
        source: &str,
        target: &str,
        limit: Option<usize>,
    ) -> Result<Self, TatoebaError> {
        let sentences = BufReader::new(File::open(sentences_path)?);
        let links = BufReader::new(File::open(links_path)?);
        Self::from_readers(sentences, links, source, target, limit)
    }
}

impl<L: BufRead> PairStream<L> {
    pub fn from_readers(
        sentences: impl BufRead,
        links: L,
        source: &str,
        target: &str,
        limit: Option<usize>,
    ) -> Result<Self, TatoebaError> {
        let source = normalize_language(source)?;
        let target = normalize_language(target)?;

        let mut stats = ReadStats::default();
        let index = index_sentences(sentences, &mut stats, |s| {
            s.language == source || s.language == target
        })?;

        debug!(
            source = %source,
            target = %target,
            indexed = index.len(),
            skipped = stats.sentence_rows_skipped,
            "Indexed sentences for pair stream"
        );

        Ok(Self {
            index,
            links,
            buf: String::new(),
            source,
            target,
            limit,
            stats,
            finished: false,
        })
    }

    /// Sentences kept by the first pass
    pub fn indexed(&self) -> usize {
        self.index.len()
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    fn next_pair(&mut self) -> Result<Option<SentencePair>, TatoebaError> {
        loop {
            if self.limit.is_some_and(|limit| self.stats.pairs >= limit) {
                return Ok(None);
            }

            let Some((a, b)) = next_link(&mut self.links, &mut self.buf, &mut self.stats)? else {
                return Ok(None);
            };

            let (Some(a), Some(b)) = (self.index.get(&a), self.index.get(&b)) else {
                continue;
            };

            if let Some(pair) = SentencePair::orient(a, b, &self.source, &self.target) {
                self.stats.pairs += 1;
                return Ok(Some(pair));
            }
        }
    }
}

impl<L: BufRead> Iterator for PairStream<L> {
    type Item = Result<SentencePair, TatoebaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_pair() {
            Ok(Some(pair)) => Some(Ok(pair)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
