//! CoNLL-U treebank reader
//!
//! Each token line has ten tab-separated columns:
//! `ID FORM LEMMA UPOS XPOS FEATS HEAD DEPREL DEPS MISC`.
//! A blank line closes a sentence block and `#` lines carry `key = value` metadata.
//!
//! The reader is lazy: it pulls one block at a time from any `BufRead`. A malformed
//! line poisons only its own block, which is reported as an `Err` item before the
//! reader moves on to the next block.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::features::Features;

/// Literal marker for an empty column
const EMPTY: &str = "_";

/// Number of columns in a token line
const COLUMN_COUNT: usize = 10;

/// CoNLL-U format errors
#[derive(Debug, Error)]
pub enum ConlluError {
    /// Token line without exactly ten columns
    #[error("Line {line}: expected 10 tab-separated fields, found {found}")]
    FieldCount { line: usize, found: usize },

    /// Unparseable ID column
    #[error("Line {line}: invalid token id '{value}'")]
    InvalidId { line: usize, value: String },

    /// Unparseable HEAD column
    #[error("Line {line}: invalid head index '{value}'")]
    InvalidHead { line: usize, value: String },

    /// Line bytes are not valid UTF-8
    #[error("Line {line}: not valid UTF-8")]
    InvalidEncoding { line: usize },

    /// Reading the underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A malformed sentence block, scoped so the caller can keep going
#[derive(Debug, Error)]
#[error("Malformed sentence block at line {start_line}: {error}")]
pub struct BlockError {
    /// `sent_id` metadata of the block, when it appeared before the bad line
    pub sent_id: Option<String>,
    /// 1-based line where the block started
    pub start_line: usize,
    pub error: ConlluError,
}

/// Token position: a word, a multiword span, or an empty node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenId {
    /// Ordinary syntactic word, 1-based
    Single(u32),
    /// Multiword token covering words `start..=end`
    Range(u32, u32),
    /// Enhanced-graph empty node such as `8.1`
    Empty(u32, u32),
}

impl TokenId {
    fn parse(value: &str) -> Option<Self> {
        if let Some((start, end)) = value.split_once('-') {
            return Some(TokenId::Range(start.parse().ok()?, end.parse().ok()?));
        }
        if let Some((major, minor)) = value.split_once('.') {
            return Some(TokenId::Empty(major.parse().ok()?, minor.parse().ok()?));
        }
        value.parse().ok().map(TokenId::Single)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenId::Single(id) => write!(f, "{}", id),
            TokenId::Range(start, end) => write!(f, "{}-{}", start, end),
            TokenId::Empty(major, minor) => write!(f, "{}.{}", major, minor),
        }
    }
}

/// One token line
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub id: TokenId,
    pub form: String,
    pub lemma: Option<String>,
    /// Universal part-of-speech tag
    pub upos: Option<String>,
    /// Language-specific tag
    pub xpos: Option<String>,
    pub features: Features,
    /// Head index; 0 is the root, `None` when unannotated
    pub head: Option<u32>,
    pub deprel: Option<String>,
    pub misc: BTreeMap<String, String>,
}

impl Token {
    /// True for multiword spans and empty nodes, which never carry patterns or counts
    pub fn is_multiword(&self) -> bool {
        !matches!(self.id, TokenId::Single(_))
    }

    /// Canonical feature-summary key for teaching patterns
    ///
    /// Nominal categories yield `<pos>_<case>_<number>_<gender>`, verbs yield
    /// `verb_<tense>_<aspect>_<mood>_p<person>_<number>`. Missing features are left
    /// out without changing the order of the rest. Other categories have no key.
    pub fn pattern_key(&self) -> Option<String> {
        if self.is_multiword() {
            return None;
        }

        let upos = self.upos.as_deref()?;
        let f = &self.features;
        let mut parts = Vec::with_capacity(6);

        match upos {
            "NOUN" | "PROPN" | "ADJ" | "DET" | "PRON" | "NUM" => {
                parts.push(upos.to_lowercase());
                parts.extend(
                    [&f.case, &f.number, &f.gender]
                        .into_iter()
                        .flatten()
                        .map(|v| v.to_lowercase()),
                );
            }
            "VERB" => {
                parts.push("verb".to_string());
                parts.extend(
                    [&f.tense, &f.aspect, &f.mood]
                        .into_iter()
                        .flatten()
                        .map(|v| v.to_lowercase()),
                );
                if let Some(person) = &f.person {
                    parts.push(format!("p{}", person.to_lowercase()));
                }
                if let Some(number) = &f.number {
                    parts.push(number.to_lowercase());
                }
            }
            _ => return None,
        }

        Some(parts.join("_"))
    }

    fn parse_line(line: &str, line_no: usize) -> Result<Self, ConlluError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != COLUMN_COUNT {
            return Err(ConlluError::FieldCount {
                line: line_no,
                found: fields.len(),
            });
        }

        let id = TokenId::parse(fields[0]).ok_or_else(|| ConlluError::InvalidId {
            line: line_no,
            value: fields[0].to_string(),
        })?;

        let head = match fields[6] {
            EMPTY => None,
            value => Some(value.parse::<u32>().map_err(|_| ConlluError::InvalidHead {
                line: line_no,
                value: value.to_string(),
            })?),
        };

        Ok(Token {
            id,
            form: fields[1].to_string(),
            lemma: optional(fields[2]),
            upos: optional(fields[3]),
            xpos: optional(fields[4]),
            features: Features::parse(fields[5]),
            head,
            deprel: optional(fields[7]),
            misc: parse_key_values(fields[9]),
        })
    }
}

/// A sentence block as read from the file; never persisted directly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSentence {
    /// `sent_id` metadata
    pub sent_id: Option<String>,
    /// `text` metadata, or the space-joined forms when absent
    pub text: String,
    pub tokens: Vec<Token>,
    /// Every other metadata line, keyed by name
    pub metadata: BTreeMap<String, String>,
}

impl ParsedSentence {
    /// Tokens that are syntactic words (no multiword spans or empty nodes)
    pub fn words(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| !t.is_multiword())
    }

    /// Pattern keys with the token position they occur at
    pub fn patterns(&self) -> Vec<(u32, String)> {
        self.tokens
            .iter()
            .enumerate()
            .filter_map(|(idx, token)| token.pattern_key().map(|key| (idx as u32, key)))
            .collect()
    }
}

/// Lazy CoNLL-U sentence iterator over any buffered reader
pub struct ConlluReader<R> {
    reader: R,
    line_no: usize,
    buf: String,
    finished: bool,
}

impl ConlluReader<BufReader<File>> {
    /// Open a file for streaming
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> ConlluReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
            finished: false,
        }
    }

    fn next_line(&mut self) -> Result<Option<&str>, ConlluError> {
        self.buf.clear();
        match self.reader.read_line(&mut self.buf) {
            Ok(0) => return Ok(None),
            Ok(_) => self.line_no += 1,
            // read_line consumed the bytes through the newline
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                self.line_no += 1;
                return Err(ConlluError::InvalidEncoding { line: self.line_no });
            }
            Err(e) => return Err(e.into()),
        }
        let line = self.buf.trim_end_matches(['\n', '\r']);
        // BOM on the first line of UTF-8 exports
        Ok(Some(line.strip_prefix('\u{feff}').unwrap_or(line)))
    }

    /// Read one block; `Ok(None)` at end of input
    fn read_block(&mut self) -> Result<Option<ParsedSentence>, BlockError> {
        let mut sentence = ParsedSentence::default();
        let mut text: Option<String> = None;
        let mut start_line = 0;
        let mut failure: Option<ConlluError> = None;

        loop {
            let line_no = self.line_no + 1;
            let next = self.next_line().map(|line| line.map(str::to_string));
            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e @ ConlluError::InvalidEncoding { .. }) => {
                    if start_line == 0 {
                        start_line = line_no;
                    }
                    failure.get_or_insert(e);
                    continue;
                }
                Err(e) => {
                    self.finished = true;
                    return Err(BlockError {
                        sent_id: sentence.sent_id,
                        start_line: line_no,
                        error: e,
                    });
                }
            };

            if line.trim().is_empty() {
                if start_line == 0 {
                    // Leading blank lines between blocks
                    continue;
                }
                break;
            }

            if start_line == 0 {
                start_line = line_no;
            }

            // After a bad line, drain the rest of the block
            if failure.is_some() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                let (key, value) = match comment.split_once('=') {
                    Some((key, value)) => (key.trim(), value.trim()),
                    None => (comment.trim(), ""),
                };
                match key {
                    "sent_id" => sentence.sent_id = Some(value.to_string()),
                    "text" => text = Some(value.to_string()),
                    _ => {
                        sentence.metadata.insert(key.to_string(), value.to_string());
                    }
                }
                continue;
            }

            match Token::parse_line(&line, line_no) {
                Ok(token) => sentence.tokens.push(token),
                Err(e) => failure = Some(e),
            }
        }

        if let Some(error) = failure {
            return Err(BlockError {
                sent_id: sentence.sent_id,
                start_line,
                error,
            });
        }

        if start_line == 0 {
            return Ok(None);
        }

        sentence.text = text.unwrap_or_else(|| {
            sentence
                .words()
                .map(|t| t.form.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        });

        Ok(Some(sentence))
    }
}

impl<R: BufRead> Iterator for ConlluReader<R> {
    type Item = Result<ParsedSentence, BlockError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_block() {
            Ok(Some(sentence)) => Some(Ok(sentence)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Restartable handle on a CoNLL-U file: each `sentences()` call starts a fresh pass
#[derive(Debug, Clone)]
pub struct ConlluFile {
    path: PathBuf,
}

impl ConlluFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sentences(&self) -> std::io::Result<ConlluReader<BufReader<File>>> {
        ConlluReader::open(&self.path)
    }
}

/// Parse an in-memory document
pub fn parse_str(input: &str) -> Vec<Result<ParsedSentence, BlockError>> {
    ConlluReader::new(input.as_bytes()).collect()
}

fn optional(value: &str) -> Option<String> {
    if value == EMPTY || value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse `Key=Val|Key=Val`; `_` is empty and keys without `=` map to ""
pub(crate) fn parse_key_values(value: &str) -> BTreeMap<String, String> {
    if value == EMPTY || value.is_empty() {
        return BTreeMap::new();
    }
    value
        .split('|')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
