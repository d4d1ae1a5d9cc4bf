//! Wiktionary dump reader
//!
//! Streams a MediaWiki XML export one `<page>` at a time and extracts dictionary
//! entries for a single language. Only one page is held in memory at once.
//!
//! Wikitext is interpreted with positional heuristics:
//! - `==Language==` selects the language section
//! - `===Noun===` (or `====Noun====` under `===Etymology N===`) opens an entry
//! - `# ...` lines are definitions, `#:`/`#*` lines are examples and quotations
//! - declension / conjugation templates are read against a fixed slot grid

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Pages larger than this are skipped rather than buffered
pub const MAX_PAGE_BYTES: usize = 8 * 1024 * 1024;

static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<title>([^<]*)</title>").unwrap());
static TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").unwrap());
static REDIRECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<redirect\b").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(={2,6})\s*(.+?)\s*(={2,6})\s*$").unwrap());
static INNER_TEMPLATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[(?:[^\[\]|]*\|)?([^\[\]|]*)\]\]").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->|<ref[^>]*/>|(?s)<ref[^>]*>.*?</ref>|<[^>]+>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static FROM_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bfrom\s+\[\[([^\]|#]+)").unwrap());

/// Wiktionary dump errors
#[derive(Debug, Error)]
pub enum WiktionaryError {
    /// No language-section label is known for the requested code
    #[error("Unsupported dictionary language: {0}")]
    UnsupportedLanguage(String),

    /// Reading the dump failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Language-section headings accepted for a language code
pub fn language_labels(code: &str) -> Option<&'static [&'static str]> {
    let labels: &'static [&'static str] = match code {
        "ru" | "rus" => &["Russian"],
        "uk" | "ukr" => &["Ukrainian"],
        "pl" | "pol" => &["Polish"],
        "cs" | "ces" => &["Czech"],
        "de" | "deu" => &["German"],
        "en" | "eng" => &["English"],
        "es" | "spa" => &["Spanish"],
        "fr" | "fra" => &["French"],
        "it" | "ita" => &["Italian"],
        "pt" | "por" => &["Portuguese"],
        "nl" | "nld" => &["Dutch"],
        "sv" | "swe" => &["Swedish"],
        "la" | "lat" => &["Latin"],
        "el" | "ell" => &["Greek", "Ancient Greek"],
        "tr" | "tur" => &["Turkish"],
        "ar" | "ara" => &["Arabic"],
        "ja" | "jpn" => &["Japanese"],
        "ko" | "kor" => &["Korean"],
        "zh" | "cmn" => &["Chinese", "Mandarin"],
        _ => return None,
    };
    Some(labels)
}

/// Part-of-speech headings and the tag stored on the lemma
const POS_HEADINGS: &[(&str, &str)] = &[
    ("Noun", "noun"),
    ("Proper noun", "proper_noun"),
    ("Verb", "verb"),
    ("Adjective", "adjective"),
    ("Adverb", "adverb"),
    ("Pronoun", "pronoun"),
    ("Numeral", "numeral"),
    ("Determiner", "determiner"),
    ("Article", "article"),
    ("Preposition", "preposition"),
    ("Postposition", "postposition"),
    ("Conjunction", "conjunction"),
    ("Particle", "particle"),
    ("Interjection", "interjection"),
    ("Participle", "participle"),
    ("Phrase", "phrase"),
    ("Prefix", "prefix"),
    ("Suffix", "suffix"),
];

const NOUN_CASES: [&str; 6] = ["nom", "gen", "dat", "acc", "ins", "loc"];
const NUMBERS: [&str; 2] = ["sing", "plur"];
const PLACEHOLDERS: [&str; 3] = ["", "-", "—"];

fn pos_tag(heading: &str) -> Option<&'static str> {
    POS_HEADINGS
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(heading))
        .map(|(_, tag)| *tag)
}

/// One inflected form read from a table template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InflectionForm {
    pub form: String,
    pub case: Option<String>,
    pub number: Option<String>,
    pub person: Option<String>,
    pub tense: Option<String>,
    pub gender: Option<String>,
}

/// A (title, part of speech) dictionary entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictionaryEntry {
    pub title: String,
    /// Requested language code, as given to the reader
    pub language: String,
    pub part_of_speech: String,
    pub definitions: Vec<String>,
    pub etymology: Option<String>,
    pub pronunciation: Option<String>,
    /// `masc`, `fem` or `neut`
    pub gender: Option<String>,
    /// `imp` or `perf`
    pub aspect: Option<String>,
    pub inflections: Vec<InflectionForm>,
}

impl DictionaryEntry {
    /// External id used for cross-run dedup; one dump serves several languages
    pub fn mapping_key(&self) -> String {
        format!("{}:{}:{}", self.title, self.language, self.part_of_speech)
    }
}

/// Page-level counters for one pass over a dump
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpStats {
    pub pages: usize,
    /// Titles with a namespace prefix (`Wiktionary:`, `Template:` ...)
    pub namespaced: usize,
    pub redirects: usize,
    pub oversized: usize,
    /// Pages with bytes that are not valid UTF-8
    pub undecodable: usize,
    pub without_text: usize,
    /// Pages without a section for the requested language
    pub without_language: usize,
    pub entries: usize,
    /// Inflection templates whose argument count fit no known grid
    pub unrecognized_tables: usize,
}

/// Streaming entry reader over a dump
pub struct DumpReader<R> {
    pages: PageScanner<R>,
    language: String,
    labels: &'static [&'static str],
    pending: VecDeque<DictionaryEntry>,
    stats: DumpStats,
    finished: bool,
}

impl DumpReader<BufReader<File>> {
    pub fn open(path: &Path, language: &str) -> Result<Self, WiktionaryError> {
        let file = File::open(path)?;
        Self::new(BufReader::with_capacity(256 * 1024, file), language)
    }
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(reader: R, language: &str) -> Result<Self, WiktionaryError> {
        let labels = language_labels(language)
            .ok_or_else(|| WiktionaryError::UnsupportedLanguage(language.to_string()))?;

        Ok(Self {
            pages: PageScanner::new(reader),
            language: language.to_string(),
            labels,
            pending: VecDeque::new(),
            stats: DumpStats::default(),
            finished: false,
        })
    }

    pub fn stats(&self) -> &DumpStats {
        &self.stats
    }

    fn handle_page(&mut self, page: ScannedPage) {
        self.stats.pages += 1;

        if page.truncated {
            self.stats.oversized += 1;
            return;
        }

        if page.undecodable {
            self.stats.undecodable += 1;
            return;
        }

        let Some(title) = TITLE.captures(&page.xml).map(|c| decode(&c[1])) else {
            self.stats.without_text += 1;
            return;
        };

        if title.contains(':') {
            self.stats.namespaced += 1;
            return;
        }

        if REDIRECT.is_match(&page.xml) {
            self.stats.redirects += 1;
            return;
        }

        let Some(text) = TEXT.captures(&page.xml).map(|c| decode(&c[1])) else {
            self.stats.without_text += 1;
            return;
        };

        let entries = parse_entries(&title, &text, &self.language, self.labels, &mut self.stats);
        self.stats.entries += entries.len();
        self.pending.extend(entries);
    }
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = Result<DictionaryEntry, WiktionaryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            if self.finished {
                return None;
            }
            match self.pages.next_page() {
                Ok(Some(page)) => self.handle_page(page),
                Ok(None) => {
                    self.finished = true;
                    debug!(stats = ?self.stats, "Dump fully scanned");
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Entries for one page of wikitext
pub fn parse_page(title: &str, text: &str, language: &str) -> Result<Vec<DictionaryEntry>, WiktionaryError> {
    let labels = language_labels(language)
        .ok_or_else(|| WiktionaryError::UnsupportedLanguage(language.to_string()))?;
    let mut stats = DumpStats::default();
    Ok(parse_entries(title, text, language, labels, &mut stats))
}

struct ScannedPage {
    xml: String,
    truncated: bool,
    undecodable: bool,
}

/// Cuts `<page>...</page>` spans out of the stream line by line
struct PageScanner<R> {
    reader: R,
    line: Vec<u8>,
    page: String,
    in_page: bool,
    truncated: bool,
    undecodable: bool,
}

impl<R: BufRead> PageScanner<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            page: String::new(),
            in_page: false,
            truncated: false,
            undecodable: false,
        }
    }

    fn next_page(&mut self) -> std::io::Result<Option<ScannedPage>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                // A page cut off by end of input is dropped
                return Ok(None);
            }

            // Markup is ASCII, so page boundaries survive a lossy decode
            let line = String::from_utf8_lossy(&self.line);
            let lossy = matches!(line, Cow::Owned(_));

            if !self.in_page {
                let Some(start) = line.find("<page>") else {
                    continue;
                };
                self.in_page = true;
                self.truncated = false;
                self.undecodable = lossy;
                self.page.clear();
                self.page.push_str(&line[start..]);
            } else {
                self.undecodable |= lossy;
                if !self.truncated {
                    if self.page.len() + line.len() > MAX_PAGE_BYTES {
                        self.truncated = true;
                        self.page.clear();
                    } else {
                        self.page.push_str(&line);
                    }
                }
            }

            if line.contains("</page>") {
                self.in_page = false;
                return Ok(Some(ScannedPage {
                    xml: std::mem::take(&mut self.page),
                    truncated: self.truncated,
                    undecodable: self.undecodable,
                }));
            }
        }
    }
}

fn decode(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaKind {
    Etymology,
    Pronunciation,
}

/// Section currently accumulating body lines
enum OpenSection {
    Entry { pos: &'static str, level: usize, body: String },
    Meta { kind: MetaKind, body: String },
}

/// Per-language-section state while walking a page
#[derive(Default)]
struct LanguageContext {
    etymology: Option<String>,
    pronunciation: Option<String>,
}

fn parse_entries(
    title: &str,
    text: &str,
    language: &str,
    labels: &[&str],
    stats: &mut DumpStats,
) -> Vec<DictionaryEntry> {
    let mut entries = Vec::new();
    let mut in_language = false;
    let mut found_language = false;
    let mut context = LanguageContext::default();
    let mut open: Option<OpenSection> = None;
    // Level-3 heading currently in effect inside the language section
    let mut under_numbered_etymology = false;

    for line in text.lines() {
        // Unbalanced `=` runs are body text
        let heading = HEADING.captures(line).filter(|h| h[1].len() == h[3].len());
        let Some(heading) = heading else {
            match open.as_mut() {
                Some(OpenSection::Entry { body, .. }) | Some(OpenSection::Meta { body, .. }) => {
                    body.push_str(line);
                    body.push('\n');
                }
                None => {}
            }
            continue;
        };

        let level = heading[1].len();
        let name = heading[2].trim();

        // An entry absorbs deeper headings (Declension, Conjugation, ...)
        if let Some(OpenSection::Entry { level: entry_level, body, .. }) = open.as_mut() {
            if level > *entry_level {
                body.push_str(line);
                body.push('\n');
                continue;
            }
        }

        if let Some(section) = open.take() {
            close_section(section, title, language, &mut context, &mut entries, stats);
        }

        if level == 2 {
            in_language = labels.iter().any(|label| label.eq_ignore_ascii_case(name));
            found_language |= in_language;
            context = LanguageContext::default();
            under_numbered_etymology = false;
            continue;
        }

        if !in_language {
            continue;
        }

        if level == 3 {
            under_numbered_etymology = false;
        }

        if let Some(pos) = pos_tag(name) {
            if level == 3 || (level == 4 && under_numbered_etymology) {
                open = Some(OpenSection::Entry { pos, level, body: String::new() });
            }
            continue;
        }

        if starts_with_ignore_case(name, "Etymology") && level == 3 {
            under_numbered_etymology = name.len() > "Etymology".len();
            context.etymology = None;
            open = Some(OpenSection::Meta { kind: MetaKind::Etymology, body: String::new() });
        } else if starts_with_ignore_case(name, "Pronunciation") && level <= 4 {
            open = Some(OpenSection::Meta { kind: MetaKind::Pronunciation, body: String::new() });
        }
    }

    if let Some(section) = open.take() {
        close_section(section, title, language, &mut context, &mut entries, stats);
    }

    if !found_language {
        stats.without_language += 1;
    }

    entries
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

fn close_section(
    section: OpenSection,
    title: &str,
    language: &str,
    context: &mut LanguageContext,
    entries: &mut Vec<DictionaryEntry>,
    stats: &mut DumpStats,
) {
    match section {
        OpenSection::Meta { kind: MetaKind::Etymology, body } => {
            context.etymology = extract_etymology(&body);
        }
        OpenSection::Meta { kind: MetaKind::Pronunciation, body } => {
            if let Some(ipa) = extract_pronunciation(&body) {
                context.pronunciation = Some(ipa);
            }
        }
        OpenSection::Entry { pos, body, .. } => {
            entries.push(build_entry(title, language, pos, &body, context, stats));
        }
    }
}

fn build_entry(
    title: &str,
    language: &str,
    pos: &str,
    body: &str,
    context: &LanguageContext,
    stats: &mut DumpStats,
) -> DictionaryEntry {
    let templates = find_templates(body);

    let mut gender = None;
    let mut aspect = None;
    for template in templates.iter().filter(|t| t.args.is_empty()) {
        match template.name.as_str() {
            "m" => gender = gender.or(Some("masc")),
            "f" => gender = gender.or(Some("fem")),
            "n" => gender = gender.or(Some("neut")),
            "impf" => aspect = aspect.or(Some("imp")),
            "pf" => aspect = aspect.or(Some("perf")),
            _ => {}
        }
    }
    let gender = gender.map(str::to_string);

    let mut inflections = Vec::new();
    for template in &templates {
        let Some(kind) = TableKind::of(&template.name) else {
            continue;
        };
        let slots = template.positional();
        match kind.read(&slots, gender.as_deref()) {
            Some(forms) => inflections.extend(forms),
            None => {
                stats.unrecognized_tables += 1;
                debug!(
                    title,
                    template = %template.name,
                    args = slots.len(),
                    "Unrecognized inflection table shape"
                );
            }
        }
    }

    DictionaryEntry {
        title: title.to_string(),
        language: language.to_string(),
        part_of_speech: pos.to_string(),
        definitions: extract_definitions(body),
        etymology: extract_etymology(body).or_else(|| context.etymology.clone()),
        pronunciation: extract_pronunciation(body).or_else(|| context.pronunciation.clone()),
        gender,
        aspect: aspect.map(str::to_string),
        inflections,
    }
}

fn extract_definitions(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("# "))
        .filter(|rest| !rest.starts_with('*'))
        .map(strip_markup)
        .filter(|definition| !definition.is_empty())
        .collect()
}

fn extract_etymology(body: &str) -> Option<String> {
    for template in find_templates(body) {
        let lead = match template.name.as_str() {
            "inh" | "inh+" => "Inherited from",
            "der" | "der+" => "Derived from",
            "bor" | "bor+" => "Borrowed from",
            "etyl" => "From",
            _ => continue,
        };
        let args = template.positional();
        // inh|<target>|<source>|<term>, etyl|<source>|<target>
        let (source, term) = if template.name == "etyl" {
            (args.first().copied(), None)
        } else {
            (args.get(1).copied(), args.get(2).copied())
        };
        let Some(source) = source.filter(|s| !s.is_empty()) else {
            continue;
        };
        return Some(match term.map(strip_markup).filter(|t| !t.is_empty()) {
            Some(term) => format!("{} {} {}", lead, source, term),
            None => format!("{} {}", lead, source),
        });
    }

    FROM_LINK
        .captures(body)
        .map(|c| format!("From {}", c[1].trim()))
}

fn extract_pronunciation(body: &str) -> Option<String> {
    find_templates(body)
        .into_iter()
        .filter(|t| t.name == "IPA")
        .find_map(|t| {
            t.positional()
                .into_iter()
                .skip(1)
                .find(|p| !p.is_empty())
                .map(str::to_string)
        })
}

/// Remove templates, links, tags and emphasis; collapse whitespace
fn strip_markup(text: &str) -> String {
    let mut stripped = text.to_string();
    loop {
        let next = INNER_TEMPLATE.replace_all(&stripped, "").into_owned();
        if next == stripped {
            break;
        }
        stripped = next;
    }
    let stripped = HTML_TAG.replace_all(&stripped, "");
    let stripped = LINK.replace_all(&stripped, "$1");
    let stripped = stripped.replace("'''", "").replace("''", "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Noun,
    Verb,
}

impl TableKind {
    fn of(template_name: &str) -> Option<Self> {
        let name = template_name.to_lowercase();
        if name.contains("decl") || name.contains("noun-table") {
            Some(TableKind::Noun)
        } else if name.contains("conj") {
            Some(TableKind::Verb)
        } else {
            None
        }
    }

    fn slots(self) -> usize {
        match self {
            TableKind::Noun => NOUN_CASES.len() * NUMBERS.len(),
            TableKind::Verb => 6,
        }
    }

    /// `None` when there are more arguments than the grid holds
    fn read(self, args: &[&str], gender: Option<&str>) -> Option<Vec<InflectionForm>> {
        if args.len() > self.slots() {
            return None;
        }

        let forms = args
            .iter()
            .enumerate()
            .filter_map(|(slot, raw)| {
                let form = strip_markup(raw);
                if PLACEHOLDERS.contains(&form.as_str()) {
                    return None;
                }
                Some(match self {
                    TableKind::Noun => InflectionForm {
                        form,
                        case: Some(NOUN_CASES[slot / 2].to_string()),
                        number: Some(NUMBERS[slot % 2].to_string()),
                        gender: gender.map(str::to_string),
                        ..Default::default()
                    },
                    TableKind::Verb => InflectionForm {
                        form,
                        person: Some(((slot % 3) + 1).to_string()),
                        number: Some(NUMBERS[slot / 3].to_string()),
                        tense: Some("pres".to_string()),
                        ..Default::default()
                    },
                })
            })
            .collect();

        Some(forms)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Template {
    name: String,
    args: Vec<String>,
}

impl Template {
    fn positional(&self) -> Vec<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .filter(|arg| !is_named(arg))
            .collect()
    }
}

fn is_named(arg: &str) -> bool {
    match arg.split_once('=') {
        Some((key, _)) => {
            let key = key.trim();
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ')
        }
        None => false,
    }
}

/// Every `{{...}}` in the text, outer templates before the ones nested in them
fn find_templates(text: &str) -> Vec<Template> {
    let bytes = text.as_bytes();
    let mut templates = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            if let Some(end) = matching_close(bytes, i + 2) {
                let inner = &text[i + 2..end];
                let mut parts = split_top_level(inner).into_iter();
                let name = parts.next().unwrap_or_default().trim().to_string();
                let args: Vec<String> = parts.map(|p| p.trim().to_string()).collect();
                let nested: Vec<Template> = args.iter().flat_map(|a| find_templates(a)).collect();
                templates.push(Template { name, args });
                templates.extend(nested);
                i = end + 2;
                continue;
            }
        }
        i += 1;
    }

    templates
}

/// Index of the `}}` closing a template whose body starts at `from`
fn matching_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1;
    let mut j = from;
    while j + 1 < bytes.len() {
        match (bytes[j], bytes[j + 1]) {
            (b'{', b'{') => {
                depth += 1;
                j += 2;
            }
            (b'}', b'}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
                j += 2;
            }
            _ => j += 1,
        }
    }
    None
}

/// Split on `|` outside nested templates and links
fn split_top_level(inner: &str) -> Vec<&str> {
    let bytes = inner.as_bytes();
    let mut parts = Vec::new();
    let mut braces = 0usize;
    let mut brackets = 0usize;
    let mut start = 0;
    let mut j = 0;

    while j < bytes.len() {
        let pair = if j + 1 < bytes.len() { Some((bytes[j], bytes[j + 1])) } else { None };
        match pair {
            Some((b'{', b'{')) => {
                braces += 1;
                j += 2;
                continue;
            }
            Some((b'}', b'}')) if braces > 0 => {
                braces -= 1;
                j += 2;
                continue;
            }
            Some((b'[', b'[')) => {
                brackets += 1;
                j += 2;
                continue;
            }
            Some((b']', b']')) if brackets > 0 => {
                brackets -= 1;
                j += 2;
                continue;
            }
            _ => {}
        }
        if bytes[j] == b'|' && braces == 0 && brackets == 0 {
            parts.push(&inner[start..j]);
            start = j + 1;
        }
        j += 1;
    }
    parts.push(&inner[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/">
  <siteinfo>
    <sitename>Wiktionary</sitename>
  </siteinfo>
  <page>
    <title>Wiktionary:Main Page</title>
    <ns>4</ns>
    <revision><text xml:space="preserve">==Russian==
===Noun===
# not a word</text></revision>
  </page>
  <page>
    <title>Мама</title>
    <redirect title="мама" />
    <revision><text xml:space="preserve">#REDIRECT [[мама]]</text></revision>
  </page>
  <page>
    <title>мама</title>
    <ns>0</ns>
    <revision>
      <text xml:space="preserve">==Russian==
===Etymology===
Inherited from {{inh|ru|orv|мама}}.

===Pronunciation===
* {{IPA|ru|[ˈmamə]}}

===Noun===
{{ru-noun+|ма́ма|*}} {{f}}

# [[mom]] &amp; [[mama]]
#: {{ux|ru|Ма́ма до́ма.|Mom is home.}}
#* {{quote-book|ru|year=1900}}
# {{lb|ru|colloquial}} [[mother|mother]]
# {{inflection of|ru|ма́ма||gen|s}}

====Declension====
{{ru-decl-noun|ма́ма|ма́мы|ма́мы|ма́м|ма́ме|ма́мам|ма́му|ма́м|ма́мой|-|ма́ме|ма́мах}}

==Bulgarian==
===Noun===
# [[mom]]
</text>
    </revision>
  </page>
  <page>
    <title>читать</title>
    <revision>
      <text xml:space="preserve">==Russian==
===Etymology 1===
From [[чтить]].

====Verb====
{{ru-verb|чита́ть|impf}} {{impf}}

# to [[read]]

=====Conjugation=====
{{ru-conj|чита́ю|чита́ешь|чита́ет|чита́ем|чита́ете|чита́ют}}

===Etymology 2===
Borrowed {{bor|ru|fr|lecture}}.

====Noun====
{{m}}
# a reading
</text>
    </revision>
  </page>
  <page>
    <title>дом</title>
    <revision>
      <text xml:space="preserve">==Russian==
===Noun===
{{m}}
# [[house]]
{{ru-decl-noun|1|2|3|4|5|6|7|8|9|10|11|12|13}}
</text>
    </revision>
  </page>
  <page>
    <title>dog</title>
    <revision>
      <text xml:space="preserve">==English==
===Noun===
# a dog</text>
    </revision>
  </page>
</mediawiki>
"#;

    fn read_all() -> (Vec<DictionaryEntry>, DumpStats) {
        let mut reader = DumpReader::new(DUMP.as_bytes(), "ru").unwrap();
        let entries: Vec<_> = reader.by_ref().map(Result::unwrap).collect();
        (entries, reader.stats().clone())
    }

    #[test]
    fn test_page_filtering_stats() {
        let (entries, stats) = read_all();
        assert_eq!(stats.pages, 6);
        assert_eq!(stats.namespaced, 1);
        assert_eq!(stats.redirects, 1);
        assert_eq!(stats.without_language, 1);
        assert_eq!(stats.entries, 4);
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn test_noun_entry_with_section_fallbacks() {
        let (entries, _) = read_all();
        let mama = &entries[0];
        assert_eq!(mama.title, "мама");
        assert_eq!(mama.part_of_speech, "noun");
        assert_eq!(mama.definitions, vec!["mom & mama", "mother"]);
        assert_eq!(mama.etymology.as_deref(), Some("Inherited from orv мама"));
        assert_eq!(mama.pronunciation.as_deref(), Some("[ˈmamə]"));
        assert_eq!(mama.gender.as_deref(), Some("fem"));
        assert_eq!(mama.mapping_key(), "мама:ru:noun");
    }

    #[test]
    fn test_declension_grid_skips_placeholders() {
        let (entries, _) = read_all();
        let forms = &entries[0].inflections;
        assert_eq!(forms.len(), 11);

        assert_eq!(forms[0].form, "ма́ма");
        assert_eq!(forms[0].case.as_deref(), Some("nom"));
        assert_eq!(forms[0].number.as_deref(), Some("sing"));

        assert_eq!(forms[3].form, "ма́м");
        assert_eq!(forms[3].case.as_deref(), Some("gen"));
        assert_eq!(forms[3].number.as_deref(), Some("plur"));

        // Slot 9 (instrumental plural) was a placeholder
        assert!(!forms.iter().any(|f| f.case.as_deref() == Some("ins") && f.number.as_deref() == Some("plur")));
        assert_eq!(forms[10].form, "ма́мах");
        assert_eq!(forms[10].case.as_deref(), Some("loc"));
        assert!(forms.iter().all(|f| f.gender.as_deref() == Some("fem")));
    }

    #[test]
    fn test_numbered_etymology_sections() {
        let (entries, _) = read_all();
        let verb = &entries[1];
        assert_eq!(verb.title, "читать");
        assert_eq!(verb.part_of_speech, "verb");
        assert_eq!(verb.definitions, vec!["to read"]);
        assert_eq!(verb.etymology.as_deref(), Some("From чтить"));
        assert_eq!(verb.aspect.as_deref(), Some("imp"));

        let noun = &entries[2];
        assert_eq!(noun.part_of_speech, "noun");
        assert_eq!(noun.etymology.as_deref(), Some("Borrowed from fr lecture"));
        assert_eq!(noun.gender.as_deref(), Some("masc"));
    }

    #[test]
    fn test_conjugation_grid() {
        let (entries, _) = read_all();
        let forms = &entries[1].inflections;
        assert_eq!(forms.len(), 6);
        assert_eq!(forms[2].form, "чита́ет");
        assert_eq!(forms[2].person.as_deref(), Some("3"));
        assert_eq!(forms[2].number.as_deref(), Some("sing"));
        assert_eq!(forms[3].person.as_deref(), Some("1"));
        assert_eq!(forms[3].number.as_deref(), Some("plur"));
        assert!(forms.iter().all(|f| f.tense.as_deref() == Some("pres")));
    }

    #[test]
    fn test_oversized_table_yields_no_inflections() {
        let (entries, stats) = read_all();
        let dom = &entries[3];
        assert_eq!(dom.title, "дом");
        assert!(dom.inflections.is_empty());
        assert_eq!(dom.definitions, vec!["house"]);
        assert_eq!(stats.unrecognized_tables, 1);
    }

    #[test]
    fn test_unsupported_language() {
        let err = DumpReader::new(DUMP.as_bytes(), "xx").err().unwrap();
        assert!(matches!(err, WiktionaryError::UnsupportedLanguage(code) if code == "xx"));
    }

    #[test]
    fn test_template_splitting_respects_nesting() {
        let templates = find_templates("{{a|x=[[b|c]]|{{d|e}}|f}}");
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].name, "a");
        assert_eq!(templates[0].args, vec!["x=[[b|c]]", "{{d|e}}", "f"]);
        assert_eq!(templates[0].positional(), vec!["{{d|e}}", "f"]);
        assert_eq!(templates[1].name, "d");
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("{{lb|ru|{{q|rare}}}} a [[big|large]] '''house'''"), "a large house");
        assert_eq!(strip_markup("{{only template}}"), "");
    }

    #[test]
    fn test_unbalanced_heading_is_body_text() {
        let text = "==Russian==\n===Noun===\n{{m}}\n# [[cat]]\n===Verb==\n# [[dog]]\n";
        let entries = parse_page("кот", text, "ru").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].part_of_speech, "noun");
        assert_eq!(entries[0].definitions, vec!["cat", "dog"]);
    }

    #[test]
    fn test_undecodable_page_is_skipped() {
        let mut dump = b"<mediawiki>\n  <page>\n    <title>bad</title>\n    <revision>\n      <text>==Russian==\n===Noun===\n# \xff\xfe\n</text>\n    </revision>\n  </page>\n".to_vec();
        dump.extend_from_slice(
            "  <page>\n    <title>кот</title>\n    <revision>\n      <text>==Russian==\n===Noun===\n# [[cat]]\n</text>\n    </revision>\n  </page>\n</mediawiki>\n".as_bytes(),
        );

        let mut reader = DumpReader::new(&dump[..], "ru").unwrap();
        let entries: Vec<_> = reader.by_ref().map(Result::unwrap).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "кот");
        assert_eq!(reader.stats().pages, 2);
        assert_eq!(reader.stats().undecodable, 1);
    }

    #[test]
    fn test_parse_page_directly() {
        let entries = parse_page("кот", "==Russian==\n===Noun===\n{{m}}\n# [[cat]]\n", "ru").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].definitions, vec!["cat"]);
    }
}
