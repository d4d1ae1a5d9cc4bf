//! Source format parsers
//!
//! Each parser turns one external serialization into a lazy sequence of domain
//! records. Parsers own nothing beyond what they yield; persistence happens in
//! the ingestion pipeline.

pub mod conllu;
pub mod features;
pub mod tatoeba;
pub mod wiktionary;

pub use conllu::{BlockError, ConlluError, ConlluFile, ConlluReader, ParsedSentence, Token, TokenId};
pub use features::Features;
pub use tatoeba::{PairStream, SentencePair, TatoebaCorpus, TatoebaError};
pub use wiktionary::{DictionaryEntry, DumpReader, DumpStats, InflectionForm, WiktionaryError};
