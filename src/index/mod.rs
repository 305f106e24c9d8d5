//! Blocking engine: tokenizer and weighted inverted index.
//!
//! The index is built once per corpus snapshot and committed before use;
//! it proposes likely-duplicate candidates by weighted token overlap with
//! TF-IDF-like scoring.

pub mod entry;
pub mod search;
pub mod tokenizer;

pub use entry::IndexEntry;
pub use search::{DEFAULT_MATCH_LIMIT, Index};
pub use tokenizer::{ADJACENCY_FACTOR, fingerprint, tokenize, tokenize_with};
