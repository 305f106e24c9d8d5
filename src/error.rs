//! Diagnostic error types for the canonize engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes, help text, and source chains so users know
//! exactly what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the canonize engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum CanonError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),
}

/// Result type used across the crate.
pub type CanonResult<T> = std::result::Result<T, CanonError>;

// ---------------------------------------------------------------------------
// Resolver errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ResolverError {
    #[error("cannot pair an identifier with itself: {id}")]
    #[diagnostic(
        code(canonize::resolver::self_pair),
        help(
            "Identity edges connect two distinct identifiers. A self-pair is \
             always a caller bug; deduplicate the ids before calling into the \
             resolver."
        )
    )]
    SelfPair { id: String },

    #[error("I/O error on resolver log {path}: {source}")]
    #[diagnostic(
        code(canonize::resolver::io),
        help(
            "Check that the resolver log path exists, is readable/writable, \
             and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt resolver log record at {path}:{line}")]
    #[diagnostic(
        code(canonize::resolver::corrupt_log),
        help(
            "Each log line must be a JSON array \
             [target, source, judgement, score, user, timestamp]. The log is \
             rewritten wholesale on save; restore from a backup or remove the \
             damaged line after inspecting it."
        )
    )]
    CorruptLog {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Index errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("I/O error on index snapshot {path}: {source}")]
    #[diagnostic(
        code(canonize::index::io),
        help(
            "Check that the snapshot path is readable/writable. A missing \
             snapshot is not an error; the index rebuilds automatically."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt index snapshot: {path}")]
    #[diagnostic(
        code(canonize::index::corrupt_snapshot),
        help(
            "The snapshot could not be decoded. Delete it and re-run; the \
             index will be rebuilt from the corpus."
        )
    )]
    CorruptSnapshot {
        path: String,
        #[source]
        source: bincode::Error,
    },
}

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("I/O error on corpus file {path}: {source}")]
    #[diagnostic(
        code(canonize::model::io),
        help("Check that the corpus file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record at {path}:{line}")]
    #[diagnostic(
        code(canonize::model::invalid_record),
        help(
            "Each corpus line must be a JSON object with `id`, `schema` and \
             `properties` fields."
        )
    )]
    InvalidRecord {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown schema: {name}")]
    #[diagnostic(
        code(canonize::model::unknown_schema),
        help("Known schemata: Person, Company, Organization, Asset, Address.")
    )]
    UnknownSchema { name: String },
}
