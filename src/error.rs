//! Error taxonomy for the document store and ingestion pipeline.
//!
//! Every operation in the core propagates the first failure from its
//! dependencies unmodified; nothing is swallowed except the dedup
//! short-circuit (which is success) and per-URL failures inside bulk URL
//! ingestion (logged and skipped).

use thiserror::Error;

/// Errors surfaced by the retrieval core.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration; fatal at manager construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// The remote embedding call failed or returned malformed data.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The remote store call failed, excluding the expected
    /// uniqueness-violation race (see [`Error::DuplicateDocument`]).
    #[error("store error: {0}")]
    Store(String),

    /// The store rejected an insert on the `document_hash` unique constraint.
    ///
    /// Concurrent stores of identical content can both pass the dedup
    /// pre-check; the loser's insert lands here and the caller re-fetches by
    /// hash instead of treating it as a hard failure.
    #[error("document with hash {0} already exists")]
    DuplicateDocument(String),

    /// Webpage fetch failed (network error or non-200 status).
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Malformed input to the ingestion pipeline (JSON documents, PDF
    /// extraction).
    #[error("parse error: {0}")]
    Parse(String),

    /// Missing local file or missing document where the contract promises one.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
