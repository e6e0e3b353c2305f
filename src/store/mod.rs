//! Storage abstraction for the document vault.
//!
//! The [`DocumentStore`] trait defines every storage operation the retrieval
//! manager needs, enabling pluggable backends: the hosted PostgREST store
//! ([`postgrest::PostgrestStore`]) and an in-memory implementation
//! ([`memory::MemoryStore`]) for tests and embedded use.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A stored document as returned by reads.
///
/// The embedding column never comes back from the store; it is write-only
/// from the client's perspective. `document_hash` and `chunk_index` are
/// absent from list responses, which select a narrower column set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    /// Arbitrary JSON object; `null` in the store is normalized to `{}` by
    /// the retrieval manager.
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub source_type: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub document_hash: Option<String>,
    #[serde(default)]
    pub chunk_index: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A document about to be written, embedding included.
#[derive(Debug, Clone, Serialize)]
pub struct NewDocument {
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
    pub source_type: String,
    pub source_url: Option<String>,
    pub document_hash: String,
    pub chunk_index: i64,
}

/// A similarity search result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub source_type: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Cosine similarity in `(threshold, 1.0]`, descending within a result
    /// set.
    pub similarity: f32,
}

/// Abstract document storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](DocumentStore::insert) | Write a document with its embedding |
/// | [`find_by_hash`](DocumentStore::find_by_hash) | Dedup lookup by content fingerprint |
/// | [`similarity_search`](DocumentStore::similarity_search) | Cosine similarity search |
/// | [`get_by_id`](DocumentStore::get_by_id) | Fetch one document |
/// | [`delete`](DocumentStore::delete) | Delete one document |
/// | [`list`](DocumentStore::list) | Page through documents, newest first |
/// | [`health_check`](DocumentStore::health_check) | Reachability probe |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, returning its assigned id.
    ///
    /// A `document_hash` uniqueness violation returns
    /// [`Error::DuplicateDocument`](crate::Error::DuplicateDocument) so
    /// callers can resolve the check-then-insert race.
    async fn insert(&self, doc: &NewDocument) -> Result<String>;

    /// Look up a document id by content fingerprint.
    async fn find_by_hash(&self, document_hash: &str) -> Result<Option<String>>;

    /// Cosine similarity search: rows strictly above `threshold`, most
    /// similar first, at most `limit` rows.
    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Fetch a document by id; `Ok(None)` when absent.
    async fn get_by_id(&self, id: &str) -> Result<Option<Document>>;

    /// Delete a document by id; `false` when nothing matched.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// List documents newest first, optionally filtered by `source_type`.
    async fn list(
        &self,
        source_type: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>>;

    /// Verify the store is reachable and the schema is present.
    async fn health_check(&self) -> Result<()>;
}
