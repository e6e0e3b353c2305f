//! The retrieval manager: dedup-checked storage and semantic search.
//!
//! Composes an [`EmbeddingClient`] and a [`DocumentStore`] behind explicit
//! constructor injection. The manager adds no retries of its own; the first
//! failure from either collaborator propagates unmodified.

use std::sync::Arc;

use tracing::{debug, info};

use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::hash::fingerprint;
use crate::store::{Document, DocumentStore, NewDocument, SearchHit};

pub const DEFAULT_SEARCH_LIMIT: usize = 5;
pub const DEFAULT_SEARCH_THRESHOLD: f32 = 0.7;
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Parameters for [`RetrievalManager::store`].
#[derive(Debug, Clone, Default)]
pub struct StoreRequest {
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub source_type: Option<String>,
    pub source_url: Option<String>,
    pub chunk_index: i64,
}

pub struct RetrievalManager {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn DocumentStore>,
}

impl RetrievalManager {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<dyn DocumentStore>) -> Self {
        Self { embedder, store }
    }

    pub fn store_backend(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Store a document, returning its id.
    ///
    /// The content fingerprint is checked first; an existing document
    /// short-circuits before any embedding call or write. If a concurrent
    /// writer wins the race between the check and the insert, the store's
    /// unique constraint rejects the insert and the existing id is fetched
    /// and returned instead.
    pub async fn store(&self, req: StoreRequest) -> Result<String> {
        let document_hash = fingerprint(&req.content, req.source_url.as_deref());

        if let Some(existing) = self.store.find_by_hash(&document_hash).await? {
            info!(%document_hash, id = %existing, "document already exists");
            return Ok(existing);
        }

        let embedding = self.embedder.embed(&req.content).await?;

        let doc = NewDocument {
            content: req.content,
            metadata: req.metadata.unwrap_or_else(|| serde_json::json!({})),
            embedding,
            source_type: req.source_type.unwrap_or_else(|| "text".to_string()),
            source_url: req.source_url,
            document_hash: document_hash.clone(),
            chunk_index: req.chunk_index,
        };

        match self.store.insert(&doc).await {
            Ok(id) => {
                info!(id = %id, "document stored");
                Ok(id)
            }
            Err(Error::DuplicateDocument(hash)) => {
                // Lost the check-then-insert race; the winner's row is the
                // answer.
                debug!(%hash, "insert raced with concurrent store");
                self.store
                    .find_by_hash(&hash)
                    .await?
                    .ok_or_else(|| Error::Store(format!("duplicate hash {hash} has no row")))
            }
            Err(e) => Err(e),
        }
    }

    /// Semantic search over stored documents.
    ///
    /// The query is embedded and matched by cosine similarity; only rows
    /// strictly above `threshold` come back, most similar first. The
    /// `source_type` filter is applied to the returned page (the similarity
    /// function takes no filter argument), so it can only shrink a page of
    /// results. An empty result set is `Ok`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
        source_type: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let query_embedding = self.embedder.embed(query).await?;
        let mut hits = self
            .store
            .similarity_search(&query_embedding, threshold, limit)
            .await?;
        if let Some(st) = source_type {
            hits.retain(|hit| hit.source_type == st);
        }
        for hit in &mut hits {
            normalize_metadata(&mut hit.metadata);
        }
        debug!(query, hits = hits.len(), "search complete");
        Ok(hits)
    }

    /// Fetch a document by id; `Ok(None)` when absent.
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let mut doc = self.store.get_by_id(id).await?;
        if let Some(d) = doc.as_mut() {
            normalize_metadata(&mut d.metadata);
        }
        Ok(doc)
    }

    /// Delete a document by id; `false` when nothing matched.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete(id).await
    }

    /// List documents newest first.
    pub async fn list(
        &self,
        source_type: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>> {
        let mut docs = self.store.list(source_type, limit, offset).await?;
        for doc in &mut docs {
            normalize_metadata(&mut doc.metadata);
        }
        Ok(docs)
    }
}

/// Stored `null` metadata reads back as an empty object.
fn normalize_metadata(metadata: &mut serde_json::Value) {
    if metadata.is_null() {
        *metadata = serde_json::json!({});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: counts calls, hashes text into a vector.
    struct StubEmbedder {
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let byte = text.as_bytes().first().copied().unwrap_or(0) as f32;
            Ok(vec![byte, 1.0, 0.0])
        }
    }

    fn manager() -> (Arc<StubEmbedder>, RetrievalManager) {
        let embedder = Arc::new(StubEmbedder::new());
        let store = Arc::new(MemoryStore::new());
        let manager = RetrievalManager::new(embedder.clone(), store);
        (embedder, manager)
    }

    fn text_request(content: &str) -> StoreRequest {
        StoreRequest {
            content: content.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn store_twice_returns_same_id_without_reembedding() {
        let (embedder, manager) = manager();
        let first = manager.store(text_request("same content")).await.unwrap();
        let second = manager.store(text_request("same content")).await.unwrap();
        assert_eq!(first, second);
        // The dedup hit never reaches the embedder.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_distinguishes_source_urls() {
        let (_, manager) = manager();
        let a = manager.store(text_request("content")).await.unwrap();
        let b = manager
            .store(StoreRequest {
                content: "content".into(),
                source_url: Some("https://example.com".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn search_empty_store_returns_empty() {
        let (_, manager) = manager();
        let hits = manager.search("anything", 5, 0.7, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_filters_by_source_type() {
        let (_, manager) = manager();
        manager.store(text_request("alpha")).await.unwrap();
        manager
            .store(StoreRequest {
                content: "alpha beta".into(),
                source_type: Some("webpage".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let all = manager.search("alpha", 10, 0.5, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let pages = manager
            .search("alpha", 10, 0.5, Some("webpage"))
            .await
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source_type, "webpage");
    }

    #[tokio::test]
    async fn delete_then_get_is_none() {
        let (_, manager) = manager();
        let id = manager.store(text_request("to delete")).await.unwrap();
        assert!(manager.delete(&id).await.unwrap());
        assert!(manager.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_race_resolves_to_existing_id() {
        // A store that reports no hash match but rejects the insert, as if a
        // concurrent writer landed between the check and the write.
        struct RacyStore {
            inner: MemoryStore,
            masked_lookups: AtomicUsize,
        }

        #[async_trait]
        impl DocumentStore for RacyStore {
            async fn insert(&self, doc: &NewDocument) -> Result<String> {
                self.inner.insert(doc).await
            }
            async fn find_by_hash(&self, hash: &str) -> Result<Option<String>> {
                if self.masked_lookups.fetch_sub(1, Ordering::SeqCst) > 0 {
                    return Ok(None);
                }
                self.inner.find_by_hash(hash).await
            }
            async fn similarity_search(
                &self,
                q: &[f32],
                t: f32,
                l: usize,
            ) -> Result<Vec<SearchHit>> {
                self.inner.similarity_search(q, t, l).await
            }
            async fn get_by_id(&self, id: &str) -> Result<Option<Document>> {
                self.inner.get_by_id(id).await
            }
            async fn delete(&self, id: &str) -> Result<bool> {
                self.inner.delete(id).await
            }
            async fn list(
                &self,
                s: Option<&str>,
                l: usize,
                o: usize,
            ) -> Result<Vec<Document>> {
                self.inner.list(s, l, o).await
            }
            async fn health_check(&self) -> Result<()> {
                Ok(())
            }
        }

        let store = Arc::new(RacyStore {
            inner: MemoryStore::new(),
            masked_lookups: AtomicUsize::new(1),
        });
        let manager = RetrievalManager::new(Arc::new(StubEmbedder::new()), store.clone());

        let winner = store
            .inner
            .insert(&NewDocument {
                content: "raced".into(),
                metadata: serde_json::json!({}),
                embedding: vec![1.0, 1.0, 0.0],
                source_type: "text".into(),
                source_url: None,
                document_hash: fingerprint("raced", None),
                chunk_index: 0,
            })
            .await
            .unwrap();

        // Pre-check sees nothing, insert hits the unique constraint, the
        // manager re-fetches and returns the winner's id.
        let id = manager.store(text_request("raced")).await.unwrap();
        assert_eq!(id, winner);
    }
}
