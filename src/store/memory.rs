//! In-memory [`DocumentStore`] for tests and embedded use.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`; similarity search is
//! brute-force cosine over all stored vectors. The `document_hash` unique
//! constraint is enforced exactly like the hosted store, so the
//! check-then-insert race resolves the same way.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};

use super::{Document, DocumentStore, NewDocument, SearchHit};

struct StoredDoc {
    doc: NewDocument,
    created_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, StoredDoc>>,
    // Never reused, even after deletions, so the list tie-break stays
    // stable.
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_document(id: &str, stored: &StoredDoc) -> Document {
    Document {
        id: id.to_string(),
        content: stored.doc.content.clone(),
        metadata: stored.doc.metadata.clone(),
        source_type: stored.doc.source_type.clone(),
        source_url: stored.doc.source_url.clone(),
        document_hash: Some(stored.doc.document_hash.clone()),
        chunk_index: Some(stored.doc.chunk_index),
        created_at: stored.created_at,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, doc: &NewDocument) -> Result<String> {
        let mut docs = self.docs.write().unwrap();
        if docs
            .values()
            .any(|s| s.doc.document_hash == doc.document_hash)
        {
            return Err(Error::DuplicateDocument(doc.document_hash.clone()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        docs.insert(
            id.clone(),
            StoredDoc {
                doc: doc.clone(),
                created_at: Utc::now(),
                seq,
            },
        );
        Ok(id)
    }

    async fn find_by_hash(&self, document_hash: &str) -> Result<Option<String>> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .iter()
            .find(|(_, s)| s.doc.document_hash == document_hash)
            .map(|(id, _)| id.clone()))
    }

    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let docs = self.docs.read().unwrap();
        let mut hits: Vec<SearchHit> = docs
            .iter()
            .filter_map(|(id, stored)| {
                let similarity = cosine_similarity(query_embedding, &stored.doc.embedding);
                if similarity > threshold {
                    Some(SearchHit {
                        id: id.clone(),
                        content: stored.doc.content.clone(),
                        metadata: stored.doc.metadata.clone(),
                        source_type: stored.doc.source_type.clone(),
                        source_url: stored.doc.source_url.clone(),
                        created_at: stored.created_at,
                        similarity,
                    })
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(id).map(|stored| to_document(id, stored)))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut docs = self.docs.write().unwrap();
        Ok(docs.remove(id).is_some())
    }

    async fn list(
        &self,
        source_type: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>> {
        let docs = self.docs.read().unwrap();
        let mut rows: Vec<(&String, &StoredDoc)> = docs
            .iter()
            .filter(|(_, s)| source_type.is_none_or(|st| s.doc.source_type == st))
            .collect();
        // Insertion sequence breaks timestamp ties for a stable newest-first
        // order.
        rows.sort_by(|a, b| {
            b.1.created_at
                .cmp(&a.1.created_at)
                .then(b.1.seq.cmp(&a.1.seq))
        });
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(id, stored)| to_document(id, stored))
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str, hash: &str, embedding: Vec<f32>) -> NewDocument {
        NewDocument {
            content: content.into(),
            metadata: serde_json::json!({}),
            embedding,
            source_type: "text".into(),
            source_url: None,
            document_hash: hash.into(),
            chunk_index: 0,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_hash() {
        let store = MemoryStore::new();
        store.insert(&doc("a", "h1", vec![1.0])).await.unwrap();
        let err = store.insert(&doc("b", "h1", vec![1.0])).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateDocument(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn search_respects_threshold_and_order() {
        let store = MemoryStore::new();
        store
            .insert(&doc("close", "h1", vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(&doc("near", "h2", vec![0.9, 0.4359]))
            .await
            .unwrap();
        store
            .insert(&doc("far", "h3", vec![0.0, 1.0]))
            .await
            .unwrap();

        let hits = store
            .similarity_search(&[1.0, 0.0], 0.5, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "close");
        assert_eq!(hits[1].content, "near");
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn search_empty_store_is_ok_empty() {
        let store = MemoryStore::new();
        let hits = store.similarity_search(&[1.0], 0.7, 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_then_get_is_none() {
        let store = MemoryStore::new();
        let id = store.insert(&doc("a", "h1", vec![1.0])).await.unwrap();
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.get_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_reinserted_rows_newest_first() {
        let store = MemoryStore::new();
        let a = store.insert(&doc("a", "h1", vec![1.0])).await.unwrap();
        store.insert(&doc("b", "h2", vec![1.0])).await.unwrap();
        assert!(store.delete(&a).await.unwrap());
        // A row inserted after a deletion must not share a tie-break slot
        // with an existing row.
        store.insert(&doc("c", "h3", vec![1.0])).await.unwrap();

        let all = store.list(None, 10, 0).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "c");
        assert_eq!(all[1].content, "b");
    }

    #[tokio::test]
    async fn list_filters_by_source_type() {
        let store = MemoryStore::new();
        store.insert(&doc("a", "h1", vec![1.0])).await.unwrap();
        let mut web = doc("b", "h2", vec![1.0]);
        web.source_type = "webpage".into();
        store.insert(&web).await.unwrap();

        let all = store.list(None, 100, 0).await.unwrap();
        assert_eq!(all.len(), 2);
        let pages = store.list(Some("webpage"), 100, 0).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].content, "b");
    }
}
