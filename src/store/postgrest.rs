//! Hosted document store client over the PostgREST API.
//!
//! Talks to a Supabase-style `documents` table plus a `match_documents`
//! similarity function. Every request carries the access key as both the
//! `apikey` header and a bearer token.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::Config;
use crate::error::{Error, Result};

use super::{Document, DocumentStore, NewDocument, SearchHit};

/// Columns selected by list responses; the embedding and hash stay
/// server-side.
const LIST_COLUMNS: &str = "id,content,metadata,source_type,source_url,created_at";

pub struct PostgrestStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(serde::Deserialize)]
struct IdRow {
    id: String,
}

impl PostgrestStore {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Store(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.store_url.trim_end_matches('/').to_string(),
            api_key: config.store_key.clone(),
            client,
        })
    }

    fn documents_url(&self) -> String {
        format!("{}/rest/v1/documents", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn error_from_response(
        context: &str,
        response: reqwest::Response,
    ) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Error::Store(format!("{context} failed with {status}: {body}"))
    }
}

#[async_trait]
impl DocumentStore for PostgrestStore {
    async fn insert(&self, doc: &NewDocument) -> Result<String> {
        let response = self
            .authed(self.client.post(self.documents_url()))
            .header("Prefer", "return=representation")
            .json(doc)
            .send()
            .await
            .map_err(|e| Error::Store(format!("insert request failed: {e}")))?;

        if response.status() == StatusCode::CONFLICT {
            return Err(Error::DuplicateDocument(doc.document_hash.clone()));
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response("insert", response).await);
        }

        let rows: Vec<IdRow> = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("invalid insert response: {e}")))?;
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| Error::Store("insert returned no rows".to_string()))
    }

    async fn find_by_hash(&self, document_hash: &str) -> Result<Option<String>> {
        let response = self
            .authed(self.client.get(self.documents_url()))
            .query(&[
                ("select", "id"),
                ("document_hash", &format!("eq.{document_hash}")),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::Store(format!("hash lookup request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("hash lookup", response).await);
        }

        let rows: Vec<IdRow> = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("invalid hash lookup response: {e}")))?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }

    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        // pgvector accepts the bracketed text form for vector arguments.
        let embedding_text = serde_json::to_string(query_embedding)?;
        let body = serde_json::json!({
            "query_embedding": embedding_text,
            "match_threshold": threshold,
            "match_count": limit,
        });

        let response = self
            .authed(
                self.client
                    .post(format!("{}/rest/v1/rpc/match_documents", self.base_url)),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Store(format!("similarity search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("similarity search", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| Error::Store(format!("invalid similarity search response: {e}")))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Document>> {
        let response = self
            .authed(self.client.get(self.documents_url()))
            .query(&[
                ("select", "id,content,metadata,source_type,source_url,document_hash,chunk_index,created_at"),
                ("id", &format!("eq.{id}")),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::Store(format!("get request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("get", response).await);
        }

        let rows: Vec<Document> = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("invalid get response: {e}")))?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let response = self
            .authed(self.client.delete(self.documents_url()))
            .header("Prefer", "return=representation")
            .query(&[("id", &format!("eq.{id}"))])
            .send()
            .await
            .map_err(|e| Error::Store(format!("delete request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("delete", response).await);
        }

        let rows: Vec<IdRow> = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("invalid delete response: {e}")))?;
        Ok(!rows.is_empty())
    }

    async fn list(
        &self,
        source_type: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>> {
        let mut query = vec![
            ("select".to_string(), LIST_COLUMNS.to_string()),
            ("order".to_string(), "created_at.desc".to_string()),
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), offset.to_string()),
        ];
        if let Some(st) = source_type {
            query.push(("source_type".to_string(), format!("eq.{st}")));
        }

        let response = self
            .authed(self.client.get(self.documents_url()))
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Store(format!("list request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("list", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| Error::Store(format!("invalid list response: {e}")))
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .authed(self.client.get(self.documents_url()))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| Error::Store(format!("health check request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("health check", response).await);
        }
        Ok(())
    }
}
