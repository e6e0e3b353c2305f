//! Store schema setup for `dv init`.
//!
//! The hosted store does not expose a SQL channel to API clients, so init
//! prints the schema for the operator to apply in the provider's SQL editor
//! and verifies the store is reachable with the current credentials.

use crate::error::Result;
use crate::store::DocumentStore;

/// The full schema: documents table, similarity function, indexes.
///
/// `dims` must match the configured embedding model's vector width.
pub fn schema_sql(dims: usize) -> String {
    format!(
        r#"-- Requires the pgvector extension.
CREATE EXTENSION IF NOT EXISTS vector;

CREATE TABLE IF NOT EXISTS documents (
    id UUID DEFAULT gen_random_uuid() PRIMARY KEY,
    content TEXT NOT NULL,
    metadata JSONB,
    embedding vector({dims}),
    source_type VARCHAR(50),
    source_url TEXT,
    document_hash VARCHAR(64) UNIQUE,
    chunk_index INTEGER,
    created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS documents_embedding_idx
ON documents USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100);

CREATE INDEX IF NOT EXISTS documents_source_hash_idx
ON documents (document_hash, chunk_index);

CREATE INDEX IF NOT EXISTS documents_source_type_idx
ON documents (source_type);

CREATE INDEX IF NOT EXISTS documents_created_at_idx
ON documents (created_at DESC);

CREATE OR REPLACE FUNCTION match_documents(
    query_embedding vector({dims}),
    match_threshold float,
    match_count int
)
RETURNS TABLE (
    id uuid,
    content text,
    metadata jsonb,
    source_type varchar(50),
    source_url text,
    created_at timestamptz,
    similarity float
)
LANGUAGE sql STABLE
AS $$
    SELECT id, content, metadata, source_type, source_url, created_at,
           1 - (documents.embedding <=> query_embedding) AS similarity
    FROM documents
    WHERE 1 - (documents.embedding <=> query_embedding) > match_threshold
    ORDER BY documents.embedding <=> query_embedding
    LIMIT match_count;
$$;
"#
    )
}

/// Run the init flow: print the schema, then probe the store.
pub async fn run_init(store: &dyn DocumentStore, dims: usize) -> Result<()> {
    println!("Apply this schema via your store's SQL editor if not done yet:");
    println!();
    println!("{}", schema_sql(dims));

    match store.health_check().await {
        Ok(()) => {
            println!("store connection ok");
            Ok(())
        }
        Err(e) => {
            println!("store connection failed: {e}");
            println!("check DOCVAULT_STORE_URL / DOCVAULT_STORE_KEY and that the schema above is applied");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_carries_configured_dims() {
        let sql = schema_sql(768);
        assert!(sql.contains("embedding vector(768)"));
        assert!(sql.contains("query_embedding vector(768)"));
        assert!(sql.contains("document_hash VARCHAR(64) UNIQUE"));
        assert!(sql.contains("FUNCTION match_documents"));
    }
}
