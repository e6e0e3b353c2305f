//! Multi-format document ingestion.
//!
//! [`DocumentIngester`] feeds the retrieval manager from plain text,
//! markdown, web pages, large texts (chunked), JSON documents, PDFs, local
//! files, and newline-delimited URL lists. File dispatch goes through a
//! [`FormatRegistry`] keyed on extension; unknown extensions fall back to
//! plain text.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use pulldown_cmark::{Event, Parser, TagEnd};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::chunker::split_text;
use crate::error::{Error, Result};
use crate::manager::{RetrievalManager, StoreRequest};
use crate::web::{url_to_filename, Crawler};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// How a file's content is interpreted during [`DocumentIngester::ingest_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Markdown,
    Json,
    Pdf,
    Text,
}

/// Extension-to-format dispatch table.
///
/// The defaults cover the formats the pipeline understands natively; callers
/// can register additional extensions. Unregistered extensions resolve to
/// [`FileFormat::Text`].
pub struct FormatRegistry {
    by_extension: HashMap<String, FileFormat>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self {
            by_extension: HashMap::new(),
        };
        registry.register("md", FileFormat::Markdown);
        registry.register("json", FileFormat::Json);
        registry.register("pdf", FileFormat::Pdf);
        for ext in ["txt", "py", "js", "ts", "html", "css"] {
            registry.register(ext, FileFormat::Text);
        }
        registry
    }
}

impl FormatRegistry {
    pub fn register(&mut self, extension: &str, format: FileFormat) {
        self.by_extension
            .insert(extension.to_ascii_lowercase(), format);
    }

    pub fn resolve(&self, extension: &str) -> FileFormat {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .copied()
            .unwrap_or(FileFormat::Text)
    }
}

pub struct DocumentIngester {
    manager: Arc<RetrievalManager>,
    crawler: Arc<dyn Crawler>,
    registry: FormatRegistry,
}

impl DocumentIngester {
    pub fn new(manager: Arc<RetrievalManager>, crawler: Arc<dyn Crawler>) -> Self {
        Self {
            manager,
            crawler,
            registry: FormatRegistry::default(),
        }
    }

    pub fn registry_mut(&mut self) -> &mut FormatRegistry {
        &mut self.registry
    }

    /// Ingest plain text as a single document.
    pub async fn ingest_text(
        &self,
        content: &str,
        source_type: Option<&str>,
        source_url: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<String> {
        self.store_text(content, source_type, source_url, metadata, 0)
            .await
    }

    async fn store_text(
        &self,
        content: &str,
        source_type: Option<&str>,
        source_url: Option<&str>,
        metadata: Option<Value>,
        chunk_index: i64,
    ) -> Result<String> {
        let mut meta = as_object(metadata);
        meta.insert("ingestion_method".into(), json!("text"));

        self.manager
            .store(StoreRequest {
                content: content.to_string(),
                metadata: Some(Value::Object(meta)),
                source_type: source_type.map(str::to_string),
                source_url: source_url.map(str::to_string),
                chunk_index,
            })
            .await
    }

    /// Ingest markdown; the plain-text rendering is embedded and the
    /// original markdown survives under `original_content`.
    pub async fn ingest_markdown(
        &self,
        content: &str,
        source_url: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<String> {
        let text = markdown_to_text(content);

        let mut meta = as_object(metadata);
        meta.insert("original_format".into(), json!("markdown"));
        meta.insert("original_content".into(), json!(content));

        self.ingest_text(&text, Some("markdown"), source_url, Some(Value::Object(meta)))
            .await
    }

    /// Fetch a web page and ingest its text content.
    ///
    /// The markdown rendering of the page is kept in metadata alongside the
    /// page title (or the URL when the page has none).
    pub async fn ingest_webpage(&self, url: &str, metadata: Option<Value>) -> Result<String> {
        let page = self.crawler.fetch(url).await?;
        let text = collapse_whitespace(&markdown_to_text(&page.markdown));

        let mut meta = as_object(metadata);
        meta.insert("original_format".into(), json!("html"));
        meta.insert("markdown_content".into(), json!(page.markdown));
        meta.insert("title".into(), json!(page.title));

        self.ingest_text(&text, Some("webpage"), Some(url), Some(Value::Object(meta)))
            .await
    }

    /// Ingest a large text by chunking it, one document per chunk.
    ///
    /// Each chunk records its position, the chunk count, and its own size in
    /// metadata; ids come back in chunk order.
    pub async fn ingest_large_text(
        &self,
        content: &str,
        source_type: Option<&str>,
        source_url: Option<&str>,
        metadata: Option<Value>,
        max_chunk_size: usize,
        overlap: usize,
    ) -> Result<Vec<String>> {
        let chunks = split_text(content, max_chunk_size, overlap);
        let base_meta = as_object(metadata);

        let mut doc_ids = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let mut meta = base_meta.clone();
            meta.insert("chunk_index".into(), json!(i));
            meta.insert("total_chunks".into(), json!(chunks.len()));
            meta.insert("chunk_size".into(), json!(chunk.chars().count()));

            let doc_id = self
                .store_text(
                    chunk,
                    source_type,
                    source_url,
                    Some(Value::Object(meta)),
                    i as i64,
                )
                .await?;
            doc_ids.push(doc_id);
        }

        info!(chunks = chunks.len(), "ingested chunked document");
        Ok(doc_ids)
    }

    /// Ingest documents from a JSON string.
    ///
    /// An array yields one document per object element: the `content` key
    /// becomes the body and the remaining keys merge into metadata. A single
    /// object yields one document, serializing the whole object when it has
    /// no `content` key. Anything else yields nothing.
    pub async fn ingest_json(
        &self,
        json_content: &str,
        source_type: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<Vec<String>> {
        let data: Value = serde_json::from_str(json_content)?;
        let source_type = source_type.unwrap_or("json");
        let base_meta = as_object(metadata);

        let mut doc_ids = Vec::new();
        match data {
            Value::Array(items) => {
                for item in items {
                    let Value::Object(obj) = item else { continue };
                    let content = content_of(&obj).unwrap_or_default();
                    let meta = merge_without_content(&base_meta, obj);
                    let doc_id = self
                        .ingest_text(&content, Some(source_type), None, Some(Value::Object(meta)))
                        .await?;
                    doc_ids.push(doc_id);
                }
            }
            Value::Object(obj) => {
                let content = match content_of(&obj) {
                    Some(c) => c,
                    None => serde_json::to_string(&obj)?,
                };
                let meta = merge_without_content(&base_meta, obj);
                let doc_id = self
                    .ingest_text(&content, Some(source_type), None, Some(Value::Object(meta)))
                    .await?;
                doc_ids.push(doc_id);
            }
            _ => {}
        }

        Ok(doc_ids)
    }

    /// Extract text from a PDF and ingest it through the chunked path.
    pub async fn ingest_pdf(
        &self,
        file_path: &Path,
        source_url: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<Vec<String>> {
        let bytes = tokio::fs::read(file_path).await?;
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| Error::Parse(format!("PDF extraction failed for {}: {e}", file_path.display())))?;

        let path_str = file_path.to_string_lossy();
        let mut meta = as_object(metadata);
        meta.insert("original_format".into(), json!("pdf"));
        meta.insert("file_path".into(), json!(path_str));

        self.ingest_large_text(
            &text,
            Some("pdf"),
            Some(source_url.unwrap_or(&path_str)),
            Some(Value::Object(meta)),
            DEFAULT_CHUNK_SIZE,
            DEFAULT_CHUNK_OVERLAP,
        )
        .await
    }

    /// Ingest a local file, dispatching on its extension through the
    /// [`FormatRegistry`].
    pub async fn ingest_file(
        &self,
        file_path: &Path,
        source_type: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<Vec<String>> {
        if !file_path.exists() {
            return Err(Error::NotFound(format!(
                "file not found: {}",
                file_path.display()
            )));
        }

        let extension = file_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let default_type = extension.clone();
        let source_type = source_type.unwrap_or(&default_type);
        let path_str = file_path.to_string_lossy();

        match self.registry.resolve(&extension) {
            FileFormat::Markdown => {
                let content = tokio::fs::read_to_string(file_path).await?;
                Ok(vec![
                    self.ingest_markdown(&content, Some(&path_str), metadata)
                        .await?,
                ])
            }
            FileFormat::Json => {
                let content = tokio::fs::read_to_string(file_path).await?;
                self.ingest_json(&content, Some(source_type), metadata).await
            }
            FileFormat::Pdf => self.ingest_pdf(file_path, Some(&path_str), metadata).await,
            FileFormat::Text => {
                let content = tokio::fs::read_to_string(file_path).await?;
                Ok(vec![
                    self.ingest_text(&content, Some(source_type), Some(&path_str), metadata)
                        .await?,
                ])
            }
        }
    }

    /// Crawl every URL listed in a file (one per line), save each page's
    /// markdown under `output_dir`, and ingest it.
    ///
    /// Failures on individual URLs are logged and skipped; the returned ids
    /// cover the successes only.
    pub async fn ingest_urls_file(
        &self,
        file_path: &Path,
        output_dir: &Path,
        metadata: Option<Value>,
    ) -> Result<Vec<String>> {
        if !file_path.exists() {
            return Err(Error::NotFound(format!(
                "file not found: {}",
                file_path.display()
            )));
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let listing = tokio::fs::read_to_string(file_path).await?;
        let urls: Vec<&str> = listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let base_meta = as_object(metadata);
        let mut doc_ids = Vec::new();

        for url in urls {
            match self.crawl_and_ingest(url, output_dir, &base_meta).await {
                Ok(doc_id) => {
                    info!(url, id = %doc_id, "ingested crawled page");
                    doc_ids.push(doc_id);
                }
                Err(e) => {
                    error!(url, error = %e, "failed to ingest URL, skipping");
                }
            }
        }

        Ok(doc_ids)
    }

    async fn crawl_and_ingest(
        &self,
        url: &str,
        output_dir: &Path,
        base_meta: &Map<String, Value>,
    ) -> Result<String> {
        let page = self.crawler.fetch(url).await?;

        let filename = url_to_filename(url)?;
        let output_path = output_dir.join(filename);
        tokio::fs::write(&output_path, &page.markdown).await?;

        let mut meta = base_meta.clone();
        meta.insert(
            "original_file".into(),
            json!(output_path.to_string_lossy()),
        );

        self.ingest_markdown(&page.markdown, Some(url), Some(Value::Object(meta)))
            .await
    }
}

/// Render markdown to plain text by keeping text and code events.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) => out.push_str(&text),
            Event::Code(code) => out.push_str(&code),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Collapse all whitespace runs to single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn as_object(metadata: Option<Value>) -> Map<String, Value> {
    match metadata {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// The `content` value of a JSON object, as text.
fn content_of(obj: &Map<String, Value>) -> Option<String> {
    obj.get("content").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Merge an item's keys over the base metadata, dropping `content`.
fn merge_without_content(base: &Map<String, Value>, item: Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in item {
        merged.insert(key, value);
    }
    merged.remove("content");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClient;
    use crate::store::memory::MemoryStore;
    use crate::web::FetchedPage;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    /// Canned crawler; URLs containing "fail" error out.
    struct StubCrawler;

    #[async_trait]
    impl Crawler for StubCrawler {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            if url.contains("fail") {
                return Err(Error::Fetch(format!("{url} returned HTTP 500")));
            }
            Ok(FetchedPage {
                title: "Stub Page".into(),
                html: "<html><body><h1>Stub</h1><p>Page body.</p></body></html>".into(),
                markdown: "# Stub\n\nPage body.".into(),
            })
        }
    }

    fn ingester() -> DocumentIngester {
        let manager = Arc::new(RetrievalManager::new(
            Arc::new(StubEmbedder),
            Arc::new(MemoryStore::new()),
        ));
        DocumentIngester::new(manager, Arc::new(StubCrawler))
    }

    async fn metadata_of(ingester: &DocumentIngester, id: &str) -> Map<String, Value> {
        let doc = ingester.manager.get(id).await.unwrap().unwrap();
        doc.metadata.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn text_ingestion_tags_the_method() {
        let ingester = ingester();
        let id = ingester
            .ingest_text("plain body", None, None, None)
            .await
            .unwrap();
        let meta = metadata_of(&ingester, &id).await;
        assert_eq!(meta["ingestion_method"], json!("text"));
    }

    #[tokio::test]
    async fn markdown_keeps_original_and_embeds_text() {
        let ingester = ingester();
        let id = ingester
            .ingest_markdown("# Title\n\nSome *emphasis*.", None, None)
            .await
            .unwrap();
        let doc = ingester.manager.get(&id).await.unwrap().unwrap();
        assert_eq!(doc.source_type, "markdown");
        assert!(!doc.content.contains('#'));
        assert!(doc.content.contains("Some emphasis."));
        let meta = doc.metadata.as_object().unwrap();
        assert_eq!(meta["original_format"], json!("markdown"));
        assert_eq!(meta["original_content"], json!("# Title\n\nSome *emphasis*."));
    }

    #[tokio::test]
    async fn webpage_records_title_and_markdown() {
        let ingester = ingester();
        let id = ingester
            .ingest_webpage("https://example.com/stub", None)
            .await
            .unwrap();
        let doc = ingester.manager.get(&id).await.unwrap().unwrap();
        assert_eq!(doc.source_type, "webpage");
        assert_eq!(doc.source_url.as_deref(), Some("https://example.com/stub"));
        assert_eq!(doc.content, "Stub Page body.");
        let meta = doc.metadata.as_object().unwrap();
        assert_eq!(meta["title"], json!("Stub Page"));
        assert_eq!(meta["markdown_content"], json!("# Stub\n\nPage body."));
    }

    #[tokio::test]
    async fn large_text_chunks_carry_positions() {
        let ingester = ingester();
        let sentence = "This sentence is here to fill space. ";
        let content = sentence.repeat(80);
        let ids = ingester
            .ingest_large_text(&content, None, None, None, 1000, 200)
            .await
            .unwrap();
        assert!(ids.len() > 1);

        for (i, id) in ids.iter().enumerate() {
            let doc = ingester.manager.get(id).await.unwrap().unwrap();
            let meta = doc.metadata.as_object().unwrap();
            assert_eq!(meta["chunk_index"], json!(i));
            assert_eq!(meta["total_chunks"], json!(ids.len()));
            assert_eq!(
                meta["chunk_size"],
                json!(doc.content.chars().count())
            );
            assert_eq!(doc.chunk_index, Some(i as i64));
        }
    }

    #[tokio::test]
    async fn json_array_yields_one_document_per_object() {
        let ingester = ingester();
        let ids = ingester
            .ingest_json(
                r#"[{"content": "first", "topic": "a"}, {"content": "second", "topic": "b"}, 42]"#,
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let meta = metadata_of(&ingester, &ids[0]).await;
        assert_eq!(meta["topic"], json!("a"));
        assert!(!meta.contains_key("content"));
        let doc = ingester.manager.get(&ids[0]).await.unwrap().unwrap();
        assert_eq!(doc.content, "first");
        assert_eq!(doc.source_type, "json");
    }

    #[tokio::test]
    async fn json_object_without_content_serializes_itself() {
        let ingester = ingester();
        let ids = ingester
            .ingest_json(r#"{"topic": "a"}"#, None, None)
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
        let doc = ingester.manager.get(&ids[0]).await.unwrap().unwrap();
        assert!(doc.content.contains("\"topic\""));
    }

    #[tokio::test]
    async fn invalid_json_is_a_parse_error() {
        let ingester = ingester();
        let err = ingester.ingest_json("{not json", None, None).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let ingester = ingester();
        let err = ingester
            .ingest_file(Path::new("/no/such/file.txt"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_extension_ingests_as_text() {
        let ingester = ingester();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.xyz");
        std::fs::write(&path, "opaque format content").unwrap();

        let ids = ingester.ingest_file(&path, None, None).await.unwrap();
        assert_eq!(ids.len(), 1);
        let doc = ingester.manager.get(&ids[0]).await.unwrap().unwrap();
        assert_eq!(doc.source_type, "xyz");
        assert_eq!(doc.content, "opaque format content");
    }

    #[tokio::test]
    async fn invalid_pdf_is_a_parse_error() {
        let ingester = ingester();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"not a valid pdf").unwrap();

        let err = ingester.ingest_file(&path, None, None).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn urls_file_skips_failures_and_saves_markdown() {
        let ingester = ingester();
        let dir = TempDir::new().unwrap();
        let listing = dir.path().join("urls.md");
        std::fs::write(
            &listing,
            "https://example.com/ok\n\nhttps://example.com/fail\n",
        )
        .unwrap();
        let out_dir = dir.path().join("web_markdown");

        let ids = ingester
            .ingest_urls_file(&listing, &out_dir, None)
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);

        let saved = out_dir.join("example.com_ok.md");
        let content = std::fs::read_to_string(&saved).unwrap();
        assert_eq!(content, "# Stub\n\nPage body.");

        let meta = metadata_of(&ingester, &ids[0]).await;
        assert_eq!(meta["original_format"], json!("markdown"));
        assert_eq!(
            meta["original_file"],
            json!(saved.to_string_lossy())
        );
    }

    #[tokio::test]
    async fn registry_override_changes_dispatch() {
        let mut ingester = ingester();
        ingester.registry_mut().register("log", FileFormat::Text);
        assert_eq!(ingester.registry.resolve("LOG"), FileFormat::Text);
        assert_eq!(ingester.registry.resolve("md"), FileFormat::Markdown);
        assert_eq!(ingester.registry.resolve("weird"), FileFormat::Text);
    }
}
