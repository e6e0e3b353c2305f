//! # docvault CLI (`dv`)
//!
//! The `dv` binary is the operator surface of docvault: schema setup,
//! ingestion of files, pages, and directories, semantic search, and the
//! HTTP tool server.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dv init` | Print the store schema and verify connectivity |
//! | `dv ingest text "<content>"` | Store a single text document |
//! | `dv ingest file <path>` | Ingest a local file (md, json, pdf, txt, ...) |
//! | `dv ingest url <url>` | Fetch and ingest a web page |
//! | `dv ingest urls <file>` | Crawl every URL listed in a file |
//! | `dv ingest dir <path>` | Batch-ingest every PDF under a directory |
//! | `dv search "<query>"` | Semantic search |
//! | `dv get <id>` | Fetch a document by id |
//! | `dv list` | List documents, newest first |
//! | `dv delete <id>` | Delete a document |
//! | `dv serve` | Start the HTTP tool server |
//!
//! Configuration comes from the environment: `DOCVAULT_STORE_URL`,
//! `DOCVAULT_STORE_KEY`, `GEMINI_API_KEY`, and the optional `EMBEDDING_*`
//! overrides.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use globset::{Glob, GlobSetBuilder};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use docvault::config::Config;
use docvault::embedding::GeminiEmbedder;
use docvault::ingest::DocumentIngester;
use docvault::manager::{
    RetrievalManager, DEFAULT_LIST_LIMIT, DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_THRESHOLD,
};
use docvault::server;
use docvault::setup;
use docvault::store::postgrest::PostgrestStore;
use docvault::web::HttpCrawler;

#[derive(Parser)]
#[command(
    name = "dv",
    about = "docvault — a deduplicating document store for retrieval-augmented agents",
    version,
    long_about = "docvault fingerprints, chunks, and embeds documents into a hosted vector \
    store and answers semantic queries over them. Ingestion covers plain text, markdown, \
    web pages, PDFs, JSON, and bulk URL lists."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the store schema and verify connectivity.
    ///
    /// The hosted store has no SQL channel for API clients, so the schema is
    /// printed for the operator to apply manually. The connectivity probe
    /// runs against the configured store afterwards.
    Init,

    /// Ingest documents.
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Semantic search over stored documents.
    Search {
        /// The search query.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// Minimum cosine similarity; results must be strictly above it.
        #[arg(long, default_value_t = DEFAULT_SEARCH_THRESHOLD)]
        threshold: f32,

        /// Only return documents of this source type.
        #[arg(long)]
        source_type: Option<String>,
    },

    /// Fetch a document by id and print it as JSON.
    Get {
        /// Document UUID.
        id: String,
    },

    /// List documents, newest first.
    List {
        /// Only list documents of this source type.
        #[arg(long)]
        source_type: Option<String>,

        /// Maximum number of rows.
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,

        /// Number of rows to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Delete a document by id.
    Delete {
        /// Document UUID.
        id: String,
    },

    /// Start the HTTP tool server.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:7431")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum IngestSource {
    /// Store a single text document.
    Text {
        /// The document content.
        content: String,

        /// Source type label (defaults to "text").
        #[arg(long)]
        source_type: Option<String>,

        /// Source URL to associate with the document.
        #[arg(long)]
        source_url: Option<String>,

        /// Extra metadata as a JSON object.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Ingest a local file, dispatching on its extension.
    File {
        /// Path to the file.
        path: PathBuf,

        /// Override the source type (defaults to the extension).
        #[arg(long)]
        source_type: Option<String>,
    },

    /// Fetch a web page and ingest its text content.
    Url {
        /// The page URL.
        url: String,
    },

    /// Crawl every URL listed in a file (one per line).
    ///
    /// Each page's markdown rendering is saved under the output directory
    /// before ingestion; failures on individual URLs are skipped.
    Urls {
        /// Path to the newline-delimited URL list.
        path: PathBuf,

        /// Where to save the crawled markdown files.
        #[arg(long, default_value = "source_data/web_markdown")]
        out_dir: PathBuf,
    },

    /// Batch-ingest every PDF under a directory, continuing past failures.
    Dir {
        /// Directory to scan recursively for `*.pdf`.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let embedder = Arc::new(GeminiEmbedder::new(&config)?);
    let store = Arc::new(PostgrestStore::new(&config)?);
    let manager = Arc::new(RetrievalManager::new(embedder, store.clone()));
    let crawler = Arc::new(HttpCrawler::new(config.timeout)?);
    let ingester = DocumentIngester::new(manager.clone(), crawler);

    match cli.command {
        Commands::Init => {
            setup::run_init(store.as_ref(), config.embedding_dims).await?;
        }
        Commands::Ingest { source } => match source {
            IngestSource::Text {
                content,
                source_type,
                source_url,
                metadata,
            } => {
                let metadata = metadata
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .context("--metadata must be a JSON object")?;
                let id = ingester
                    .ingest_text(
                        &content,
                        source_type.as_deref(),
                        source_url.as_deref(),
                        metadata,
                    )
                    .await?;
                println!("stored: {id}");
            }
            IngestSource::File { path, source_type } => {
                let ids = ingester
                    .ingest_file(&path, source_type.as_deref(), None)
                    .await?;
                println!("ingested {} document(s) from {}", ids.len(), path.display());
                for id in ids {
                    println!("  {id}");
                }
            }
            IngestSource::Url { url } => {
                let id = ingester.ingest_webpage(&url, None).await?;
                println!("stored: {id}");
            }
            IngestSource::Urls { path, out_dir } => {
                let ids = ingester.ingest_urls_file(&path, &out_dir, None).await?;
                println!("ingested {} page(s)", ids.len());
                for id in ids {
                    println!("  {id}");
                }
            }
            IngestSource::Dir { path } => {
                run_ingest_dir(&ingester, &path).await?;
            }
        },
        Commands::Search {
            query,
            limit,
            threshold,
            source_type,
        } => {
            let hits = manager
                .search(&query, limit, threshold, source_type.as_deref())
                .await?;
            if hits.is_empty() {
                println!("no results");
            }
            for hit in hits {
                let snippet: String = hit.content.chars().take(200).collect();
                println!(
                    "id: {}  similarity: {:.3}  source_type: {}",
                    hit.id, hit.similarity, hit.source_type
                );
                println!("  {snippet}");
            }
        }
        Commands::Get { id } => match manager.get(&id).await? {
            Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
            None => println!("no document with id: {id}"),
        },
        Commands::List {
            source_type,
            limit,
            offset,
        } => {
            let docs = manager.list(source_type.as_deref(), limit, offset).await?;
            for doc in docs {
                let snippet: String = doc.content.chars().take(80).collect();
                println!(
                    "{}  {}  {}  {}",
                    doc.id,
                    doc.created_at.format("%Y-%m-%d %H:%M"),
                    doc.source_type,
                    snippet
                );
            }
        }
        Commands::Delete { id } => {
            if manager.delete(&id).await? {
                println!("deleted: {id}");
            } else {
                println!("no document with id: {id}");
            }
        }
        Commands::Serve { bind } => {
            server::run_server(manager.clone(), &bind).await?;
        }
    }

    Ok(())
}

/// Batch-ingest every PDF under `dir`, printing a summary report.
async fn run_ingest_dir(ingester: &DocumentIngester, dir: &std::path::Path) -> anyhow::Result<()> {
    let pdf_glob = GlobSetBuilder::new()
        .add(Glob::new("**/*.pdf")?)
        .build()?;

    let mut processed = 0usize;
    let mut succeeded = Vec::new();
    let mut failed = 0usize;

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !pdf_glob.is_match(entry.path()) {
            continue;
        }
        processed += 1;
        match ingester.ingest_file(entry.path(), None, None).await {
            Ok(ids) => {
                succeeded.push((entry.path().to_path_buf(), ids));
            }
            Err(e) => {
                eprintln!("failed to ingest {}: {e}", entry.path().display());
                failed += 1;
            }
        }
    }

    println!("ingestion summary");
    println!("  pdf files processed: {processed}");
    println!("  pdf files succeeded: {}", succeeded.len());
    println!("  pdf files failed: {failed}");
    for (path, ids) in &succeeded {
        println!("  - {} ({} chunk(s))", path.display(), ids.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
