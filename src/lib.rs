//! # docvault
//!
//! A deduplicating document store and ingestion pipeline for
//! retrieval-augmented agents.
//!
//! docvault fingerprints, chunks, and embeds documents into a hosted vector
//! store, and answers semantic queries over them. Ingestion covers plain
//! text, markdown, web pages, PDFs, JSON, and bulk URL lists; retrieval is
//! exposed as a library API, a CLI (`dv`), and a small HTTP tool server for
//! agent integration.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────┐
//! │  Ingesters   │──▶│   Retrieval   │──▶│ Vector store│
//! │ text/md/web/ │   │    manager    │   │ (PostgREST) │
//! │ pdf/json/urls│   │ hash+embed    │   └─────────────┘
//! └──────────────┘   └──────┬────────┘          ▲
//!                           │              ┌────┴─────┐
//!                      ┌────┴────┐         │ Embedding │
//!                      │ CLI/HTTP│         │   API     │
//!                      └─────────┘         └──────────┘
//! ```
//!
//! ## Quick start
//!
//! ```bash
//! dv init                          # print schema, check store connectivity
//! dv ingest text "some fact"       # store one document
//! dv ingest file notes.md          # markdown, json, pdf, txt, ...
//! dv search "deployment steps"     # semantic search
//! dv serve --bind 127.0.0.1:7431   # HTTP tool server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment-based configuration |
//! | [`hash`] | Content fingerprinting |
//! | [`chunker`] | Overlapping sentence-aware chunking |
//! | [`embedding`] | Embedding client abstraction |
//! | [`store`] | Document store backends |
//! | [`manager`] | Dedup-checked storage and search |
//! | [`ingest`] | Multi-format ingestion pipeline |
//! | [`web`] | Webpage fetching and conversion |
//! | [`server`] | HTTP tool server |
//! | [`setup`] | Store schema setup |

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod hash;
pub mod ingest;
pub mod manager;
pub mod server;
pub mod setup;
pub mod store;
pub mod web;

pub use error::{Error, Result};
