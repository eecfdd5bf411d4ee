//! QTO Server Library
//!
//! HTTP server for the QTO construction estimation platform.
//!
//! # Overview
//!
//! Users upload building-model files and receive an itemized construction
//! cost estimate. The server owns the whole model ingestion pipeline:
//!
//! - **Ingestion Gateway**: validates and submits uploads to the external
//!   translation service
//! - **Translation Job Orchestrator**: drives each job through a bounded
//!   polling state machine on its own task
//! - **Element Extractor**: normalizes completed result payloads into
//!   categorized quantity records
//! - **Cost Aggregator**: combines elements and parametric assembly
//!   selections into a deterministic cost report
//!
//! Job state lives in a SQLite-backed store with compare-and-swap status
//! transitions; progress and terminal-state events stream to subscribers
//! over a broadcast channel.
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP API (multipart upload, status, report, SSE events)
//! - **SQLx**: job state store on SQLite
//! - **Reqwest**: client for the external translation service
//!
//! # Example
//!
//! ```no_run
//! use qto_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     api::serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
