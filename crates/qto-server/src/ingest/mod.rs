//! Model ingestion pipeline
//!
//! An uploaded building-model file moves through four stages:
//!
//! 1. The [`gateway`] validates the file and submits it to the external
//!    translation service, creating the job record.
//! 2. The [`orchestrator`] polls the service on its own task until the job
//!    reaches Complete, Failed, or TimedOut, under bounded attempt and
//!    wall-clock budgets.
//! 3. The [`extractor`] normalizes the completed result payload into
//!    categorized quantity records.
//! 4. The [`aggregator`] folds elements and parametric assembly selections
//!    into a deterministic cost report.
//!
//! Components share nothing but the job state store; progress and
//! terminal-state changes are published on the [`events`] channel.

pub mod aggregator;
pub mod config;
pub mod events;
pub mod extractor;
pub mod gateway;
pub mod orchestrator;
pub mod rates;
pub mod translation;

pub use config::IngestConfig;
pub use orchestrator::Orchestrator;
