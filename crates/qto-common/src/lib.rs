//! QTO Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the QTO platform.
//!
//! # Overview
//!
//! This crate provides common functionality used across all QTO workspace
//! members:
//!
//! - **Error Handling**: The shared error taxonomy and result type
//! - **Checksums**: Payload integrity utilities
//! - **Logging**: Centralized tracing configuration
//! - **Types**: Domain types for jobs, elements, and cost reports
//!
//! # Example
//!
//! ```no_run
//! use qto_common::{Result, QtoError};
//! use qto_common::checksum::sha256_hex;
//!
//! fn fingerprint(payload: &[u8]) -> Result<String> {
//!     Ok(sha256_hex(payload))
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{QtoError, Result};
