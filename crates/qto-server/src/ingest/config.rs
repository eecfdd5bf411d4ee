//! Ingestion configuration
//!
//! Budgets and limits for the upload gateway and the polling orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default interval between status checks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Default maximum number of status checks per job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Default wall-clock ceiling for the whole polling phase.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

/// Default bound on each individual network call.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30;

/// Default number of consecutive transport-error retries absorbed within a
/// single poll before it counts against the attempt budget.
pub const DEFAULT_TRANSIENT_RETRIES: u32 = 3;

/// Default upload size limit (500 MB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: i64 = 500 * 1024 * 1024;

/// File extensions the gateway accepts.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 7] =
    ["dwg", "dxf", "ifc", "rvt", "skp", "pln", "pdf"];

/// Default base URL of the external translation service.
pub const DEFAULT_TRANSLATION_BASE_URL: &str = "http://localhost:9090";

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Interval between status checks in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum status checks per job
    pub max_attempts: u32,
    /// Wall-clock ceiling for the polling phase in seconds
    pub job_timeout_secs: u64,
    /// Bound on each individual network call in seconds
    pub step_timeout_secs: u64,
    /// Consecutive transport-error retries absorbed within one poll
    pub transient_retries: u32,
    /// Upload size limit in bytes
    pub max_file_size_bytes: i64,
    /// Accepted file extensions, lowercase, without dots
    pub allowed_extensions: Vec<String>,
    /// Optional path to a JSON rate table; compiled-in defaults otherwise
    pub rate_table_path: Option<PathBuf>,
    /// Translation service endpoint
    pub translation: TranslationConfig,
}

/// Translation service connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Base URL of the service, without a trailing slash
    pub base_url: String,
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            poll_interval_ms: std::env::var("INGEST_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: std::env::var("INGEST_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            job_timeout_secs: std::env::var("INGEST_JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_JOB_TIMEOUT_SECS),
            step_timeout_secs: std::env::var("INGEST_STEP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_STEP_TIMEOUT_SECS),
            transient_retries: std::env::var("INGEST_TRANSIENT_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TRANSIENT_RETRIES),
            max_file_size_bytes: std::env::var("INGEST_MAX_FILE_SIZE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES),
            allowed_extensions: std::env::var("INGEST_ALLOWED_EXTENSIONS")
                .map(|s| {
                    s.split(',')
                        .map(|ext| ext.trim().to_ascii_lowercase())
                        .filter(|ext| !ext.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    DEFAULT_ALLOWED_EXTENSIONS
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                }),
            rate_table_path: std::env::var("INGEST_RATE_TABLE_PATH").ok().map(PathBuf::from),
            translation: TranslationConfig {
                base_url: std::env::var("TRANSLATION_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_TRANSLATION_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("INGEST_POLL_INTERVAL_MS must be greater than 0");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("INGEST_MAX_ATTEMPTS must be greater than 0");
        }
        if self.job_timeout_secs == 0 {
            anyhow::bail!("INGEST_JOB_TIMEOUT_SECS must be greater than 0");
        }
        if self.step_timeout_secs == 0 {
            anyhow::bail!("INGEST_STEP_TIMEOUT_SECS must be greater than 0");
        }
        if self.max_file_size_bytes <= 0 {
            anyhow::bail!("INGEST_MAX_FILE_SIZE_BYTES must be greater than 0");
        }
        if self.allowed_extensions.is_empty() {
            anyhow::bail!("INGEST_ALLOWED_EXTENSIONS cannot be empty");
        }
        if self.translation.base_url.is_empty() {
            anyhow::bail!("TRANSLATION_BASE_URL cannot be empty");
        }
        Ok(())
    }

    /// Interval between status checks as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Wall-clock polling ceiling as a Duration
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Per-call network bound as a Duration
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            transient_retries: DEFAULT_TRANSIENT_RETRIES,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rate_table_path: None,
            translation: TranslationConfig {
                base_url: DEFAULT_TRANSLATION_BASE_URL.to_string(),
            },
        }
    }
}
