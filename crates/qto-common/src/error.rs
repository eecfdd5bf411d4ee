//! Error types for QTO

use thiserror::Error;

/// Result type alias for QTO operations
pub type Result<T> = std::result::Result<T, QtoError>;

/// Main error type for QTO
///
/// The first six variants form the ingestion error taxonomy: gateway
/// rejections are returned synchronously and never create a job record,
/// orchestrator failures are recorded on the job row, and extraction
/// failures are reported distinctly from translation failures.
#[derive(Error, Debug)]
pub enum QtoError {
    #[error("unsupported file format: {0}")]
    InvalidFormat(String),

    #[error("file of {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    PayloadTooLarge { size_bytes: i64, limit_bytes: i64 },

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("translation failed: {0}")]
    TranslationError(String),

    #[error("polling budget exhausted: {0}")]
    PollTimeout(String),

    #[error("result payload could not be decoded: {0}")]
    ExtractionDataError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
