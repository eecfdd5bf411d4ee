//! Translation service client
//!
//! The external translation/extraction service is a black box satisfying a
//! three-call contract: submit a file, check status by opaque id, fetch the
//! result payload. The orchestrator only depends on the [`TranslationService`]
//! trait; [`HttpTranslationClient`] is the production implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::config::TranslationConfig;

/// Client-side failure classification.
///
/// The split matters to the orchestrator: `Transport` failures are retried a
/// bounded number of times within one poll, while an `InvalidResponse`
/// counts against the attempt budget immediately.
#[derive(Debug, Error)]
pub enum TranslationClientError {
    /// Network-level failure; the request may never have reached the service
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered, but the response could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The service refused the request outright
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Processing state reported by the translation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationState {
    Processing,
    Complete,
    Error,
}

/// One status-check response.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationStatus {
    pub state: TranslationState,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Contract of the external translation service.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Submit a model file; returns the opaque id to poll by.
    async fn submit(
        &self,
        file_name: &str,
        payload: Vec<u8>,
    ) -> Result<String, TranslationClientError>;

    /// Check processing state for a submitted file.
    async fn status(
        &self,
        translation_id: &str,
    ) -> Result<TranslationStatus, TranslationClientError>;

    /// Fetch the raw categorized result payload of a completed translation.
    async fn result(
        &self,
        translation_id: &str,
    ) -> Result<serde_json::Value, TranslationClientError>;
}

/// HTTP implementation of the translation service contract.
pub struct HttpTranslationClient {
    client: Client,
    base_url: String,
}

impl HttpTranslationClient {
    /// Build a client whose requests are individually bounded by
    /// `step_timeout`.
    pub fn new(config: &TranslationConfig, step_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(step_timeout)
            .user_agent(concat!("qto-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TranslationClientError> {
        let status = response.status();

        if status.is_server_error() {
            return Err(TranslationClientError::Transport(format!(
                "service returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationClientError::Rejected(format!(
                "{}: {}",
                status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TranslationClientError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TranslationService for HttpTranslationClient {
    async fn submit(
        &self,
        file_name: &str,
        payload: Vec<u8>,
    ) -> Result<String, TranslationClientError> {
        let part = reqwest::multipart::Part::bytes(payload).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/translations"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranslationClientError::Transport(e.to_string()))?;

        let submitted: SubmitResponse = Self::decode(response).await?;
        Ok(submitted.job_id)
    }

    async fn status(
        &self,
        translation_id: &str,
    ) -> Result<TranslationStatus, TranslationClientError> {
        let response = self
            .client
            .get(self.url(&format!("/translations/{}", translation_id)))
            .send()
            .await
            .map_err(|e| TranslationClientError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn result(
        &self,
        translation_id: &str,
    ) -> Result<serde_json::Value, TranslationClientError> {
        let response = self
            .client
            .get(self.url(&format!("/translations/{}/result", translation_id)))
            .send()
            .await
            .map_err(|e| TranslationClientError::Transport(e.to_string()))?;

        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_deserializes_service_states() {
        let status: TranslationStatus =
            serde_json::from_str(r#"{"state": "processing", "progress": 42}"#).unwrap();
        assert_eq!(status.state, TranslationState::Processing);
        assert_eq!(status.progress, 42);
        assert!(status.error.is_none());

        let status: TranslationStatus =
            serde_json::from_str(r#"{"state": "error", "error": "corrupt geometry"}"#).unwrap();
        assert_eq!(status.state, TranslationState::Error);
        assert_eq!(status.error.as_deref(), Some("corrupt geometry"));
    }

    #[test]
    fn test_status_rejects_unknown_state() {
        let result = serde_json::from_str::<TranslationStatus>(r#"{"state": "paused"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_is_normalized() {
        let config = TranslationConfig {
            base_url: "http://svc.example/".to_string(),
        };
        let client = HttpTranslationClient::new(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(client.url("/translations"), "http://svc.example/translations");
    }
}
