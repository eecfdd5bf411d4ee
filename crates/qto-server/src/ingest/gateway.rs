//! Ingestion gateway
//!
//! Front door of the pipeline: validates an upload against the format
//! allow-list and size limit, forwards it to the translation service, and
//! persists the job record. Validation happens before any network call, and
//! no job record exists unless the submission succeeded.

use std::sync::Arc;

use chrono::Utc;
use qto_common::checksum::sha256_hex;
use qto_common::types::{JobStatus, UploadJob};
use qto_common::{QtoError, Result};
use tracing::info;
use uuid::Uuid;

use super::config::IngestConfig;
use super::translation::TranslationService;
use crate::db::JobStore;

pub struct IngestionGateway {
    store: JobStore,
    service: Arc<dyn TranslationService>,
    config: Arc<IngestConfig>,
}

impl IngestionGateway {
    pub fn new(
        store: JobStore,
        service: Arc<dyn TranslationService>,
        config: Arc<IngestConfig>,
    ) -> Self {
        Self {
            store,
            service,
            config,
        }
    }

    /// Check a file against the extension allow-list and size limit.
    /// Returns the normalized extension.
    pub fn validate(&self, file_name: &str, size_bytes: i64) -> Result<String> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| QtoError::InvalidFormat(file_name.to_string()))?;

        if !self.config.allowed_extensions.contains(&extension) {
            return Err(QtoError::InvalidFormat(extension));
        }

        if size_bytes > self.config.max_file_size_bytes {
            return Err(QtoError::PayloadTooLarge {
                size_bytes,
                limit_bytes: self.config.max_file_size_bytes,
            });
        }

        Ok(extension)
    }

    /// Validate and submit a file, persisting the job record on success.
    ///
    /// A transport failure during submission surfaces as `UploadFailed` and
    /// leaves no partial state behind; the caller may simply retry.
    pub async fn submit(&self, file_name: &str, payload: Vec<u8>) -> Result<UploadJob> {
        let extension = self.validate(file_name, payload.len() as i64)?;
        let file_size_bytes = payload.len() as i64;
        let checksum_sha256 = sha256_hex(&payload);

        let translation_id = self
            .service
            .submit(file_name, payload)
            .await
            .map_err(|e| QtoError::UploadFailed(e.to_string()))?;

        let job = UploadJob {
            id: Uuid::new_v4(),
            translation_id,
            source_file_name: file_name.to_string(),
            file_extension: extension,
            file_size_bytes,
            checksum_sha256,
            status: JobStatus::Uploading,
            attempts: 0,
            progress_percent: 0,
            error: None,
            created_at: Utc::now(),
            last_polled_at: None,
            completed_at: None,
        };

        self.store.insert(&job).await?;

        info!(
            job_id = %job.id,
            file = %job.source_file_name,
            size_bytes = job.file_size_bytes,
            "upload accepted"
        );

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::translation::{
        TranslationClientError, TranslationStatus,
    };
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;

    struct StubService {
        fail_submit: bool,
    }

    #[async_trait]
    impl TranslationService for StubService {
        async fn submit(
            &self,
            _file_name: &str,
            _payload: Vec<u8>,
        ) -> std::result::Result<String, TranslationClientError> {
            if self.fail_submit {
                Err(TranslationClientError::Transport(
                    "connection refused".to_string(),
                ))
            } else {
                Ok("tr-42".to_string())
            }
        }

        async fn status(
            &self,
            _translation_id: &str,
        ) -> std::result::Result<TranslationStatus, TranslationClientError> {
            unimplemented!("not used by gateway tests")
        }

        async fn result(
            &self,
            _translation_id: &str,
        ) -> std::result::Result<serde_json::Value, TranslationClientError> {
            unimplemented!("not used by gateway tests")
        }
    }

    async fn test_gateway(fail_submit: bool) -> IngestionGateway {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&pool).await.unwrap();

        IngestionGateway::new(
            JobStore::new(pool),
            Arc::new(StubService { fail_submit }),
            Arc::new(IngestConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_validate_accepts_every_allowed_extension() {
        let gateway = test_gateway(false).await;
        for ext in ["dwg", "dxf", "ifc", "rvt", "skp", "pln", "pdf"] {
            let name = format!("model.{}", ext);
            assert_eq!(gateway.validate(&name, 1024).unwrap(), ext);
        }
    }

    #[tokio::test]
    async fn test_validate_normalizes_uppercase_extensions() {
        let gateway = test_gateway(false).await;
        assert_eq!(gateway.validate("TOWER.IFC", 1024).unwrap(), "ifc");
    }

    #[tokio::test]
    async fn test_validate_rejects_unsupported_extensions() {
        let gateway = test_gateway(false).await;
        for name in ["model.exe", "model.zip", "model", "model."] {
            assert!(matches!(
                gateway.validate(name, 1024),
                Err(QtoError::InvalidFormat(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_validate_rejects_oversized_files() {
        let gateway = test_gateway(false).await;
        let limit = IngestConfig::default().max_file_size_bytes;
        assert!(matches!(
            gateway.validate("model.ifc", limit + 1),
            Err(QtoError::PayloadTooLarge { .. })
        ));
        // The limit itself is still acceptable.
        assert!(gateway.validate("model.ifc", limit).is_ok());
    }

    #[tokio::test]
    async fn test_submit_persists_job_before_returning() {
        let gateway = test_gateway(false).await;
        let job = gateway.submit("tower.ifc", b"IFC-DATA".to_vec()).await.unwrap();

        assert_eq!(job.status, JobStatus::Uploading);
        assert_eq!(job.translation_id, "tr-42");
        assert_eq!(job.checksum_sha256, sha256_hex(b"IFC-DATA"));

        let stored = gateway.store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Uploading);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_no_job_record() {
        let gateway = test_gateway(true).await;
        let err = gateway
            .submit("tower.ifc", b"IFC-DATA".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, QtoError::UploadFailed(_)));

        let jobs = gateway.store.list(10, 0).await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_validation_runs_before_any_network_call() {
        // A failing service is never reached when validation rejects first.
        let gateway = test_gateway(true).await;
        let err = gateway
            .submit("malware.exe", b"MZ".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, QtoError::InvalidFormat(_)));
    }
}
