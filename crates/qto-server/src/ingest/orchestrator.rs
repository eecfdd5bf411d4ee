//! Translation job orchestrator
//!
//! Drives one job per tokio task through
//! `Uploading → Translating → Polling → {Complete | Failed | TimedOut}`.
//!
//! The polling loop runs on a fixed interval under two independent budgets:
//! a maximum attempt count and a wall-clock ceiling. Exhausting either while
//! the service still looks healthy parks the job in `TimedOut` (the service
//! may yet finish server-side); exhausting the attempt budget through
//! repeated failing checks parks it in `Failed`. Every status change is a
//! compare-and-swap in the job state store, so a cancellation racing an
//! in-flight poll always wins and the poll's late result is discarded.

use std::sync::Arc;

use qto_common::types::{JobStatus, UploadJob};
use qto_common::Result;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::IngestConfig;
use super::events::{JobEvent, JobEvents};
use super::translation::{
    TranslationClientError, TranslationService, TranslationState, TranslationStatus,
};
use crate::db::JobStore;

#[derive(Clone)]
pub struct Orchestrator {
    store: JobStore,
    service: Arc<dyn TranslationService>,
    events: JobEvents,
    config: Arc<IngestConfig>,
}

impl Orchestrator {
    pub fn new(
        store: JobStore,
        service: Arc<dyn TranslationService>,
        events: JobEvents,
        config: Arc<IngestConfig>,
    ) -> Self {
        Self {
            store,
            service,
            events,
            config,
        }
    }

    /// Spawn the task that owns this job until it reaches a terminal state.
    pub fn spawn(&self, job: UploadJob) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let job_id = job.id;
            if let Err(e) = orchestrator.drive(job).await {
                error!(%job_id, error = %e, "orchestrator task aborted");
            }
            orchestrator.store.forget_poll_lock(job_id).await;
        })
    }

    /// Cancel a job: any non-terminal status moves to Failed with error
    /// "cancelled". An in-flight poll is allowed to finish; its result is
    /// discarded when its own compare-and-swap fails against the terminal
    /// row. Returns `false` when the job was already terminal.
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool> {
        let cancelled = self.store.fail_if_active(job_id, "cancelled").await?;
        if cancelled {
            info!(%job_id, "job cancelled");
            self.publish_status(job_id, JobStatus::Failed, Some("cancelled".to_string()));
        }
        Ok(cancelled)
    }

    async fn drive(&self, job: UploadJob) -> Result<()> {
        let job_id = job.id;
        let translation_id = job.translation_id.clone();

        // Submission was already confirmed by the gateway.
        if !self
            .store
            .advance(job_id, JobStatus::Uploading, JobStatus::Translating)
            .await?
        {
            debug!(%job_id, "job no longer uploading, not taking ownership");
            return Ok(());
        }
        self.publish_status(job_id, JobStatus::Translating, None);

        // The first status check is scheduled now.
        if !self
            .store
            .advance(job_id, JobStatus::Translating, JobStatus::Polling)
            .await?
        {
            return Ok(());
        }
        self.publish_status(job_id, JobStatus::Polling, None);

        let deadline = Instant::now() + self.config.job_timeout();
        let max_attempts = i64::from(self.config.max_attempts);
        let mut attempts: i64 = 0;
        let mut last_error: Option<String> = None;

        loop {
            if attempts >= max_attempts {
                // A budget exhausted by healthy "processing" answers is a
                // timeout; one exhausted by failing checks is a failure.
                return match last_error {
                    Some(e) => {
                        self.finish_without_result(
                            job_id,
                            JobStatus::Failed,
                            format!("status checks failed repeatedly: {}", e),
                        )
                        .await
                    },
                    None => {
                        self.finish_without_result(
                            job_id,
                            JobStatus::TimedOut,
                            format!("no result after {} status checks", attempts),
                        )
                        .await
                    },
                };
            }

            if Instant::now() >= deadline {
                return self
                    .finish_without_result(
                        job_id,
                        JobStatus::TimedOut,
                        format!(
                            "polling window of {}s elapsed",
                            self.config.job_timeout_secs
                        ),
                    )
                    .await;
            }

            // A cancellation observed between ticks stops the loop before
            // another poll is issued.
            match self.store.get(job_id).await? {
                Some(current) if current.status == JobStatus::Polling => {},
                _ => {
                    debug!(%job_id, "job left polling, stopping");
                    return Ok(());
                },
            }

            // Single-flight: the per-job lock is held for the whole check.
            let outcome = {
                let lock = self.store.poll_lock(job_id).await;
                let _guard = lock.lock().await;
                self.poll_once(&translation_id).await
            };
            attempts += 1;

            match outcome {
                Ok(status) => {
                    last_error = None;
                    match status.state {
                        TranslationState::Processing => {
                            let progress = status.progress.clamp(0, 100);
                            if !self.store.record_poll(job_id, attempts, progress).await? {
                                return Ok(());
                            }
                            self.events.publish(JobEvent::Progress {
                                job_id,
                                progress_percent: progress,
                                attempts,
                            });
                        },
                        TranslationState::Complete => {
                            self.store.record_poll(job_id, attempts, 100).await?;
                            if self
                                .store
                                .finish(job_id, JobStatus::Polling, JobStatus::Complete, None)
                                .await?
                            {
                                info!(%job_id, attempts, "translation complete");
                                self.publish_status(job_id, JobStatus::Complete, None);
                            } else {
                                debug!(%job_id, "completion discarded, job already terminal");
                            }
                            return Ok(());
                        },
                        TranslationState::Error => {
                            let message = status.error.unwrap_or_else(|| {
                                "translation service reported an error".to_string()
                            });
                            if self
                                .store
                                .finish(
                                    job_id,
                                    JobStatus::Polling,
                                    JobStatus::Failed,
                                    Some(&message),
                                )
                                .await?
                            {
                                warn!(%job_id, error = %message, "translation failed");
                                self.publish_status(job_id, JobStatus::Failed, Some(message));
                            }
                            return Ok(());
                        },
                    }
                },
                Err(message) => {
                    warn!(%job_id, attempt = attempts, error = %message, "status check failed");
                    if !self.store.record_attempt(job_id, attempts).await? {
                        return Ok(());
                    }
                    last_error = Some(message);
                },
            }

            sleep(self.config.poll_interval()).await;
        }
    }

    /// One status check with bounded transient retries. Transport-class
    /// failures (including the step timeout) are retried consecutively up to
    /// the configured count before the poll counts against the attempt
    /// budget; a structurally invalid response counts immediately.
    async fn poll_once(
        &self,
        translation_id: &str,
    ) -> std::result::Result<TranslationStatus, String> {
        let mut consecutive_failures: u32 = 0;

        loop {
            let attempt = tokio::time::timeout(
                self.config.step_timeout(),
                self.service.status(translation_id),
            )
            .await;

            let failure = match attempt {
                Ok(Ok(status)) => return Ok(status),
                Ok(Err(TranslationClientError::Transport(message))) => message,
                Ok(Err(err)) => return Err(err.to_string()),
                Err(_) => format!(
                    "status check exceeded the {}s step timeout",
                    self.config.step_timeout_secs
                ),
            };

            if consecutive_failures >= self.config.transient_retries {
                return Err(format!(
                    "transport error after {} retries: {}",
                    consecutive_failures, failure
                ));
            }
            consecutive_failures += 1;
            debug!(
                translation_id,
                retry = consecutive_failures,
                error = %failure,
                "transient poll failure, retrying"
            );
        }
    }

    /// Apply a terminal transition reached without a service result. The
    /// compare-and-swap keeps a concurrent cancellation authoritative.
    async fn finish_without_result(
        &self,
        job_id: Uuid,
        to: JobStatus,
        message: String,
    ) -> Result<()> {
        if self
            .store
            .finish(job_id, JobStatus::Polling, to, Some(&message))
            .await?
        {
            warn!(%job_id, status = %to, reason = %message, "job finished without a result");
            self.publish_status(job_id, to, Some(message));
        }
        Ok(())
    }

    fn publish_status(&self, job_id: Uuid, status: JobStatus, error: Option<String>) {
        self.events.publish(JobEvent::StatusChanged {
            job_id,
            status,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Service whose status calls fail with transport errors a fixed number
    /// of times before succeeding.
    struct FlakyService {
        failures_before_success: usize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TranslationService for FlakyService {
        async fn submit(
            &self,
            _file_name: &str,
            _payload: Vec<u8>,
        ) -> std::result::Result<String, TranslationClientError> {
            Ok("tr-1".to_string())
        }

        async fn status(
            &self,
            _translation_id: &str,
        ) -> std::result::Result<TranslationStatus, TranslationClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(TranslationClientError::Transport("refused".to_string()))
            } else {
                Ok(TranslationStatus {
                    state: TranslationState::Processing,
                    progress: 10,
                    error: None,
                })
            }
        }

        async fn result(
            &self,
            _translation_id: &str,
        ) -> std::result::Result<serde_json::Value, TranslationClientError> {
            Ok(serde_json::json!({"elements": []}))
        }
    }

    async fn orchestrator_with(service: Arc<dyn TranslationService>) -> Orchestrator {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&pool).await.unwrap();

        Orchestrator::new(
            JobStore::new(pool),
            service,
            JobEvents::default(),
            Arc::new(IngestConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_poll_once_absorbs_transient_transport_errors() {
        // Three consecutive transport failures stay within the default
        // retry budget; the fourth try succeeds.
        let service = Arc::new(FlakyService {
            failures_before_success: 3,
            calls: AtomicUsize::new(0),
        });
        let orchestrator = orchestrator_with(service.clone()).await;

        let status = orchestrator.poll_once("tr-1").await.unwrap();
        assert_eq!(status.state, TranslationState::Processing);
        assert_eq!(service.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_poll_once_gives_up_after_retry_budget() {
        let service = Arc::new(FlakyService {
            failures_before_success: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let orchestrator = orchestrator_with(service.clone()).await;

        let err = orchestrator.poll_once("tr-1").await.unwrap_err();
        assert!(err.contains("transport error"));
        // Initial try plus three retries.
        assert_eq!(service.calls.load(Ordering::SeqCst), 4);
    }

    struct InvalidResponseService;

    #[async_trait::async_trait]
    impl TranslationService for InvalidResponseService {
        async fn submit(
            &self,
            _file_name: &str,
            _payload: Vec<u8>,
        ) -> std::result::Result<String, TranslationClientError> {
            Ok("tr-1".to_string())
        }

        async fn status(
            &self,
            _translation_id: &str,
        ) -> std::result::Result<TranslationStatus, TranslationClientError> {
            Err(TranslationClientError::InvalidResponse(
                "not json".to_string(),
            ))
        }

        async fn result(
            &self,
            _translation_id: &str,
        ) -> std::result::Result<serde_json::Value, TranslationClientError> {
            Ok(serde_json::json!({"elements": []}))
        }
    }

    #[tokio::test]
    async fn test_poll_once_does_not_retry_invalid_responses() {
        let orchestrator = orchestrator_with(Arc::new(InvalidResponseService)).await;
        let err = orchestrator.poll_once("tr-1").await.unwrap_err();
        assert!(err.contains("invalid response"));
    }
}
