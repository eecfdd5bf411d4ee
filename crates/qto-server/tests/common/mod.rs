//! Shared helpers for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use qto_server::db::JobStore;
use qto_server::ingest::translation::{
    TranslationClientError, TranslationService, TranslationState, TranslationStatus,
};
use qto_server::ingest::IngestConfig;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

/// One scripted answer to a status check.
#[derive(Debug, Clone)]
pub enum StatusStep {
    Processing(i64),
    Complete,
    Error(String),
    Transport,
    Invalid,
}

/// Translation service double that replays a scripted sequence of status
/// answers, then repeats `fallback` forever. Counts every status call so
/// tests can assert how many polls actually happened.
pub struct ScriptedTranslationService {
    script: Mutex<VecDeque<StatusStep>>,
    fallback: StatusStep,
    result_payload: Value,
    pub status_calls: AtomicUsize,
}

impl ScriptedTranslationService {
    pub fn new(script: Vec<StatusStep>, fallback: StatusStep, result_payload: Value) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            result_payload,
            status_calls: AtomicUsize::new(0),
        })
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationService for ScriptedTranslationService {
    async fn submit(
        &self,
        _file_name: &str,
        _payload: Vec<u8>,
    ) -> Result<String, TranslationClientError> {
        Ok("tr-test".to_string())
    }

    async fn status(
        &self,
        _translation_id: &str,
    ) -> Result<TranslationStatus, TranslationClientError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            StatusStep::Processing(progress) => Ok(TranslationStatus {
                state: TranslationState::Processing,
                progress,
                error: None,
            }),
            StatusStep::Complete => Ok(TranslationStatus {
                state: TranslationState::Complete,
                progress: 100,
                error: None,
            }),
            StatusStep::Error(message) => Ok(TranslationStatus {
                state: TranslationState::Error,
                progress: 0,
                error: Some(message),
            }),
            StatusStep::Transport => Err(TranslationClientError::Transport(
                "connection reset".to_string(),
            )),
            StatusStep::Invalid => Err(TranslationClientError::InvalidResponse(
                "unexpected body".to_string(),
            )),
        }
    }

    async fn result(
        &self,
        _translation_id: &str,
    ) -> Result<Value, TranslationClientError> {
        Ok(self.result_payload.clone())
    }
}

/// In-memory job store pool with the schema applied.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
    pool
}

/// Ingest configuration with test-sized budgets.
pub fn fast_config(max_attempts: u32) -> IngestConfig {
    IngestConfig {
        poll_interval_ms: 20,
        max_attempts,
        job_timeout_secs: 30,
        step_timeout_secs: 5,
        ..Default::default()
    }
}

/// Poll the store until the job reaches a terminal state.
pub async fn wait_for_terminal(
    store: &JobStore,
    job_id: Uuid,
    timeout: Duration,
) -> qto_common::types::UploadJob {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = store.get(job_id).await.unwrap().expect("job must exist");
        if job.status.is_terminal() {
            return job;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("job {} still {} after {:?}", job_id, job.status, timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Result payload with ten elements: 4 structural, 3 architectural, 2 MEP,
/// 1 external. All costs are integral so sums are exact.
pub fn sample_result_payload() -> Value {
    json!({
        "metadata": {"accuracy_band": "±15%"},
        "elements": [
            {"id": "s-1", "category": "structural", "type": "concrete_column", "quantity": 4, "unit": "ea", "unit_cost": 310},
            {"id": "s-2", "category": "structural", "type": "concrete_column", "quantity": 2, "unit": "ea", "unit_cost": 310},
            {"id": "s-3", "category": "structural", "type": "steel_beam", "quantity": 12, "unit": "m", "unit_cost": 185},
            {"id": "s-4", "category": "structural", "type": "concrete_slab", "quantity": 140, "unit": "m2", "unit_cost": 96},
            {"id": "a-1", "category": "architectural", "type": "window", "quantity": 9, "unit": "ea", "unit_cost": 420},
            {"id": "a-2", "category": "architectural", "type": "door", "quantity": 6, "unit": "ea", "unit_cost": 380},
            {"id": "a-3", "category": "architectural", "type": "partition_wall", "quantity": 85, "unit": "m2", "unit_cost": 64},
            {"id": "m-1", "category": "mep", "type": "duct", "quantity": 36, "unit": "m", "unit_cost": 52},
            {"id": "m-2", "category": "mep", "type": "pipe", "quantity": 54, "unit": "m", "unit_cost": 34},
            {"id": "e-1", "category": "external", "type": "paving", "quantity": 60, "unit": "m2", "unit_cost": 58}
        ]
    })
}
