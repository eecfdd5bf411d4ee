//! Job state store
//!
//! One row per upload job. All status changes go through compare-and-swap
//! updates keyed on the current status, so a `cancel()` racing a concurrent
//! poll completion cannot resurrect a terminal job or double-apply a
//! transition. The store also hands out the logical per-job poll lock that
//! enforces the single-flight guarantee.

use chrono::{DateTime, Utc};
use qto_common::types::{JobStatus, UploadJob};
use qto_common::QtoError;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

type Result<T> = std::result::Result<T, QtoError>;

/// Row shape of the `upload_jobs` table
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    translation_id: String,
    source_file_name: String,
    file_extension: String,
    file_size_bytes: i64,
    checksum_sha256: String,
    status: String,
    attempts: i64,
    progress_percent: i64,
    error: Option<String>,
    created_at: DateTime<Utc>,
    last_polled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn into_job(self) -> Result<UploadJob> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| QtoError::Database(format!("corrupt job id '{}': {}", self.id, e)))?;

        Ok(UploadJob {
            id,
            translation_id: self.translation_id,
            source_file_name: self.source_file_name,
            file_extension: self.file_extension,
            file_size_bytes: self.file_size_bytes,
            checksum_sha256: self.checksum_sha256,
            status: JobStatus::from(self.status.as_str()),
            attempts: self.attempts,
            progress_percent: self.progress_percent,
            error: self.error,
            created_at: self.created_at,
            last_polled_at: self.last_polled_at,
            completed_at: self.completed_at,
        })
    }
}

fn db_err(e: sqlx::Error) -> QtoError {
    QtoError::Database(e.to_string())
}

/// SQLite-backed store for upload jobs plus the in-process poll lock map.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
    poll_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            poll_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Persist a freshly created job.
    pub async fn insert(&self, job: &UploadJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO upload_jobs (
                id, translation_id, source_file_name, file_extension,
                file_size_bytes, checksum_sha256, status, attempts,
                progress_percent, error, created_at, last_polled_at, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.translation_id)
        .bind(&job.source_file_name)
        .bind(&job.file_extension)
        .bind(job.file_size_bytes)
        .bind(&job.checksum_sha256)
        .bind(job.status.as_str())
        .bind(job.attempts)
        .bind(job.progress_percent)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.last_polled_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Fetch a job by id.
    pub async fn get(&self, id: Uuid) -> Result<Option<UploadJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM upload_jobs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(JobRow::into_job).transpose()
    }

    /// List jobs, newest first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<UploadJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM upload_jobs ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Advance a job one non-terminal step forward. Returns `false` when the
    /// job is no longer in `from` (e.g. it was cancelled meanwhile). A
    /// terminal `from` is refused outright: no transition may originate from
    /// a terminal state.
    pub async fn advance(&self, id: Uuid, from: JobStatus, to: JobStatus) -> Result<bool> {
        if from.is_terminal() {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE upload_jobs SET status = ?1 WHERE id = ?2 AND status = ?3",
        )
        .bind(to.as_str())
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    /// Apply a terminal transition from `from`. Returns `false` when the job
    /// already left `from`, in which case the caller discards its result.
    pub async fn finish(
        &self,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        if from.is_terminal() {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE upload_jobs
            SET status = ?1, error = ?2, completed_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(to.as_str())
        .bind(error)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    /// Move any still-active job to Failed. Terminal jobs are left untouched
    /// and `false` is returned.
    pub async fn fail_if_active(&self, id: Uuid, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE upload_jobs
            SET status = 'failed', error = ?1, completed_at = ?2
            WHERE id = ?3 AND status NOT IN ('complete', 'failed', 'timed_out')
            "#,
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    /// Record the outcome of one status check while the job is still
    /// Polling. Returns `false` once the job left Polling.
    pub async fn record_poll(&self, id: Uuid, attempts: i64, progress: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE upload_jobs
            SET attempts = ?1, progress_percent = ?2, last_polled_at = ?3
            WHERE id = ?4 AND status = 'polling'
            "#,
        )
        .bind(attempts)
        .bind(progress)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a failed status check without touching the progress figure.
    pub async fn record_attempt(&self, id: Uuid, attempts: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE upload_jobs
            SET attempts = ?1, last_polled_at = ?2
            WHERE id = ?3 AND status = 'polling'
            "#,
        )
        .bind(attempts)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    /// The logical per-job poll lock. Holding it across a status check is
    /// what keeps polls single-flight per job id; locks for different jobs
    /// are independent.
    pub async fn poll_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.poll_locks.lock().await;
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the poll lock entry once a job is terminal.
    pub async fn forget_poll_lock(&self, id: Uuid) {
        self.poll_locks.lock().await.remove(&id);
    }
}
