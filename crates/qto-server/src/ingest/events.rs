//! Job event channel
//!
//! The orchestrator publishes progress and terminal-state changes here
//! instead of calling into any presentation layer. Subscribers (the SSE
//! endpoint, tests) attach via [`JobEvents::subscribe`]; publishing with no
//! subscribers is a no-op.

use qto_common::types::JobStatus;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default buffer size for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// An observable change to a job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// The job moved to a new state
    StatusChanged {
        job_id: Uuid,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A status check reported progress
    Progress {
        job_id: Uuid,
        progress_percent: i64,
        attempts: i64,
    },
}

/// Broadcast channel for job events.
#[derive(Debug, Clone)]
pub struct JobEvents {
    tx: broadcast::Sender<JobEvent>,
}

impl JobEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Nothing listening is not an error.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

impl Default for JobEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let events = JobEvents::default();
        let mut rx = events.subscribe();
        let job_id = Uuid::new_v4();

        events.publish(JobEvent::Progress {
            job_id,
            progress_percent: 55,
            attempts: 2,
        });

        match rx.recv().await.unwrap() {
            JobEvent::Progress {
                job_id: id,
                progress_percent,
                attempts,
            } => {
                assert_eq!(id, job_id);
                assert_eq!(progress_percent, 55);
                assert_eq!(attempts, 2);
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_a_noop() {
        let events = JobEvents::default();
        events.publish(JobEvent::StatusChanged {
            job_id: Uuid::new_v4(),
            status: JobStatus::Polling,
            error: None,
        });
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let json = serde_json::to_value(JobEvent::StatusChanged {
            job_id: Uuid::nil(),
            status: JobStatus::Failed,
            error: Some("cancelled".to_string()),
        })
        .unwrap();
        assert_eq!(json["event"], "status_changed");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "cancelled");
    }
}
