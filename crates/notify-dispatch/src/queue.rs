use std::fmt;

use serde_json::Value as Json;

#[derive(Debug, Clone)]
pub struct QueueError(pub String);

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue error: {}", self.0)
    }
}

impl std::error::Error for QueueError {}

/// The parallelism boundary: a hand-off to a background worker. The
/// dispatcher itself never calls `deliver()` for queued work — it only
/// enqueues, trusting a worker to pick the job up later under its own
/// context (`notify-worker`).
pub trait OutboxQueue: Send + Sync {
    fn enqueue(&self, job_id: &str, job_name: &str, payload: Json) -> Result<(), QueueError>;

    /// Optional queue/topic label recorded alongside the Job row.
    fn label(&self) -> Option<&str> {
        None
    }
}
