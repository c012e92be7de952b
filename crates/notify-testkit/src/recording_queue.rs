use notify_dispatch::{OutboxQueue, QueueError};
use serde_json::Value as Json;
use std::sync::Mutex;

/// An `OutboxQueue` double that records every enqueue call instead of
/// persisting anything, for asserting on what the dispatcher handed off to
/// the queued path.
#[derive(Default)]
pub struct RecordingQueue {
    calls: Mutex<Vec<(String, String, Json)>>,
    label: Option<String>,
    fail: bool,
}

impl RecordingQueue {
    pub fn new(label: impl Into<String>) -> Self {
        Self { calls: Mutex::new(Vec::new()), label: Some(label.into()), fail: false }
    }

    pub fn failing() -> Self {
        Self { calls: Mutex::new(Vec::new()), label: None, fail: true }
    }

    /// `(job_id, job_name, payload)` for every `enqueue` call, in order.
    pub fn calls(&self) -> Vec<(String, String, Json)> {
        self.calls.lock().expect("recording queue lock poisoned").clone()
    }
}

impl OutboxQueue for RecordingQueue {
    fn enqueue(&self, job_id: &str, job_name: &str, payload: Json) -> Result<(), QueueError> {
        if self.fail {
            return Err(QueueError("queue unavailable".to_string()));
        }
        self.calls
            .lock()
            .expect("recording queue lock poisoned")
            .push((job_id.to_string(), job_name.to_string(), payload));
        Ok(())
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_job_name_and_payload_per_call() {
        let queue = RecordingQueue::new("notify");
        queue.enqueue("job-1", "app.notify.worker.dispatch", json!({"k": "v"})).unwrap();
        let calls = queue.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "job-1");
        assert_eq!(calls[0].1, "app.notify.worker.dispatch");
    }

    #[test]
    fn failing_queue_never_records_a_call() {
        let queue = RecordingQueue::failing();
        assert!(queue.enqueue("job-1", "app.notify.worker.dispatch", json!({})).is_err());
        assert!(queue.calls().is_empty());
    }
}
