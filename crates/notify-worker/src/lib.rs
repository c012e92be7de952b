//! Background worker that claims queued jobs and delivers them through the
//! same `Dispatcher::deliver()` contract the inline path uses.
//!
//! It does **not**: decide what gets queued — `notify-dispatch` owns that
//! decision when it enqueues onto an `OutboxQueue`. The worker only claims,
//! delivers, and reports the outcome back to the claim source.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use notify_adapters::AdapterRegistry;
use notify_audit::AuditRepository;
use notify_dispatch::Dispatcher;
use notify_schemas::{Action, Row};
use serde::Deserialize;
use serde_json::Value as Json;

#[derive(Debug, Clone)]
pub struct ClaimError(pub String);

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claim error: {}", self.0)
    }
}

impl std::error::Error for ClaimError {}

/// One claimed unit of work: the raw payload `notify-dispatch` enqueued,
/// plus the identifiers needed to report back.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job_id: String,
    pub job_name: String,
    pub payload: Json,
}

/// Where jobs come from, and how the worker reports what happened to one.
/// Mirrors the claim/release/mark-done triad an outbox table exposes under
/// `FOR UPDATE SKIP LOCKED` semantics (see `notify-db`), kept abstract here
/// so the worker loop never depends on a concrete storage engine.
pub trait JobClaimSource: Send + Sync {
    fn claim_batch(&self, batch_size: usize, worker_id: &str) -> Result<Vec<ClaimedJob>, ClaimError>;
    fn mark_done(&self, job_id: &str) -> Result<(), ClaimError>;
    /// Relinquish a claim so another worker (or a future retry) can pick the
    /// job back up. Called when delivery fails.
    fn release(&self, job_id: &str) -> Result<(), ClaimError>;
}

#[derive(Debug, Deserialize)]
struct JobPayload {
    playbook: Option<String>,
    action: Action,
    row: Row,
    rule_results: BTreeMap<String, bool>,
}

/// Per-batch delivery counts, for worker loop logging/metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub claimed: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Claims one batch and delivers every job in it, releasing any job whose
/// payload doesn't deserialize or whose delivery errors, marking the rest
/// done. Does not loop or sleep — callers drive the poll cadence.
/// `adapter_timeout` overrides the per-adapter delivery deadline; `None`
/// keeps the dispatcher's own default (10s).
pub fn run_once(
    source: &dyn JobClaimSource,
    registry: &AdapterRegistry,
    audit: &dyn AuditRepository,
    worker_id: &str,
    batch_size: usize,
    adapter_timeout: Option<Duration>,
) -> Result<WorkerStats, ClaimError> {
    let jobs = source.claim_batch(batch_size, worker_id)?;
    let mut stats = WorkerStats { claimed: jobs.len() as u64, ..Default::default() };

    let mut dispatcher = Dispatcher::new(registry, audit);
    if let Some(t) = adapter_timeout {
        dispatcher = dispatcher.with_adapter_timeout(t);
    }

    for job in jobs {
        let parsed: JobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(job_id = %job.job_id, error = %e, "worker.payload_invalid");
                stats.failed += 1;
                source.release(&job.job_id)?;
                continue;
            }
        };

        let channel = parsed.action.channel_key();
        let result = dispatcher.deliver(
            parsed.playbook.as_deref(),
            &parsed.action,
            &channel,
            &parsed.row,
            &parsed.rule_results,
            false,
            Some(&job.job_id),
            Some(&job.job_name),
        );

        match result {
            Ok(_) => {
                stats.delivered += 1;
                source.mark_done(&job.job_id)?;
            }
            Err(e) => {
                tracing::error!(job_id = %job.job_id, error = %e, "worker.delivery_failed");
                stats.failed += 1;
                source.release(&job.job_id)?;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_adapters::{AdapterError, ChannelAdapter};
    use notify_audit::InMemoryAuditRepository;
    use notify_schemas::Value;
    use serde_json::json;
    use std::sync::Mutex;

    struct StubAdapter {
        fail: bool,
    }
    impl ChannelAdapter for StubAdapter {
        fn send(&self, _payload: &Json) -> Result<Json, AdapterError> {
            if self.fail {
                Err(AdapterError::Delivery("boom".into()))
            } else {
                Ok(json!({"status": "sent"}))
            }
        }
    }

    struct FixedSource {
        jobs: Mutex<Vec<ClaimedJob>>,
        released: Mutex<Vec<String>>,
        done: Mutex<Vec<String>>,
    }
    impl JobClaimSource for FixedSource {
        fn claim_batch(&self, batch_size: usize, _worker_id: &str) -> Result<Vec<ClaimedJob>, ClaimError> {
            let mut jobs = self.jobs.lock().unwrap();
            let n = batch_size.min(jobs.len());
            Ok(jobs.drain(..n).collect())
        }
        fn mark_done(&self, job_id: &str) -> Result<(), ClaimError> {
            self.done.lock().unwrap().push(job_id.to_string());
            Ok(())
        }
        fn release(&self, job_id: &str) -> Result<(), ClaimError> {
            self.released.lock().unwrap().push(job_id.to_string());
            Ok(())
        }
    }

    fn sample_payload() -> Json {
        let mut row = Row::new();
        row.insert("telefono".into(), Value::Str("+34111".into()));
        json!({
            "playbook": "compliance",
            "action": {
                "type": "notify",
                "channel": "whatsapp",
                "to": "{{ row.telefono }}",
            },
            "row": row,
            "rule_results": {"debe_notificar": true},
        })
    }

    #[test]
    fn delivers_claimed_job_and_marks_it_done() {
        let mut registry = AdapterRegistry::new();
        registry.register("whatsapp", Box::new(StubAdapter { fail: false }));
        let audit = InMemoryAuditRepository::new();
        let source = FixedSource {
            jobs: Mutex::new(vec![ClaimedJob {
                job_id: "job-1".into(),
                job_name: "app.notify.worker.dispatch".into(),
                payload: sample_payload(),
            }]),
            released: Mutex::new(vec![]),
            done: Mutex::new(vec![]),
        };

        let stats = run_once(&source, &registry, &audit, "worker-a", 10, None).unwrap();
        assert_eq!(stats, WorkerStats { claimed: 1, delivered: 1, failed: 0 });
        assert_eq!(source.done.lock().unwrap().as_slice(), ["job-1"]);
        assert!(source.released.lock().unwrap().is_empty());
    }

    #[test]
    fn adapter_failure_releases_the_claim() {
        let mut registry = AdapterRegistry::new();
        registry.register("whatsapp", Box::new(StubAdapter { fail: true }));
        let audit = InMemoryAuditRepository::new();
        let source = FixedSource {
            jobs: Mutex::new(vec![ClaimedJob {
                job_id: "job-2".into(),
                job_name: "app.notify.worker.dispatch".into(),
                payload: sample_payload(),
            }]),
            released: Mutex::new(vec![]),
            done: Mutex::new(vec![]),
        };

        let stats = run_once(&source, &registry, &audit, "worker-a", 10, None).unwrap();
        assert_eq!(stats, WorkerStats { claimed: 1, delivered: 0, failed: 1 });
        assert_eq!(source.released.lock().unwrap().as_slice(), ["job-2"]);
    }

    #[test]
    fn malformed_payload_is_released_without_panicking() {
        let registry = AdapterRegistry::new();
        let audit = InMemoryAuditRepository::new();
        let source = FixedSource {
            jobs: Mutex::new(vec![ClaimedJob {
                job_id: "job-3".into(),
                job_name: "app.notify.worker.dispatch".into(),
                payload: json!({"not": "a valid job"}),
            }]),
            released: Mutex::new(vec![]),
            done: Mutex::new(vec![]),
        };

        let stats = run_once(&source, &registry, &audit, "worker-a", 10, None).unwrap();
        assert_eq!(stats, WorkerStats { claimed: 1, delivered: 0, failed: 1 });
        assert_eq!(source.released.lock().unwrap().as_slice(), ["job-3"]);
    }
}
