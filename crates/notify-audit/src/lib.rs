//! Persists notification attempts, and the jobs/job-events correlated with
//! them.
//!
//! `add()` is atomic: inserting a `NotificationAudit` also upserts the
//! linked `Job` (by `job_id`, if present) and appends a `JobEvent` recording
//! the transition, all as one unit. Audit rows are immutable after
//! insertion — a retried or later-failing delivery produces a *new* row,
//! never a mutation of the original.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use notify_schemas::{AuditStatus, Job, JobEvent, JobStatus, NotificationAudit};
use serde_json::Value as Json;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum AuditError {
    Storage(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::Storage(msg) => write!(f, "audit storage error: {msg}"),
        }
    }
}

impl std::error::Error for AuditError {}

/// Everything needed to persist one notification attempt. `created_at` is
/// supplied by the caller (the dispatcher's injected clock) so repositories
/// never call `Utc::now()` themselves.
#[derive(Debug, Clone)]
pub struct NewAudit {
    pub playbook: Option<String>,
    pub channel: String,
    pub adapter: String,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub status: AuditStatus,
    pub payload: Json,
    pub response: Option<Json>,
    pub error: Option<String>,
    pub job_id: Option<String>,
    pub job_name: Option<String>,
    pub queue_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Contract every persistence backend (Postgres, in-memory test double)
/// implements. Implementations must serialize concurrent writes at the
/// storage layer — one transaction per `add`.
pub trait AuditRepository: Send + Sync {
    fn add(&self, entry: NewAudit) -> Result<NotificationAudit, AuditError>;
}

/// Maps an audit status to the Job status it implies on upsert.
pub fn job_status_for(status: AuditStatus) -> JobStatus {
    status.to_job_status()
}

/// The JobEvent recorded alongside every audit insert.
pub fn job_event_for(audit: &NotificationAudit) -> Option<JobEvent> {
    let job_id = audit.job_id.clone()?;
    Some(JobEvent {
        job_id,
        event_type: format!("notification.{}", audit.status.as_str()),
        message: audit.error.clone().or_else(|| audit.subject.clone()),
        payload: Some(audit.payload.clone()),
        created_at: audit.created_at,
    })
}

/// A simple, process-local implementation grounded on the same Job/JobEvent
/// upsert contract the Postgres backend (`notify-db`) applies inside a
/// transaction. Used by unit tests, `notify-dispatch` doctests, and
/// `notify-testkit` fixtures.
#[derive(Default)]
pub struct InMemoryAuditRepository {
    audits: Mutex<Vec<NotificationAudit>>,
    jobs: Mutex<BTreeMap<String, Job>>,
    events: Mutex<Vec<JobEvent>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audits(&self) -> Vec<NotificationAudit> {
        self.audits.lock().expect("audits lock poisoned").clone()
    }

    pub fn jobs(&self) -> BTreeMap<String, Job> {
        self.jobs.lock().expect("jobs lock poisoned").clone()
    }

    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().expect("events lock poisoned").clone()
    }

    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.jobs.lock().expect("jobs lock poisoned").get(job_id).cloned()
    }
}

impl AuditRepository for InMemoryAuditRepository {
    fn add(&self, entry: NewAudit) -> Result<NotificationAudit, AuditError> {
        let audit = NotificationAudit {
            id: Uuid::new_v4(),
            playbook: entry.playbook,
            channel: entry.channel,
            adapter: entry.adapter,
            recipient: entry.recipient,
            subject: entry.subject,
            status: entry.status,
            payload: entry.payload,
            response: entry.response,
            error: entry.error,
            job_id: entry.job_id.clone(),
            created_at: entry.created_at,
            sent_at: entry.sent_at,
        };

        if let Some(job_id) = &entry.job_id {
            let mut jobs = self.jobs.lock().expect("jobs lock poisoned");
            let new_status = job_status_for(audit.status);
            jobs.entry(job_id.clone())
                .and_modify(|job| {
                    job.status = new_status;
                    job.name = entry.job_name.clone().unwrap_or_else(|| job.name.clone());
                    job.queue_label = entry.queue_label.clone().or_else(|| job.queue_label.clone());
                    job.payload = audit.payload.clone();
                    if matches!(new_status, JobStatus::Succeeded | JobStatus::Failed) {
                        job.finished_at = Some(audit.created_at);
                    }
                })
                .or_insert_with(|| Job {
                    id: job_id.clone(),
                    name: entry.job_name.clone().unwrap_or_default(),
                    queue_label: entry.queue_label.clone(),
                    status: new_status,
                    payload: audit.payload.clone(),
                    created_at: audit.created_at,
                    started_at: Some(audit.created_at),
                    finished_at: None,
                });
        }

        if let Some(event) = job_event_for(&audit) {
            self.events.lock().expect("events lock poisoned").push(event);
        }

        self.audits.lock().expect("audits lock poisoned").push(audit.clone());
        tracing::info!(channel = %audit.channel, status = audit.status.as_str(), job_id = ?audit.job_id, "audit.recorded");
        Ok(audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_schemas::AuditStatus;
    use serde_json::json;

    fn entry(status: AuditStatus, job_id: Option<&str>) -> NewAudit {
        NewAudit {
            playbook: Some("compliance".into()),
            channel: "whatsapp".into(),
            adapter: "whatsapp".into(),
            recipient: Some("+34111".into()),
            subject: None,
            status,
            payload: json!({"k": "v"}),
            response: None,
            error: None,
            job_id: job_id.map(str::to_string),
            job_name: Some("app.notify.worker.dispatch".into()),
            queue_label: Some("notify".into()),
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    #[test]
    fn add_without_job_id_writes_no_job_or_event() {
        let repo = InMemoryAuditRepository::new();
        repo.add(entry(AuditStatus::DryRun, None)).unwrap();
        assert_eq!(repo.audits().len(), 1);
        assert!(repo.jobs().is_empty());
        assert!(repo.events().is_empty());
    }

    #[test]
    fn queued_then_sent_upserts_job_status_and_appends_events() {
        let repo = InMemoryAuditRepository::new();
        repo.add(entry(AuditStatus::Queued, Some("job-1"))).unwrap();
        assert_eq!(repo.job("job-1").unwrap().status, JobStatus::Queued);

        repo.add(entry(AuditStatus::Sent, Some("job-1"))).unwrap();
        let job = repo.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.finished_at.is_some());

        // Immutability: two distinct audit rows, not one mutated row.
        assert_eq!(repo.audits().len(), 2);
        assert_eq!(repo.events().len(), 2);
    }

    #[test]
    fn quiet_hours_status_maps_to_paused_job() {
        let repo = InMemoryAuditRepository::new();
        repo.add(entry(AuditStatus::QuietHours, Some("job-2"))).unwrap();
        assert_eq!(repo.job("job-2").unwrap().status, JobStatus::Paused);
    }
}
