use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    DryRun,
    Queued,
    QuietHours,
    Sent,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::DryRun => "dry_run",
            AuditStatus::Queued => "queued",
            AuditStatus::QuietHours => "quiet_hours",
            AuditStatus::Sent => "sent",
            AuditStatus::Error => "error",
        }
    }

    /// Status → Job status mapping applied on upsert.
    pub fn to_job_status(self) -> JobStatus {
        match self {
            AuditStatus::Queued => JobStatus::Queued,
            AuditStatus::DryRun => JobStatus::DryRun,
            AuditStatus::QuietHours => JobStatus::Paused,
            AuditStatus::Sent => JobStatus::Succeeded,
            AuditStatus::Error => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAudit {
    pub id: Uuid,
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
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    DryRun,
    Paused,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub queue_label: Option<String>,
    pub status: JobStatus,
    pub payload: Json,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: String,
    pub event_type: String,
    pub message: Option<String>,
    pub payload: Option<Json>,
    pub created_at: DateTime<Utc>,
}
