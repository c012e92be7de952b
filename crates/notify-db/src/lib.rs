//! Postgres persistence backend: Course/Learner/Enrollment storage, and the
//! Postgres-backed `AuditRepository`/`OutboxQueue`/`JobClaimSource`
//! implementations notify-daemon and notify-worker wire up in production.
//!
//! `notify-schemas`' traits are intentionally sync, so every Postgres-backed
//! implementation here bridges its async `sqlx` calls through a captured
//! `tokio::runtime::Handle`.
//! Callers are expected to invoke them from inside a `spawn_blocking` (or an
//! otherwise dedicated thread) rather than directly on the async runtime.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use notify_audit::{AuditError, AuditRepository, NewAudit};
use notify_dispatch::{OutboxQueue, QueueError};
use notify_schemas::{AuditStatus, Job, JobEvent, JobStatus, NotificationAudit};
use notify_worker::{ClaimError, ClaimedJob, JobClaimSource};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub const ENV_DB_URL: &str = "NOTIFY_DATABASE_URL";

/// Connect to Postgres using `NOTIFY_DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_courses_table: bool,
}

/// Connectivity + schema presence, used by the daemon's `/v1/status`.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'courses'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus { ok: one == 1, has_courses_table: exists })
}

// ---------------------------------------------------------------------
// Course / Learner / Enrollment persistence
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub hours_required: i64,
    pub deadline_date: NaiveDate,
    pub source_tag: Option<String>,
}

/// Upserts by `name`: a re-ingested workbook refreshes hours/deadline for
/// the same named course rather than duplicating it.
pub async fn upsert_course(pool: &PgPool, new: &NewCourse) -> Result<notify_schemas::Course> {
    let row = sqlx::query(
        r#"
        insert into courses (name, hours_required, deadline_date, source_tag)
        values ($1, $2, $3, $4)
        on conflict (name) do update
            set hours_required = excluded.hours_required,
                deadline_date = excluded.deadline_date,
                source_tag = excluded.source_tag
        returning id, name, hours_required, deadline_date, source_tag
        "#,
    )
    .bind(&new.name)
    .bind(new.hours_required)
    .bind(new.deadline_date)
    .bind(&new.source_tag)
    .fetch_one(pool)
    .await
    .context("upsert_course failed")?;

    Ok(notify_schemas::Course {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        hours_required: row.try_get("hours_required")?,
        deadline_date: row.try_get("deadline_date")?,
        source_tag: row.try_get("source_tag")?,
    })
}

#[derive(Debug, Clone)]
pub struct NewLearner {
    pub full_name: String,
    pub email: String,
    pub certificate_expires_at: Option<NaiveDate>,
}

/// Upserts by `email`: the natural key a spreadsheet re-export repeats.
pub async fn upsert_learner(pool: &PgPool, new: &NewLearner) -> Result<notify_schemas::Learner> {
    let row = sqlx::query(
        r#"
        insert into learners (full_name, email, certificate_expires_at)
        values ($1, $2, $3)
        on conflict (email) do update
            set full_name = excluded.full_name,
                certificate_expires_at = excluded.certificate_expires_at
        returning id, full_name, email, certificate_expires_at
        "#,
    )
    .bind(&new.full_name)
    .bind(&new.email)
    .bind(new.certificate_expires_at)
    .fetch_one(pool)
    .await
    .context("upsert_learner failed")?;

    Ok(notify_schemas::Learner {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        certificate_expires_at: row.try_get("certificate_expires_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub progress_hours: f64,
    pub status: Option<String>,
    pub attributes: serde_json::Value,
}

/// Upserts by `(learner_id, course_id)`. `progress_hours` only ever moves
/// forward: a later export reporting fewer hours than already recorded
/// (a stale or corrected row) never regresses a learner's progress.
pub async fn upsert_enrollment(pool: &PgPool, new: &NewEnrollment) -> Result<notify_schemas::Enrollment> {
    let row = sqlx::query(
        r#"
        insert into enrollments (learner_id, course_id, progress_hours, status, attributes)
        values ($1, $2, $3, $4, $5)
        on conflict (learner_id, course_id) do update
            set progress_hours = greatest(enrollments.progress_hours, excluded.progress_hours),
                status = excluded.status,
                attributes = excluded.attributes
        returning id, learner_id, course_id, progress_hours, status, last_notified_at, attributes
        "#,
    )
    .bind(new.learner_id)
    .bind(new.course_id)
    .bind(new.progress_hours)
    .bind(&new.status)
    .bind(&new.attributes)
    .fetch_one(pool)
    .await
    .context("upsert_enrollment failed")?;

    let attributes: serde_json::Value = row.try_get("attributes")?;
    Ok(notify_schemas::Enrollment {
        id: row.try_get("id")?,
        learner_id: row.try_get("learner_id")?,
        course_id: row.try_get("course_id")?,
        progress_hours: row.try_get("progress_hours")?,
        status: row.try_get("status")?,
        last_notified_at: row.try_get("last_notified_at")?,
        attributes: match attributes {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => Default::default(),
        },
    })
}

/// Stamps `last_notified_at`, called after a dispatch successfully sends.
pub async fn mark_enrollment_notified(pool: &PgPool, enrollment_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("update enrollments set last_notified_at = $2 where id = $1")
        .bind(enrollment_id)
        .bind(at)
        .execute(pool)
        .await
        .context("mark_enrollment_notified failed")?;
    Ok(())
}

// ---------------------------------------------------------------------
// Audit Repository
// ---------------------------------------------------------------------

fn audit_status_str(status: AuditStatus) -> &'static str {
    status.as_str()
}

fn parse_audit_status(s: &str) -> AuditStatus {
    match s {
        "dry_run" => AuditStatus::DryRun,
        "queued" => AuditStatus::Queued,
        "quiet_hours" => AuditStatus::QuietHours,
        "sent" => AuditStatus::Sent,
        _ => AuditStatus::Error,
    }
}

fn job_status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "queued",
        JobStatus::DryRun => "dry_run",
        JobStatus::Paused => "paused",
        JobStatus::Succeeded => "succeeded",
        JobStatus::Failed => "failed",
    }
}

fn parse_job_status(s: &str) -> JobStatus {
    match s {
        "queued" => JobStatus::Queued,
        "dry_run" => JobStatus::DryRun,
        "paused" => JobStatus::Paused,
        "succeeded" => JobStatus::Succeeded,
        _ => JobStatus::Failed,
    }
}

/// Postgres-backed `AuditRepository`: inserts the audit row, upserts its
/// Job (by `job_id`) and appends a JobEvent, all inside one transaction.
pub struct PgAuditRepository {
    pool: PgPool,
    handle: tokio::runtime::Handle,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, handle: tokio::runtime::Handle::current() }
    }

    async fn add_async(&self, entry: NewAudit) -> Result<NotificationAudit> {
        let mut tx = self.pool.begin().await.context("begin audit transaction")?;

        let row = sqlx::query(
            r#"
            insert into notification_audits
                (playbook, channel, adapter, recipient, subject, status, payload, response, error, job_id, created_at, sent_at)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            returning id, playbook, channel, adapter, recipient, subject, status, payload, response, error, job_id, created_at, sent_at
            "#,
        )
        .bind(&entry.playbook)
        .bind(&entry.channel)
        .bind(&entry.adapter)
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(audit_status_str(entry.status))
        .bind(&entry.payload)
        .bind(&entry.response)
        .bind(&entry.error)
        .bind(&entry.job_id)
        .bind(entry.created_at)
        .bind(entry.sent_at)
        .fetch_one(&mut *tx)
        .await
        .context("insert notification_audits failed")?;

        let status_str: String = row.try_get("status")?;
        let audit = NotificationAudit {
            id: row.try_get("id")?,
            playbook: row.try_get("playbook")?,
            channel: row.try_get("channel")?,
            adapter: row.try_get("adapter")?,
            recipient: row.try_get("recipient")?,
            subject: row.try_get("subject")?,
            status: parse_audit_status(&status_str),
            payload: row.try_get("payload")?,
            response: row.try_get("response")?,
            error: row.try_get("error")?,
            job_id: row.try_get("job_id")?,
            created_at: row.try_get("created_at")?,
            sent_at: row.try_get("sent_at")?,
        };

        if let Some(job_id) = &entry.job_id {
            let new_status = audit.status.to_job_status();
            let finished = matches!(new_status, JobStatus::Succeeded | JobStatus::Failed);
            sqlx::query(
                r#"
                insert into jobs (id, name, queue_label, status, payload, created_at, started_at, finished_at)
                values ($1, $2, $3, $4, $5, $6, $6, case when $7 then $6 else null end)
                on conflict (id) do update
                    set status = excluded.status,
                        name = coalesce(nullif(excluded.name, ''), jobs.name),
                        queue_label = coalesce(excluded.queue_label, jobs.queue_label),
                        payload = excluded.payload,
                        finished_at = case when $7 then $6 else jobs.finished_at end
                "#,
            )
            .bind(job_id)
            .bind(entry.job_name.clone().unwrap_or_default())
            .bind(&entry.queue_label)
            .bind(job_status_str(new_status))
            .bind(&audit.payload)
            .bind(audit.created_at)
            .bind(finished)
            .execute(&mut *tx)
            .await
            .context("upsert jobs failed")?;

            sqlx::query(
                r#"
                insert into job_events (job_id, event_type, message, payload, created_at)
                values ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(job_id)
            .bind(format!("notification.{}", audit.status.as_str()))
            .bind(audit.error.clone().or_else(|| audit.subject.clone()))
            .bind(&audit.payload)
            .bind(audit.created_at)
            .execute(&mut *tx)
            .await
            .context("insert job_events failed")?;
        }

        tx.commit().await.context("commit audit transaction")?;
        Ok(audit)
    }

    /// Reads the Job row currently stored for `job_id`, for daemon/CLI
    /// status queries.
    pub async fn job(&self, job_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query(
            "select id, name, queue_label, status, payload, created_at, started_at, finished_at from jobs where id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch job failed")?;

        let Some(row) = row else { return Ok(None) };
        let status_str: String = row.try_get("status")?;
        Ok(Some(Job {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            queue_label: row.try_get("queue_label")?,
            status: parse_job_status(&status_str),
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
        }))
    }

    /// Reads every JobEvent recorded for `job_id`, oldest first.
    pub async fn events(&self, job_id: &str) -> Result<Vec<JobEvent>> {
        let rows = sqlx::query(
            "select job_id, event_type, message, payload, created_at from job_events where job_id = $1 order by id asc",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .context("fetch job_events failed")?;

        rows.into_iter()
            .map(|row| {
                Ok(JobEvent {
                    job_id: row.try_get("job_id")?,
                    event_type: row.try_get("event_type")?,
                    message: row.try_get("message")?,
                    payload: row.try_get("payload")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

impl AuditRepository for PgAuditRepository {
    fn add(&self, entry: NewAudit) -> Result<NotificationAudit, AuditError> {
        self.handle
            .block_on(self.add_async(entry))
            .map_err(|e| AuditError::Storage(e.to_string()))
    }
}

// ---------------------------------------------------------------------
// Outbox queue (the queued delivery path) + claim source (notify-worker)
// ---------------------------------------------------------------------

/// Postgres-backed `OutboxQueue`: inserts a `pending` row that
/// `PgJobClaimSource` later claims.
pub struct PgOutboxQueue {
    pool: PgPool,
    handle: tokio::runtime::Handle,
    queue_label: Option<String>,
}

impl PgOutboxQueue {
    pub fn new(pool: PgPool, queue_label: Option<String>) -> Self {
        Self { pool, handle: tokio::runtime::Handle::current(), queue_label }
    }

    async fn enqueue_async(&self, job_id: &str, job_name: &str, payload: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            insert into notification_outbox (job_id, job_name, payload, status, queue_label)
            values ($1, $2, $3, 'pending', $4)
            on conflict (job_id) do nothing
            "#,
        )
        .bind(job_id)
        .bind(job_name)
        .bind(payload)
        .bind(&self.queue_label)
        .execute(&self.pool)
        .await
        .context("outbox enqueue failed")?;
        Ok(())
    }
}

impl OutboxQueue for PgOutboxQueue {
    fn enqueue(&self, job_id: &str, job_name: &str, payload: serde_json::Value) -> Result<(), QueueError> {
        self.handle
            .block_on(self.enqueue_async(job_id, job_name, payload))
            .map_err(|e| QueueError(e.to_string()))
    }

    fn label(&self) -> Option<&str> {
        self.queue_label.as_deref()
    }
}

/// Postgres-backed `JobClaimSource`: claims a batch of `pending` outbox rows
/// under `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
/// same row.
pub struct PgJobClaimSource {
    pool: PgPool,
    handle: tokio::runtime::Handle,
}

impl PgJobClaimSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, handle: tokio::runtime::Handle::current() }
    }

    async fn claim_batch_async(&self, batch_size: usize, worker_id: &str) -> Result<Vec<ClaimedJob>> {
        let rows = sqlx::query(
            r#"
            with to_claim as (
                select id
                from notification_outbox
                where status = 'pending'
                order by id asc
                limit $1
                for update skip locked
            )
            update notification_outbox
               set status = 'claimed',
                   claimed_at = now(),
                   claimed_by = $2
             where id in (select id from to_claim)
            returning job_id, job_name, payload
            "#,
        )
        .bind(batch_size as i64)
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await
        .context("outbox claim_batch failed")?;

        rows.into_iter()
            .map(|row| {
                Ok(ClaimedJob {
                    job_id: row.try_get("job_id")?,
                    job_name: row.try_get("job_name")?,
                    payload: row.try_get("payload")?,
                })
            })
            .collect()
    }

    async fn mark_done_async(&self, job_id: &str) -> Result<()> {
        sqlx::query("update notification_outbox set status = 'done' where job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .context("outbox mark_done failed")?;
        Ok(())
    }

    async fn release_async(&self, job_id: &str) -> Result<()> {
        sqlx::query(
            "update notification_outbox set status = 'pending', claimed_at = null, claimed_by = null where job_id = $1",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .context("outbox release failed")?;
        Ok(())
    }
}

impl JobClaimSource for PgJobClaimSource {
    fn claim_batch(&self, batch_size: usize, worker_id: &str) -> Result<Vec<ClaimedJob>, ClaimError> {
        self.handle
            .block_on(self.claim_batch_async(batch_size, worker_id))
            .map_err(|e| ClaimError(e.to_string()))
    }

    fn mark_done(&self, job_id: &str) -> Result<(), ClaimError> {
        self.handle.block_on(self.mark_done_async(job_id)).map_err(|e| ClaimError(e.to_string()))
    }

    fn release(&self, job_id: &str) -> Result<(), ClaimError> {
        self.handle.block_on(self.release_async(job_id)).map_err(|e| ClaimError(e.to_string()))
    }
}
