//! Fans evaluated rows × actions into deliveries: chooses the inline vs
//! queued path, enforces quiet hours, and collects per-channel statistics.
//! The heart of the core.
//!
//! The dispatcher itself is single-threaded cooperative over one input run:
//! it drives one row at a time, one action at a time, in input order.
//! Per-row/per-action failures are local — they update stats and the run
//! continues; only `notify-playbook`/ingest failures are fatal.

mod error;
mod queue;

use std::collections::BTreeMap;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify_actions::QuietHours;
use notify_adapters::{AdapterRegistry, ChannelAdapter};
use notify_audit::{AuditRepository, NewAudit};
use notify_schemas::{Action, AuditStatus, Row};
use serde_json::{json, Value as Json};
use uuid::Uuid;

/// Default per-adapter delivery deadline, matching `notify-config`'s default
/// for `NOTIFY_ADAPTER_TIMEOUT_SECS` when a caller never overrides it.
const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(10);

pub use error::{DeliveryError, DispatchOutcome};
pub use queue::{OutboxQueue, QueueError};

/// A row of normalized data alongside the rule results evaluated against it.
#[derive(Debug, Clone)]
pub struct EvaluatedRow {
    pub row: Row,
    pub rule_results: BTreeMap<String, bool>,
}

/// Per-channel statistics collected across one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub matches: u64,
    pub enqueued: u64,
    pub skipped_quiet_hours: u64,
    pub errors: u64,
}

pub type Summary = BTreeMap<String, ChannelStats>;

/// Injected wall-clock, for deterministic quiet-hours evaluation in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Owns no state beyond its collaborators: borrows the adapter registry and
/// the audit repository (shared by concurrent workers), and an optional
/// outbox queue. Generic over both so callers can substitute test doubles
/// without touching the algorithm.
pub struct Dispatcher<'a> {
    pub registry: &'a AdapterRegistry,
    pub audit: &'a dyn AuditRepository,
    pub queue: Option<&'a dyn OutboxQueue>,
    pub job_name: String,
    pub clock: Clock,
    pub quiet_hours: Option<QuietHours>,
    pub adapter_timeout: Duration,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a AdapterRegistry, audit: &'a dyn AuditRepository) -> Self {
        Self {
            registry,
            audit,
            queue: None,
            job_name: "app.notify.worker.dispatch".to_string(),
            clock: system_clock(),
            quiet_hours: None,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    pub fn with_queue(mut self, queue: &'a dyn OutboxQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_quiet_hours(mut self, quiet_hours: Option<QuietHours>) -> Self {
        self.quiet_hours = quiet_hours;
        self
    }

    /// Overrides the per-adapter delivery deadline (default 10s). A breach
    /// surfaces as a normal `DeliveryError::Adapter`, same as any other
    /// adapter failure.
    pub fn with_adapter_timeout(mut self, adapter_timeout: Duration) -> Self {
        self.adapter_timeout = adapter_timeout;
        self
    }

    /// Runs the match-render-gate-deliver sequence over every row × action
    /// pair, in input order.
    pub fn dispatch(
        &self,
        evaluated_rows: &[EvaluatedRow],
        actions: &[Action],
        dry_run: bool,
        playbook_name: Option<&str>,
    ) -> Summary {
        let mut summary = Summary::new();
        let today = (self.clock)().date_naive();

        for item in evaluated_rows {
            let ctx = notify_schemas::Context::new(item.row.clone(), item.rule_results.clone());

            for action in actions {
                if !action.is_notify() {
                    continue;
                }

                let guard = match notify_actions::evaluate_guard(action.when.as_deref(), &ctx, today) {
                    Ok(g) => g,
                    Err(e) => {
                        tracing::warn!(error = %e, "dispatch.guard_error");
                        continue;
                    }
                };
                if !guard {
                    continue;
                }

                let rendered = match notify_actions::render_action(action, &ctx, today) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(error = %e, "dispatch.render_error");
                        continue;
                    }
                };

                let channel = rendered.channel.clone();
                let stats = summary.entry(channel.clone()).or_default();
                stats.matches += 1;

                if dry_run {
                    let _ = self.deliver_rendered(playbook_name, &rendered, &item.row, &item.rule_results, true, None, None);
                    continue;
                }

                if let Some(qh) = &self.quiet_hours {
                    if !qh.allows((self.clock)()) {
                        stats.skipped_quiet_hours += 1;
                        let job_id = format!("job-{}", Uuid::new_v4());
                        self.record_quiet_hours(playbook_name, &rendered, item, &job_id);
                        continue;
                    }
                }

                match self.queue {
                    None => match self.deliver_rendered(
                        playbook_name,
                        &rendered,
                        &item.row,
                        &item.rule_results,
                        false,
                        None,
                        None,
                    ) {
                        Ok(DispatchOutcome::Sent { .. }) => stats.enqueued += 1,
                        Ok(DispatchOutcome::DryRun) => {}
                        Err(_) => stats.errors += 1,
                    },
                    Some(queue) => {
                        let job_id = format!("job-{}", Uuid::new_v4());
                        let payload = json!({
                            "playbook": playbook_name,
                            "action": rendered.to_json(),
                            "row": item.row,
                            "rule_results": item.rule_results,
                            "job_id": job_id,
                        });
                        match queue.enqueue(&job_id, &self.job_name, payload.clone()) {
                            Ok(()) => {
                                let _ = self.audit.add(NewAudit {
                                    playbook: playbook_name.map(str::to_string),
                                    channel: channel.clone(),
                                    adapter: channel.clone(),
                                    recipient: rendered.to.clone(),
                                    subject: rendered.subject.clone(),
                                    status: AuditStatus::Queued,
                                    payload,
                                    response: None,
                                    error: None,
                                    job_id: Some(job_id),
                                    job_name: Some(self.job_name.clone()),
                                    queue_label: queue.label().map(str::to_string),
                                    created_at: (self.clock)(),
                                    sent_at: None,
                                });
                                stats.enqueued += 1;
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "dispatch.queue_error");
                                stats.errors += 1;
                            }
                        }
                    }
                }
            }
        }

        summary
    }

    /// Quiet-hours suppression still maps to `Job { status: paused }` on
    /// upsert, so the suppressed attempt needs a `job_id` of its own even
    /// though no queue call ever happens.
    fn record_quiet_hours(&self, playbook_name: Option<&str>, rendered: &notify_actions::RenderedAction, item: &EvaluatedRow, job_id: &str) {
        let payload = json!({
            "playbook": playbook_name,
            "action": rendered.to_json(),
            "row": item.row,
            "rule_results": item.rule_results,
            "job_id": job_id,
        });
        let _ = self.audit.add(NewAudit {
            playbook: playbook_name.map(str::to_string),
            channel: rendered.channel.clone(),
            adapter: rendered.channel.clone(),
            recipient: rendered.to.clone(),
            subject: rendered.subject.clone(),
            status: AuditStatus::QuietHours,
            payload,
            response: None,
            error: None,
            job_id: Some(job_id.to_string()),
            job_name: Some(self.job_name.clone()),
            queue_label: self.queue.and_then(|q| q.label()).map(str::to_string),
            created_at: (self.clock)(),
            sent_at: None,
        });
    }

    /// For callers that only hold the raw, unrendered `Action`
    /// (`notify-worker`, reconstituting a claimed job). Renders it against
    /// `row`/`rule_results` and delegates to [`Self::deliver_rendered`].
    pub fn deliver(
        &self,
        playbook_name: Option<&str>,
        action: &Action,
        _channel: &str,
        row: &Row,
        rule_results: &BTreeMap<String, bool>,
        dry_run: bool,
        job_id: Option<&str>,
        job_name: Option<&str>,
    ) -> Result<DispatchOutcome, DeliveryError> {
        let today = (self.clock)().date_naive();
        let ctx = notify_schemas::Context::new(row.clone(), rule_results.clone());
        let rendered = notify_actions::render_action(action, &ctx, today)
            .map_err(|e| DeliveryError::Render(e.to_string()))?;
        self.deliver_rendered(playbook_name, &rendered, row, rule_results, dry_run, job_id, job_name)
    }

    /// Called by the dispatcher inline (with the
    /// action it just rendered for the guard check) and by `notify-worker`
    /// once a queued job is claimed — in both cases `job_id`/`job_name`
    /// correlate the resulting audit to its Job. The payload's `action`
    /// field always carries the rendered (template-expanded) view, never the
    /// raw `Action` — the same contract the queued-enqueue payload carries.
    pub fn deliver_rendered(
        &self,
        playbook_name: Option<&str>,
        rendered: &notify_actions::RenderedAction,
        row: &Row,
        rule_results: &BTreeMap<String, bool>,
        dry_run: bool,
        job_id: Option<&str>,
        job_name: Option<&str>,
    ) -> Result<DispatchOutcome, DeliveryError> {
        let resolved_channel = if rendered.channel.is_empty() { "default" } else { &rendered.channel };
        let adapter = match self.registry.resolve(resolved_channel) {
            Ok(a) => a,
            Err(not_found) => {
                // Every matched dry-run action yields exactly one `dry_run`
                // audit, with no adapter invocation — even when the channel
                // itself doesn't resolve.
                if dry_run {
                    self.audit.add(NewAudit {
                        playbook: playbook_name.map(str::to_string),
                        channel: resolved_channel.to_string(),
                        adapter: resolved_channel.to_string(),
                        recipient: rendered.to.clone(),
                        subject: rendered.subject.clone(),
                        status: AuditStatus::DryRun,
                        payload: payload_json(playbook_name, rendered, row, rule_results),
                        response: None,
                        error: None,
                        job_id: job_id.map(str::to_string),
                        job_name: job_name.map(str::to_string),
                        queue_label: None,
                        created_at: (self.clock)(),
                        sent_at: None,
                    }).ok();
                    return Ok(DispatchOutcome::DryRun);
                }
                self.audit.add(NewAudit {
                    playbook: playbook_name.map(str::to_string),
                    channel: resolved_channel.to_string(),
                    adapter: resolved_channel.to_string(),
                    recipient: rendered.to.clone(),
                    subject: rendered.subject.clone(),
                    status: AuditStatus::Error,
                    payload: payload_json(playbook_name, rendered, row, rule_results),
                    response: None,
                    error: Some(not_found.to_string()),
                    job_id: job_id.map(str::to_string),
                    job_name: job_name.map(str::to_string),
                    queue_label: None,
                    created_at: (self.clock)(),
                    sent_at: None,
                }).ok();
                return Err(DeliveryError::AdapterNotFound(not_found.to_string()));
            }
        };

        let payload = payload_json(playbook_name, rendered, row, rule_results);

        if dry_run {
            self.audit.add(NewAudit {
                playbook: playbook_name.map(str::to_string),
                channel: resolved_channel.to_string(),
                adapter: resolved_channel.to_string(),
                recipient: rendered.to.clone(),
                subject: rendered.subject.clone(),
                status: AuditStatus::DryRun,
                payload,
                response: None,
                error: None,
                job_id: job_id.map(str::to_string),
                job_name: job_name.map(str::to_string),
                queue_label: None,
                created_at: (self.clock)(),
                sent_at: None,
            }).ok();
            return Ok(DispatchOutcome::DryRun);
        }

        match send_with_deadline(adapter, &payload, self.adapter_timeout) {
            Ok(response) => {
                let now = (self.clock)();
                self.audit.add(NewAudit {
                    playbook: playbook_name.map(str::to_string),
                    channel: resolved_channel.to_string(),
                    adapter: resolved_channel.to_string(),
                    recipient: rendered.to.clone(),
                    subject: rendered.subject.clone(),
                    status: AuditStatus::Sent,
                    payload,
                    response: Some(response.clone()),
                    error: None,
                    job_id: job_id.map(str::to_string),
                    job_name: job_name.map(str::to_string),
                    queue_label: None,
                    created_at: now,
                    sent_at: Some(now),
                }).ok();
                Ok(DispatchOutcome::Sent { response })
            }
            Err(adapter_err) => {
                self.audit.add(NewAudit {
                    playbook: playbook_name.map(str::to_string),
                    channel: resolved_channel.to_string(),
                    adapter: resolved_channel.to_string(),
                    recipient: rendered.to.clone(),
                    subject: rendered.subject.clone(),
                    status: AuditStatus::Error,
                    payload,
                    response: None,
                    error: Some(adapter_err.clone()),
                    job_id: job_id.map(str::to_string),
                    job_name: job_name.map(str::to_string),
                    queue_label: None,
                    created_at: (self.clock)(),
                    sent_at: None,
                }).ok();
                Err(DeliveryError::Adapter {
                    channel: resolved_channel.to_string(),
                    source: adapter_err,
                })
            }
        }
    }
}

/// Runs `adapter.send` on its own thread and enforces `deadline` against the
/// result, so a slow or hung adapter call cannot stall the dispatcher past
/// the configured delivery window. A breach is folded into the same error
/// shape as any other adapter failure, per `DeliveryError::Adapter`.
fn send_with_deadline(adapter: &dyn ChannelAdapter, payload: &Json, deadline: Duration) -> Result<Json, String> {
    let (tx, rx) = mpsc::channel();
    std::thread::scope(|scope| {
        scope.spawn(move || {
            let _ = tx.send(adapter.send(payload));
        });
        match rx.recv_timeout(deadline) {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(adapter_err)) => Err(adapter_err.to_string()),
            Err(_) => Err(format!("adapter call exceeded {:.1}s deadline", deadline.as_secs_f64())),
        }
    })
}

fn payload_json(
    playbook_name: Option<&str>,
    rendered: &notify_actions::RenderedAction,
    row: &Row,
    rule_results: &BTreeMap<String, bool>,
) -> Json {
    json!({
        "playbook": playbook_name,
        "action": rendered.to_json(),
        "context": { "row": row, "rule_results": rule_results },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use notify_adapters::{AdapterError, ChannelAdapter};
    use notify_audit::InMemoryAuditRepository;
    use notify_schemas::Value;

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

    fn row_with_phone() -> EvaluatedRow {
        let mut row = Row::new();
        row.insert("telefono".into(), Value::Str("+34111".into()));
        let mut rule_results = BTreeMap::new();
        rule_results.insert("debe_notificar".into(), true);
        EvaluatedRow { row, rule_results }
    }

    fn notify_action() -> Action {
        Action {
            action_type: "notify".into(),
            channel: "whatsapp".into(),
            when: Some("{{ rule_results.debe_notificar }}".into()),
            to: Some("{{ row.telefono }}".into()),
            subject: None,
            template: None,
            extra: Default::default(),
        }
    }

    fn clock_at(hour: u32, minute: u32) -> Clock {
        let dt = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
        );
        Arc::new(move || dt)
    }

    #[test]
    fn scenario_1_single_row_dry_run() {
        let mut registry = AdapterRegistry::new();
        registry.register("whatsapp", Box::new(StubAdapter { fail: false }));
        let audit = InMemoryAuditRepository::new();
        let dispatcher = Dispatcher::new(&registry, &audit).with_clock(clock_at(10, 0));

        let summary = dispatcher.dispatch(&[row_with_phone()], &[notify_action()], true, None);
        let stats = summary.get("whatsapp").unwrap();
        assert_eq!(*stats, ChannelStats { matches: 1, enqueued: 0, skipped_quiet_hours: 0, errors: 0 });
        assert_eq!(audit.audits().len(), 1);
        assert_eq!(audit.audits()[0].status, AuditStatus::DryRun);
    }

    #[test]
    fn scenario_2_live_enqueue_outside_quiet_hours() {
        struct RecordingQueue {
            calls: std::sync::Mutex<Vec<(String, Json)>>,
        }
        impl OutboxQueue for RecordingQueue {
            fn enqueue(&self, _job_id: &str, job_name: &str, payload: Json) -> Result<(), QueueError> {
                self.calls.lock().unwrap().push((job_name.to_string(), payload));
                Ok(())
            }
            fn label(&self) -> Option<&str> {
                Some("notify")
            }
        }

        let mut registry = AdapterRegistry::new();
        registry.register("whatsapp", Box::new(StubAdapter { fail: false }));
        let audit = InMemoryAuditRepository::new();
        let queue = RecordingQueue { calls: Default::default() };
        let quiet_hours = Some(QuietHours::new(
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        ));

        let dispatcher = Dispatcher::new(&registry, &audit)
            .with_queue(&queue)
            .with_clock(clock_at(10, 0))
            .with_quiet_hours(quiet_hours);

        let summary = dispatcher.dispatch(&[row_with_phone()], &[notify_action()], false, None);
        assert_eq!(summary.get("whatsapp").unwrap().enqueued, 1);
        assert_eq!(queue.calls.lock().unwrap().len(), 1);
        let (job_name, payload) = &queue.calls.lock().unwrap()[0];
        assert_eq!(job_name, "app.notify.worker.dispatch");
        assert_eq!(
            payload.get("action").and_then(|a| a.get("to")).and_then(Json::as_str),
            Some("+34111")
        );
        assert_eq!(audit.audits()[0].status, AuditStatus::Queued);
        let job_id = audit.audits()[0].job_id.clone().unwrap();
        assert_eq!(audit.job(&job_id).unwrap().status, notify_schemas::JobStatus::Queued);
    }

    #[test]
    fn scenario_3_quiet_hours_suppression() {
        struct NeverCalledQueue;
        impl OutboxQueue for NeverCalledQueue {
            fn enqueue(&self, _job_id: &str, _job_name: &str, _payload: Json) -> Result<(), QueueError> {
                panic!("queue must not be called during quiet hours");
            }
        }

        let mut registry = AdapterRegistry::new();
        registry.register("whatsapp", Box::new(StubAdapter { fail: false }));
        let audit = InMemoryAuditRepository::new();
        let queue = NeverCalledQueue;
        let quiet_hours = Some(QuietHours::new(
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        ));

        let dispatcher = Dispatcher::new(&registry, &audit)
            .with_queue(&queue)
            .with_clock(clock_at(22, 0))
            .with_quiet_hours(quiet_hours);

        let summary = dispatcher.dispatch(&[row_with_phone()], &[notify_action()], false, None);
        assert_eq!(summary.get("whatsapp").unwrap().skipped_quiet_hours, 1);
        assert_eq!(audit.audits()[0].status, AuditStatus::QuietHours);
        let job_id = audit.audits()[0].job_id.clone().expect("quiet-hours audit carries a job_id for Job correlation");
        assert_eq!(audit.job(&job_id).unwrap().status, notify_schemas::JobStatus::Paused);
    }

    #[test]
    fn scenario_4_inline_delivery_failure_does_not_abort() {
        let mut registry = AdapterRegistry::new();
        registry.register("whatsapp", Box::new(StubAdapter { fail: true }));
        let audit = InMemoryAuditRepository::new();
        let dispatcher = Dispatcher::new(&registry, &audit).with_clock(clock_at(10, 0));

        let summary = dispatcher.dispatch(&[row_with_phone()], &[notify_action()], false, None);
        assert_eq!(summary.get("whatsapp").unwrap().errors, 1);
        assert_eq!(audit.audits()[0].status, AuditStatus::Error);
        assert!(audit.audits()[0].error.is_some());
    }

    #[test]
    fn slow_adapter_surfaces_as_a_delivery_error_past_its_deadline() {
        struct SlowAdapter;
        impl ChannelAdapter for SlowAdapter {
            fn send(&self, _payload: &Json) -> Result<Json, AdapterError> {
                std::thread::sleep(Duration::from_millis(50));
                Ok(json!({"status": "sent"}))
            }
        }

        let mut registry = AdapterRegistry::new();
        registry.register("whatsapp", Box::new(SlowAdapter));
        let audit = InMemoryAuditRepository::new();
        let dispatcher = Dispatcher::new(&registry, &audit)
            .with_clock(clock_at(10, 0))
            .with_adapter_timeout(Duration::from_millis(5));

        let summary = dispatcher.dispatch(&[row_with_phone()], &[notify_action()], false, None);
        assert_eq!(summary.get("whatsapp").unwrap().errors, 1);
        assert!(audit.audits()[0].error.as_deref().unwrap().contains("deadline"));
    }

    #[test]
    fn unknown_channel_increments_errors_without_panicking() {
        let registry = AdapterRegistry::new();
        let audit = InMemoryAuditRepository::new();
        let dispatcher = Dispatcher::new(&registry, &audit).with_clock(clock_at(10, 0));

        let summary = dispatcher.dispatch(&[row_with_phone()], &[notify_action()], false, None);
        assert_eq!(summary.get("whatsapp").unwrap().errors, 1);
    }
}
