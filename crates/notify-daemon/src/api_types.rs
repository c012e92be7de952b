//! Request and response types for every notify-daemon HTTP endpoint.
//!
//! These types are `Serialize` so Axum can JSON-encode them; no business
//! logic lives here.

use notify_dispatch::{ChannelStats, Summary};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub daemon_uptime_secs: u64,
    pub db_ok: bool,
}

/// Mirrors `notify_runtime::RunReport`, serialized for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    pub playbook: String,
    pub dry_run: bool,
    pub total_rows: usize,
    pub matched_actions: u64,
    pub enqueued_actions: u64,
    pub summary: BTreeMap<String, ChannelStats>,
}

impl From<notify_runtime::RunReport> for RunResponse {
    fn from(report: notify_runtime::RunReport) -> Self {
        Self {
            playbook: report.playbook,
            dry_run: report.dry_run,
            total_rows: report.total_rows,
            matched_actions: report.matched_actions,
            enqueued_actions: report.enqueued_actions,
            summary: report.summary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// Re-exported so downstream callers can build a `Summary` without reaching
// into notify-dispatch directly.
pub type RunSummary = Summary;
