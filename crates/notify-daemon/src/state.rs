//! Shared runtime state for notify-daemon.
//!
//! All types here are `Clone`-able (via `Arc`). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use notify_adapters::AdapterRegistry;
use notify_audit::AuditRepository;
use notify_dispatch::OutboxQueue;
use notify_runtime::WorkflowRunner;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers. Owns the runner,
/// adapter registry, and Postgres-backed audit repository / outbox queue the
/// HTTP layer hands to every run.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<WorkflowRunner>,
    pub registry: Arc<AdapterRegistry>,
    pub audit: Arc<dyn AuditRepository>,
    pub queue: Arc<dyn OutboxQueue>,
    pub pool: PgPool,
    pub adapter_timeout: Duration,
    pub build: BuildInfo,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: WorkflowRunner,
        registry: AdapterRegistry,
        audit: Arc<dyn AuditRepository>,
        queue: Arc<dyn OutboxQueue>,
        pool: PgPool,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            runner: Arc::new(runner),
            registry: Arc::new(registry),
            audit,
            queue,
            pool,
            adapter_timeout,
            build: BuildInfo {
                service: "notify-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_secs()
}
