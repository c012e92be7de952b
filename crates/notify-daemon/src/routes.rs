//! Axum router and all HTTP handlers for notify-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every handler that touches the (sync, `block_on`-based)
//! `WorkflowRunner` runs inside `spawn_blocking` so it never blocks the Tokio
//! executor.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use notify_playbook::PlaybookError;
use notify_runtime::RunError;

use crate::{
    api_types::{ErrorResponse, HealthResponse, RunResponse, StatusResponse},
    state::{uptime_secs, AppState},
};

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/playbooks/:name/dry-run", post(dry_run))
        .route("/v1/playbooks/:name/execute", post(execute))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse { ok: true, service: state.build.service, version: state.build.version })
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let db_ok = notify_db::status(&state.pool).await.map(|s| s.ok).unwrap_or(false);
    Json(StatusResponse { ok: db_ok, daemon_uptime_secs: uptime_secs(), db_ok })
}

async fn dry_run(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    run_playbook(state, name, true).await
}

async fn execute(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    run_playbook(state, name, false).await
}

/// Runs a playbook to completion, then returns its summary.
///
/// `dry_run=false` enqueues onto the outbox for the worker to deliver later;
/// `dry_run=true` evaluates and audits without ever calling an adapter.
async fn run_playbook(state: Arc<AppState>, name: String, dry_run: bool) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let queue: Option<&dyn notify_dispatch::OutboxQueue> =
            if dry_run { None } else { Some(state.queue.as_ref()) };
        state.runner.run(
            &name,
            dry_run,
            &state.registry,
            state.audit.as_ref(),
            queue,
            None,
            Some(state.adapter_timeout),
        )
    })
    .await;

    match result {
        Ok(Ok(report)) => (StatusCode::OK, Json(RunResponse::from(report))).into_response(),
        Ok(Err(e)) => run_error_response(e),
        Err(join_err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: format!("run task panicked: {join_err}") }),
        )
            .into_response(),
    }
}

fn run_error_response(err: RunError) -> Response {
    let status = match &err {
        RunError::Playbook(PlaybookError::NotFound(_)) => StatusCode::NOT_FOUND,
        RunError::Playbook(PlaybookError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        RunError::Input(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RunError::Mapping(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RunError::Rules(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, Json(ErrorResponse { error: err.to_string() })).into_response()
}
