//! notify-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, connects to
//! Postgres, builds the shared state, wires middleware, and starts the HTTP
//! server. All route handlers live in `routes.rs`; all shared state types
//! live in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use notify_adapters::{AdapterRegistry, EmailAdapter, WhatsAppAdapter};
use notify_config::Settings;
use notify_daemon::{routes, state};
use notify_db::{PgAuditRepository, PgOutboxQueue};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = Settings::from_env();

    let pool = notify_db::connect_from_env().await.context("connect to postgres")?;
    notify_db::migrate(&pool).await.context("run db migrations")?;

    let registry = build_registry(&settings);
    let audit: Arc<dyn notify_audit::AuditRepository> = Arc::new(PgAuditRepository::new(pool.clone()));
    let queue: Arc<dyn notify_dispatch::OutboxQueue> = Arc::new(PgOutboxQueue::new(pool.clone(), None));
    let runner = notify_runtime::WorkflowRunner::new(
        format!("{}/workflows/playbooks", settings.repository_root),
        settings.repository_root.clone(),
    );

    let shared = Arc::new(state::AppState::new(runner, registry, audit, queue, pool, settings.adapter_timeout));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("notify-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

/// Registers the channel adapters: email when SMTP is configured, whatsapp
/// always (it falls back to the simulation command when no CLI is wired).
fn build_registry(settings: &Settings) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    if let Some(smtp_host) = &settings.smtp_host {
        let mut email = EmailAdapter::new(
            std::path::PathBuf::from(format!("{}/workflows/templates", settings.repository_root)),
            smtp_host.clone(),
            settings.smtp_port,
            settings
                .smtp_from
                .clone()
                .or_else(|| settings.smtp_username.clone())
                .unwrap_or_else(|| "notifications@example.com".to_string()),
        );
        email.username = settings.smtp_username.clone();
        email.password = settings.smtp_password.clone();
        email.use_starttls = settings.smtp_use_tls;
        registry.register("email", Box::new(email));
    }

    registry.register("whatsapp", Box::new(WhatsAppAdapter::new(None)));

    registry
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("NOTIFY_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
