use anyhow::{Context, Result};
use notify_db::{PgAuditRepository, PgJobClaimSource};

use super::build_registry;

/// Claims and delivers one batch of outbox jobs, the worker's unit of
/// work. Does not loop; callers cron or supervise the cadence externally.
pub async fn run_once(batch_size: usize, worker_id: &str) -> Result<()> {
    let settings = notify_config::Settings::from_env();
    let registry = build_registry(&settings);

    let pool = notify_db::connect_from_env().await.context("connect to postgres")?;
    let audit = PgAuditRepository::new(pool.clone());
    let source = PgJobClaimSource::new(pool);

    let worker_id = worker_id.to_string();
    let adapter_timeout = settings.adapter_timeout;
    let stats = tokio::task::spawn_blocking(move || {
        notify_worker::run_once(&source, &registry, &audit, &worker_id, batch_size, Some(adapter_timeout))
    })
    .await
    .context("worker task panicked")?
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("claimed={} delivered={} failed={}", stats.claimed, stats.delivered, stats.failed);
    Ok(())
}
