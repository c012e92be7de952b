use std::sync::Arc;

use anyhow::{Context, Result};
use notify_db::{PgAuditRepository, PgOutboxQueue};
use notify_runtime::WorkflowRunner;

use super::build_registry;

/// Runs `playbook` end to end and prints its per-channel summary.
/// `dry_run=true` never touches the queue or an adapter, matching the
/// dispatcher's contract regardless of `--queue`.
pub async fn run_playbook(
    playbook: &str,
    dry_run: bool,
    queue: bool,
    playbooks_dir: &str,
    repo_root: &str,
) -> Result<()> {
    let settings = notify_config::Settings::from_env();
    let registry = build_registry(&settings);

    let pool = notify_db::connect_from_env().await.context("connect to postgres")?;
    let audit: Arc<dyn notify_audit::AuditRepository> = Arc::new(PgAuditRepository::new(pool.clone()));
    let outbox = PgOutboxQueue::new(pool, None);

    let runner = WorkflowRunner::new(playbooks_dir.to_string(), repo_root.to_string());

    let report = tokio::task::spawn_blocking({
        let playbook = playbook.to_string();
        let audit = Arc::clone(&audit);
        move || {
            let queue_ref: Option<&dyn notify_dispatch::OutboxQueue> =
                if !dry_run && queue { Some(&outbox) } else { None };
            runner.run(&playbook, dry_run, &registry, audit.as_ref(), queue_ref, None, Some(settings.adapter_timeout))
        }
    })
    .await
    .context("run task panicked")??;

    println!("playbook={} dry_run={} total_rows={}", report.playbook, report.dry_run, report.total_rows);
    println!("matched_actions={} enqueued_actions={}", report.matched_actions, report.enqueued_actions);
    for (channel, stats) in &report.summary {
        println!(
            "channel={channel} matches={} enqueued={} skipped_quiet_hours={} errors={}",
            stats.matches, stats.enqueued, stats.skipped_quiet_hours, stats.errors
        );
    }

    Ok(())
}
