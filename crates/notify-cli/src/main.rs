//! notify-cli: operator entry point for running playbooks, validating them
//! offline, and driving the Postgres-backed audit/outbox schema, mirroring
//! the HTTP trigger surface `notify-daemon` exposes for operators who would
//! rather drive a run from a terminal or a cron job.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "notify-cli")]
#[command(about = "Compliance-notification workflow runtime CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a playbook end to end: load, evaluate, dispatch.
    Run {
        /// Playbook identifier (file stem under `--playbooks-dir`).
        playbook: String,

        /// Evaluate rules and write audits without invoking any adapter.
        #[arg(long)]
        dry_run: bool,

        /// Enqueue onto the Postgres outbox instead of delivering inline.
        #[arg(long)]
        queue: bool,

        /// Directory playbook descriptors live under.
        #[arg(long, default_value = "workflows/playbooks")]
        playbooks_dir: String,

        /// Repository root used to resolve relative asset paths.
        #[arg(long, default_value = ".")]
        repo_root: String,
    },

    /// Load and evaluate a playbook without dispatching any action, to
    /// confirm its mapping/ruleset resolve against the workbook.
    Validate {
        playbook: String,

        #[arg(long, default_value = "workflows/playbooks")]
        playbooks_dir: String,

        #[arg(long, default_value = ".")]
        repo_root: String,
    },

    /// Database lifecycle commands.
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Claim and deliver one batch of outbox jobs (the worker's unit of
    /// work — see notify-worker). Does not loop; callers cron/cadence it.
    WorkerRunOnce {
        #[arg(long, default_value_t = 25)]
        batch_size: usize,

        #[arg(long, default_value = "cli-worker")]
        worker_id: String,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Print connectivity + schema-presence status.
    Status,
    /// Apply pending SQLx migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Run { playbook, dry_run, queue, playbooks_dir, repo_root } => {
            commands::run::run_playbook(&playbook, dry_run, queue, &playbooks_dir, &repo_root).await
        }
        Commands::Validate { playbook, playbooks_dir, repo_root } => {
            commands::validate::validate_playbook(&playbook, &playbooks_dir, &repo_root)
        }
        Commands::Db { cmd } => match cmd {
            DbCmd::Status => commands::db::status().await,
            DbCmd::Migrate => commands::db::migrate().await,
        },
        Commands::WorkerRunOnce { batch_size, worker_id } => {
            commands::worker::run_once(batch_size, &worker_id).await
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
