//! `db status`/`db migrate`/`run` all need a Postgres connection string.
//! Without `NOTIFY_DATABASE_URL` set, `notify-cli` falls back to a
//! localhost default (see `notify_config::Settings`) so these commands
//! fail at connect time with a clear error rather than panicking.

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn db_status_fails_cleanly_without_a_reachable_database() {
    Command::cargo_bin("notify-cli")
        .unwrap()
        .env_remove("NOTIFY_DATABASE_URL")
        .env("NOTIFY_DATABASE_URL", "postgres://127.0.0.1:1/this_db_does_not_exist")
        .arg("db")
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("Error"));
}

#[test]
fn run_fails_cleanly_without_a_reachable_database() {
    let tmp = tempfile::tempdir().unwrap();

    Command::cargo_bin("notify-cli")
        .unwrap()
        .env("NOTIFY_DATABASE_URL", "postgres://127.0.0.1:1/this_db_does_not_exist")
        .args([
            "run",
            "ghost",
            "--dry-run",
            "--playbooks-dir",
            tmp.path().to_str().unwrap(),
            "--repo-root",
            tmp.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("Error"));
}
