//! `notify-cli validate` loads a playbook and runs it through ingestion
//! without dispatching anything. Against the shared test fixture (whose
//! workbook is a stub, not a real xlsx), it must surface the input error
//! cleanly rather than panic.

use assert_cmd::Command;
use notify_testkit::PlaybookFixture;
use predicates::str::contains;

#[test]
fn validate_surfaces_input_error_for_unparsable_workbook() {
    let fixture = PlaybookFixture::build(
        "compliance",
        &["Email"],
        "  - id: debe_notificar\n    when: \"row.Email != ''\"\n",
        "  - type: notify\n    channel: whatsapp\n    to: \"{{ row.Email }}\"\n",
    )
    .unwrap();

    Command::cargo_bin("notify-cli")
        .unwrap()
        .args([
            "validate",
            "compliance",
            "--playbooks-dir",
            fixture.playbooks_dir.to_str().unwrap(),
            "--repo-root",
            fixture.root_path.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("Error"));
}

#[test]
fn validate_reports_missing_playbook() {
    let tmp = tempfile::tempdir().unwrap();

    Command::cargo_bin("notify-cli")
        .unwrap()
        .args([
            "validate",
            "ghost",
            "--playbooks-dir",
            tmp.path().to_str().unwrap(),
            "--repo-root",
            tmp.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("ghost"));
}
