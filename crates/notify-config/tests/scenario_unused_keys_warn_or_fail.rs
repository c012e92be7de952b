//! `report_unused_keys` compares a loaded document's top-level keys against
//! the set a consumer actually read, and either fails fast or logs a
//! warning for the rest, per the configured policy.

use notify_config::{report_unused_keys, UnusedKeyPolicy};
use serde_json::json;

#[test]
fn no_unused_keys_is_always_ok() {
    let cfg = json!({"smtp": {}, "quiet_hours": {}});
    assert!(report_unused_keys(&cfg, &["smtp", "quiet_hours"], UnusedKeyPolicy::Fail).is_ok());
}

#[test]
fn fail_policy_errors_on_unused_keys() {
    let cfg = json!({"smtp": {}, "legacy_webhook": "https://example.com"});
    let err = report_unused_keys(&cfg, &["smtp"], UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("legacy_webhook"));
}

#[test]
fn warn_policy_never_errors() {
    let cfg = json!({"smtp": {}, "legacy_webhook": "https://example.com"});
    assert!(report_unused_keys(&cfg, &["smtp"], UnusedKeyPolicy::Warn).is_ok());
}

#[test]
fn non_object_config_is_ignored() {
    let cfg = json!("not-a-map");
    assert!(report_unused_keys(&cfg, &[], UnusedKeyPolicy::Fail).is_ok());
}
