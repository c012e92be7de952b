//! Config hash stability: layered YAML merging must canonicalize key order
//! before hashing, so reordering a document's keys never changes the hash,
//! while a genuine value change always does.

use notify_config::load_layered_yaml;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_yaml(content: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f
}

const BASE_YAML: &str = r#"
smtp:
  host: "smtp.example.com"
  port: 587
quiet_hours:
  start: "21:00"
  end: "08:00"
"#;

const BASE_YAML_REORDERED: &str = r#"
quiet_hours:
  end: "08:00"
  start: "21:00"
smtp:
  port: 587
  host: "smtp.example.com"
"#;

const BASE_YAML_CHANGED: &str = r#"
smtp:
  host: "smtp.example.com"
  port: 2525
quiet_hours:
  start: "21:00"
  end: "08:00"
"#;

#[test]
fn reordering_keys_does_not_change_hash() {
    let a = write_yaml(BASE_YAML);
    let b = write_yaml(BASE_YAML_REORDERED);

    let loaded_a = load_layered_yaml(&[a.path().to_str().unwrap()]).unwrap();
    let loaded_b = load_layered_yaml(&[b.path().to_str().unwrap()]).unwrap();

    assert_eq!(loaded_a.config_hash, loaded_b.config_hash);
}

#[test]
fn changing_a_value_changes_the_hash() {
    let a = write_yaml(BASE_YAML);
    let changed = write_yaml(BASE_YAML_CHANGED);

    let loaded_a = load_layered_yaml(&[a.path().to_str().unwrap()]).unwrap();
    let loaded_changed = load_layered_yaml(&[changed.path().to_str().unwrap()]).unwrap();

    assert_ne!(loaded_a.config_hash, loaded_changed.config_hash);
}

#[test]
fn later_layer_overrides_earlier_layer_for_scalars() {
    let base = write_yaml("smtp:\n  host: base.example.com\n  port: 25\n");
    let overlay = write_yaml("smtp:\n  port: 587\n");

    let loaded = load_layered_yaml(&[base.path().to_str().unwrap(), overlay.path().to_str().unwrap()]).unwrap();

    assert_eq!(loaded.config_json["smtp"]["host"], "base.example.com");
    assert_eq!(loaded.config_json["smtp"]["port"], 587);
}

#[test]
fn deep_merge_keeps_untouched_sibling_keys() {
    let base = write_yaml("smtp:\n  host: base.example.com\nquiet_hours:\n  start: \"21:00\"\n  end: \"08:00\"\n");
    let overlay = write_yaml("smtp:\n  port: 2525\n");

    let loaded = load_layered_yaml(&[base.path().to_str().unwrap(), overlay.path().to_str().unwrap()]).unwrap();

    assert_eq!(loaded.config_json["smtp"]["host"], "base.example.com");
    assert_eq!(loaded.config_json["smtp"]["port"], 2525);
    assert_eq!(loaded.config_json["quiet_hours"]["start"], "21:00");
}
