use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Fail,
    Warn,
}

/// Compares the top-level keys of a loaded config document against the set of
/// keys a consumer actually read, and either fails or logs a warning for the
/// rest, per `policy`.
pub fn report_unused_keys(config: &Value, known_keys: &[&str], policy: UnusedKeyPolicy) -> Result<()> {
    let Value::Object(map) = config else {
        return Ok(());
    };
    let known: BTreeSet<&str> = known_keys.iter().copied().collect();
    let unused: Vec<&String> = map.keys().filter(|k| !known.contains(k.as_str())).collect();
    if unused.is_empty() {
        return Ok(());
    }
    let joined = unused
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    match policy {
        UnusedKeyPolicy::Fail => bail!("unused config keys: {joined}"),
        UnusedKeyPolicy::Warn => {
            tracing::warn!(keys = %joined, "unused config keys");
            Ok(())
        }
    }
}
