use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A playbook action. Only `type == "notify"` is dispatched by the core;
/// other types are reserved but not acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    pub channel: String,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    /// Channel-specific fields not covered above, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Json>,
}

impl Action {
    pub fn is_notify(&self) -> bool {
        self.action_type == "notify"
    }

    pub fn channel_key(&self) -> String {
        self.channel.to_lowercase()
    }
}
