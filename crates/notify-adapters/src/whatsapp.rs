use serde_json::Value as Json;
use uuid::Uuid;

use crate::adapter::{AdapterError, ChannelAdapter};
use crate::cli::CliAdapter;

/// Wraps `CliAdapter` with a simulation command as the default, and fills in
/// `status`/`message_id` on the response when the subprocess doesn't supply
/// them — the simulation path never does.
pub struct WhatsAppAdapter {
    inner: CliAdapter,
}

impl WhatsAppAdapter {
    pub fn new(command: Option<Vec<String>>) -> Self {
        Self {
            inner: CliAdapter::new(command.unwrap_or_else(simulation_command)),
        }
    }
}

fn simulation_command() -> Vec<String> {
    vec!["true".to_string()]
}

impl ChannelAdapter for WhatsAppAdapter {
    fn send(&self, payload: &Json) -> Result<Json, AdapterError> {
        let mut response = self.inner.send(payload)?;
        if let Json::Object(map) = &mut response {
            map.entry("status").or_insert_with(|| Json::String("simulated".to_string()));
            map.entry("message_id")
                .or_insert_with(|| Json::String(format!("cli-{}", Uuid::new_v4())));
        }
        Ok(response)
    }
}
