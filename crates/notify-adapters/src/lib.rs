//! Maps channel name → adapter and invokes it with a uniform payload
//! contract.
//!
//! It does **not**: decide whether to invoke an adapter at all — quiet
//! hours, dry-run, and queue routing are `notify-dispatch`'s job.

mod adapter;
mod cli;
mod context_payload;
mod email;
mod registry;
mod whatsapp;

pub use adapter::{AdapterError, ChannelAdapter};
pub use cli::CliAdapter;
pub use context_payload::context_from_payload;
pub use email::EmailAdapter;
pub use registry::{AdapterNotFound, AdapterRegistry};
pub use whatsapp::WhatsAppAdapter;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StubAdapter;
    impl ChannelAdapter for StubAdapter {
        fn send(&self, _payload: &serde_json::Value) -> Result<serde_json::Value, AdapterError> {
            Ok(json!({"status": "sent"}))
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = AdapterRegistry::new();
        registry.register("Email", Box::new(StubAdapter));
        assert!(registry.resolve("email").is_ok());
        assert!(registry.resolve("EMAIL").is_ok());
    }

    #[test]
    fn empty_channel_resolves_to_default() {
        let mut registry = AdapterRegistry::new();
        registry.register("default", Box::new(StubAdapter));
        assert!(registry.resolve("").is_ok());
    }

    #[test]
    fn unknown_channel_is_not_found() {
        let registry = AdapterRegistry::new();
        assert!(registry.resolve("sms").is_err());
    }

    #[test]
    fn whatsapp_simulation_fills_defaults() {
        let adapter = WhatsAppAdapter::new(None);
        let response = adapter.send(&json!({"action": {}, "context": {}})).unwrap();
        assert_eq!(response.get("status").and_then(|v| v.as_str()), Some("simulated"));
        assert!(response.get("message_id").is_some());
    }
}
