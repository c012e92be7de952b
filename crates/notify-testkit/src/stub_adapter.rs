use notify_adapters::{AdapterError, ChannelAdapter};
use serde_json::{json, Value as Json};
use std::sync::Mutex;

/// A `ChannelAdapter` double: returns a fixed response, or a fixed error when
/// `fail` is set. Records every payload it was sent, so dispatcher/runtime
/// tests can assert on what actually reached the adapter.
pub struct StubAdapter {
    fail: Option<String>,
    response: Json,
    calls: Mutex<Vec<Json>>,
}

impl Default for StubAdapter {
    fn default() -> Self {
        Self::succeeding(json!({"status": "sent"}))
    }
}

impl StubAdapter {
    pub fn succeeding(response: Json) -> Self {
        Self { fail: None, response, calls: Mutex::new(Vec::new()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { fail: Some(message.into()), response: Json::Null, calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<Json> {
        self.calls.lock().expect("stub adapter lock poisoned").clone()
    }
}

impl ChannelAdapter for StubAdapter {
    fn send(&self, payload: &Json) -> Result<Json, AdapterError> {
        self.calls.lock().expect("stub adapter lock poisoned").push(payload.clone());
        match &self.fail {
            Some(msg) => Err(AdapterError::Delivery(msg.clone())),
            None => Ok(self.response.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeding_adapter_records_the_payload_it_received() {
        let adapter = StubAdapter::default();
        adapter.send(&json!({"to": "+34111"})).unwrap();
        assert_eq!(adapter.calls().len(), 1);
    }

    #[test]
    fn failing_adapter_surfaces_the_configured_message() {
        let adapter = StubAdapter::failing("smtp timeout");
        let err = adapter.send(&json!({})).unwrap_err();
        assert!(err.to_string().contains("smtp timeout"));
    }
}
