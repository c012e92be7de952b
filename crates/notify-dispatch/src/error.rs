use std::fmt;

use serde_json::Value as Json;

/// What `deliver()` actually did, distinguishing a dry-run (no adapter
/// invoked) from a live send (adapter invoked, response captured).
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    DryRun,
    Sent { response: Json },
}

/// `AdapterNotFound` and render failures both surface through this type
/// from `deliver()`; the dispatcher's `dispatch()` loop catches both and
/// increments `errors` rather than propagating them.
#[derive(Debug, Clone)]
pub enum DeliveryError {
    Render(String),
    AdapterNotFound(String),
    Adapter { channel: String, source: String },
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Render(msg) => write!(f, "render error: {msg}"),
            DeliveryError::AdapterNotFound(channel) => write!(f, "adapter not found: {channel}"),
            DeliveryError::Adapter { channel, source } => {
                write!(f, "delivery error on channel {channel}: {source}")
            }
        }
    }
}

impl std::error::Error for DeliveryError {}
