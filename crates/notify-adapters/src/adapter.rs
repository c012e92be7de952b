use std::fmt;

use serde_json::Value as Json;

/// A channel-specific delivery unit with a uniform payload→response
/// contract. Any failure — validation, transport, subprocess exit — signals
/// delivery failure through `AdapterError`.
pub trait ChannelAdapter: Send + Sync {
    fn send(&self, payload: &Json) -> Result<Json, AdapterError>;
}

#[derive(Debug, Clone)]
pub enum AdapterError {
    Validation(String),
    Delivery(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::Validation(msg) => write!(f, "validation error: {msg}"),
            AdapterError::Delivery(msg) => write!(f, "delivery error: {msg}"),
        }
    }
}

impl std::error::Error for AdapterError {}
