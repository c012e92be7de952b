use std::collections::BTreeMap;
use std::fmt;

use crate::adapter::ChannelAdapter;

#[derive(Debug, Clone)]
pub struct AdapterNotFound(pub String);

impl fmt::Display for AdapterNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adaptador no configurado: {}", self.0)
    }
}

impl std::error::Error for AdapterNotFound {}

/// Keyed case-insensitively; read-only after construction. The only shared
/// mutable collaborator besides the audit repository.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Box<dyn ChannelAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: &str, adapter: Box<dyn ChannelAdapter>) {
        self.adapters.insert(channel.to_lowercase(), adapter);
    }

    pub fn resolve(&self, channel: &str) -> Result<&dyn ChannelAdapter, AdapterNotFound> {
        let key = if channel.is_empty() {
            "default".to_string()
        } else {
            channel.to_lowercase()
        };
        self.adapters
            .get(&key)
            .map(|b| b.as_ref())
            .ok_or_else(|| AdapterNotFound(key))
    }
}
