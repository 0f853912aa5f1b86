use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Named transports available to clients at construction time.
///
/// A client takes ownership of the transport it selects, so each transport
/// serves exactly one transmitter.
#[derive(Default)]
pub struct TransportRegistry {
    transports: HashMap<String, Box<dyn Transport>>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, transport: impl Transport + 'static) {
        let name = name.into();
        debug!(%name, kind = transport.transport_name(), "registered transport");
        self.transports.insert(name, Box::new(transport));
    }

    /// Remove and return the transport registered under `name`.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn Transport>> {
        self.transports
            .remove(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))
    }

    /// Whether a transport is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.transports.contains_key(name)
    }

    /// Registered transport names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use crate::traits::WriteMode;

    #[test]
    fn take_removes_entry() {
        let probe = MemoryTransport::new();
        let mut registry = TransportRegistry::new();
        registry.insert("uart_cdc", probe.clone());

        let mut transport = registry.take("uart_cdc").unwrap();
        transport.write(b"hi", WriteMode::FireAndForget).unwrap();

        assert_eq!(probe.contents(), b"hi");
        assert!(!registry.contains("uart_cdc"));
    }

    #[test]
    fn missing_transport_is_reported() {
        let mut registry = TransportRegistry::new();
        let err = registry.take("uart_missing").err().unwrap();
        assert!(matches!(err, TransportError::NotFound(name) if name == "uart_missing"));
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = TransportRegistry::new();
        registry.insert("b", MemoryTransport::new());
        registry.insert("a", MemoryTransport::new());
        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}
