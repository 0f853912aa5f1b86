use std::path::Path;

use serde::{Deserialize, Serialize};
use topicmux_frame::HEADER_SIZE;

use crate::error::{ClientError, Result};
use crate::queue::MAX_QUEUE_CAPACITY;

/// Smallest stack handed to the transmitter thread, whatever the hint says.
pub const MIN_WORKER_STACK_SIZE: usize = 64 * 1024;

/// What happens to an update that does not fit in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Count the drop and stay quiet.
    Drop,
    /// Count the drop; the transmitter logs a warning for new drops.
    #[default]
    WarnAndDrop,
}

/// One subscribed topic.
///
/// Accepts either a bare `"name"` or `{ "name": ..., "namespace": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTopicEntry")]
pub struct TopicEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl TopicEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    pub fn in_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTopicEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        namespace: Option<String>,
    },
}

impl From<RawTopicEntry> for TopicEntry {
    fn from(raw: RawTopicEntry) -> Self {
        match raw {
            RawTopicEntry::Name(name) => TopicEntry::new(name),
            RawTopicEntry::Full { name, namespace } => TopicEntry { name, namespace },
        }
    }
}

/// Construction parameters for a [`SharedTopicClient`](crate::SharedTopicClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Name of the transport to take from the transport registry.
    pub transport: String,
    /// Stack size hint for the transmitter thread, in bytes.
    pub worker_stack_size: usize,
    /// Capacity of the shared frame queue, in bytes.
    pub queue_capacity: usize,
    /// Size of the transmitter's scratch buffer, in bytes.
    pub scratch_capacity: usize,
    /// Topics to subscribe to, in slot order.
    pub topics: Vec<TopicEntry>,
    pub drop_policy: DropPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: "uart_cdc".to_string(),
            worker_stack_size: 512,
            queue_capacity: 256,
            scratch_capacity: 256,
            topics: vec![TopicEntry::new("topic1"), TopicEntry::new("topic2")],
            drop_policy: DropPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ClientError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check the configuration for values no client could run with.
    pub fn validate(&self) -> Result<()> {
        if self.transport.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "transport name must not be empty".to_string(),
            ));
        }
        if self.topics.is_empty() {
            return Err(ClientError::InvalidConfig(
                "at least one topic is required".to_string(),
            ));
        }
        if let Some(entry) = self.topics.iter().find(|entry| entry.name.trim().is_empty()) {
            return Err(ClientError::InvalidConfig(format!(
                "topic name must not be empty (namespace {:?})",
                entry.namespace
            )));
        }
        if self.queue_capacity <= HEADER_SIZE || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ClientError::InvalidConfig(format!(
                "queue_capacity must be in {}..={MAX_QUEUE_CAPACITY}, got {}",
                HEADER_SIZE + 1,
                self.queue_capacity
            )));
        }
        if self.scratch_capacity == 0 {
            return Err(ClientError::InvalidConfig(
                "scratch_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Stack size actually requested for the transmitter thread.
    pub fn effective_stack_size(&self) -> usize {
        self.worker_stack_size.max(MIN_WORKER_STACK_SIZE)
    }
}
