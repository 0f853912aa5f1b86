use std::path::PathBuf;

/// Errors that can occur while building a client.
///
/// Once a client is running nothing is reported back to producers; runtime
/// losses show up in [`ClientStats`](crate::ClientStats) instead.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configuration is internally inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for [`ClientConfig`](crate::ClientConfig).
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A configured topic is not present in the registry.
    #[error("topic not found: {namespace}/{name}")]
    TopicNotFound { name: String, namespace: String },

    /// The selected transport is not registered.
    #[error("transport not found: {0}")]
    TransportNotFound(String),

    /// Topic registry error.
    #[error("topic error: {0}")]
    Topic(#[from] topicmux_topic::TopicError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] topicmux_transport::TransportError),

    /// The frame queue could not be built.
    #[error("queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),

    /// The transmitter thread could not be started.
    #[error("failed to spawn transmitter thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
