/// Errors that can occur in topic registry operations.
#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    /// No topic with this name exists in the namespace.
    #[error("topic not found: {namespace}/{name}")]
    NotFound { name: String, namespace: String },

    /// A topic with the same identifier already exists.
    #[error("topic already exists: {namespace}/{name} (id {identifier:#010x})")]
    AlreadyExists {
        name: String,
        namespace: String,
        identifier: u32,
    },

    /// The registry reached its configured topic limit.
    #[error("topic limit reached ({max})")]
    TooManyTopics { max: usize },

    /// The topic reached its configured callback limit.
    #[error("callback limit reached for {topic} ({max})")]
    TooManyCallbacks { topic: String, max: usize },

    /// The published payload exceeds the topic's maximum payload size.
    #[error("payload too large for {topic} ({size} bytes, max {max})")]
    PayloadTooLarge {
        topic: String,
        size: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TopicError>;
