/// Limits applied by a [`TopicRegistry`](crate::TopicRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of topics the registry accepts.
    pub max_topics: usize,
    /// Maximum number of callbacks registered on a single topic.
    pub max_callbacks_per_topic: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_topics: 1024,
            max_callbacks_per_topic: 16,
        }
    }
}
