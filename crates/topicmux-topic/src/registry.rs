use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::debug;

use crate::config::RegistryConfig;
use crate::descriptor::{topic_identifier, TopicDescriptor, DEFAULT_NAMESPACE};
use crate::error::{Result, TopicError};

/// Execution context a publish runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallContext {
    /// Regular thread context; callbacks may block briefly.
    Thread,
    /// Interrupt-like context; callbacks must not block or allocate.
    Interrupt,
}

impl CallContext {
    pub fn is_interrupt(self) -> bool {
        self == CallContext::Interrupt
    }
}

/// Subscriber callback invoked synchronously for every publish.
pub type TopicCallback = Arc<dyn Fn(CallContext, &[u8]) + Send + Sync>;

struct Topic {
    descriptor: TopicDescriptor,
    callbacks: RwLock<Vec<(u64, TopicCallback)>>,
    next_callback: AtomicU64,
}

impl Topic {
    fn callbacks_mut(&self) -> RwLockWriteGuard<'_, Vec<(u64, TopicCallback)>> {
        self.callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn callbacks(&self) -> RwLockReadGuard<'_, Vec<(u64, TopicCallback)>> {
        self.callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Identifies one registered callback so it can be removed again.
///
/// Holds only a weak reference to the topic, so keeping a handle around does
/// not keep the topic's callbacks alive.
#[derive(Debug, Clone)]
pub struct CallbackHandle {
    topic: Weak<Topic>,
    id: u64,
}

impl CallbackHandle {
    /// Remove the callback. Returns `false` if it was already removed.
    ///
    /// Waits for publishes that are running the topic's callbacks to finish,
    /// so once this returns the callback is not running and never runs again.
    pub fn unregister(&self) -> bool {
        let Some(topic) = self.topic.upgrade() else {
            return false;
        };
        let mut callbacks = topic.callbacks_mut();
        let before = callbacks.len();
        callbacks.retain(|(id, _)| *id != self.id);
        let removed = callbacks.len() != before;
        if removed {
            debug!(topic = %topic.descriptor.qualified_name(), count = callbacks.len(), "unregistered callback");
        }
        removed
    }
}


/// Thread-safe registry of topics keyed by identifier.
pub struct TopicRegistry {
    topics: RwLock<HashMap<u32, Arc<Topic>>>,
    config: RegistryConfig,
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TopicRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Create a topic. `namespace` defaults to [`DEFAULT_NAMESPACE`].
    pub fn create(
        &self,
        name: &str,
        namespace: Option<&str>,
        max_payload_size: usize,
    ) -> Result<TopicDescriptor> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let descriptor = TopicDescriptor::new(name, namespace, max_payload_size);

        let mut topics = self.write_topics();
        if topics.contains_key(&descriptor.identifier) {
            return Err(TopicError::AlreadyExists {
                name: name.to_string(),
                namespace: namespace.to_string(),
                identifier: descriptor.identifier,
            });
        }
        if topics.len() >= self.config.max_topics {
            return Err(TopicError::TooManyTopics {
                max: self.config.max_topics,
            });
        }

        topics.insert(
            descriptor.identifier,
            Arc::new(Topic {
                descriptor: descriptor.clone(),
                callbacks: RwLock::new(Vec::new()),
                next_callback: AtomicU64::new(0),
            }),
        );
        debug!(
            topic = %descriptor.qualified_name(),
            identifier = descriptor.identifier,
            max_payload_size,
            "created topic"
        );
        Ok(descriptor)
    }

    /// Look up a topic. `namespace` defaults to [`DEFAULT_NAMESPACE`].
    pub fn resolve(&self, name: &str, namespace: Option<&str>) -> Option<TopicDescriptor> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let identifier = topic_identifier(name, namespace);
        self.read_topics()
            .get(&identifier)
            .filter(|topic| topic.descriptor.name == name && topic.descriptor.namespace == namespace)
            .map(|topic| topic.descriptor.clone())
    }

    /// Register a callback for every future publish on the topic.
    pub fn register_callback(
        &self,
        descriptor: &TopicDescriptor,
        callback: TopicCallback,
    ) -> Result<CallbackHandle> {
        let topic = self.topic(descriptor)?;
        let mut callbacks = topic.callbacks_mut();
        if callbacks.len() >= self.config.max_callbacks_per_topic {
            return Err(TopicError::TooManyCallbacks {
                topic: descriptor.qualified_name(),
                max: self.config.max_callbacks_per_topic,
            });
        }
        let id = topic.next_callback.fetch_add(1, Ordering::Relaxed);
        callbacks.push((id, callback));
        debug!(topic = %descriptor.qualified_name(), count = callbacks.len(), "registered callback");
        Ok(CallbackHandle {
            topic: Arc::downgrade(&topic),
            id,
        })
    }

    /// Remove a callback added by [`register_callback`](Self::register_callback).
    pub fn unregister_callback(&self, handle: &CallbackHandle) -> bool {
        handle.unregister()
    }

    /// Publish from a regular thread.
    pub fn publish(&self, descriptor: &TopicDescriptor, data: &[u8]) -> Result<()> {
        self.publish_in(descriptor, data, CallContext::Thread)
    }

    /// Publish from an interrupt-like context.
    pub fn publish_from_isr(&self, descriptor: &TopicDescriptor, data: &[u8]) -> Result<()> {
        self.publish_in(descriptor, data, CallContext::Interrupt)
    }

    /// Publish `data`, running every callback synchronously in `context`.
    pub fn publish_in(
        &self,
        descriptor: &TopicDescriptor,
        data: &[u8],
        context: CallContext,
    ) -> Result<()> {
        let topic = self.topic(descriptor)?;
        if data.len() > topic.descriptor.max_payload_size {
            return Err(TopicError::PayloadTooLarge {
                topic: topic.descriptor.qualified_name(),
                size: data.len(),
                max: topic.descriptor.max_payload_size,
            });
        }

        for (_, callback) in topic.callbacks().iter() {
            callback(context, data);
        }
        Ok(())
    }

    /// All registered topics, sorted by qualified name.
    pub fn descriptors(&self) -> Vec<TopicDescriptor> {
        let mut descriptors: Vec<TopicDescriptor> = self
            .read_topics()
            .values()
            .map(|topic| topic.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| {
            (a.namespace.as_str(), a.name.as_str()).cmp(&(b.namespace.as_str(), b.name.as_str()))
        });
        descriptors
    }

    /// Number of callbacks registered on the topic.
    pub fn callback_count(&self, descriptor: &TopicDescriptor) -> usize {
        self.topic(descriptor)
            .map(|topic| topic.callbacks().len())
            .unwrap_or(0)
    }

    /// Current registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn topic(&self, descriptor: &TopicDescriptor) -> Result<Arc<Topic>> {
        self.read_topics()
            .get(&descriptor.identifier)
            .cloned()
            .ok_or_else(|| TopicError::NotFound {
                name: descriptor.name.clone(),
                namespace: descriptor.namespace.clone(),
            })
    }

    fn read_topics(&self) -> RwLockReadGuard<'_, HashMap<u32, Arc<Topic>>> {
        self.topics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_topics(&self) -> RwLockWriteGuard<'_, HashMap<u32, Arc<Topic>>> {
        self.topics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}
