use std::sync::Arc;
use std::thread::{self, JoinHandle};

use topicmux_frame::packed_len;
use topicmux_topic::{
    CallContext, CallbackHandle, TopicCallback, TopicDescriptor, TopicRegistry, DEFAULT_NAMESPACE,
};
use topicmux_transport::{Transport, TransportError, TransportRegistry};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::pack::PackArena;
use crate::producer::{on_publish, ProducerContext, Shared};
use crate::queue::FrameQueue;
use crate::signal::WakeSignal;
use crate::stats::{ClientStats, Counters};
use crate::transmitter::Transmitter;

/// Name given to the transmitter thread.
pub const WORKER_THREAD_NAME: &str = "topicmux-tx";

/// Forwards every update published on a set of topics to one serial transport.
///
/// Construction resolves all topics, allocates every buffer, registers one
/// callback per topic and starts the transmitter thread. After that,
/// publishing on a subscribed topic frames the payload and queues it for the
/// transmitter without blocking.
///
/// Dropping the client unsubscribes its callbacks, then stops the
/// transmitter after it has flushed whatever was already queued.
pub struct SharedTopicClient {
    shared: Arc<Shared>,
    topics: Vec<TopicDescriptor>,
    subscriptions: Vec<CallbackHandle>,
    transport_name: String,
    worker: Option<JoinHandle<()>>,
}

impl SharedTopicClient {
    /// Build a client whose transport is taken from `transports` by name.
    pub fn start(
        config: ClientConfig,
        topics: &TopicRegistry,
        transports: &mut TransportRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let transport = transports
            .take(&config.transport)
            .map_err(|err| match err {
                TransportError::NotFound(name) => ClientError::TransportNotFound(name),
                other => ClientError::Transport(other),
            })?;
        Self::with_transport(config, topics, transport)
    }

    /// Build a client around an already opened transport.
    ///
    /// `config.transport` is used only as a label.
    pub fn with_transport(
        config: ClientConfig,
        topics: &TopicRegistry,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;

        let descriptors = config
            .topics
            .iter()
            .map(|entry| {
                topics
                    .resolve(&entry.name, entry.namespace.as_deref())
                    .ok_or_else(|| ClientError::TopicNotFound {
                        name: entry.name.clone(),
                        namespace: entry
                            .namespace
                            .clone()
                            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let largest = descriptors
            .iter()
            .map(|descriptor| packed_len(descriptor.max_payload_size))
            .max()
            .unwrap_or_default();
        if largest > config.queue_capacity {
            warn!(
                frame = largest,
                queue_capacity = config.queue_capacity,
                "largest frame does not fit the queue; such updates will be dropped"
            );
        }

        let (writer, reader) = FrameQueue::with_capacity(config.queue_capacity)?;
        let shared = Arc::new(Shared {
            queue: writer,
            signal: WakeSignal::new(),
            packs: PackArena::new(
                descriptors
                    .iter()
                    .map(|descriptor| packed_len(descriptor.max_payload_size)),
            ),
            counters: Counters::default(),
        });

        let mut subscriptions = Vec::with_capacity(descriptors.len());
        for (slot, descriptor) in descriptors.iter().enumerate() {
            let context = ProducerContext::new(Arc::clone(&shared), descriptor.identifier, slot);
            let callback: TopicCallback =
                Arc::new(move |call: CallContext, payload: &[u8]| on_publish(&context, call, payload));
            match topics.register_callback(descriptor, callback) {
                Ok(handle) => subscriptions.push(handle),
                Err(err) => {
                    unsubscribe(&subscriptions);
                    return Err(err.into());
                }
            }
            debug!(
                topic = %descriptor.qualified_name(),
                identifier = format_args!("{:#010x}", descriptor.identifier),
                slot,
                "subscribed topic"
            );
        }

        let transmitter = Transmitter::new(
            reader,
            config.scratch_capacity,
            transport,
            Arc::clone(&shared),
            config.drop_policy,
        );
        let worker = match thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .stack_size(config.effective_stack_size())
            .spawn(move || transmitter.run())
        {
            Ok(worker) => worker,
            Err(err) => {
                unsubscribe(&subscriptions);
                return Err(ClientError::Spawn(err));
            }
        };

        info!(
            transport = %config.transport,
            topics = descriptors.len(),
            queue_capacity = config.queue_capacity,
            "shared topic client started"
        );

        Ok(Self {
            shared,
            topics: descriptors,
            subscriptions,
            transport_name: config.transport,
            worker: Some(worker),
        })
    }

    /// Topics this client forwards, in slot order.
    pub fn topics(&self) -> &[TopicDescriptor] {
        &self.topics
    }

    pub fn transport_name(&self) -> &str {
        &self.transport_name
    }

    /// Current counter values.
    pub fn stats(&self) -> ClientStats {
        self.shared.counters.snapshot()
    }

    /// Bytes queued but not yet taken by the transmitter.
    pub fn queued_bytes(&self) -> usize {
        self.shared.queue.len()
    }

    /// Stop the transmitter after a final drain and return the final counters.
    pub fn shutdown(mut self) -> ClientStats {
        self.stop();
        self.stats()
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // Unsubscribing waits out in-flight callbacks, so every frame counted
        // as enqueued is in the queue before the final drain starts.
        unsubscribe(&self.subscriptions);
        self.subscriptions.clear();
        self.shared.signal.request_shutdown();
        if worker.join().is_err() {
            warn!(transport = %self.transport_name, "transmitter thread panicked");
        }
    }
}

fn unsubscribe(subscriptions: &[CallbackHandle]) {
    for handle in subscriptions {
        handle.unregister();
    }
}

impl Drop for SharedTopicClient {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SharedTopicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTopicClient")
            .field("transport", &self.transport_name)
            .field("topics", &self.topics)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use topicmux_transport::MemoryTransport;

    use super::*;
    use crate::config::TopicEntry;

    fn registry() -> TopicRegistry {
        let registry = TopicRegistry::new();
        registry.create("topic1", None, 4).unwrap();
        registry.create("topic2", None, 8).unwrap();
        registry
    }

    #[test]
    fn start_takes_named_transport() {
        let topics = registry();
        let mut transports = TransportRegistry::new();
        transports.insert("uart_cdc", MemoryTransport::new());

        let client = SharedTopicClient::start(ClientConfig::default(), &topics, &mut transports)
            .unwrap();
        assert_eq!(client.transport_name(), "uart_cdc");
        assert_eq!(client.topics().len(), 2);
        assert!(!transports.contains("uart_cdc"));
    }

    #[test]
    fn each_topic_gets_one_callback() {
        let topics = registry();
        let client = SharedTopicClient::with_transport(
            ClientConfig::default(),
            &topics,
            Box::new(MemoryTransport::new()),
        )
        .unwrap();

        for descriptor in client.topics() {
            assert_eq!(topics.callback_count(descriptor), 1);
        }
    }

    #[test]
    fn missing_topic_reports_namespace() {
        let topics = registry();
        let config = ClientConfig {
            topics: vec![TopicEntry::in_namespace("topic1", "chassis")],
            ..ClientConfig::default()
        };

        let err = SharedTopicClient::with_transport(
            config,
            &topics,
            Box::new(MemoryTransport::new()),
        )
        .unwrap_err();
        match err {
            ClientError::TopicNotFound { name, namespace } => {
                assert_eq!(name, "topic1");
                assert_eq!(namespace, "chassis");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shutdown_is_idempotent_with_drop() {
        let topics = registry();
        let client = SharedTopicClient::with_transport(
            ClientConfig::default(),
            &topics,
            Box::new(MemoryTransport::new()),
        )
        .unwrap();

        let stats = client.shutdown();
        assert_eq!(stats, ClientStats::default());
    }

    #[test]
    fn shutdown_unsubscribes_every_topic() {
        let topics = registry();
        let client = SharedTopicClient::with_transport(
            ClientConfig::default(),
            &topics,
            Box::new(MemoryTransport::new()),
        )
        .unwrap();
        let descriptors = client.topics().to_vec();

        client.shutdown();
        for descriptor in &descriptors {
            assert_eq!(topics.callback_count(descriptor), 0);
        }
    }

    #[test]
    fn failed_start_rolls_back_subscriptions() {
        let topics = TopicRegistry::with_config(topicmux_topic::RegistryConfig {
            max_callbacks_per_topic: 1,
            ..Default::default()
        });
        let topic1 = topics.create("topic1", None, 4).unwrap();
        let topic2 = topics.create("topic2", None, 8).unwrap();
        let _held = topics
            .register_callback(&topic2, Arc::new(|_: CallContext, _: &[u8]| {}))
            .unwrap();

        let err = SharedTopicClient::with_transport(
            ClientConfig::default(),
            &topics,
            Box::new(MemoryTransport::new()),
        )
        .unwrap_err();

        assert!(matches!(err, ClientError::Topic(_)), "{err}");
        assert_eq!(topics.callback_count(&topic1), 0);
        assert_eq!(topics.callback_count(&topic2), 1);
    }
}
