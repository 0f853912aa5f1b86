//! Fan-in of topic updates onto a single serial transport.
//!
//! A [`SharedTopicClient`] subscribes to a fixed set of topics. Every update
//! published on one of them is framed as `[identifier][length][payload]`,
//! pushed onto a shared lock-free byte queue, and a wake signal is raised.
//! One transmitter thread drains the queue in batches and writes them to the
//! transport, so producers never touch the transport themselves.
//!
//! ```no_run
//! use topicmux_client::{ClientConfig, SharedTopicClient};
//! use topicmux_topic::TopicRegistry;
//! use topicmux_transport::{MemoryTransport, TransportRegistry};
//!
//! let topics = TopicRegistry::new();
//! let topic1 = topics.create("topic1", None, 4)?;
//! topics.create("topic2", None, 8)?;
//!
//! let mut transports = TransportRegistry::new();
//! transports.insert("uart_cdc", MemoryTransport::new());
//!
//! let client = SharedTopicClient::start(ClientConfig::default(), &topics, &mut transports)?;
//! topics.publish(&topic1, &[1, 2])?;
//! let stats = client.shutdown();
//! assert_eq!(stats.frames_enqueued, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod pack;
pub mod producer;
pub mod queue;
pub mod signal;
pub mod stats;
mod transmitter;

pub use client::{SharedTopicClient, WORKER_THREAD_NAME};
pub use config::{ClientConfig, DropPolicy, TopicEntry, MIN_WORKER_STACK_SIZE};
pub use error::{ClientError, Result};
pub use pack::{PackArena, PackGuard};
pub use producer::{on_publish, ProducerContext};
pub use queue::{FrameQueue, QueueError, QueueFull, QueueReader, QueueWriter, MAX_QUEUE_CAPACITY};
pub use signal::{Wake, WakeSignal};
pub use stats::ClientStats;
