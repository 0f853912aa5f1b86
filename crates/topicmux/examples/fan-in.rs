//! Fan-in example: several publisher threads, one shared stream.
//!
//! Run with: cargo run --example fan-in
//!
//! Four sensor threads publish on their own topics. The client frames every
//! update onto an in-memory transport, and the captured stream is decoded at
//! the end to show the interleaving.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use topicmux::client::{ClientConfig, SharedTopicClient, TopicEntry};
use topicmux::frame::decode_stream;
use topicmux::topic::TopicRegistry;
use topicmux::transport::{MemoryTransport, TransportRegistry};

const SENSORS: [&str; 4] = ["imu", "odom", "battery", "gps"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let topics = Arc::new(TopicRegistry::new());
    for name in SENSORS {
        topics.create(name, Some("robot"), 32)?;
    }

    let capture = MemoryTransport::new();
    let mut transports = TransportRegistry::new();
    transports.insert("uart_cdc", capture.clone());

    let config = ClientConfig {
        topics: SENSORS
            .iter()
            .map(|name| TopicEntry::in_namespace(*name, "robot"))
            .collect(),
        queue_capacity: 1024,
        ..ClientConfig::default()
    };
    let client = SharedTopicClient::start(config, &topics, &mut transports)?;

    let publishers: Vec<_> = SENSORS
        .iter()
        .map(|name| {
            let topics = Arc::clone(&topics);
            let name = name.to_string();
            thread::spawn(move || {
                let Some(descriptor) = topics.resolve(&name, Some("robot")) else {
                    return;
                };
                for seq in 0..5 {
                    let reading = format!("{name} #{seq}");
                    if let Err(err) = topics.publish(&descriptor, reading.as_bytes()) {
                        eprintln!("publish failed: {err}");
                    }
                    thread::sleep(Duration::from_millis(2));
                }
            })
        })
        .collect();
    for publisher in publishers {
        let _ = publisher.join();
    }

    let stats = client.shutdown();
    println!(
        "enqueued={} dropped={} bytes={}",
        stats.frames_enqueued,
        stats.frames_dropped(),
        stats.bytes_written
    );

    let names: Vec<_> = topics.descriptors();
    for frame in decode_stream(&capture.contents(), 32)? {
        let topic = names
            .iter()
            .find(|d| d.identifier == frame.identifier)
            .map(|d| d.qualified_name())
            .unwrap_or_else(|| format!("{:#010x}", frame.identifier));
        println!("{topic:<16} {}", String::from_utf8_lossy(&frame.payload));
    }

    Ok(())
}
