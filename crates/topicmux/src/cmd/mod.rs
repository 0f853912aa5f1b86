use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use topicmux_client::ClientConfig;
use topicmux_topic::TopicRegistry;

use crate::exit::{client_error, topic_error, CliResult};
use crate::output::OutputFormat;

pub mod inspect;
pub mod run;
pub mod topics;
pub mod version;

/// Payload limit given to every configured topic unless overridden.
pub const DEFAULT_MAX_PAYLOAD: usize = 64;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Forward `TOPIC PAYLOAD` lines from stdin through the fan-in client.
    Run(RunArgs),
    /// List configured topics and their wire identifiers.
    Topics(TopicsArgs),
    /// Decode a captured byte stream into frames.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Topics(args) => topics::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Client configuration (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Write frames to a listening Unix domain socket.
    #[arg(long, value_name = "PATH", conflicts_with = "out")]
    pub uds: Option<PathBuf>,
    /// Write frames to a file (for example a serial device node).
    #[arg(long, value_name = "PATH", conflicts_with = "uds")]
    pub out: Option<PathBuf>,
    /// Read lines from a file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Maximum payload size of every configured topic.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
    /// Payloads are hex strings instead of text.
    #[arg(long)]
    pub hex: bool,
    /// Publish as if from interrupt context.
    #[arg(long)]
    pub isr: bool,
}

#[derive(Args, Debug)]
pub struct TopicsArgs {
    /// Client configuration (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Maximum payload size of every configured topic.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Captured stream to decode. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Configuration used to name identifiers.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Reject frames whose payload is larger than this.
    #[arg(long, default_value_t = 1 << 20)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn load_config(path: Option<&Path>) -> CliResult<ClientConfig> {
    match path {
        Some(path) => ClientConfig::from_path(path).map_err(|err| client_error("config", err)),
        None => Ok(ClientConfig::default()),
    }
}

/// Create every configured topic in a fresh registry.
pub fn build_registry(config: &ClientConfig, max_payload: usize) -> CliResult<TopicRegistry> {
    let registry = TopicRegistry::new();
    for entry in &config.topics {
        registry
            .create(&entry.name, entry.namespace.as_deref(), max_payload)
            .map_err(|err| topic_error("topic setup failed", err))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicmux_client::TopicEntry;

    #[test]
    fn registry_holds_every_configured_topic() {
        let config = ClientConfig {
            topics: vec![
                TopicEntry::new("imu"),
                TopicEntry::in_namespace("odom", "chassis"),
            ],
            ..ClientConfig::default()
        };
        let registry = build_registry(&config, 16).unwrap();

        assert!(registry.resolve("imu", None).is_some());
        let odom = registry.resolve("odom", Some("chassis")).unwrap();
        assert_eq!(odom.max_payload_size, 16);
    }

    #[test]
    fn duplicate_topics_are_rejected() {
        let config = ClientConfig {
            topics: vec![TopicEntry::new("imu"), TopicEntry::new("imu")],
            ..ClientConfig::default()
        };
        let err = build_registry(&config, 16).unwrap_err();
        assert_eq!(err.code, crate::exit::CONFIG_INVALID);
    }
}
