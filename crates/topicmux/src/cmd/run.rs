use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use topicmux_client::SharedTopicClient;
use topicmux_topic::{CallContext, TopicError, TopicRegistry, DEFAULT_NAMESPACE};
use topicmux_transport::{StreamTransport, Transport, TransportRegistry};

use crate::cmd::{build_registry, load_config, RunArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_stats, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(args.config.as_deref())?;
    let topics = build_registry(&config, args.max_payload)?;

    let (sink, frames_on_stdout) = open_sink(&args)?;
    let mut transports = TransportRegistry::new();
    transports.insert(config.transport.clone(), sink);

    let client = SharedTopicClient::start(config, &topics, &mut transports)
        .map_err(|err| client_error("start failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    let lines = spawn_line_reader(args.input.as_deref())?;
    let context = if args.isr {
        CallContext::Interrupt
    } else {
        CallContext::Thread
    };

    let mut published = 0u64;
    let mut rejected = 0u64;
    while running.load(Ordering::SeqCst) {
        let line = match lines.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(line)) => line,
            Ok(Err(err)) => return Err(io_error("read failed", err)),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let Some((topic, payload)) = parse_line(&line) else {
            continue;
        };
        match publish_line(&topics, topic, payload, args.hex, context) {
            Ok(()) => published += 1,
            Err(err) => {
                rejected += 1;
                tracing::warn!(topic, error = %err, "line rejected");
            }
        }
    }

    let stats = client.shutdown();
    tracing::info!(published, rejected, "input finished");

    if frames_on_stdout {
        io::stdout()
            .flush()
            .map_err(|err| io_error("failed flushing stdout", err))?;
        print_stats(&mut io::stderr(), &stats, format);
    } else {
        print_stats(&mut io::stdout(), &stats, format);
    }
    Ok(SUCCESS)
}

/// Open the byte sink. The flag reports whether frames go to stdout.
fn open_sink(args: &RunArgs) -> CliResult<(Box<dyn Transport>, bool)> {
    if let Some(path) = &args.uds {
        return open_uds(path).map(|sink| (sink, false));
    }
    if let Some(path) = &args.out {
        let file = File::create(path)
            .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
        return Ok((Box::new(StreamTransport::new("file", file)), false));
    }
    Ok((Box::new(StreamTransport::new("stdout", io::stdout())), true))
}

#[cfg(unix)]
fn open_uds(path: &Path) -> CliResult<Box<dyn Transport>> {
    let socket = topicmux_transport::UnixDomainSocket::connect(path)
        .map_err(|err| crate::exit::transport_error("connect failed", err))?;
    Ok(Box::new(socket))
}

#[cfg(not(unix))]
fn open_uds(path: &Path) -> CliResult<Box<dyn Transport>> {
    Err(CliError::new(
        crate::exit::USAGE,
        format!("unix domain sockets are not supported here: {}", path.display()),
    ))
}

fn spawn_line_reader(input: Option<&Path>) -> CliResult<Receiver<io::Result<String>>> {
    let reader: Box<dyn BufRead + Send> = match input {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("topicmux-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|err| io_error("failed starting input reader", err))?;
    Ok(rx)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Split `TOPIC PAYLOAD`. Blank lines and `#` comments yield `None`.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(trimmed.split_once(' ').unwrap_or((trimmed, "")))
}

/// `namespace/name` or a bare name in the default namespace.
fn split_topic(topic: &str) -> (Option<&str>, &str) {
    match topic.rsplit_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, topic),
    }
}

fn publish_line(
    registry: &TopicRegistry,
    topic: &str,
    payload: &str,
    hex: bool,
    context: CallContext,
) -> Result<(), LineError> {
    let (namespace, name) = split_topic(topic);
    let descriptor = registry
        .resolve(name, namespace)
        .ok_or_else(|| TopicError::NotFound {
            name: name.to_string(),
            namespace: namespace.unwrap_or(DEFAULT_NAMESPACE).to_string(),
        })?;
    let bytes = if hex {
        decode_hex(payload).ok_or(LineError::InvalidHex)?
    } else {
        payload.as_bytes().to_vec()
    };
    registry.publish_in(&descriptor, &bytes, context)?;
    Ok(())
}

#[derive(Debug)]
enum LineError {
    Topic(TopicError),
    InvalidHex,
}

impl From<TopicError> for LineError {
    fn from(err: TopicError) -> Self {
        Self::Topic(err)
    }
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Topic(err) => write!(f, "{err}"),
            Self::InvalidHex => write!(f, "payload is not valid hex"),
        }
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn parse_line_splits_topic_and_payload() {
        assert_eq!(parse_line("imu hello world"), Some(("imu", "hello world")));
        assert_eq!(parse_line("imu\r\n"), Some(("imu", "")));
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# comment"), None);
    }

    #[test]
    fn split_topic_handles_namespaces() {
        assert_eq!(split_topic("imu"), (None, "imu"));
        assert_eq!(split_topic("chassis/odom"), (Some("chassis"), "odom"));
    }

    #[test]
    fn decode_hex_accepts_spaced_pairs() {
        assert_eq!(decode_hex("AA bb 01"), Some(vec![0xAA, 0xBB, 0x01]));
        assert_eq!(decode_hex(""), Some(Vec::new()));
        assert_eq!(decode_hex("abc"), None);
        assert_eq!(decode_hex("zz"), None);
    }

    #[test]
    fn publish_line_delivers_to_subscribers() {
        let registry = TopicRegistry::new();
        let odom = registry.create("odom", Some("chassis"), 8).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry
            .register_callback(
                &odom,
                Arc::new(move |call: CallContext, data: &[u8]| {
                    sink.lock().unwrap().push((call, data.to_vec()));
                }),
            )
            .unwrap();

        publish_line(&registry, "chassis/odom", "0102", true, CallContext::Interrupt).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(CallContext::Interrupt, vec![0x01, 0x02])]
        );
    }

    #[test]
    fn publish_line_rejects_unknown_topic() {
        let registry = TopicRegistry::new();
        let err = publish_line(&registry, "ghost", "x", false, CallContext::Thread).unwrap_err();
        assert!(matches!(err, LineError::Topic(TopicError::NotFound { .. })));
    }
}
