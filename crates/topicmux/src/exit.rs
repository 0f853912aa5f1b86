use std::fmt;
use std::io;

use topicmux_client::ClientError;
use topicmux_frame::FrameError;
use topicmux_topic::TopicError;
use topicmux_transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CONFIG_INVALID: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const NOT_FOUND: i32 = 66;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::NotFound(_) => CliError::new(NOT_FOUND, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn topic_error(context: &str, err: TopicError) -> CliError {
    match err {
        TopicError::NotFound { .. } => CliError::new(NOT_FOUND, format!("{context}: {err}")),
        TopicError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(CONFIG_INVALID, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::InvalidConfig(_) | ClientError::ConfigParse(_) | ClientError::Queue(_) => {
            CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
        }
        ClientError::ConfigRead { source, path } => {
            io_error(&format!("{context}: {}", path.display()), source)
        }
        ClientError::TopicNotFound { .. } | ClientError::TransportNotFound(_) => {
            CliError::new(NOT_FOUND, format!("{context}: {err}"))
        }
        ClientError::Topic(err) => topic_error(context, err),
        ClientError::Transport(err) => transport_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_topic_maps_to_not_found() {
        let err = client_error(
            "start failed",
            ClientError::TopicNotFound {
                name: "imu".to_string(),
                namespace: "default".to_string(),
            },
        );
        assert_eq!(err.code, NOT_FOUND);
        assert!(err.message.starts_with("start failed: "));
    }

    #[test]
    fn invalid_config_maps_to_config_code() {
        let err = client_error("config", ClientError::InvalidConfig("bad".to_string()));
        assert_eq!(err.code, CONFIG_INVALID);
    }

    #[test]
    fn connect_refused_maps_through_io_kind() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                path: "/tmp/x.sock".into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn truncated_stream_is_invalid_data() {
        let err = frame_error(
            "decode failed",
            FrameError::Truncated {
                expected: 8,
                available: 3,
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }
}
