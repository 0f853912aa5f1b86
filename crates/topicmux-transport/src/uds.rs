use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::StreamTransport;

/// Unix domain socket transport.
///
/// Connects to a listening socket (for example a serial bridge or a capture
/// tool) and exposes it as a [`StreamTransport`].
pub struct UnixDomainSocket;

impl UnixDomainSocket {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<StreamTransport<UnixStream>> {
        let path = path.as_ref();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path: path.to_path_buf(),
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to unix domain socket");
        Ok(StreamTransport::new(
            format!("uds:{}", path.display()),
            stream,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixListener;

    use super::*;
    use crate::traits::{Transport, WriteMode};

    #[test]
    fn test_connect_and_write() {
        let dir = std::env::temp_dir().join(format!("topicmux-uds-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("sink.sock");
        let _ = std::fs::remove_file(&sock_path);
        let listener = UnixListener::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let handle = std::thread::spawn(move || {
            let mut transport = UnixDomainSocket::connect(&path_clone).unwrap();
            transport.write(b"hello", WriteMode::Blocking).unwrap();
        });

        let (mut server, _) = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixDomainSocket::connect(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn test_connect_missing_socket() {
        let path = std::env::temp_dir().join(format!(
            "topicmux-missing-{}.sock",
            std::process::id()
        ));
        let result = UnixDomainSocket::connect(&path);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
