use std::io::{ErrorKind, Write};

use crate::error::{Result, TransportError};

/// How long a write waits for the bytes to leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Hand the bytes over and flush before returning.
    Blocking,
    /// Hand the bytes over and return without waiting for completion.
    FireAndForget,
}

/// A byte sink the transmitter writes framed output into.
pub trait Transport: Send {
    /// Write all of `bytes` to the transport.
    fn write(&mut self, bytes: &[u8], mode: WriteMode) -> Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &str {
        "transport"
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8], mode: WriteMode) -> Result<()> {
        (**self).write(bytes, mode)
    }

    fn transport_name(&self) -> &str {
        (**self).transport_name()
    }
}

/// Adapts any [`Write`] stream (serial device file, socket, stdout) into a
/// [`Transport`].
pub struct StreamTransport<W> {
    inner: W,
    name: String,
}

impl<W: Write + Send> StreamTransport<W> {
    /// Wrap a stream under a diagnostic name.
    pub fn new(name: impl Into<String>, inner: W) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the transport and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Retries only `Interrupted`. A `WouldBlock` from a non-blocking sink is
    /// surfaced so the caller can drop the batch and keep going.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<W: Write + Send> Transport for StreamTransport<W> {
    fn write(&mut self, bytes: &[u8], mode: WriteMode) -> Result<()> {
        self.write_all(bytes)?;
        if mode == WriteMode::Blocking {
            self.flush()?;
        }
        Ok(())
    }

    fn transport_name(&self) -> &str {
        &self.name
    }
}
