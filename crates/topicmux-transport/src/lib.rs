//! Byte-stream transport abstraction for the topicmux transmitter.
//!
//! A transport is anything that accepts raw bytes: a serial port opened as a
//! file, a Unix domain socket, stdout, or an in-memory capture buffer.
//! Transports are looked up by name in a [`TransportRegistry`] when a client
//! is constructed.
//!
//! This is the lowest layer of topicmux. Only the transmitter worker ever
//! writes to a transport.

pub mod error;
pub mod memory;
pub mod registry;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use registry::TransportRegistry;
pub use traits::{StreamTransport, Transport, WriteMode};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
