//! Multiplex publish/subscribe topics onto a single serial byte stream.
//!
//! Updates published on any subscribed topic are framed with a topic
//! identifier and a length, funneled through one shared lock-free queue and
//! written to a single transport by one transmitter thread.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-sink abstraction (streams, Unix sockets, memory)
//! - [`frame`]: `[identifier][length][payload]` framing
//! - [`topic`]: in-process topic registry with CRC-32 identifiers
//! - [`client`]: the fan-in client itself (behind the `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use topicmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use topicmux_frame::*;
}

/// Re-export topic registry types.
pub mod topic {
    pub use topicmux_topic::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use topicmux_client::*;
}
