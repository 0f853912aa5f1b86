//! Fixed-header topic framing for multiplexed serial streams.
//!
//! Every topic update is framed with:
//! - A 4-byte little-endian topic identifier
//! - A 4-byte little-endian payload length
//!
//! Frames are written back-to-back with no delimiter; a receiver always reads
//! the header first to learn the length of the payload that follows.

pub mod codec;
pub mod error;

pub use codec::{
    decode_frame, decode_stream, encode_frame, pack_frame, packed_len, Frame, FrameHeader,
    HEADER_SIZE,
};
pub use error::{FrameError, Result};
