use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: identifier (4) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Total framed size of a payload of `payload_len` bytes.
pub const fn packed_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len
}

/// A decoded topic frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identifier of the topic this update belongs to.
    pub identifier: u32,
    /// The update payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(identifier: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            identifier,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        packed_len(self.payload.len())
    }
}

/// The fixed-size header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub identifier: u32,
    pub payload_len: u32,
}

impl FrameHeader {
    /// Parse a header from the first [`HEADER_SIZE`] bytes of `src`.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn parse(mut src: &[u8]) -> Option<Self> {
        if src.len() < HEADER_SIZE {
            return None;
        }
        let identifier = src.get_u32_le();
        let payload_len = src.get_u32_le();
        Some(Self {
            identifier,
            payload_len,
        })
    }
}

/// Pack a payload into `dst` and return the number of bytes written.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬─────────────────┐
/// │ Identifier   │ Length       │ Payload         │
/// │ (4B LE)      │ (4B LE)      │ (Length bytes)  │
/// └──────────────┴──────────────┴─────────────────┘
/// ```
///
/// Never allocates. `dst` must hold at least `payload.len() + HEADER_SIZE`
/// bytes; a shorter buffer is a caller bug and panics.
pub fn pack_frame(identifier: u32, dst: &mut [u8], payload: &[u8]) -> usize {
    debug_assert!(payload.len() <= u32::MAX as usize);
    let total = packed_len(payload.len());
    let mut cursor = &mut dst[..total];
    cursor.put_u32_le(identifier);
    cursor.put_u32_le(payload.len() as u32);
    cursor.put_slice(payload);
    total
}

/// Encode a frame onto the end of a growable buffer.
pub fn encode_frame(identifier: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(packed_len(payload.len()));
    dst.put_u32_le(identifier);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(header) = FrameHeader::parse(&src[..]) else {
        return Ok(None);
    };

    let payload_len = header.payload_len as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < packed_len(payload_len) {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame {
        identifier: header.identifier,
        payload,
    }))
}

/// Split a captured byte stream into its frames.
///
/// Fails with [`FrameError::Truncated`] if the stream ends mid-frame.
pub fn decode_stream(bytes: &[u8], max_payload: usize) -> Result<Vec<Frame>> {
    let mut src = BytesMut::from(bytes);
    let mut frames = Vec::new();
    while let Some(frame) = decode_frame(&mut src, max_payload)? {
        frames.push(frame);
    }
    if !src.is_empty() {
        let expected = FrameHeader::parse(&src)
            .map(|header| packed_len(header.payload_len as usize))
            .unwrap_or(HEADER_SIZE);
        return Err(FrameError::Truncated {
            expected,
            available: src.len(),
        });
    }
    Ok(frames)
}
