/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream ended in the middle of a frame.
    #[error("truncated frame ({available} of {expected} bytes)")]
    Truncated { expected: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
