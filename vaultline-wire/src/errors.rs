//! Errors produced while packing, unpacking or transporting a [`crate::Frame`].

use vaultline_crypto::StreamError;

use crate::cursor::Underrun;

/// Anything that can go wrong turning bytes into a [`crate::Frame`] or back.
#[derive(Debug)]
pub enum WireError {
    /// The buffer handed to `unpack` wasn't exactly [`crate::FRAME_SIZE`] bytes,
    /// or ran out while reading a fixed-width field.
    Truncated,
    /// The frame's `flag` field isn't one of [`crate::Flag`]'s known values.
    UnknownFlag(i32),
    /// `size` claims more valid body bytes than the body actually holds.
    BodySizeOutOfRange { size: u32, body_len: usize },
    /// Stream decryption of an encrypted frame failed.
    Decrypt(StreamError),
}

impl From<Underrun> for WireError {
    fn from(_: Underrun) -> Self {
        WireError::Truncated
    }
}

impl From<StreamError> for WireError {
    fn from(e: StreamError) -> Self {
        WireError::Decrypt(e)
    }
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => write!(f, "frame buffer is the wrong length"),
            Self::UnknownFlag(v) => write!(f, "unknown frame flag 0x{v:08x}"),
            Self::BodySizeOutOfRange { size, body_len } => {
                write!(f, "frame claims size {size} but body is only {body_len} bytes")
            }
            Self::Decrypt(e) => write!(f, "frame decryption failed: {e}"),
        }
    }
}
impl std::error::Error for WireError {}
