//! Error types for the session protocol.
//!
//! One small enum per concern, plus a crate-wide [`SessionError`] that wraps
//! all of them — mirroring the split between a narrow `RpcError` and the
//! umbrella `InvocationError` this crate's teacher used for its own protocol.

use std::{fmt, io};

use vaultline_crypto::{SealError, StreamError};
use vaultline_wire::WireError;
use vaultline_store::StoreError;

/// A blocking step of the protocol (handshake, login, peer setup) didn't
/// complete within its allotted window.
#[derive(Debug)]
pub struct TimeoutError {
    pub step: &'static str,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timed out waiting for {}", self.step)
    }
}
impl std::error::Error for TimeoutError {}

/// The peer or server violated the protocol: an unexpected flag, a size
/// mismatch, a token that doesn't match, or a state-machine transition that
/// isn't legal from the current state.
#[derive(Debug)]
pub enum ProtocolError {
    UnexpectedFlag { expected: &'static str, got: i32 },
    SizeMismatch { expected: usize, got: usize },
    IllegalTransition { from: &'static str, event: &'static str },
    ServerOriginNotVerified,
    FileTooLarge { limit: u64, actual: u64 },
    FileHashMismatch,
    MessageTooLong { limit: usize, actual: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedFlag { expected, got } => {
                write!(f, "expected {expected}, got flag 0x{got:08x}")
            }
            Self::SizeMismatch { expected, got } => {
                write!(f, "expected {expected} bytes, got {got}")
            }
            Self::IllegalTransition { from, event } => {
                write!(f, "{event} is not legal from state {from}")
            }
            Self::ServerOriginNotVerified => write!(f, "server-origin frame failed token verification"),
            Self::FileTooLarge { limit, actual } => {
                write!(f, "file of {actual} bytes exceeds the {limit}-byte limit")
            }
            Self::FileHashMismatch => write!(f, "transferred file's content hash didn't match the invite"),
            Self::MessageTooLong { limit, actual } => {
                write!(f, "message of {actual} bytes exceeds the {limit}-byte per-frame limit")
            }
        }
    }
}
impl std::error::Error for ProtocolError {}

/// The single error type returned from session protocol operations.
#[derive(Debug)]
pub enum SessionError {
    Io(io::Error),
    Crypto(StreamError),
    Seal(SealError),
    Wire(WireError),
    Store(StoreError),
    Protocol(ProtocolError),
    Timeout(TimeoutError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Crypto(e) => write!(f, "crypto error: {e}"),
            Self::Seal(e) => write!(f, "seal error: {e}"),
            Self::Wire(e) => write!(f, "wire error: {e}"),
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Timeout(e) => write!(f, "{e}"),
        }
    }
}
impl std::error::Error for SessionError {}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}
impl From<StreamError> for SessionError {
    fn from(e: StreamError) -> Self { Self::Crypto(e) }
}
impl From<SealError> for SessionError {
    fn from(e: SealError) -> Self { Self::Seal(e) }
}
impl From<WireError> for SessionError {
    fn from(e: WireError) -> Self { Self::Wire(e) }
}
impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self { Self::Store(e) }
}
impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self { Self::Protocol(e) }
}
impl From<TimeoutError> for SessionError {
    fn from(e: TimeoutError) -> Self { Self::Timeout(e) }
}
