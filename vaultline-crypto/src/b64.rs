//! Thin wrapper around the `base64` crate's standard alphabet, used by the
//! config file's `credentials` field to carry a sealed blob in a line-
//! oriented text format.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Errors from [`decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError;

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid base64")
    }
}
impl std::error::Error for DecodeError {}

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(text.trim()).map_err(|_| DecodeError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let bytes = b"seal(derive_key(host_id), username password)";
        assert_eq!(decode(&encode(bytes)).unwrap(), bytes);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode("not valid base64!!").is_err());
    }
}
