//! PKCS#7-style length-suffix padding for message plaintexts.
//!
//! Messages are padded up to a multiple of [`BLOCK_SIZE`] bytes before being
//! handed to the stream cipher, so ciphertext lengths don't leak the exact
//! plaintext length to an observer watching frame sizes on the wire.

/// Padding block size in bytes.
pub const BLOCK_SIZE: usize = 8;

/// Errors from [`unpad`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadError {
    /// The input was empty, or its trailing pad count was zero, larger than
    /// the input, or larger than [`BLOCK_SIZE`] — none of which a value
    /// produced by [`pad`] can ever be.
    NotPadded,
}

impl std::fmt::Display for PadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "input is not validly padded")
    }
}
impl std::error::Error for PadError {}

/// Pad `plaintext` to a multiple of [`BLOCK_SIZE`] bytes, appending a trailing
/// byte count in `1..=BLOCK_SIZE` that records how many padding bytes were
/// added (always at least one, even if `plaintext.len()` is already aligned).
pub fn pad(plaintext: &[u8]) -> Vec<u8> {
    let remainder = plaintext.len() % BLOCK_SIZE;
    let pad_len = BLOCK_SIZE - remainder;

    let mut out = Vec::with_capacity(plaintext.len() + pad_len);
    out.extend_from_slice(plaintext);
    out.resize(out.len() + pad_len, pad_len as u8);
    out
}

/// Reverse [`pad`], stripping the trailing padding bytes.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>, PadError> {
    let &pad_len = padded.last().ok_or(PadError::NotPadded)?;
    let pad_len = pad_len as usize;

    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > padded.len() {
        return Err(PadError::NotPadded);
    }

    let split = padded.len() - pad_len;
    if padded[split..].iter().any(|&b| b as usize != pad_len) {
        return Err(PadError::NotPadded);
    }

    Ok(padded[..split].to_vec())
}
