//! One-shot XChaCha20-Poly1305 sealing for data at rest (the encrypted
//! store's row payloads), as opposed to the ratcheting [`crate::stream`]
//! construction used for the live session.

use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

/// Errors from [`open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealError {
    /// The input was shorter than the fixed mac + nonce overhead.
    Truncated,
    /// Authentication failed: wrong key or tampered bytes.
    AuthenticationFailed,
}

impl std::fmt::Display for SealError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => write!(f, "sealed value shorter than the mac + nonce overhead"),
            Self::AuthenticationFailed => write!(f, "sealed value failed authentication"),
        }
    }
}
impl std::error::Error for SealError {}

/// Per-value overhead added by [`seal`]: a 16-byte Poly1305 MAC plus a
/// 24-byte random nonce.
pub const SEAL_OVERHEAD: usize = 16 + 24;

/// Encrypt `plaintext` under `key` with a freshly generated random nonce.
/// Output layout is `mac(16) || ciphertext || nonce(24)`, total length
/// `plaintext.len() + SEAL_OVERHEAD`.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; 24];
    getrandom::getrandom(&mut nonce_bytes).expect("getrandom failed");
    let nonce = XNonce::from_slice(&nonce_bytes);

    let mut buf = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(nonce, b"", &mut buf)
        .expect("encryption with a valid 32-byte key cannot fail");

    let mut out = Vec::with_capacity(tag.len() + buf.len() + nonce_bytes.len());
    out.extend_from_slice(&tag);
    out.extend_from_slice(&buf);
    out.extend_from_slice(&nonce_bytes);
    out
}

/// Reverse [`seal`].
pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, SealError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(SealError::Truncated);
    }

    let (mac, rest) = sealed.split_at(16);
    let (ciphertext, nonce_bytes) = rest.split_at(rest.len() - 24);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = XNonce::from_slice(nonce_bytes);

    let mut buf = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(nonce, b"", &mut buf, mac.into())
        .map_err(|_| SealError::AuthenticationFailed)?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [5u8; 32];
        let plaintext = b"a row of the encrypted store";
        let sealed = seal(&key, plaintext);
        assert_eq!(sealed.len(), plaintext.len() + SEAL_OVERHEAD);
        assert_eq!(open(&key, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(&[1u8; 32], b"secret");
        assert_eq!(open(&[2u8; 32], &sealed), Err(SealError::AuthenticationFailed));
    }

    #[test]
    fn truncated_input_rejected() {
        assert_eq!(open(&[0u8; 32], &[0u8; 10]), Err(SealError::Truncated));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [9u8; 32];
        let mut sealed = seal(&key, b"tamper me");
        let mid = sealed.len() / 2;
        sealed[mid] ^= 0x01;
        assert_eq!(open(&key, &sealed), Err(SealError::AuthenticationFailed));
    }
}
