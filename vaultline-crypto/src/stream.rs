//! A ratcheting XChaCha20-Poly1305 stream construction.
//!
//! Modeled on libsodium's `crypto_secretstream_xchacha20poly1305`: a 24-byte
//! header is exchanged once, each side derives its own 52-byte stream state
//! from it, and every subsequent message is encrypted against a nonce that
//! advances a counter held inside the state. Decrypting with a counter that
//! doesn't match the sender's exactly fails — this is what makes out-of-order,
//! duplicated or dropped frames unrecoverable (the "ratchet" property the
//! session protocol depends on for ordering, see the crate-level docs in
//! `vaultline-session`).

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::Zeroize;

use crate::{STREAM_HEADER_SIZE, STREAM_OVERHEAD};

/// Size in bytes of one direction's persisted stream state: a 32-byte
/// derived subkey, a 16-byte nonce root and a 4-byte little-endian counter.
pub const STREAM_STATE_SIZE: usize = 32 + 16 + 4;

/// Errors from [`stream_init_pull`] and [`stream_pull`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// The header handed to `stream_init_pull` wasn't exactly
    /// [`crate::STREAM_HEADER_SIZE`] bytes.
    InvalidHeader,
    /// The ciphertext was shorter than [`crate::STREAM_OVERHEAD`].
    CiphertextTooShort,
    /// Authentication failed: wrong key, wrong counter, or tampered bytes.
    AuthenticationFailed,
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidHeader => write!(f, "stream header has the wrong length"),
            Self::CiphertextTooShort => write!(f, "ciphertext shorter than the AEAD overhead"),
            Self::AuthenticationFailed => write!(f, "stream authentication failed"),
        }
    }
}
impl std::error::Error for StreamError {}

/// One direction (encryption or decryption) of a per-peer stream.
///
/// Opaque on purpose: callers persist it via [`StreamState::to_bytes`] /
/// [`StreamState::from_bytes`] and never inspect the fields directly.
#[derive(Clone, Zeroize)]
pub struct StreamState {
    subkey: [u8; 32],
    nonce_root: [u8; 16],
    counter: u32,
}

impl StreamState {
    /// Serialize to the fixed [`STREAM_STATE_SIZE`]-byte representation
    /// persisted in the encrypted store.
    pub fn to_bytes(&self) -> [u8; STREAM_STATE_SIZE] {
        let mut out = [0u8; STREAM_STATE_SIZE];
        out[..32].copy_from_slice(&self.subkey);
        out[32..48].copy_from_slice(&self.nonce_root);
        out[48..52].copy_from_slice(&self.counter.to_le_bytes());
        out
    }

    /// Restore a state previously produced by [`StreamState::to_bytes`].
    pub fn from_bytes(bytes: &[u8; STREAM_STATE_SIZE]) -> Self {
        let mut subkey = [0u8; 32];
        let mut nonce_root = [0u8; 16];
        subkey.copy_from_slice(&bytes[..32]);
        nonce_root.copy_from_slice(&bytes[32..48]);
        let counter = u32::from_le_bytes(bytes[48..52].try_into().unwrap());
        StreamState { subkey, nonce_root, counter }
    }

    fn nonce_for(&self, counter: u32) -> XNonce {
        let mut bytes = [0u8; 24];
        bytes[..16].copy_from_slice(&self.nonce_root);
        bytes[16..20].copy_from_slice(&counter.to_le_bytes());
        // remaining 4 bytes stay zero: the header is unique per conversation
        // direction and the counter never wraps within a conversation's life.
        XNonce::clone_from_slice(&bytes)
    }
}

fn derive_subkey(key: &[u8; 32], header: &[u8; STREAM_HEADER_SIZE]) -> [u8; 32] {
    let mut hasher = Blake2bVar::new(32).expect("32 is a valid blake2b output size");
    hasher.update(key);
    hasher.update(header);
    let mut out = [0u8; 32];
    hasher.finalize_variable(&mut out).expect("fixed-size buffer");
    out
}

/// Initialize an encryption stream under `key`, returning the state and the
/// 24-byte header to hand to the peer's [`stream_init_pull`].
pub fn stream_init_push(key: &[u8; 32]) -> (StreamState, [u8; STREAM_HEADER_SIZE]) {
    let mut header = [0u8; STREAM_HEADER_SIZE];
    getrandom::getrandom(&mut header).expect("getrandom failed");

    let subkey = derive_subkey(key, &header);
    let mut nonce_root = [0u8; 16];
    nonce_root.copy_from_slice(&header[..16]);

    (StreamState { subkey, nonce_root, counter: 0 }, header)
}

/// Initialize a decryption stream under `key` from a header received from
/// the peer's [`stream_init_push`]. `header` must be exactly
/// [`STREAM_HEADER_SIZE`] bytes.
pub fn stream_init_pull(key: &[u8; 32], header: &[u8]) -> Result<StreamState, StreamError> {
    let header: &[u8; STREAM_HEADER_SIZE] =
        header.try_into().map_err(|_| StreamError::InvalidHeader)?;

    let subkey = derive_subkey(key, header);
    let mut nonce_root = [0u8; 16];
    nonce_root.copy_from_slice(&header[..16]);
    Ok(StreamState { subkey, nonce_root, counter: 0 })
}

/// Encrypt `plaintext`, advancing `state` in place. Output length is always
/// exactly `plaintext.len() + STREAM_OVERHEAD`.
pub fn stream_push(state: &mut StreamState, plaintext: &[u8]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&state.subkey));
    let nonce = state.nonce_for(state.counter);

    // A one-byte message tag precedes the plaintext inside the AEAD
    // boundary, mirroring the libsodium construction this is modeled on;
    // this implementation only ever uses the "message" tag (0x00).
    let mut buf = Vec::with_capacity(1 + plaintext.len() + 16);
    buf.push(0u8);
    buf.extend_from_slice(plaintext);

    let tag = cipher
        .encrypt_in_place_detached(&nonce, b"", &mut buf)
        .expect("encryption with a valid 32-byte key cannot fail");
    buf.extend_from_slice(&tag);

    state.counter = state.counter.wrapping_add(1);
    buf
}

/// Decrypt `ciphertext` produced by the peer's [`stream_push`], advancing
/// `state` in place. Fails if the counter implied by the bytes doesn't match
/// the next expected value, or if authentication fails for any other reason
/// — this is the ratchet: out-of-order or replayed frames never decrypt.
pub fn stream_pull(state: &mut StreamState, ciphertext: &[u8]) -> Result<Vec<u8>, StreamError> {
    if ciphertext.len() < STREAM_OVERHEAD {
        return Err(StreamError::CiphertextTooShort);
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&state.subkey));
    let nonce = state.nonce_for(state.counter);

    let (body, tag) = ciphertext.split_at(ciphertext.len() - 16);
    let mut buf = body.to_vec();

    cipher
        .decrypt_in_place_detached(&nonce, b"", &mut buf, tag.into())
        .map_err(|_| StreamError::AuthenticationFailed)?;

    if buf.is_empty() {
        return Err(StreamError::AuthenticationFailed);
    }
    let plaintext = buf[1..].to_vec();
    state.counter = state.counter.wrapping_add(1);
    Ok(plaintext)
}
