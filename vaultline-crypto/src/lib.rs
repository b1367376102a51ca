//! Cryptographic primitives for vaultline's secure transport.
//!
//! Provides:
//! - Ed25519 signing / verification (the server's long-term identity key)
//! - X25519 ephemeral key agreement with role-sensitive session key derivation
//! - A ratcheting XChaCha20-Poly1305 stream construction for per-direction framing
//! - One-shot sealing for data at rest
//! - Blake2b-256 hashing (file fingerprints, password-derived keys)
//! - PKCS#7-style padding for plaintext bodies
//!
//! None of this is a general-purpose crypto library: every primitive here
//! exists because a specific part of the session protocol needs exactly it.

#![deny(unsafe_code)]

mod b64;
mod hash;
mod keys;
mod pad;
mod seal;
mod stream;

pub use b64::{decode as base64_decode, encode as base64_encode, DecodeError as Base64DecodeError};
pub use hash::{derive_key_from_password, HashState};
pub use keys::{generate_signing_keypair, keypair, sign, sign_verify, DerivedKeys, PublicKey, SecretKey, Signature};
pub use pad::{pad, unpad, PadError};
pub use seal::{open, seal, SealError};
pub use stream::{stream_init_pull, stream_init_push, stream_pull, stream_push, StreamError, StreamState};

/// Size in bytes of an X25519 public key, also used for the signing key and
/// for the `crypto key size` referenced throughout the session protocol.
pub const KEY_SIZE: usize = 32;

/// Size in bytes of a detached Ed25519 signature.
pub const SIGNATURE_SIZE: usize = 64;

/// Size in bytes of a stream header (the nonce root handed to the peer).
pub const STREAM_HEADER_SIZE: usize = 24;

/// Per-message AEAD overhead added by [`stream::stream_push`]: one tag byte
/// plus a 16-byte Poly1305 MAC.
pub const STREAM_OVERHEAD: usize = 17;

/// Size in bytes of one direction's persisted stream state.
pub const STREAM_STATE_SIZE: usize = stream::STREAM_STATE_SIZE;

/// Size in bytes of both directions' persisted stream state, concatenated.
pub const STREAMS_STATES_SIZE: usize = STREAM_STATE_SIZE * 2;

/// Output size of [`hash::HashState`] and [`derive_key_from_password`].
pub const HASH_SIZE: usize = 32;
