//! Signing key verification and X25519 session key agreement.

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use ed25519_dalek::{Signature as Ed25519Signature, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::KEY_SIZE;

/// A raw 32-byte X25519 or Ed25519 public key, role determined by context.
pub type PublicKey = [u8; KEY_SIZE];
/// A raw 32-byte X25519 secret key.
pub type SecretKey = [u8; KEY_SIZE];
/// A detached Ed25519 signature.
pub type Signature = [u8; crate::SIGNATURE_SIZE];

/// Generate a fresh ephemeral X25519 keypair.
///
/// The secret half is returned as raw bytes so callers can hold it in their
/// own zeroize-on-drop wrapper. It's a `StaticSecret` rather than dalek's
/// single-use `EphemeralSecret` because the protocol needs to hold the
/// secret across several awaited network round-trips before performing the
/// Diffie-Hellman step.
pub fn keypair() -> (PublicKey, SecretKey) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = X25519PublicKey::from(&secret);
    (*public.as_bytes(), secret.to_bytes())
}

/// Verify a detached Ed25519 signature over `message` under `public_key`.
///
/// Returns `false` (never panics) on a malformed key or signature.
pub fn sign_verify(public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = Ed25519Signature::from_bytes(signature);
    vk.verify(message, &sig).is_ok()
}

/// Generate a fresh Ed25519 signing keypair (used by the reference in-process
/// server harness and by tests; a deployed client only ever verifies against
/// a pinned key, it never signs).
pub fn generate_signing_keypair() -> (PublicKey, SigningKey) {
    let sk = SigningKey::generate(&mut OsRng);
    (sk.verifying_key().to_bytes(), sk)
}

/// Sign `message` with `secret_key`, producing a detached signature.
pub fn sign(secret_key: &SigningKey, message: &[u8]) -> Signature {
    use ed25519_dalek::Signer;
    secret_key.sign(message).to_bytes()
}

/// The two keys derived from an X25519 Diffie-Hellman exchange: one for
/// receiving, one for transmitting.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DerivedKeys {
    pub rx: [u8; 32],
    pub tx: [u8; 32],
}

impl DerivedKeys {
    /// Derive session keys playing the client role.
    ///
    /// The client's `tx` key must equal the server's `rx` key (and vice
    /// versa) when both sides run this on the same public keys — see
    /// [`DerivedKeys::as_server`].
    pub fn as_client(their_pk: &PublicKey, our_pk: &PublicKey, our_sk: &SecretKey) -> Self {
        let (first, second) = shared_halves(their_pk, our_sk, our_pk, their_pk);
        DerivedKeys { rx: first, tx: second }
    }

    /// Derive session keys playing the server role (same inputs, opposite
    /// role — the KDF output halves are swapped relative to the client).
    pub fn as_server(their_pk: &PublicKey, our_pk: &PublicKey, our_sk: &SecretKey) -> Self {
        let (first, second) = shared_halves(their_pk, our_sk, their_pk, our_pk);
        DerivedKeys { rx: second, tx: first }
    }
}

/// Compute the X25519 shared secret and mix it with both public keys
/// (ordered `client_pk || server_pk`, regardless of which side is calling)
/// through Blake2b to produce two 32-byte halves.
///
/// Keeping the public-key ordering fixed regardless of caller role is what
/// makes the role asymmetry meaningful: both sides compute the identical
/// 64-byte digest, and only differ in which half they call `rx` vs `tx`.
fn shared_halves(
    their_pk: &PublicKey,
    our_sk: &SecretKey,
    client_pk: &PublicKey,
    server_pk: &PublicKey,
) -> ([u8; 32], [u8; 32]) {
    let our_secret = StaticSecret::from(*our_sk);
    let their_public = X25519PublicKey::from(*their_pk);
    let shared = our_secret.diffie_hellman(&their_public);

    let mut hasher = Blake2bVar::new(64).expect("64 is a valid blake2b output size");
    hasher.update(shared.as_bytes());
    hasher.update(client_pk);
    hasher.update(server_pk);
    let mut out = [0u8; 64];
    hasher.finalize_variable(&mut out).expect("fixed-size buffer");

    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    first.copy_from_slice(&out[..32]);
    second.copy_from_slice(&out[32..]);
    (first, second)
}
