//! Incremental Blake2b-256 hashing and password-derived key generation.

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;

use crate::HASH_SIZE;

/// Incremental Blake2b-256 hash state, used to fingerprint transferred files
/// without holding the whole file in memory.
pub struct HashState(Blake2bVar);

impl HashState {
    /// Start a new hash.
    pub fn init() -> Self {
        HashState(Blake2bVar::new(HASH_SIZE).expect("32 is a valid blake2b output size"))
    }

    /// Feed more bytes into the hash.
    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    /// Finish and return the 32-byte digest.
    pub fn finish(self) -> [u8; HASH_SIZE] {
        let mut out = [0u8; HASH_SIZE];
        self.0.finalize_variable(&mut out).expect("fixed-size buffer");
        out
    }
}

impl Default for HashState {
    fn default() -> Self {
        Self::init()
    }
}

/// Derive a 32-byte store key from the user's login password.
///
/// This is a single unkeyed Blake2b-256 pass over the password bytes: the
/// password never leaves the device and the threat model trusts its entropy,
/// so no salt is mixed in (see `DESIGN.md` for the explicit wire-compatibility
/// trade-off this implies).
pub fn derive_key_from_password(password: &[u8]) -> [u8; HASH_SIZE] {
    let mut state = HashState::init();
    state.update(password);
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_matches_single_shot() {
        let a = b"hello, ";
        let b = b"world!";

        let mut incremental = HashState::init();
        incremental.update(a);
        incremental.update(b);
        let multipart = incremental.finish();

        let mut combined = Vec::new();
        combined.extend_from_slice(a);
        combined.extend_from_slice(b);
        let mut single = HashState::init();
        single.update(&combined);
        let single = single.finish();

        assert_eq!(multipart, single);
    }

    #[test]
    fn password_derivation_is_deterministic() {
        let k1 = derive_key_from_password(b"hunter2");
        let k2 = derive_key_from_password(b"hunter2");
        assert_eq!(k1, k2);
        let k3 = derive_key_from_password(b"hunter3");
        assert_ne!(k1, k3);
    }
}
