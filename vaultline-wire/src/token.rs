//! 64-byte authentication tokens carried in every frame header.

use vaultline_crypto::{sign_verify, PublicKey, Signature};

/// A 64-byte authentication token.
pub type Token = [u8; TOKEN_SIZE];

/// Wire size of a token.
pub const TOKEN_SIZE: usize = 64;

/// A token with no session established yet (pre-login outbound frames).
pub const ANONYMOUS: Token = [0u8; TOKEN_SIZE];

/// The fixed message a server-origin token's trailing signature is verified
/// against: eight `0xff` bytes.
const SERVER_ORIGIN_MESSAGE: [u8; 8] = [0xff; 8];

/// Check whether `token`'s trailing 16 bytes, read as a detached signature
/// over [`SERVER_ORIGIN_MESSAGE`], verify under `server_signing_key`.
///
/// Frames whose `from` field is the server-origin sentinel must carry a
/// token satisfying this; the session layer drops the connection otherwise.
pub fn verify_server_origin(token: &Token, server_signing_key: &PublicKey) -> bool {
    // A detached Ed25519 signature is 64 bytes, so it occupies the entire
    // token rather than some shorter trailing slice (see DESIGN.md for why
    // this is the only arithmetic consistent with the signature scheme in
    // use here).
    let signature: Signature = *token;
    sign_verify(server_signing_key, &signature, &SERVER_ORIGIN_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_crypto::{generate_signing_keypair, sign};

    #[test]
    fn accepts_a_correctly_signed_token() {
        let (pk, sk) = generate_signing_keypair();
        let token: Token = sign(&sk, &SERVER_ORIGIN_MESSAGE);
        assert!(verify_server_origin(&token, &pk));
    }

    #[test]
    fn rejects_a_token_signed_by_the_wrong_key() {
        let (_pk, sk) = generate_signing_keypair();
        let (other_pk, _other_sk) = generate_signing_keypair();
        let token: Token = sign(&sk, &SERVER_ORIGIN_MESSAGE);
        assert!(!verify_server_origin(&token, &other_pk));
    }

    #[test]
    fn anonymous_token_never_verifies() {
        let (pk, _sk) = generate_signing_keypair();
        assert!(!verify_server_origin(&ANONYMOUS, &pk));
    }
}
