//! Client↔server handshake: establishes the stream-ratchet state that every
//! subsequent frame on the socket is encrypted under.
//!
//! Strictly sequential — this runs once, before the network task starts its
//! read loop, and nothing else touches the socket while it's in progress.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use vaultline_crypto::{
    keypair, sign_verify, stream_init_pull, stream_init_push, DerivedKeys, PublicKey, Signature,
    StreamState, KEY_SIZE, SIGNATURE_SIZE, STREAM_HEADER_SIZE,
};

use crate::errors::{ProtocolError, SessionError};

/// The two stream-ratchet states a completed handshake leaves behind: one to
/// encrypt frames bound for the server, one to decrypt frames from it.
pub struct ServerStreams {
    pub push: StreamState,
    pub pull: StreamState,
}

/// Run the handshake over an already-connected socket.
///
/// `server_signing_key` is the long-term identity key pinned in
/// configuration; every signed value the server sends is checked against it.
pub async fn perform<S>(stream: &mut S, server_signing_key: &PublicKey) -> Result<ServerStreams, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // 1. Server's signed ephemeral public key.
    let mut buf = [0u8; SIGNATURE_SIZE + KEY_SIZE];
    stream.read_exact(&mut buf).await?;
    let signature: Signature = buf[..SIGNATURE_SIZE].try_into().unwrap();
    let server_ephemeral_pk: PublicKey = buf[SIGNATURE_SIZE..].try_into().unwrap();

    if server_ephemeral_pk == [0u8; KEY_SIZE] {
        return Err(ProtocolError::ServerOriginNotVerified.into());
    }
    if !sign_verify(server_signing_key, &signature, &server_ephemeral_pk) {
        return Err(ProtocolError::ServerOriginNotVerified.into());
    }

    // 2. Our ephemeral keypair, client-role session keys.
    let (client_pk, client_sk) = keypair();
    let derived = DerivedKeys::as_client(&server_ephemeral_pk, &client_pk, &client_sk);

    // 3. Send our public key.
    stream.write_all(&client_pk).await?;

    // 4. Server's signed stream header.
    let mut buf = [0u8; SIGNATURE_SIZE + STREAM_HEADER_SIZE];
    stream.read_exact(&mut buf).await?;
    let signature: Signature = buf[..SIGNATURE_SIZE].try_into().unwrap();
    let header = &buf[SIGNATURE_SIZE..];
    if !sign_verify(server_signing_key, &signature, header) {
        return Err(ProtocolError::ServerOriginNotVerified.into());
    }
    let pull = stream_init_pull(&derived.rx, header)?;

    // 5. Our stream header, sent in the clear: a deployed client never signs,
    // it only verifies, so there is nothing further to authenticate here.
    let (push, our_header) = stream_init_push(&derived.tx);
    stream.write_all(&our_header).await?;

    Ok(ServerStreams { push, pull })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_crypto::{generate_signing_keypair, sign};

    /// Drives both sides of the handshake over an in-memory duplex pipe,
    /// proving the client and a hand-rolled reference server land on
    /// reciprocal stream states.
    #[tokio::test]
    async fn handshake_establishes_reciprocal_streams() {
        let (mut client_side, mut server_side) = tokio::io::duplex(4096);
        let (signing_pk, signing_sk) = generate_signing_keypair();

        let server_task = tokio::spawn(async move {
            let (server_eph_pk, server_eph_sk) = keypair();
            let sig = sign(&signing_sk, &server_eph_pk);
            server_side.write_all(&sig).await.unwrap();
            server_side.write_all(&server_eph_pk).await.unwrap();

            let mut client_pk = [0u8; KEY_SIZE];
            server_side.read_exact(&mut client_pk).await.unwrap();
            let derived = DerivedKeys::as_server(&client_pk, &server_eph_pk, &server_eph_sk);

            let (server_push, header) = stream_init_push(&derived.tx);
            let header_sig = sign(&signing_sk, &header);
            server_side.write_all(&header_sig).await.unwrap();
            server_side.write_all(&header).await.unwrap();

            let mut client_header = [0u8; STREAM_HEADER_SIZE];
            server_side.read_exact(&mut client_header).await.unwrap();
            let server_pull = stream_init_pull(&derived.rx, &client_header).unwrap();

            (server_push, server_pull)
        });

        let client_streams = perform(&mut client_side, &signing_pk).await.unwrap();
        let (mut server_push, mut server_pull) = server_task.await.unwrap();

        let mut client_push = client_streams.push;
        let mut client_pull = client_streams.pull;

        let ct = vaultline_crypto::stream_push(&mut client_push, b"hello server");
        assert_eq!(vaultline_crypto::stream_pull(&mut server_pull, &ct).unwrap(), b"hello server");

        let ct = vaultline_crypto::stream_push(&mut server_push, b"hello client");
        assert_eq!(vaultline_crypto::stream_pull(&mut client_pull, &ct).unwrap(), b"hello client");
    }

    #[tokio::test]
    async fn all_zero_ephemeral_key_is_rejected_as_denial_of_service() {
        let (mut client_side, mut server_side) = tokio::io::duplex(4096);
        let (signing_pk, signing_sk) = generate_signing_keypair();

        tokio::spawn(async move {
            let zero_key = [0u8; KEY_SIZE];
            let sig = sign(&signing_sk, &zero_key);
            let _ = server_side.write_all(&sig).await;
            let _ = server_side.write_all(&zero_key).await;
        });

        let result = perform(&mut client_side, &signing_pk).await;
        assert!(matches!(result, Err(SessionError::Protocol(ProtocolError::ServerOriginNotVerified))));
    }
}
