//! Peer conversation setup: the 4-message key and stream-header exchange
//! relayed through the server between two clients.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use vaultline_crypto::{keypair, stream_init_pull, stream_init_push, DerivedKeys, PublicKey, SecretKey, StreamState};
use vaultline_wire::{Flag, Frame, Token};

use crate::errors::{ProtocolError, SessionError, TimeoutError};

const SETUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Guards against two conversation setups running concurrently: while one is
/// in flight, ordinary `PROCEED` relay traffic for the upper layer must be
/// held back rather than interpreted (see the session orchestrator).
#[derive(Default)]
pub struct SettingUpGuard(AtomicBool);

impl SettingUpGuard {
    /// Attempt to take the guard. Returns `false` if setup is already in
    /// progress.
    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The stream-ratchet state established between two peers once setup
/// completes.
pub struct PeerCrypto {
    pub push: StreamState,
    pub pull: StreamState,
}

/// One side of the relayed channel to a specific peer: an outbound sink that
/// hands frames to the network task, and an inbound queue the orchestrator
/// has already demultiplexed to frames from this peer.
pub struct PeerLink {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::Receiver<Frame>,
    pub self_id: u32,
    pub peer_id: u32,
    pub token: Token,
}

impl PeerLink {
    fn send(&self, flag: Flag, body: Vec<u8>) -> Result<(), SessionError> {
        let frame = Frame::single(flag, now_ms(), self.self_id, self.peer_id, self.token, body);
        self.outbound
            .send(frame)
            .map_err(|_| SessionError::from(ProtocolError::IllegalTransition {
                from: "peer link",
                event: "network task is gone",
            }))
    }

    async fn expect(&mut self, flag: Flag) -> Result<Frame, SessionError> {
        let frame = timeout(SETUP_TIMEOUT, self.inbound.recv())
            .await
            .map_err(|_| TimeoutError { step: "peer conversation setup" })?
            .ok_or_else(|| SessionError::from(ProtocolError::IllegalTransition {
                from: "peer link",
                event: "inbound channel closed",
            }))?;

        if frame.flag != flag.to_i32() {
            return Err(ProtocolError::UnexpectedFlag { expected: "the next setup step", got: frame.flag }.into());
        }
        Ok(frame)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Act as the inviter (client role in the KDF).
pub async fn invite(link: &mut PeerLink, guard: &SettingUpGuard) -> Result<PeerCrypto, SessionError> {
    if !guard.try_acquire() {
        return Err(ProtocolError::IllegalTransition { from: "conversation setup", event: "concurrent invite" }.into());
    }
    let result = invite_inner(link).await;
    guard.release();
    result
}

async fn invite_inner(link: &mut PeerLink) -> Result<PeerCrypto, SessionError> {
    link.send(Flag::ExchangeKeys, vec![1u8])?;

    let reply = link.expect(Flag::ExchangeKeys).await?;
    let body = reply.payload();
    if body.len() == 2 {
        return Err(ProtocolError::IllegalTransition { from: "conversation setup", event: "invite denied" }.into());
    }
    let responder_pk: PublicKey = body
        .try_into()
        .map_err(|_| SessionError::from(ProtocolError::SizeMismatch { expected: 32, got: body.len() }))?;

    let (our_pk, our_sk) = keypair();
    link.send(Flag::ExchangeKeysDone, our_pk.to_vec())?;

    let headers = link.expect(Flag::ExchangeHeaders).await?;
    let responder_header = headers.payload();

    let derived = DerivedKeys::as_client(&responder_pk, &our_pk, &our_sk);
    let pull = stream_init_pull(&derived.rx, responder_header)?;
    let (push, our_header) = stream_init_push(&derived.tx);

    link.send(Flag::ExchangeHeadersDone, our_header.to_vec())?;

    Ok(PeerCrypto { push, pull })
}

/// Act as the responder (server role in the KDF) to an incoming invite
/// already consumed by the caller as `first_frame`. `accept` chooses whether
/// to proceed or send the 2-byte denial body.
pub async fn respond(
    link: &mut PeerLink,
    guard: &SettingUpGuard,
    accept: bool,
) -> Result<Option<PeerCrypto>, SessionError> {
    if !accept {
        link.send(Flag::ExchangeKeys, vec![0u8, 0u8])?;
        return Ok(None);
    }
    if !guard.try_acquire() {
        link.send(Flag::ExchangeKeys, vec![0u8, 0u8])?;
        return Err(ProtocolError::IllegalTransition { from: "conversation setup", event: "concurrent invite" }.into());
    }
    let result = respond_inner(link).await;
    guard.release();
    result.map(Some)
}

async fn respond_inner(link: &mut PeerLink) -> Result<PeerCrypto, SessionError> {
    let (our_pk, our_sk): (PublicKey, SecretKey) = keypair();
    link.send(Flag::ExchangeKeys, our_pk.to_vec())?;

    let done = link.expect(Flag::ExchangeKeysDone).await?;
    let inviter_pk: PublicKey = done
        .payload()
        .try_into()
        .map_err(|_| SessionError::from(ProtocolError::SizeMismatch { expected: 32, got: done.payload().len() }))?;

    let derived = DerivedKeys::as_server(&inviter_pk, &our_pk, &our_sk);
    let (push, our_header) = stream_init_push(&derived.tx);
    link.send(Flag::ExchangeHeaders, our_header.to_vec())?;

    let headers_done = link.expect(Flag::ExchangeHeadersDone).await?;
    let pull = stream_init_pull(&derived.rx, headers_done.payload())?;

    Ok(PeerCrypto { push, pull })
}
