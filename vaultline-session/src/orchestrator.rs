//! Ties the wire codec and session protocol to a live socket: a network
//! poll task that owns the read half, a serialized write half shared by
//! every task that needs to send, and a worker task that runs queued
//! actions one at a time so blocking protocol steps never share state with
//! a concurrent send.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};

use vaultline_crypto::{PublicKey, StreamState};
use vaultline_wire::{Frame, ENCRYPTED_FRAME_SIZE};

use crate::dispatch::{dispatch, ServerEvent, UsersListAccumulator};
use crate::errors::SessionError;

/// A queued unit of work for the async worker task, optionally delayed.
pub struct Action {
    pub delay: Option<Duration>,
    pub run: Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>,
}

impl Action {
    pub fn now<F>(f: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Action { delay: None, run: Box::new(move || Box::pin(f)) }
    }

    pub fn delayed<F>(delay: Duration, f: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Action { delay: Some(delay), run: Box::new(move || Box::pin(f)) }
    }
}

/// The serialized outbound half of the client↔server socket: acquiring the
/// lock, pushing one frame through the stream cipher, and writing it are one
/// atomic unit, because the cipher forbids interleaved pushes from different
/// tasks.
pub struct OutboundSocket<W> {
    inner: Mutex<(W, StreamState)>,
}

impl<W> OutboundSocket<W>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    pub fn new(write_half: W, push: StreamState) -> Self {
        OutboundSocket { inner: Mutex::new((write_half, push)) }
    }

    pub async fn send(&self, frame: &Frame) -> Result<(), SessionError> {
        let mut guard = self.inner.lock().await;
        let (write_half, push) = &mut *guard;
        let ciphertext = frame.pack_encrypted(push);
        write_half.write_all(&ciphertext).await?;
        Ok(())
    }
}

/// Frames from a live peer conversation are routed here instead of to the
/// orchestrator's own event stream; registered by the worker task once
/// conversation setup completes.
pub type PeerRoutes = Arc<Mutex<HashMap<u32, mpsc::Sender<Frame>>>>;

/// Spawn the network poll task: the single reader of the client↔server
/// socket. Every server-origin frame is dispatched and published as a
/// [`ServerEvent`]; every `PROCEED` frame from a peer with a registered
/// route is forwarded there; anything else is dropped with a warning.
pub fn spawn_network_poll_task<R>(
    mut read_half: ReadHalf<R>,
    mut pull: StreamState,
    server_signing_key: PublicKey,
    peer_routes: PeerRoutes,
    events: mpsc::UnboundedSender<ServerEvent>,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Send + 'static,
{
    tokio::spawn(async move {
        let mut accumulator = UsersListAccumulator::new();
        loop {
            let mut buf = vec![0u8; ENCRYPTED_FRAME_SIZE];
            if let Err(e) = read_half.read_exact(&mut buf).await {
                tracing::warn!(error = %e, "client<->server socket closed");
                break;
            }

            let frame = match Frame::unpack_encrypted(&buf, &mut pull) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, "frame decryption failed, dropping connection");
                    break;
                }
            };

            match dispatch(&frame, &server_signing_key, &mut accumulator) {
                Ok(Some(event)) => {
                    tracing::debug!(?event, "server event");
                    let _ = events.send(event);
                }
                Ok(None) => {
                    route_peer_frame(&peer_routes, frame).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "protocol violation from server, dropping connection");
                    break;
                }
            }
        }
    })
}

async fn route_peer_frame(peer_routes: &PeerRoutes, frame: Frame) {
    let routes = peer_routes.lock().await;
    if let Some(sender) = routes.get(&frame.from) {
        let _ = sender.send(frame).await;
    } else {
        tracing::debug!(from = frame.from, "frame from a peer with no registered route, dropping");
    }
}

/// Spawn the async worker task: a serial FIFO consumer of queued [`Action`]s.
/// All blocking protocol steps (handshake waits, conversation setup, file
/// transfer) run here, off the network poll task.
pub fn spawn_worker_task(mut actions: mpsc::UnboundedReceiver<Action>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(action) = actions.recv().await {
            if let Some(delay) = action.delay {
                tokio::time::sleep(delay).await;
            }
            (action.run)().await;
        }
        tracing::info!("worker task queue closed, shutting down");
    })
}

/// Split `R`'s unused type parameter bound so callers constructing a
/// [`WriteHalf`] can wire up [`OutboundSocket`] directly.
pub fn outbound_socket_from_write_half<R>(write_half: WriteHalf<R>, push: StreamState) -> OutboundSocket<WriteHalf<R>>
where
    R: tokio::io::AsyncWrite + Unpin,
{
    OutboundSocket::new(write_half, push)
}
