//! Client/server handshake, authentication, peer conversation setup,
//! messaging, file transfer and the tokio-task orchestrator that runs them
//! against a live socket.
//!
//! This crate is the session protocol (C4) plus its orchestrator (C5): it
//! owns no cryptographic primitives of its own (`vaultline_crypto`), no wire
//! layout (`vaultline_wire`), and no persistence (`vaultline_store`) — it
//! composes the three into a running client.

pub mod auth;
pub mod conversation;
pub mod dispatch;
pub mod errors;
pub mod file_transfer;
pub mod handshake;
pub mod messaging;
pub mod orchestrator;
pub mod resync;

pub use auth::{AuthMachine, AuthState};
pub use conversation::{PeerCrypto, PeerLink, SettingUpGuard};
pub use dispatch::ServerEvent;
pub use errors::{ProtocolError, SessionError, TimeoutError};
pub use handshake::ServerStreams;
pub use resync::IgnoreUsualMessages;
