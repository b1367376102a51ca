//! The client↔server authentication state machine.

use crate::errors::ProtocolError;

/// Fixed wire width of the username field within a `LOG_IN`/`REGISTER` body.
pub const USERNAME_FIELD_SIZE: usize = 16;
/// Fixed wire width of the pre-hash password field within the same body.
pub const PASSWORD_FIELD_SIZE: usize = 16;

/// Where a connection is in the login/registration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingAuthentication,
    Authenticated { user_id: u32 },
    ExchangingMessages { user_id: u32 },
    FinishedWithError,
}

/// Drives [`AuthState`] transitions and rejects anything illegal.
#[derive(Debug, Clone, Copy)]
pub struct AuthMachine {
    state: AuthState,
}

impl Default for AuthMachine {
    fn default() -> Self {
        Self { state: AuthState::Unauthenticated }
    }
}

impl AuthMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// A `LOG_IN` or `REGISTER` frame was just sent.
    pub fn on_log_in_sent(&mut self) -> Result<(), ProtocolError> {
        match self.state {
            AuthState::Unauthenticated => {
                self.state = AuthState::AwaitingAuthentication;
                Ok(())
            }
            _ => Err(ProtocolError::IllegalTransition { from: self.state_name(), event: "LOG_IN sent" }),
        }
    }

    /// A `LOGGED_IN` frame arrived; `user_id` is the value carried in the
    /// frame's `to` field.
    pub fn on_logged_in(&mut self, user_id: u32) -> Result<(), ProtocolError> {
        match self.state {
            AuthState::AwaitingAuthentication => {
                self.state = AuthState::Authenticated { user_id };
                Ok(())
            }
            _ => Err(ProtocolError::IllegalTransition { from: self.state_name(), event: "LOGGED_IN received" }),
        }
    }

    /// The client chose a peer to start (or resume) a conversation with.
    pub fn on_peer_chosen(&mut self) -> Result<(), ProtocolError> {
        match self.state {
            AuthState::Authenticated { user_id } => {
                self.state = AuthState::ExchangingMessages { user_id };
                Ok(())
            }
            _ => Err(ProtocolError::IllegalTransition { from: self.state_name(), event: "peer chosen" }),
        }
    }

    /// The connection dropped; re-initialization is required from scratch.
    pub fn on_disconnect(&mut self) {
        self.state = AuthState::Unauthenticated;
    }

    /// An unrecoverable protocol violation occurred.
    pub fn on_fatal_error(&mut self) {
        self.state = AuthState::FinishedWithError;
    }

    pub fn authenticated_user_id(&self) -> Option<u32> {
        match self.state {
            AuthState::Authenticated { user_id } | AuthState::ExchangingMessages { user_id } => Some(user_id),
            _ => None,
        }
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            AuthState::Unauthenticated => "UNAUTHENTICATED",
            AuthState::AwaitingAuthentication => "AWAITING_AUTHENTICATION",
            AuthState::Authenticated { .. } => "AUTHENTICATED",
            AuthState::ExchangingMessages { .. } => "EXCHANGING_MESSAGES",
            AuthState::FinishedWithError => "FINISHED_WITH_ERROR",
        }
    }
}

/// Pack a fixed-width `username || password` body for `LOG_IN`/`REGISTER`,
/// right-padding each field with zeros (never silently truncating — callers
/// validate lengths before this is reached).
pub fn pack_credentials(username: &str, password_hash: &[u8; PASSWORD_FIELD_SIZE]) -> Vec<u8> {
    let mut body = Vec::with_capacity(USERNAME_FIELD_SIZE + PASSWORD_FIELD_SIZE);
    let mut username_field = [0u8; USERNAME_FIELD_SIZE];
    let name_bytes = username.as_bytes();
    let n = name_bytes.len().min(USERNAME_FIELD_SIZE);
    username_field[..n].copy_from_slice(&name_bytes[..n]);
    body.extend_from_slice(&username_field);
    body.extend_from_slice(password_hash);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_login() {
        let mut m = AuthMachine::new();
        m.on_log_in_sent().unwrap();
        m.on_logged_in(42).unwrap();
        assert_eq!(m.authenticated_user_id(), Some(42));
        m.on_peer_chosen().unwrap();
        assert_eq!(m.state(), AuthState::ExchangingMessages { user_id: 42 });
    }

    #[test]
    fn logged_in_from_unauthenticated_is_rejected() {
        let mut m = AuthMachine::new();
        assert!(m.on_logged_in(1).is_err());
    }

    #[test]
    fn disconnect_always_resets_to_unauthenticated() {
        let mut m = AuthMachine::new();
        m.on_log_in_sent().unwrap();
        m.on_logged_in(1).unwrap();
        m.on_disconnect();
        assert_eq!(m.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn credentials_are_packed_to_the_fixed_field_widths() {
        let packed = pack_credentials("alice", &[9u8; PASSWORD_FIELD_SIZE]);
        assert_eq!(packed.len(), USERNAME_FIELD_SIZE + PASSWORD_FIELD_SIZE);
        assert_eq!(&packed[..5], b"alice");
        assert!(packed[5..USERNAME_FIELD_SIZE].iter().all(|&b| b == 0));
    }
}
