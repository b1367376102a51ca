//! Dispatch of frames received from the server: flag routing, token
//! verification, and accumulation of multi-part `FETCH_USERS` responses.

use vaultline_crypto::PublicKey;
use vaultline_wire::token::verify_server_origin;
use vaultline_wire::{sentinel, Flag, Frame, UserInfo};

use crate::errors::{ProtocolError, SessionError};

/// A decoded, already-authenticated event raised by a server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    LoggedIn { user_id: u32, token: vaultline_wire::Token },
    Registered,
    Error { message: Vec<u8> },
    Unauthenticated,
    AccessDenied,
    UsersList(Vec<UserInfo>),
}

/// Accumulates the parts of a multi-part `FETCH_USERS` response.
#[derive(Debug, Default)]
pub struct UsersListAccumulator {
    parts: Vec<Option<Vec<u8>>>,
}

impl UsersListAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one part. Returns the assembled records once `index == count - 1`
    /// has been seen for every index, clearing internal state either way
    /// forward progress is made.
    fn accept(&mut self, index: u32, count: u32, body: &[u8]) -> Result<Option<Vec<UserInfo>>, SessionError> {
        if self.parts.len() != count as usize {
            self.parts = vec![None; count as usize];
        }
        let idx = index as usize;
        if idx >= self.parts.len() {
            return Err(ProtocolError::SizeMismatch { expected: self.parts.len(), got: idx + 1 }.into());
        }
        self.parts[idx] = Some(body.to_vec());

        if self.parts.iter().all(Option::is_some) {
            let mut combined = Vec::new();
            for part in self.parts.drain(..) {
                combined.extend_from_slice(&part.unwrap());
            }
            let users = UserInfo::unpack_many(&combined).map_err(vaultline_wire::WireError::from)?;
            Ok(Some(users))
        } else {
            Ok(None)
        }
    }
}

/// Verify and route a single inbound frame.
///
/// Returns `Ok(None)` when the frame is a non-final part of a multi-part
/// response still being accumulated. Unknown flags from the server are a
/// protocol violation and bubble up as an error so the caller can terminate
/// the connection.
pub fn dispatch(
    frame: &Frame,
    server_signing_key: &PublicKey,
    accumulator: &mut UsersListAccumulator,
) -> Result<Option<ServerEvent>, SessionError> {
    if frame.from != sentinel::SERVER_ORIGIN {
        // Not a server-origin frame; nothing for this dispatcher to do.
        return Ok(None);
    }
    if !verify_server_origin(&frame.token, server_signing_key) {
        return Err(ProtocolError::ServerOriginNotVerified.into());
    }

    let flag = Flag::from_i32(frame.flag)
        .ok_or_else(|| SessionError::from(ProtocolError::UnexpectedFlag { expected: "a known flag", got: frame.flag }))?;
    let body = frame.payload();

    Ok(match flag {
        Flag::LoggedIn => {
            let token: vaultline_wire::Token = body
                .try_into()
                .map_err(|_| SessionError::from(ProtocolError::SizeMismatch { expected: 64, got: body.len() }))?;
            Some(ServerEvent::LoggedIn { user_id: frame.to, token })
        }
        Flag::Registered => Some(ServerEvent::Registered),
        Flag::Error => Some(ServerEvent::Error { message: body.to_vec() }),
        Flag::Unauthenticated => Some(ServerEvent::Unauthenticated),
        Flag::AccessDenied => Some(ServerEvent::AccessDenied),
        Flag::FetchUsers => accumulator
            .accept(frame.index, frame.count, body)?
            .map(ServerEvent::UsersList),
        other => {
            return Err(ProtocolError::UnexpectedFlag { expected: "a known server flag", got: other.to_i32() }.into());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_frame(flag: Flag, to: u32, body: Vec<u8>) -> Frame {
        Frame::single(flag, 0, sentinel::SERVER_ORIGIN, to, [0u8; 64], body)
    }

    #[test]
    fn non_server_origin_frames_are_ignored() {
        let mut acc = UsersListAccumulator::new();
        let (pk, _sk) = vaultline_crypto::generate_signing_keypair();
        let frame = Frame::single(Flag::Proceed, 0, 5, 6, [0u8; 64], b"hi".to_vec());
        assert_eq!(dispatch(&frame, &pk, &mut acc).unwrap(), None);
    }

    #[test]
    fn unverified_server_origin_token_is_rejected() {
        let mut acc = UsersListAccumulator::new();
        let (pk, _sk) = vaultline_crypto::generate_signing_keypair();
        let frame = server_frame(Flag::Registered, 0, Vec::new());
        assert!(dispatch(&frame, &pk, &mut acc).is_err());
    }

    #[test]
    fn users_list_assembles_across_parts_in_index_order() {
        let (pk, sk) = vaultline_crypto::generate_signing_keypair();
        let mut acc = UsersListAccumulator::new();

        let a = UserInfo { id: 1, connected: true, name: "a".into() };
        let b = UserInfo { id: 2, connected: false, name: "b".into() };

        let token_for = |msg: &[u8; 8]| vaultline_crypto::sign(&sk, msg);
        let token: vaultline_wire::Token = token_for(&[0xff; 8]);

        let mut frame0 = Frame::single(Flag::FetchUsers, 0, sentinel::SERVER_ORIGIN, 0, token, a.pack().to_vec());
        frame0.index = 0;
        frame0.count = 2;
        let mut frame1 = Frame::single(Flag::FetchUsers, 0, sentinel::SERVER_ORIGIN, 0, token, b.pack().to_vec());
        frame1.index = 1;
        frame1.count = 2;

        assert_eq!(dispatch(&frame0, &pk, &mut acc).unwrap(), None);
        let result = dispatch(&frame1, &pk, &mut acc).unwrap();
        assert_eq!(result, Some(ServerEvent::UsersList(vec![a, b])));
    }
}
