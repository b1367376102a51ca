//! The fixed-size encrypted frame codec shared by every vaultline socket.
//!
//! A [`Frame`] is exactly [`FRAME_SIZE`] bytes plaintext, marshalled
//! field-by-field into a little-endian buffer (never via struct transmute),
//! then pushed through the peer's `vaultline_crypto` stream state to produce
//! [`ENCRYPTED_FRAME_SIZE`] bytes on the socket.

#![deny(unsafe_code)]

mod cursor;
mod errors;
mod flags;
mod frame;
pub mod token;
mod user_info;

pub use cursor::{Reader, Underrun, Writer};
pub use errors::WireError;
pub use flags::{sentinel, Flag};
pub use frame::{Frame, BODY_SIZE, ENCRYPTED_FRAME_SIZE, FRAME_SIZE, HEADER_SIZE};
pub use token::Token;
pub use user_info::{UserInfo, USER_INFO_SIZE};
