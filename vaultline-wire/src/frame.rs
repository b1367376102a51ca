//! The fixed-size frame that crosses every vaultline socket.

use vaultline_crypto::StreamState;

use crate::cursor::{Reader, Writer};
use crate::errors::WireError;
use crate::flags::Flag;
use crate::token::{Token, ANONYMOUS};

/// Plaintext size of a frame on the wire: 96-byte header + 928-byte body.
pub const FRAME_SIZE: usize = 1024;
/// Size of the header alone.
pub const HEADER_SIZE: usize = 96;
/// Size of the body alone.
pub const BODY_SIZE: usize = FRAME_SIZE - HEADER_SIZE;
/// Size of a frame once it has gone through [`vaultline_crypto::stream`]:
/// `FRAME_SIZE` plus the stream cipher's per-message overhead.
pub const ENCRYPTED_FRAME_SIZE: usize = FRAME_SIZE + vaultline_crypto::STREAM_OVERHEAD;

/// One frame: a 96-byte header plus a zero-padded 928-byte body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flag: i32,
    /// Milliseconds since the Unix epoch when this frame was built.
    pub timestamp: u64,
    /// Length of the valid prefix of `body`; the rest is padding.
    pub size: u32,
    /// Part number within a multi-part send (`0` for single-part frames).
    pub index: u32,
    /// Total parts in a multi-part send (`1` for single-part frames).
    pub count: u32,
    pub from: u32,
    pub to: u32,
    pub token: Token,
    pub body: Vec<u8>,
}

impl Frame {
    /// Build a single-part frame, truncating or this-is-a-bug-panicking on
    /// a body that doesn't fit — callers are expected to chunk beforehand.
    pub fn single(flag: Flag, timestamp: u64, from: u32, to: u32, token: Token, body: Vec<u8>) -> Self {
        assert!(body.len() <= BODY_SIZE, "frame body exceeds the {BODY_SIZE}-byte budget");
        let size = body.len() as u32;
        Frame { flag: flag.to_i32(), timestamp, size, index: 0, count: 1, from, to, token, body }
    }

    /// Build an anonymous (pre-login) single-part frame.
    pub fn anonymous(flag: Flag, timestamp: u64, to: u32, body: Vec<u8>) -> Self {
        Self::single(flag, timestamp, crate::flags::sentinel::ANONYMOUS, to, ANONYMOUS, body)
    }

    /// The valid (non-padding) prefix of `body`.
    pub fn payload(&self) -> &[u8] {
        let len = (self.size as usize).min(self.body.len());
        &self.body[..len]
    }

    /// Marshal to exactly [`FRAME_SIZE`] bytes, little-endian, field by field.
    pub fn pack(&self) -> [u8; FRAME_SIZE] {
        let mut w = Writer::with_capacity(FRAME_SIZE);
        w.put_i32(self.flag);
        w.put_u64(self.timestamp);
        w.put_u32(self.size);
        w.put_u32(self.index);
        w.put_u32(self.count);
        w.put_u32(self.from);
        w.put_u32(self.to);
        w.put_bytes(&self.token);
        w.put_bytes(&self.body);
        w.zero_fill_to(FRAME_SIZE);
        w.into_bytes().try_into().expect("writer produces exactly FRAME_SIZE bytes")
    }

    /// Unmarshal a buffer produced by [`Frame::pack`].
    pub fn unpack(bytes: &[u8; FRAME_SIZE]) -> Result<Self, WireError> {
        let mut r = Reader::new(bytes);
        let flag = r.get_i32()?;
        Flag::from_i32(flag).ok_or(WireError::UnknownFlag(flag))?;
        let timestamp = r.get_u64()?;
        let size = r.get_u32()?;
        let index = r.get_u32()?;
        let count = r.get_u32()?;
        let from = r.get_u32()?;
        let to = r.get_u32()?;
        let token: Token = r.get_bytes(64)?.try_into().unwrap();
        let body = r.get_bytes(BODY_SIZE)?.to_vec();

        if size as usize > body.len() {
            return Err(WireError::BodySizeOutOfRange { size, body_len: body.len() });
        }

        Ok(Frame { flag, timestamp, size, index, count, from, to, token, body })
    }

    /// Pack and stream-encrypt, advancing `state`. Output is exactly
    /// [`ENCRYPTED_FRAME_SIZE`] bytes.
    pub fn pack_encrypted(&self, state: &mut StreamState) -> Vec<u8> {
        vaultline_crypto::stream_push(state, &self.pack())
    }

    /// Stream-decrypt and unmarshal, advancing `state`.
    pub fn unpack_encrypted(ciphertext: &[u8], state: &mut StreamState) -> Result<Self, WireError> {
        let plaintext = vaultline_crypto::stream_pull(state, ciphertext).inspect_err(|e| {
            tracing::debug!(error = %e, "frame stream decryption failed");
        })?;
        let plaintext: [u8; FRAME_SIZE] =
            plaintext.try_into().map_err(|_| WireError::Truncated)?;
        Frame::unpack(&plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_output_is_exactly_frame_size() {
        let frame = Frame::anonymous(Flag::LogIn, 1, 0, b"hello".to_vec());
        assert_eq!(frame.pack().len(), FRAME_SIZE);
    }

    #[test]
    fn round_trips_through_pack_unpack() {
        let frame = Frame::single(Flag::Proceed, 1234, 5, 6, [7u8; 64], b"payload".to_vec());
        let packed = frame.pack();
        let unpacked = Frame::unpack(&packed).unwrap();
        assert_eq!(frame, unpacked);
    }

    #[test]
    fn endianness_matches_the_documented_byte_layout() {
        let frame = Frame {
            flag: 0,
            timestamp: 1,
            size: 2,
            index: 3,
            count: 4,
            from: 5,
            to: 6,
            token: [7u8; 64],
            body: Vec::new(),
        };
        let packed = frame.pack();
        let mut expected = Vec::new();
        expected.extend_from_slice(&0i32.to_le_bytes());
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&3u32.to_le_bytes());
        expected.extend_from_slice(&4u32.to_le_bytes());
        expected.extend_from_slice(&5u32.to_le_bytes());
        expected.extend_from_slice(&6u32.to_le_bytes());
        expected.extend_from_slice(&[7u8; 64]);
        assert_eq!(&packed[..HEADER_SIZE], &expected[..]);
    }

    #[test]
    fn unpack_rejects_unknown_flag() {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[0..4].copy_from_slice(&0x1234i32.to_le_bytes());
        assert!(matches!(Frame::unpack(&bytes), Err(WireError::UnknownFlag(0x1234))));
    }

    #[test]
    fn unpack_rejects_size_larger_than_body() {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[8..12].copy_from_slice(&(BODY_SIZE as u32 + 1).to_le_bytes());
        assert!(matches!(Frame::unpack(&bytes), Err(WireError::BodySizeOutOfRange { .. })));
    }

    #[test]
    fn encrypted_round_trip() {
        let (mut push, header) = vaultline_crypto::stream_init_push(&[1u8; 32]);
        let mut pull = vaultline_crypto::stream_init_pull(&[1u8; 32], &header).unwrap();

        let frame = Frame::single(Flag::Proceed, 99, 1, 2, [0u8; 64], b"hi".to_vec());
        let ciphertext = frame.pack_encrypted(&mut push);
        assert_eq!(ciphertext.len(), ENCRYPTED_FRAME_SIZE);

        let decrypted = Frame::unpack_encrypted(&ciphertext, &mut pull).unwrap();
        assert_eq!(decrypted, frame);
    }
}
