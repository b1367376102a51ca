//! File exchange over an established peer conversation: chunked, ordered,
//! hash-verified. Encryption itself is `messaging`'s job (file payloads ride
//! the same ratchet as text, tagged to distinguish them); this module only
//! slices a file into chunks on the way out and reassembles + verifies them
//! on the way in.

use vaultline_crypto::HashState;

use crate::errors::{ProtocolError, SessionError};

pub use vaultline_crypto::HASH_SIZE;

/// Files above this size are rejected before transfer begins.
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Conservative default chunk size, matching the session's conservative
/// default plaintext body size for ordinary messages.
pub const DEFAULT_CHUNK_SIZE: usize = 160;

/// An invite announcing an incoming file, before any chunk is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInvite {
    pub size: u64,
    pub content_hash: [u8; HASH_SIZE],
    pub filename: String,
}

impl FileInvite {
    pub fn new(size: u64, content_hash: [u8; HASH_SIZE], filename: String) -> Result<Self, SessionError> {
        if size > MAX_FILE_SIZE {
            return Err(ProtocolError::FileTooLarge { limit: MAX_FILE_SIZE, actual: size }.into());
        }
        Ok(FileInvite { size, content_hash, filename })
    }

    /// Encode as `size (8 bytes LE) || content_hash (32 bytes) || filename`,
    /// the body `messaging` carries inside a tagged file-invite frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + HASH_SIZE + self.filename.len());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.content_hash);
        out.extend_from_slice(self.filename.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SessionError> {
        if bytes.len() < 8 + HASH_SIZE {
            return Err(ProtocolError::SizeMismatch { expected: 8 + HASH_SIZE, got: bytes.len() }.into());
        }
        let mut size_bytes = [0u8; 8];
        size_bytes.copy_from_slice(&bytes[..8]);
        let size = u64::from_le_bytes(size_bytes);
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&bytes[8..8 + HASH_SIZE]);
        let filename = String::from_utf8(bytes[8 + HASH_SIZE..].to_vec())
            .map_err(|_| SessionError::from(ProtocolError::SizeMismatch { expected: 0, got: 0 }))?;
        FileInvite::new(size, hash, filename)
    }

    /// Hash `data` the same way the invite's `content_hash` is computed.
    pub fn hash_of(data: &[u8]) -> [u8; HASH_SIZE] {
        let mut hasher = HashState::init();
        hasher.update(data);
        hasher.finish()
    }
}

/// Slices a file into plaintext chunks of at most `max_chunk` bytes each.
pub struct Sender<'a> {
    data: &'a [u8],
    offset: usize,
    max_chunk: usize,
}

impl<'a> Sender<'a> {
    pub fn new(data: &'a [u8], max_chunk: usize) -> Self {
        Sender { data, offset: 0, max_chunk }
    }

    /// Return the next plaintext chunk, advancing the cursor. `None` once
    /// the whole file has been yielded.
    pub fn next_chunk(&mut self) -> Option<&'a [u8]> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = (self.offset + self.max_chunk).min(self.data.len());
        let chunk = &self.data[self.offset..end];
        self.offset = end;
        Some(chunk)
    }
}

/// Reassembles plaintext chunks in order and checks the rolling content
/// hash against the invite once the announced size has arrived.
pub struct Receiver {
    invite: FileInvite,
    received: Vec<u8>,
    hasher: HashState,
}

impl Receiver {
    pub fn new(invite: FileInvite) -> Self {
        Receiver { invite, received: Vec::new(), hasher: HashState::init() }
    }

    /// Absorb the next plaintext chunk. An error here (overrun) means the
    /// caller must discard any partial file it has buffered or written.
    pub fn absorb_chunk(&mut self, plaintext: &[u8]) -> Result<(), SessionError> {
        let total = self.received.len() as u64 + plaintext.len() as u64;
        if total > self.invite.size {
            return Err(ProtocolError::FileTooLarge { limit: self.invite.size, actual: total }.into());
        }
        self.hasher.update(plaintext);
        self.received.extend_from_slice(plaintext);
        Ok(())
    }

    /// Call once all bytes announced by the invite have arrived. Verifies
    /// the rolling hash and returns the assembled file.
    pub fn finish(self) -> Result<Vec<u8>, SessionError> {
        if self.received.len() as u64 != self.invite.size {
            return Err(ProtocolError::FileTooLarge { limit: self.invite.size, actual: self.received.len() as u64 }.into());
        }
        let digest = self.hasher.finish();
        if digest != self.invite.content_hash {
            return Err(ProtocolError::FileHashMismatch.into());
        }
        Ok(self.received)
    }

    pub fn filename(&self) -> &str {
        &self.invite.filename
    }

    pub fn bytes_received(&self) -> u64 {
        self.received.len() as u64
    }
}
