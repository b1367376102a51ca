//! Conversation message send/receive: padding, stream encryption, and
//! persistence into the encrypted store.

use vaultline_crypto::{pad, unpad, StreamState};
use vaultline_store::Store;
use vaultline_wire::{sentinel, Flag, Frame, Token, BODY_SIZE};

use crate::errors::{ProtocolError, SessionError};
use crate::file_transfer::FileInvite;

/// Leading byte of every `PROCEED` frame's plaintext, identifying what kind
/// of conversation payload follows. Text is padded before this tag is
/// prepended; file-transfer payloads are already size-framed by the invite
/// and travel unpadded.
const TAG_TEXT: u8 = 0x00;
const TAG_FILE_INVITE: u8 = 0x01;
const TAG_FILE_CHUNK: u8 = 0x02;
const TAG_FILE_END: u8 = 0x03;

/// Largest tagged plaintext `stream_push` can take and still produce a
/// ciphertext that fits in a single frame's body.
const MAX_STREAM_PLAINTEXT: usize = BODY_SIZE - vaultline_crypto::STREAM_OVERHEAD;

fn check_fits_one_frame(plaintext_len: usize) -> Result<(), SessionError> {
    if plaintext_len > MAX_STREAM_PLAINTEXT {
        return Err(ProtocolError::MessageTooLong { limit: MAX_STREAM_PLAINTEXT, actual: plaintext_len }.into());
    }
    Ok(())
}

/// A decrypted `PROCEED` frame, classified by its leading tag byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(Vec<u8>),
    FileInvite(FileInvite),
    FileChunk(Vec<u8>),
    FileEnd,
}

/// Prepare and encrypt `text` for sending to `peer_id`, advancing `push` in
/// place and persisting the updated ratchet state.
pub fn prepare_outgoing(
    store: &Store,
    push: &mut StreamState,
    pull: &StreamState,
    peer_id: u32,
    text: &[u8],
) -> Result<Vec<u8>, SessionError> {
    let mut tagged = Vec::with_capacity(1 + text.len());
    tagged.push(TAG_TEXT);
    tagged.extend_from_slice(text);
    let padded = pad(&tagged);
    check_fits_one_frame(padded.len())?;
    let ciphertext = vaultline_crypto::stream_push(push, &padded);
    persist_streams(store, peer_id, push, pull)?;
    Ok(ciphertext)
}

/// Prepare and encrypt a file invite announcing an incoming transfer.
pub fn prepare_file_invite(
    store: &Store,
    push: &mut StreamState,
    pull: &StreamState,
    peer_id: u32,
    invite: &FileInvite,
) -> Result<Vec<u8>, SessionError> {
    prepare_tagged(store, push, pull, peer_id, TAG_FILE_INVITE, &invite.encode())
}

/// Prepare and encrypt one chunk of file data.
pub fn prepare_file_chunk(
    store: &Store,
    push: &mut StreamState,
    pull: &StreamState,
    peer_id: u32,
    chunk: &[u8],
) -> Result<Vec<u8>, SessionError> {
    prepare_tagged(store, push, pull, peer_id, TAG_FILE_CHUNK, chunk)
}

/// Prepare and encrypt the end-of-file marker.
pub fn prepare_file_end(
    store: &Store,
    push: &mut StreamState,
    pull: &StreamState,
    peer_id: u32,
) -> Result<Vec<u8>, SessionError> {
    prepare_tagged(store, push, pull, peer_id, TAG_FILE_END, &[])
}

fn prepare_tagged(
    store: &Store,
    push: &mut StreamState,
    pull: &StreamState,
    peer_id: u32,
    tag: u8,
    body: &[u8],
) -> Result<Vec<u8>, SessionError> {
    let mut tagged = Vec::with_capacity(1 + body.len());
    tagged.push(tag);
    tagged.extend_from_slice(body);
    check_fits_one_frame(tagged.len())?;
    let ciphertext = vaultline_crypto::stream_push(push, &tagged);
    persist_streams(store, peer_id, push, pull)?;
    Ok(ciphertext)
}

/// Build the outbound `PROCEED` frame for an already-encrypted conversation
/// message.
pub fn frame_for(self_id: u32, peer_id: u32, token: Token, timestamp: u64, ciphertext: Vec<u8>) -> Frame {
    Frame::single(Flag::Proceed, timestamp, self_id, peer_id, token, ciphertext)
}

/// Decrypt and persist a `PROCEED` frame received from `peer_id`, advancing
/// `pull` in place, classifying the result by its leading tag byte.
///
/// Returns the classified payload so the caller can decide whether to
/// deliver it to a live subscriber (only when the peer's conversation is
/// currently open — see the orchestrator) or feed it to an in-progress file
/// transfer.
pub fn receive_incoming(
    store: &Store,
    push: &StreamState,
    pull: &mut StreamState,
    peer_id: u32,
    timestamp: u64,
    ciphertext: &[u8],
) -> Result<Incoming, SessionError> {
    let raw = vaultline_crypto::stream_pull(pull, ciphertext)?;
    let (&tag, rest) = raw.split_first().ok_or_else(|| SessionError::from(ProtocolError::SizeMismatch { expected: 1, got: 0 }))?;

    let incoming = match tag {
        TAG_TEXT => {
            let plaintext = unpad(rest)
                .map_err(|_| SessionError::from(ProtocolError::SizeMismatch { expected: 0, got: rest.len() }))?;
            store.add_message(peer_id, peer_id, timestamp, &plaintext)?;
            Incoming::Text(plaintext)
        }
        TAG_FILE_INVITE => Incoming::FileInvite(FileInvite::decode(rest)?),
        TAG_FILE_CHUNK => Incoming::FileChunk(rest.to_vec()),
        TAG_FILE_END => Incoming::FileEnd,
        other => return Err(ProtocolError::UnexpectedFlag { expected: "a known message tag", got: other as i32 }.into()),
    };

    persist_streams(store, peer_id, push, pull)?;
    Ok(incoming)
}

fn persist_streams(store: &Store, peer_id: u32, push: &StreamState, pull: &StreamState) -> Result<(), SessionError> {
    let mut combined = [0u8; vaultline_crypto::STREAMS_STATES_SIZE];
    combined[..vaultline_crypto::STREAM_STATE_SIZE].copy_from_slice(&push.to_bytes());
    combined[vaultline_crypto::STREAM_STATE_SIZE..].copy_from_slice(&pull.to_bytes());
    store.upsert_conversation(peer_id, &combined)?;
    Ok(())
}

/// Whether `frame` is a conversation message from `peer_id` (as opposed to
/// server traffic or a different peer).
pub fn is_message_from(frame: &Frame, peer_id: u32) -> bool {
    frame.flag == Flag::Proceed.to_i32() && frame.from == peer_id && frame.from != sentinel::SERVER_ORIGIN
}
