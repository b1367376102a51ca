//! Client-local message resynchronization.
//!
//! The upstream distillation of this protocol left the wire format for
//! fetching missed messages undefined. Rather than invent bytes no server
//! ever agreed to, resync here is scoped to what the client can already do
//! on its own: replay locally persisted history newer than a given point.
//! While a drain is in progress, inbound conversation messages from the
//! same peer must be queued rather than delivered, or a live frame could
//! race ahead of the ratchet state the drain is replaying against.

use std::sync::atomic::{AtomicBool, Ordering};

use vaultline_store::{Store, StoredMessage};

use crate::errors::SessionError;

/// Set for the duration of a drain against one peer; `PROCEED` frames from
/// that peer are dropped (and will themselves be picked up by a later
/// resync) rather than decrypted out of order.
#[derive(Default)]
pub struct IgnoreUsualMessages(AtomicBool);

impl IgnoreUsualMessages {
    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Replay every message for `peer_id` newer than `after_timestamp`,
/// returning them oldest-first for the caller to re-deliver to its
/// subscriber.
pub fn fetch_missing_messages(
    store: &Store,
    ignore_guard: &IgnoreUsualMessages,
    peer_id: u32,
    after_timestamp: u64,
) -> Result<Vec<StoredMessage>, SessionError> {
    ignore_guard.set();
    let result = store.messages_after(peer_id, after_timestamp);
    ignore_guard.clear();
    Ok(result?)
}
