//! Encrypted local store for conversations and messages.
//!
//! Every blob at rest is sealed (see `vaultline_crypto::seal`) under a key
//! derived from the user's login password; nothing here ever persists
//! plaintext. A single [`Store`] owns one `rusqlite::Connection` behind a
//! `Mutex` — `rusqlite::Connection` isn't `Sync`, so a genuine
//! reader-writer lock can't give concurrent readers a shared borrow of it;
//! a plain mutex gets the same "operations are serialized" guarantee the
//! schema needs without pretending to offer concurrent reads it can't.

mod errors;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use vaultline_crypto::{open, seal, STREAMS_STATES_SIZE};

pub use errors::StoreError;

/// A message pulled back out of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub timestamp: u64,
    pub conversation_id: u32,
    pub from_id: u32,
    pub plaintext: Vec<u8>,
}

/// The encrypted local store: conversations, their stream-ratchet state,
/// and message history.
pub struct Store {
    conn: Mutex<Connection>,
    key: [u8; 32],
}

impl Store {
    /// Open (creating if absent) the store at `path`, sealed under
    /// `password`.
    ///
    /// On a fresh file this seals and records the local host id. On an
    /// existing file this unseals the recorded host id and compares it;
    /// failure of either step means the password is wrong or the file has
    /// been tampered with.
    pub fn open(path: impl AsRef<Path>, password: &[u8]) -> Result<Self, StoreError> {
        let key = vaultline_crypto::derive_key_from_password(password);
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = OFF;
             PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS conversations (
                 user_id INTEGER UNIQUE PRIMARY KEY,
                 sealed_streams_states BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS messages (
                 timestamp INTEGER NOT NULL,
                 conversation_id INTEGER NOT NULL,
                 from_id INTEGER NOT NULL,
                 sealed_text BLOB NOT NULL,
                 plaintext_size INTEGER NOT NULL,
                 PRIMARY KEY (conversation_id, timestamp, from_id),
                 FOREIGN KEY (conversation_id) REFERENCES conversations(user_id)
             );
             CREATE TABLE IF NOT EXISTS service (
                 machine_id BLOB
             );",
        )?;

        let store = Store { conn: Mutex::new(conn), key };
        store.open_or_claim_host_id()?;
        Ok(store)
    }

    fn open_or_claim_host_id(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<Vec<u8>> = conn
            .query_row("SELECT machine_id FROM service LIMIT 1", [], |row| row.get(0))
            .optional()?;

        match existing {
            None => {
                let host_id = local_host_id();
                let sealed = seal(&self.key, &host_id);
                conn.execute("INSERT INTO service (machine_id) VALUES (?1)", params![sealed])?;
                tracing::info!("claimed store with a fresh host id");
                Ok(())
            }
            Some(sealed) => {
                let unsealed = open(&self.key, &sealed).map_err(|_| StoreError::WrongPassword)?;
                if unsealed != local_host_id() {
                    return Err(StoreError::WrongPassword);
                }
                Ok(())
            }
        }
    }

    /// Insert or replace a conversation's sealed ratchet state.
    pub fn upsert_conversation(&self, user_id: u32, streams_states: &[u8; STREAMS_STATES_SIZE]) -> Result<(), StoreError> {
        let sealed = seal(&self.key, streams_states);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO conversations (user_id, sealed_streams_states) VALUES (?1, ?2)",
            params![user_id, sealed],
        )?;
        Ok(())
    }

    /// Load and unseal a conversation's ratchet state.
    pub fn load_conversation_streams(&self, user_id: u32) -> Result<Option<[u8; STREAMS_STATES_SIZE]>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sealed: Option<Vec<u8>> = conn
            .query_row(
                "SELECT sealed_streams_states FROM conversations WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(sealed) = sealed else { return Ok(None) };
        let unsealed = open(&self.key, &sealed)?;
        let array: [u8; STREAMS_STATES_SIZE] =
            unsealed.try_into().map_err(|_| StoreError::Invariant("stored ratchet state has the wrong length"))?;
        Ok(Some(array))
    }

    /// Append a message to `conversation_id`'s history.
    ///
    /// The conversation must already exist; inserting against a
    /// non-existent conversation is a caller bug, not a recoverable runtime
    /// condition.
    pub fn add_message(
        &self,
        conversation_id: u32,
        from_id: u32,
        timestamp: u64,
        plaintext: &[u8],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM conversations WHERE user_id = ?1",
                params![conversation_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        debug_assert!(exists, "add_message against a conversation that was never set up");
        if !exists {
            return Err(StoreError::Invariant("conversation does not exist"));
        }

        let sealed_text = seal(&self.key, plaintext);
        conn.execute(
            "INSERT INTO messages (timestamp, conversation_id, from_id, sealed_text, plaintext_size)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![timestamp, conversation_id, from_id, sealed_text, plaintext.len() as u32],
        )?;
        Ok(())
    }

    /// Messages in `conversation_id` strictly newer than `after_timestamp`,
    /// oldest first.
    pub fn messages_after(&self, conversation_id: u32, after_timestamp: u64) -> Result<Vec<StoredMessage>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT timestamp, from_id, sealed_text FROM messages
             WHERE conversation_id = ?1 AND timestamp > ?2
             ORDER BY timestamp ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id, after_timestamp], |row| {
            let timestamp: u64 = row.get(0)?;
            let from_id: u32 = row.get(1)?;
            let sealed_text: Vec<u8> = row.get(2)?;
            Ok((timestamp, from_id, sealed_text))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (timestamp, from_id, sealed_text) = row?;
            let plaintext = open(&self.key, &sealed_text)?;
            out.push(StoredMessage { timestamp, conversation_id, from_id, plaintext });
        }
        Ok(out)
    }

    /// Latest message timestamp recorded for `conversation_id`, if any.
    pub fn latest_timestamp(&self, conversation_id: u32) -> Result<Option<u64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let ts: Option<u64> = conn
            .query_row(
                "SELECT MAX(timestamp) FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(ts)
    }
}

/// A 16-byte value identifying this machine, used only to prove a store was
/// previously opened with a given password on this host — not itself
/// security-critical.
fn local_host_id() -> Vec<u8> {
    if let Ok(id) = std::fs::read("/etc/machine-id") {
        let trimmed: Vec<u8> = id.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).expect("getrandom failed");
    bytes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vaultline-store-test-{name}-{}.sqlite3", std::process::id()))
    }

    #[test]
    fn fresh_store_claims_a_host_id_then_reopens_with_the_same_password() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        {
            let _store = Store::open(&path, b"hunter2").unwrap();
        }
        let _store = Store::open(&path, b"hunter2").unwrap();

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn wrong_password_is_rejected_on_reopen() {
        let path = temp_path("wrongpw");
        let _ = std::fs::remove_file(&path);

        {
            let _store = Store::open(&path, b"correct horse").unwrap();
        }
        let result = Store::open(&path, b"incorrect horse");
        assert!(matches!(result, Err(StoreError::WrongPassword)));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn messages_round_trip_through_sealing() {
        let path = temp_path("messages");
        let _ = std::fs::remove_file(&path);

        let store = Store::open(&path, b"pw").unwrap();
        store.upsert_conversation(42, &[0u8; STREAMS_STATES_SIZE]).unwrap();
        store.add_message(42, 42, 100, b"hello").unwrap();
        store.add_message(42, 42, 200, b"world").unwrap();

        let msgs = store.messages_after(42, 0).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].plaintext, b"hello");
        assert_eq!(msgs[1].plaintext, b"world");

        let msgs = store.messages_after(42, 100).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].plaintext, b"world");

        assert_eq!(store.latest_timestamp(42).unwrap(), Some(200));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn adding_a_message_to_an_unknown_conversation_is_rejected() {
        let path = temp_path("invariant");
        let _ = std::fs::remove_file(&path);

        let store = Store::open(&path, b"pw").unwrap();
        let result = store.add_message(999, 1, 0, b"nope");
        assert!(matches!(result, Err(StoreError::Invariant(_))));

        let _ = std::fs::remove_file(&path);
    }
}
