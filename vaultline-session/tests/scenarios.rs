//! End-to-end scenarios against in-process loopback peer pairs: no socket,
//! no server process, just the same relayed `PeerLink` plumbing the
//! orchestrator hands to `conversation`/`messaging` in a real client.

use tokio::sync::mpsc;

use vaultline_session::conversation::{invite, respond};
use vaultline_session::messaging::{prepare_outgoing, receive_incoming, Incoming};
use vaultline_session::{PeerLink, SettingUpGuard};
use vaultline_store::Store;

fn link_pair(a_id: u32, b_id: u32) -> (PeerLink, PeerLink) {
    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    let (relay_to_b, inbound_b) = mpsc::channel(8);
    let (relay_to_a, inbound_a) = mpsc::channel(8);

    tokio::spawn(async move {
        let mut rx_a = rx_a;
        while let Some(frame) = rx_a.recv().await {
            if relay_to_b.send(frame).await.is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        let mut rx_b = rx_b;
        while let Some(frame) = rx_b.recv().await {
            if relay_to_a.send(frame).await.is_err() {
                break;
            }
        }
    });

    let a = PeerLink { outbound: tx_a, inbound: inbound_a, self_id: a_id, peer_id: b_id, token: [0u8; 64] };
    let b = PeerLink { outbound: tx_b, inbound: inbound_b, self_id: b_id, peer_id: a_id, token: [0u8; 64] };
    (a, b)
}

fn fresh_store(name: &str) -> Store {
    let path = std::env::temp_dir().join(format!("vaultline-scenario-{name}-{}.sqlite3", std::process::id()));
    let _ = std::fs::remove_file(&path);
    Store::open(&path, b"correct horse battery staple").unwrap()
}

/// S3: two clients complete the 4-message conversation setup; a message sent
/// by one is decrypted by the other to exactly the same bytes, and the
/// reverse direction works too.
#[tokio::test]
async fn established_conversation_carries_messages_both_ways() {
    let (mut a_link, mut b_link) = link_pair(1, 2);
    let a_guard = SettingUpGuard::default();
    let b_guard = SettingUpGuard::default();

    let a_task = tokio::spawn(async move {
        let crypto = invite(&mut a_link, &a_guard).await.unwrap();
        (a_link, crypto)
    });
    let b_task = tokio::spawn(async move {
        let _invite_frame = b_link.inbound.recv().await.unwrap();
        let crypto = respond(&mut b_link, &b_guard, true).await.unwrap().unwrap();
        (b_link, crypto)
    });

    let (_a_link, mut a_crypto) = a_task.await.unwrap();
    let (_b_link, mut b_crypto) = b_task.await.unwrap();

    let a_store = fresh_store("s3-a");
    let b_store = fresh_store("s3-b");
    a_store.upsert_conversation(2, &[0u8; vaultline_crypto::STREAMS_STATES_SIZE]).unwrap();
    b_store.upsert_conversation(1, &[0u8; vaultline_crypto::STREAMS_STATES_SIZE]).unwrap();

    let ciphertext = prepare_outgoing(&a_store, &mut a_crypto.push, &a_crypto.pull, 2, b"hi").unwrap();
    let incoming = receive_incoming(&b_store, &b_crypto.push, &mut b_crypto.pull, 1, 0, &ciphertext).unwrap();
    assert_eq!(incoming, Incoming::Text(b"hi".to_vec()));

    let ciphertext = prepare_outgoing(&b_store, &mut b_crypto.push, &b_crypto.pull, 1, b"hi back").unwrap();
    let incoming = receive_incoming(&a_store, &a_crypto.push, &mut a_crypto.pull, 2, 0, &ciphertext).unwrap();
    assert_eq!(incoming, Incoming::Text(b"hi back".to_vec()));
}

/// S4: a corrupted bit in the ciphertext fails authentication rather than
/// delivering altered or garbage plaintext.
#[tokio::test]
async fn corrupted_ciphertext_is_rejected_not_silently_garbled() {
    let (mut a_link, mut b_link) = link_pair(1, 2);
    let a_guard = SettingUpGuard::default();
    let b_guard = SettingUpGuard::default();

    let a_task = tokio::spawn(async move {
        let crypto = invite(&mut a_link, &a_guard).await.unwrap();
        crypto
    });
    let b_task = tokio::spawn(async move {
        let _invite_frame = b_link.inbound.recv().await.unwrap();
        respond(&mut b_link, &b_guard, true).await.unwrap().unwrap()
    });

    let mut a_crypto = a_task.await.unwrap();
    let mut b_crypto = b_task.await.unwrap();

    let a_store = fresh_store("s4-a");
    let b_store = fresh_store("s4-b");
    a_store.upsert_conversation(2, &[0u8; vaultline_crypto::STREAMS_STATES_SIZE]).unwrap();
    b_store.upsert_conversation(1, &[0u8; vaultline_crypto::STREAMS_STATES_SIZE]).unwrap();

    let mut ciphertext = prepare_outgoing(&a_store, &mut a_crypto.push, &a_crypto.pull, 2, b"hi").unwrap();
    *ciphertext.last_mut().unwrap() ^= 0x01;

    let result = receive_incoming(&b_store, &b_crypto.push, &mut b_crypto.pull, 1, 0, &ciphertext);
    assert!(result.is_err());
    assert!(b_store.messages_after(1, 0).unwrap().is_empty());
}

/// S6: opening the store with the wrong password fails, and the plaintext of
/// a stored message never appears verbatim in the on-disk file.
#[tokio::test]
async fn wrong_password_is_rejected_and_disk_bytes_are_not_plaintext() {
    let path = std::env::temp_dir().join(format!("vaultline-scenario-s6-{}.sqlite3", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let store = Store::open(&path, b"the real password").unwrap();
    store.upsert_conversation(99, &[0u8; vaultline_crypto::STREAMS_STATES_SIZE]).unwrap();
    let secret_message = b"the launch code is nine four two six";
    store.add_message(99, 99, 1, secret_message).unwrap();
    drop(store);

    assert!(Store::open(&path, b"a guessed password").is_err());

    let raw = std::fs::read(&path).unwrap();
    let needle = secret_message.to_vec();
    assert!(
        !raw.windows(needle.len()).any(|window| window == needle.as_slice()),
        "plaintext message bytes must not appear verbatim in the store file"
    );
}
