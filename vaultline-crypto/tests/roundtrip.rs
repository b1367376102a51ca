use vaultline_crypto::{
    derive_key_from_password, keypair, open, pad, seal, stream_init_pull, stream_init_push, stream_pull, stream_push,
    unpad, DerivedKeys, HashState, StreamState,
};

#[test]
fn handshake_reciprocity_across_independent_keypairs() {
    let (client_pk, client_sk) = keypair();
    let (server_pk, server_sk) = keypair();

    let client = DerivedKeys::as_client(&server_pk, &client_pk, &client_sk);
    let server = DerivedKeys::as_server(&client_pk, &server_pk, &server_sk);

    assert_eq!(client.tx, server.rx);
    assert_eq!(client.rx, server.tx);
    // rx and tx must differ, or the ratchet would encrypt both directions
    // under the same key.
    assert_ne!(client.rx, client.tx);
}

#[test]
fn stream_ratchet_delivers_messages_in_order() {
    let key = [42u8; 32];
    let (mut push, header) = stream_init_push(&key);
    let mut pull = stream_init_pull(&key, &header).unwrap();

    let messages: Vec<Vec<u8>> = vec![b"first".to_vec(), b"second".to_vec(), b"third, a bit longer".to_vec()];
    let ciphertexts: Vec<Vec<u8>> = messages.iter().map(|m| stream_push(&mut push, m)).collect();

    for (ciphertext, expected) in ciphertexts.iter().zip(&messages) {
        let plaintext = stream_pull(&mut pull, ciphertext).unwrap();
        assert_eq!(&plaintext, expected);
    }
}

#[test]
fn stream_ratchet_rejects_replayed_ciphertext() {
    let key = [7u8; 32];
    let (mut push, header) = stream_init_push(&key);
    let mut pull = stream_init_pull(&key, &header).unwrap();

    let first = stream_push(&mut push, b"one");
    let _second = stream_push(&mut push, b"two");

    assert!(stream_pull(&mut pull, &first).is_ok());
    // pull has already advanced past the first message; replaying it must
    // not decrypt again under the new ratchet position.
    assert!(stream_pull(&mut pull, &first).is_err());
}

#[test]
fn stream_ratchet_rejects_out_of_order_delivery() {
    let key = [13u8; 32];
    let (mut push, header) = stream_init_push(&key);
    let mut pull = stream_init_pull(&key, &header).unwrap();

    let first = stream_push(&mut push, b"one");
    let second = stream_push(&mut push, b"two");

    // pull expects `first` next; handing it `second` first must fail rather
    // than silently desynchronizing.
    assert!(stream_pull(&mut pull, &second).is_err());
    assert!(stream_pull(&mut pull, &first).is_ok());
}

#[test]
fn stream_state_survives_a_byte_round_trip() {
    let key = [99u8; 32];
    let (mut push, header) = stream_init_push(&key);
    let mut pull = stream_init_pull(&key, &header).unwrap();

    let ciphertext = stream_push(&mut push, b"before persistence");
    let restored = StreamState::from_bytes(&push.to_bytes());
    let mut restored_pull = StreamState::from_bytes(&pull.to_bytes());

    assert_eq!(stream_pull(&mut pull, &ciphertext).unwrap(), b"before persistence");

    // a freshly-restored push state continues the ratchet from where it was
    // serialized, independent of the original value.
    let mut push2 = restored;
    let next = stream_push(&mut push2, b"after persistence");
    assert_eq!(stream_pull(&mut restored_pull, &next).unwrap(), b"after persistence");
}

#[test]
fn seal_open_round_trip_recovers_plaintext() {
    let key = [5u8; 32];
    let plaintext = b"the master key never touches disk unsealed";
    let sealed = seal(&key, plaintext);

    // nonce (24) + tag (16) + plaintext length
    assert_eq!(sealed.len(), plaintext.len() + 16 + 24);
    assert_eq!(open(&key, &sealed).unwrap(), plaintext);
}

#[test]
fn seal_open_rejects_wrong_key() {
    let key = [5u8; 32];
    let wrong_key = [6u8; 32];
    let sealed = seal(&key, b"secret");
    assert!(open(&wrong_key, &sealed).is_err());
}

#[test]
fn seal_open_rejects_truncated_ciphertext() {
    let key = [5u8; 32];
    let mut sealed = seal(&key, b"secret");
    sealed.truncate(sealed.len() - 1);
    assert!(open(&key, &sealed).is_err());
}

#[test]
fn hash_is_order_sensitive_and_incremental() {
    let mut incremental = HashState::init();
    incremental.update(b"hello, ");
    incremental.update(b"world");
    let incremental_digest = incremental.finish();

    let mut combined = HashState::init();
    combined.update(b"hello, world");
    let combined_digest = combined.finish();

    assert_eq!(incremental_digest, combined_digest);

    let mut swapped = HashState::init();
    swapped.update(b"world");
    swapped.update(b"hello, ");
    assert_ne!(swapped.finish(), combined_digest);
}

#[test]
fn password_derived_keys_are_deterministic_and_distinct() {
    let a = derive_key_from_password(b"correct horse battery staple");
    let b = derive_key_from_password(b"correct horse battery staple");
    let c = derive_key_from_password(b"different password entirely");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn pad_unpad_round_trip_recovers_original_bytes() {
    for len in [0usize, 1, 7, 8, 9, 63, 64, 65] {
        let data = vec![0xab; len];
        let padded = pad(&data);
        assert_eq!(padded.len() % 8, 0);
        assert_eq!(unpad(&padded).unwrap(), data);
    }
}
