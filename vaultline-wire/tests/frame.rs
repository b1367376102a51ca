use vaultline_wire::token::ANONYMOUS;
use vaultline_wire::{Flag, Frame, Token, BODY_SIZE, FRAME_SIZE};

#[test]
fn pack_unpack_round_trip_preserves_every_field() {
    let token: Token = [9u8; 64];
    let frame = Frame::single(Flag::Proceed, 123456, 5, 6, token, b"hello".to_vec());
    let packed = frame.pack();
    assert_eq!(packed.len(), FRAME_SIZE);

    let unpacked = Frame::unpack(&packed).unwrap();
    assert_eq!(unpacked.flag, frame.flag);
    assert_eq!(unpacked.timestamp, frame.timestamp);
    assert_eq!(unpacked.size, frame.size);
    assert_eq!(unpacked.from, frame.from);
    assert_eq!(unpacked.to, frame.to);
    assert_eq!(unpacked.token, frame.token);
    assert_eq!(unpacked.payload(), b"hello");
}

#[test]
fn anonymous_frame_carries_the_zero_token() {
    let frame = Frame::anonymous(Flag::LogIn, 0, 1, b"user".to_vec());
    assert_eq!(frame.token, ANONYMOUS);
    assert_eq!(Frame::unpack(&frame.pack()).unwrap().token, ANONYMOUS);
}

#[test]
fn body_is_zero_padded_past_size() {
    let frame = Frame::single(Flag::Proceed, 0, 1, 2, ANONYMOUS, b"ab".to_vec());
    let packed = frame.pack();
    let unpacked = Frame::unpack(&packed).unwrap();
    assert_eq!(unpacked.size, 2);
    assert_eq!(unpacked.body.len(), BODY_SIZE);
    assert!(unpacked.body[2..].iter().all(|&b| b == 0));
}

#[test]
fn header_byte_layout_is_little_endian() {
    let mut frame = Frame::single(Flag::Proceed, 1, 5, 6, [7u8; 64], Vec::new());
    frame.size = 2;
    frame.index = 3;
    frame.count = 4;
    let packed = frame.pack();

    let mut expected = Vec::new();
    expected.extend_from_slice(&0i32.to_le_bytes()); // flag = Proceed
    expected.extend_from_slice(&1u64.to_le_bytes()); // timestamp
    expected.extend_from_slice(&2u32.to_le_bytes()); // size
    expected.extend_from_slice(&3u32.to_le_bytes()); // index
    expected.extend_from_slice(&4u32.to_le_bytes()); // count
    expected.extend_from_slice(&5u32.to_le_bytes()); // from
    expected.extend_from_slice(&6u32.to_le_bytes()); // to
    expected.extend_from_slice(&[7u8; 64]); // token

    assert_eq!(&packed[..expected.len()], expected.as_slice());
}

#[test]
fn unpack_rejects_unknown_flag() {
    let mut bytes = Frame::single(Flag::Proceed, 0, 0, 0, ANONYMOUS, Vec::new()).pack();
    bytes[0..4].copy_from_slice(&999i32.to_le_bytes());
    assert!(Frame::unpack(&bytes).is_err());
}
