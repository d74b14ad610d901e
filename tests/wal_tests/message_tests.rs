//! Tests for WalMessage and WalSequencer

use pagevault::wal::{WalMessage, WalSequencer};
use pagevault::VaultError;

// =============================================================================
// Message Encoding Tests
// =============================================================================

#[test]
fn test_encode_decode() {
    let message = WalMessage::Write {
        sequence: 7,
        timestamp: 1_700_000_000_123,
        offset: 4096,
        data: vec![9u8; 100],
    };

    let bytes = message.encode().unwrap();
    assert_eq!(WalMessage::decode(&bytes).unwrap(), message);
}

#[test]
fn test_flipped_bit_is_corruption() {
    let message = WalMessage::Truncate {
        size: 0,
        sequence: 3,
        timestamp: 5,
    };
    let mut bytes = message.encode().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    assert!(matches!(
        WalMessage::decode(&bytes),
        Err(VaultError::Corruption(_))
    ));
}

#[test]
fn test_short_message_is_corruption() {
    assert!(matches!(
        WalMessage::decode(&[1, 2, 3]),
        Err(VaultError::Corruption(_))
    ));
}

#[test]
fn test_accessors() {
    let write = WalMessage::Write {
        sequence: 2,
        timestamp: 20,
        offset: 0,
        data: Vec::new(),
    };
    let truncate = WalMessage::Truncate {
        size: 1,
        sequence: 3,
        timestamp: 30,
    };
    assert_eq!((write.sequence(), write.timestamp()), (2, 20));
    assert_eq!((truncate.sequence(), truncate.timestamp()), (3, 30));
}

// =============================================================================
// Sequencer Tests
// =============================================================================

#[test]
fn test_sequencer_numbers_writes() {
    let sequencer = WalSequencer::new();
    let first = sequencer.write(0, b"a");
    let second = sequencer.write(1, b"b");

    assert_eq!(first.sequence(), 1);
    assert_eq!(second.sequence(), 2);
    assert!(second.timestamp() >= first.timestamp());
    assert!(first.timestamp() > 0);
    assert_eq!(sequencer.sequence(), 2);
}

#[test]
fn test_sequencer_truncate_resets_epoch() {
    let sequencer = WalSequencer::new();
    sequencer.write(0, b"a");
    sequencer.write(1, b"b");

    let truncate = sequencer.truncate(0);
    assert_eq!(truncate.sequence(), 3);
    assert_eq!(sequencer.sequence(), 0);

    assert_eq!(sequencer.write(0, b"c").sequence(), 1);
}
