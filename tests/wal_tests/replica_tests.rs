//! Tests for WalReplica
//!
//! These tests verify:
//! - Out-of-order arrivals produce the same file as in-order ones
//! - A buffered successor that fails to apply does not undo the write before it
//! - Stale replays are rejected without touching the file
//! - A fresh replica demands sequence 1
//! - Truncation starts a new epoch and drops buffered writes

use std::fs;
use std::path::Path;

use pagevault::wal::{ApplyOutcome, WalReplica, WalSequencer};
use pagevault::VaultError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (TempDir, WalReplica) {
    let temp_dir = TempDir::new().unwrap();
    let replica = WalReplica::open(&temp_dir.path().join("wal").join("db.wal")).unwrap();
    (temp_dir, replica)
}

fn contents(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap()
}

/// Three writes that overlap so application order matters
fn writes() -> Vec<(i64, u64, Vec<u8>)> {
    vec![
        (1, 0, b"AAAAAAAA".to_vec()),
        (2, 4, b"BBBBBBBB".to_vec()),
        (3, 8, b"CC".to_vec()),
    ]
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_reordered_writes_match_in_order_writes() {
    let (_a, in_order) = setup();
    for (seq, offset, data) in writes() {
        in_order.write_at(seq, seq * 10, offset, &data).unwrap();
    }

    let (_b, reordered) = setup();
    let w = writes();
    reordered.write_at(w[0].0, 10, w[0].1, &w[0].2).unwrap();
    assert_eq!(
        reordered.write_at(w[2].0, 30, w[2].1, &w[2].2).unwrap(),
        ApplyOutcome::Buffered
    );
    assert_eq!(reordered.pending_count(), 1);
    assert_eq!(
        reordered.write_at(w[1].0, 20, w[1].1, &w[1].2).unwrap(),
        ApplyOutcome::Applied { drained: 1 }
    );

    assert_eq!(reordered.sequence(), 3);
    assert_eq!(reordered.timestamp(), 30);
    assert_eq!(reordered.pending_count(), 0);
    assert_eq!(
        contents(reordered.file().path()),
        contents(in_order.file().path())
    );
    assert_eq!(contents(in_order.file().path()), b"AAAABBBBCC");
}

#[test]
fn test_long_gap_drains_in_sequence() {
    let (_temp, replica) = setup();
    replica.write_at(1, 1, 0, b"1").unwrap();
    for seq in (3..=6).rev() {
        assert_eq!(
            replica.write_at(seq, seq, (seq - 1) as u64, seq.to_string().as_bytes()).unwrap(),
            ApplyOutcome::Buffered
        );
    }

    assert_eq!(
        replica.write_at(2, 2, 1, b"2").unwrap(),
        ApplyOutcome::Applied { drained: 4 }
    );
    assert_eq!(contents(replica.file().path()), b"123456");
}

#[test]
fn test_duplicate_buffered_write_keeps_first_copy() {
    let (_temp, replica) = setup();
    replica.write_at(1, 1, 0, b"a").unwrap();
    replica.write_at(3, 3, 2, b"first").unwrap();
    replica.write_at(3, 3, 2, b"second").unwrap();
    assert_eq!(replica.pending_count(), 1);

    replica.write_at(2, 2, 1, b"b").unwrap();
    assert_eq!(contents(replica.file().path()), b"abfirst");
}

#[test]
fn test_failed_drain_keeps_applied_write() {
    let (_temp, replica) = setup();
    replica.write_at(1, 1, 0, b"one").unwrap();

    // Sequence 3 cannot be written at this offset and stays buffered
    assert_eq!(
        replica.write_at(3, 3, u64::MAX - 8, b"bad").unwrap(),
        ApplyOutcome::Buffered
    );

    assert_eq!(
        replica.write_at(2, 2, 3, b"two").unwrap(),
        ApplyOutcome::Applied { drained: 0 }
    );
    assert_eq!(replica.sequence(), 2);
    assert_eq!(replica.pending_count(), 1);

    // A retransmitted 3 replaces the stuck copy
    assert_eq!(
        replica.write_at(3, 3, 6, b"three").unwrap(),
        ApplyOutcome::Applied { drained: 0 }
    );
    assert_eq!(replica.pending_count(), 0);
    assert_eq!(contents(replica.file().path()), b"onetwothree");
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[test]
fn test_stale_replay_is_rejected() {
    let (_temp, replica) = setup();
    for seq in 1..=5 {
        replica.write_at(seq, seq, (seq - 1) as u64, b"x").unwrap();
    }
    let before = contents(replica.file().path());

    let err = replica.write_at(3, 99, 0, b"REPLAY").unwrap_err();

    assert!(matches!(
        err,
        VaultError::WalSequenceMismatch { current: 5, received: 3 }
    ));
    assert_eq!(contents(replica.file().path()), before);
    assert_eq!(replica.sequence(), 5);
}

#[test]
fn test_fresh_replica_requires_first_sequence() {
    let (_temp, replica) = setup();

    let err = replica.write_at(4, 1, 0, b"late").unwrap_err();

    assert!(matches!(err, VaultError::WalOutOfSync { sequence: 4 }));
    assert_eq!(replica.pending_count(), 0);
    assert_eq!(replica.file().size().unwrap(), 0);
}

// =============================================================================
// Truncate Tests
// =============================================================================

#[test]
fn test_truncate_starts_new_epoch() {
    let (_temp, replica) = setup();
    replica.write_at(1, 1, 0, b"0123456789").unwrap();
    replica.write_at(3, 3, 10, b"lost").unwrap();
    assert_eq!(replica.pending_count(), 1);

    replica.truncate(4, 3, 50).unwrap();

    assert_eq!(replica.sequence(), 0);
    assert_eq!(replica.timestamp(), 50);
    assert_eq!(replica.pending_count(), 0);
    assert_eq!(contents(replica.file().path()), b"0123");

    // The next epoch begins at 1 again
    assert!(replica.write_at(2, 51, 0, b"x").is_err());
    replica.write_at(1, 51, 4, b"45").unwrap();
    assert_eq!(contents(replica.file().path()), b"012345");
}

#[test]
fn test_sequencer_messages_drive_replica() {
    let (_temp, replica) = setup();
    let sequencer = WalSequencer::new();

    let messages = vec![
        sequencer.write(0, b"hello"),
        sequencer.write(5, b" world"),
        sequencer.truncate(5),
        sequencer.write(5, b"!"),
    ];

    // A fresh replica cannot start at the second write
    assert!(matches!(
        replica.apply(&messages[1]),
        Err(VaultError::WalOutOfSync { sequence: 2 })
    ));
    replica.apply(&messages[0]).unwrap();
    replica.apply(&messages[1]).unwrap();
    replica.apply(&messages[2]).unwrap();
    replica.apply(&messages[3]).unwrap();

    assert_eq!(contents(replica.file().path()), b"hello!");
    assert_eq!(replica.sequence(), 1);
}
