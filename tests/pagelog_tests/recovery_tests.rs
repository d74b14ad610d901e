//! Tests for page log recovery
//!
//! These tests verify:
//! - Partial trailing index entries are ignored and cut off
//! - Log records whose index entry was lost are re-indexed
//! - Partial trailing log records are cut off
//! - Dangling index entries are discarded

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use pagevault::pagelog::{PageLog, INDEX_ENTRY_SIZE, RECORD_HEADER_SIZE};
use tempfile::TempDir;

const PAGE_SIZE: usize = 512;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_versions(dir: &Path, versions: &[(u64, u64, u8)]) {
    let log = PageLog::open(dir, PAGE_SIZE).unwrap();
    for (page, version, byte) in versions {
        log.append(*page, *version, &vec![*byte; PAGE_SIZE]).unwrap();
    }
    log.close().unwrap();
}

fn append_garbage(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

fn set_len(path: &Path, len: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len).unwrap();
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_clean_open_reports_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let log = PageLog::open(temp_dir.path(), PAGE_SIZE).unwrap();
    assert_eq!(log.recovery().entries_recovered, 0);
    assert!(!log.recovery().was_truncated);
}

#[test]
fn test_partial_index_tail_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    write_versions(temp_dir.path(), &[(1, 1, 0xA1), (1, 2, 0xA2)]);

    let idx = temp_dir.path().join("pages.idx");
    append_garbage(&idx, &[0xEE; 10]);

    let log = PageLog::open(temp_dir.path(), PAGE_SIZE).unwrap();
    assert_eq!(log.recovery().entries_recovered, 2);
    assert!(log.recovery().was_truncated);
    assert_eq!(file_len(&idx), 2 * INDEX_ENTRY_SIZE as u64);

    let mut out = vec![0u8; PAGE_SIZE];
    assert_eq!(log.get(1, 0, &mut out).unwrap(), Some(2));
    assert_eq!(out, vec![0xA2; PAGE_SIZE]);
}

#[test]
fn test_lost_index_entry_is_reindexed() {
    let temp_dir = TempDir::new().unwrap();
    write_versions(temp_dir.path(), &[(1, 1, 0x01), (2, 1, 0x02), (1, 2, 0x03)]);

    // Simulate a crash between the data write and the index write
    let idx = temp_dir.path().join("pages.idx");
    set_len(&idx, 2 * INDEX_ENTRY_SIZE as u64);

    let log = PageLog::open(temp_dir.path(), PAGE_SIZE).unwrap();
    assert_eq!(log.recovery().entries_recovered, 2);
    assert_eq!(log.recovery().records_reindexed, 1);

    let mut out = vec![0u8; PAGE_SIZE];
    assert_eq!(log.get(1, 0, &mut out).unwrap(), Some(2));
    assert_eq!(out, vec![0x03; PAGE_SIZE]);
    assert_eq!(file_len(&idx), 3 * INDEX_ENTRY_SIZE as u64);
}

#[test]
fn test_partial_log_record_is_cut_off() {
    let temp_dir = TempDir::new().unwrap();
    write_versions(temp_dir.path(), &[(1, 1, 0x55)]);

    let log_path = temp_dir.path().join("pages.log");
    let record_size = (RECORD_HEADER_SIZE + PAGE_SIZE) as u64;
    append_garbage(&log_path, &[0x77; 100]);

    let log = PageLog::open(temp_dir.path(), PAGE_SIZE).unwrap();
    assert!(log.recovery().was_truncated);
    assert_eq!(log.log_size(), record_size);
    assert_eq!(file_len(&log_path), record_size);

    // Appends continue right after the last good record
    log.append(1, 2, &vec![0x66; PAGE_SIZE]).unwrap();
    let mut out = vec![0u8; PAGE_SIZE];
    assert_eq!(log.get(1, 0, &mut out).unwrap(), Some(2));
    assert_eq!(out, vec![0x66; PAGE_SIZE]);
}

#[test]
fn test_dangling_index_entry_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    write_versions(temp_dir.path(), &[(1, 1, 0x01), (1, 2, 0x02)]);

    // Lose the second data record but keep its index entry
    let log_path = temp_dir.path().join("pages.log");
    set_len(&log_path, (RECORD_HEADER_SIZE + PAGE_SIZE) as u64);

    let log = PageLog::open(temp_dir.path(), PAGE_SIZE).unwrap();
    assert_eq!(log.recovery().entries_recovered, 1);
    assert_eq!(log.recovery().entries_discarded, 1);
    assert_eq!(log.versions(1), vec![1]);
}

#[test]
fn test_recovered_log_survives_second_reopen() {
    let temp_dir = TempDir::new().unwrap();
    write_versions(temp_dir.path(), &[(4, 1, 0x10), (4, 2, 0x20)]);
    append_garbage(&temp_dir.path().join("pages.idx"), &[1, 2, 3]);

    {
        let log = PageLog::open(temp_dir.path(), PAGE_SIZE).unwrap();
        assert!(log.recovery().was_truncated);
        log.close().unwrap();
    }

    let log = PageLog::open(temp_dir.path(), PAGE_SIZE).unwrap();
    assert!(!log.recovery().was_truncated);
    assert_eq!(log.versions(4), vec![1, 2]);
}
