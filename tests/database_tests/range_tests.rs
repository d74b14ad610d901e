//! Tests for DataRange and DatabaseMetadata

use std::sync::Arc;
use std::time::Duration;

use pagevault::database::{DataRange, DatabaseMetadata};
use pagevault::fs::{Codec, DurableFs, LocalFs, MemoryObjectStore, TieredFs};
use pagevault::{TieredConfig, VaultError};
use tempfile::TempDir;

const PAGE_SIZE: usize = 256;
const MAX_PAGES: u64 = 8;

fn setup() -> (TempDir, Arc<TieredFs>) {
    let temp = TempDir::new().unwrap();
    let local = LocalFs::new(temp.path()).unwrap();
    let durable = DurableFs::new(Arc::new(MemoryObjectStore::new()), Codec::identity());
    let fs = Arc::new(TieredFs::new(
        local,
        durable,
        TieredConfig {
            max_open_files: 4,
            promotion_interval: Duration::from_secs(60),
            promotion_grace: Duration::ZERO,
        },
    ));
    (temp, fs)
}

fn range(fs: &Arc<TieredFs>) -> DataRange {
    DataRange::new(Arc::clone(fs), "r/0000000003".to_string(), 3, PAGE_SIZE, MAX_PAGES)
}

// =============================================================================
// DataRange Tests
// =============================================================================

#[test]
fn test_missing_range_reads_zero() {
    let (_temp, fs) = setup();
    let range = range(&fs);

    let mut buf = vec![0u8; PAGE_SIZE];
    assert_eq!(range.read_page(0, &mut buf).unwrap(), 0);
    assert_eq!(range.size().unwrap(), 0);
}

#[test]
fn test_slot_offsets() {
    let (_temp, fs) = setup();
    let range = range(&fs);

    range.write_page(2, &vec![0xAB; PAGE_SIZE]).unwrap();
    assert_eq!(range.size().unwrap(), 3 * PAGE_SIZE as u64);

    let mut buf = vec![0u8; PAGE_SIZE];
    assert_eq!(range.read_page(2, &mut buf).unwrap(), PAGE_SIZE);
    assert_eq!(buf, vec![0xAB; PAGE_SIZE]);
    // Slots before the first write are zero-filled holes
    range.read_page(0, &mut buf).unwrap();
    assert!(buf.iter().all(|b| *b == 0));
}

#[test]
fn test_slot_out_of_bounds() {
    let (_temp, fs) = setup();
    let range = range(&fs);

    let mut buf = vec![0u8; PAGE_SIZE];
    assert!(matches!(range.read_page(MAX_PAGES, &mut buf), Err(VaultError::Storage(_))));
    assert!(range.write_page(MAX_PAGES, &buf).is_err());
}

#[test]
fn test_write_requires_full_page() {
    let (_temp, fs) = setup();
    let range = range(&fs);

    let err = range.write_page(0, &[1u8; 10]).unwrap_err();
    assert!(matches!(
        err,
        VaultError::PageSizeMismatch { expected: PAGE_SIZE, actual: 10 }
    ));
}

#[test]
fn test_truncate_never_grows_and_delete_is_idempotent() {
    let (_temp, fs) = setup();
    let range = range(&fs);
    range.write_page(1, &vec![1u8; PAGE_SIZE]).unwrap();

    range.truncate(10 * PAGE_SIZE as u64).unwrap();
    assert_eq!(range.size().unwrap(), 2 * PAGE_SIZE as u64);

    range.truncate(PAGE_SIZE as u64).unwrap();
    assert_eq!(range.size().unwrap(), PAGE_SIZE as u64);

    range.delete().unwrap();
    range.delete().unwrap();
    assert!(!fs.exists(range.key()).unwrap());
}

// =============================================================================
// Metadata Tests
// =============================================================================

#[test]
fn test_metadata_defaults_when_missing() {
    let (_temp, fs) = setup();
    let meta = DatabaseMetadata::load(&fs, "meta", "db", "main").unwrap();
    assert_eq!(meta, DatabaseMetadata::new("db", "main"));
    assert_eq!(meta.size(4096), 0);
}

#[test]
fn test_metadata_save_and_load() {
    let (_temp, fs) = setup();
    let mut meta = DatabaseMetadata::new("db", "main");
    meta.page_count = 42;
    meta.save(&fs, "meta").unwrap();

    let loaded = DatabaseMetadata::load(&fs, "meta", "db", "main").unwrap();
    assert_eq!(loaded.page_count, 42);
    assert_eq!(loaded.size(4096), 42 * 4096);
}

#[test]
fn test_metadata_corrupt_file_is_error() {
    let (_temp, fs) = setup();
    fs.write_file("meta", &[0xFF; 3]).unwrap();
    assert!(DatabaseMetadata::load(&fs, "meta", "db", "main").is_err());
}
