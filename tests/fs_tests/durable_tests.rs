//! Tests for object stores and DurableFs

use std::sync::Arc;

use pagevault::fs::{Codec, DirObjectStore, DurableFs, MemoryObjectStore, ObjectStore};
use pagevault::Compression;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memory_fs() -> (Arc<MemoryObjectStore>, DurableFs) {
    let store = Arc::new(MemoryObjectStore::new());
    let fs = DurableFs::new(store.clone(), Codec::identity());
    (store, fs)
}

// =============================================================================
// Object Store Tests
// =============================================================================

#[test]
fn test_memory_store_list_respects_separator() {
    let store = MemoryObjectStore::new();
    store.put("a/1", b"x").unwrap();
    store.put("a/2", b"y").unwrap();
    store.put("ab/3", b"z").unwrap();

    assert_eq!(store.list("a/").unwrap(), vec!["a/1", "a/2"]);
    assert_eq!(store.list("").unwrap().len(), 3);
}

#[test]
fn test_dir_store_round_trip_and_list() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirObjectStore::open(temp_dir.path()).unwrap();

    store.put("databases/db/main/metadata", b"meta").unwrap();
    store.put("databases/db/main/ranges/0000000000", b"range").unwrap();

    assert_eq!(store.get("databases/db/main/metadata").unwrap(), b"meta");
    assert_eq!(
        store.list("databases/db/main/ranges/").unwrap(),
        vec!["databases/db/main/ranges/0000000000"]
    );

    store.delete("databases/db/main/metadata").unwrap();
    assert!(store.get("databases/db/main/metadata").unwrap_err().is_not_found());
    // Deleting again is not an error
    store.delete("databases/db/main/metadata").unwrap();
}

#[test]
fn test_dir_store_keys_differing_by_extension() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirObjectStore::open(temp_dir.path()).unwrap();

    store.put("blobs/x.a", b"first").unwrap();
    store.put("blobs/x.b", b"second").unwrap();
    store.put("blobs/x.partial", b"third").unwrap();

    assert_eq!(store.get("blobs/x.a").unwrap(), b"first");
    assert_eq!(store.get("blobs/x.b").unwrap(), b"second");
    assert_eq!(
        store.list("blobs/").unwrap(),
        vec!["blobs/x.a", "blobs/x.b", "blobs/x.partial"]
    );
}

#[test]
fn test_dir_store_keys_stay_inside_root() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirObjectStore::open(temp_dir.path().join("store")).unwrap();

    store.put("../../outside", b"confined").unwrap();

    assert!(!temp_dir.path().join("outside").exists());
    assert_eq!(store.get("outside").unwrap(), b"confined");
    assert_eq!(store.list("").unwrap(), vec!["outside"]);
}

// =============================================================================
// DurableFs Tests
// =============================================================================

#[test]
fn test_missing_object_is_not_found() {
    let (_store, fs) = memory_fs();
    assert!(fs.read_file("nope").unwrap_err().is_not_found());
    assert!(!fs.exists("nope").unwrap());
}

#[test]
fn test_compressed_objects_are_transparent() {
    let store = Arc::new(MemoryObjectStore::new());
    let fs = DurableFs::new(store.clone(), Codec::new(Compression::Zstd { level: 3 }));

    let data = vec![0x42u8; 64 * 1024];
    fs.write_file("big", &data).unwrap();

    assert!(store.get("big").unwrap().len() < data.len());
    assert_eq!(fs.read_file("big").unwrap(), data);
    assert_eq!(fs.stat("big").unwrap().size, data.len() as i64);
}

#[test]
fn test_rename_and_truncate() {
    let (store, fs) = memory_fs();
    fs.write_file("old", b"abcdef").unwrap();

    fs.rename("old", "new").unwrap();
    assert!(!fs.exists("old").unwrap());
    assert_eq!(store.len(), 1);

    fs.truncate("new", 3).unwrap();
    assert_eq!(fs.read_file("new").unwrap(), b"abc");
    fs.truncate("new", 5).unwrap();
    assert_eq!(fs.read_file("new").unwrap(), b"abc\0\0");
}

#[test]
fn test_remove_all_only_touches_subtree() {
    let (store, fs) = memory_fs();
    fs.write_file("db/main/metadata", b"1").unwrap();
    fs.write_file("db/main/ranges/0", b"2").unwrap();
    fs.write_file("db/mainline/metadata", b"3").unwrap();

    fs.remove_all("db/main").unwrap();

    assert_eq!(store.len(), 1);
    assert!(fs.exists("db/mainline/metadata").unwrap());
}

#[test]
fn test_read_dir_lists_direct_children() {
    let (_store, fs) = memory_fs();
    fs.write_file("d/file1", b"1").unwrap();
    fs.write_file("d/sub/file2", b"22").unwrap();

    let entries = fs.read_dir("d").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "file1");
    assert_eq!(entries[0].size, 1);
    assert_eq!(entries[1].name, "sub");
    assert!(entries[1].is_dir);

    assert!(fs.read_dir("empty").unwrap_err().is_not_found());
}
