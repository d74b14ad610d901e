//! Tests for Engine lifecycle
//!
//! These tests verify:
//! - Opening validates the config and lays out the data directory
//! - Close promotes every local change to durable storage
//! - Dropping a database removes its ranges and page log
//! - WAL replicas are created once per stream

use std::sync::Arc;

use pagevault::fs::{DirObjectStore, ObjectStore};
use pagevault::{Config, Engine, VaultError};
use tempfile::TempDir;

const PAGE_SIZE: usize = 1024;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path().join("data"))
        .durable_dir(temp_dir.path().join("durable"))
        .page_size(PAGE_SIZE)
        .data_range_max_pages(8)
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn page(byte: u8) -> Vec<u8> {
    vec![byte; PAGE_SIZE]
}

// =============================================================================
// Open / Close Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let engine = Engine::open_path(&data_dir).unwrap();

    assert!(data_dir.exists());
    assert!(data_dir.join("local").exists());
    assert!(data_dir.join("node").exists());
    assert!(data_dir.join("durable").exists());
    assert_eq!(engine.data_dir(), data_dir.as_path());
    assert_eq!(engine.config().page_size, 4096);
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .page_size(1000)
        .build();

    assert!(matches!(Engine::open(config), Err(VaultError::Config(_))));
}

#[test]
fn test_database_handles_are_shared() {
    let (_temp, engine) = setup_temp_engine();

    let a = engine.database("db", "main").unwrap();
    let b = engine.database("db", "main").unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(engine.open_database_count(), 1);
}

#[test]
fn test_close_promotes_to_durable_storage() {
    let (temp_dir, engine) = setup_temp_engine();
    let db = engine.database("db", "main").unwrap();
    for p in 1..=20u64 {
        db.write_page(p, &page(p as u8)).unwrap();
    }

    engine.close().unwrap();
    assert_eq!(engine.open_database_count(), 0);

    let store = DirObjectStore::open(temp_dir.path().join("durable")).unwrap();
    let ranges = store.list("databases/db/main/ranges/").unwrap();
    assert_eq!(ranges.len(), 3);
    assert!(store.get("databases/db/main/metadata").is_ok());
}

#[test]
fn test_fresh_node_reads_from_durable_storage() {
    let temp_dir = TempDir::new().unwrap();
    let durable = temp_dir.path().join("shared-durable");

    {
        let engine = Engine::open(
            Config::builder()
                .data_dir(temp_dir.path().join("node-a"))
                .durable_dir(&durable)
                .page_size(PAGE_SIZE)
                .build(),
        )
        .unwrap();
        let db = engine.database("db", "main").unwrap();
        db.write_page(3, &page(0x33)).unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(
        Config::builder()
            .data_dir(temp_dir.path().join("node-b"))
            .durable_dir(&durable)
            .page_size(PAGE_SIZE)
            .build(),
    )
    .unwrap();
    let db = engine.database("db", "main").unwrap();

    assert_eq!(db.page_count(), 3);
    let mut buf = page(0);
    db.read_page(3, &mut buf).unwrap();
    assert_eq!(buf, page(0x33));
}

// =============================================================================
// Drop Database Tests
// =============================================================================

#[test]
fn test_drop_database_removes_pages_and_history() {
    let (_temp, engine) = setup_temp_engine();
    let db = engine.database("db", "main").unwrap();
    db.write_page(1, &page(1)).unwrap();
    db.write_page(1, &page(2)).unwrap();
    assert_eq!(engine.page_log("db", "main").unwrap().entry_count(), 1);

    engine.drop_database("db", "main").unwrap();
    assert_eq!(engine.open_database_count(), 0);

    let db = engine.database("db", "main").unwrap();
    assert_eq!(db.page_count(), 0);
    assert_eq!(engine.page_log("db", "main").unwrap().entry_count(), 0);
    assert_eq!(engine.snapshot("db", "main").unwrap(), 0);
}

#[test]
fn test_drop_unopened_database() {
    let (_temp, engine) = setup_temp_engine();
    engine.drop_database("never", "opened").unwrap();
    assert_eq!(engine.open_database_count(), 0);
}

// =============================================================================
// WAL Replica Tests
// =============================================================================

#[test]
fn test_wal_replica_created_once() {
    let (_temp, engine) = setup_temp_engine();

    let a = engine.wal_replica("stream-1").unwrap();
    let b = engine.wal_replica("stream-1").unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    a.write_at(1, 1, 0, b"wal bytes").unwrap();
    assert!(a.file().path().ends_with("wal/stream-1.wal"));

    engine.close().unwrap();
    assert!(!a.file().is_dirty());
}

#[test]
fn test_wal_replica_rejects_bad_names() {
    let (_temp, engine) = setup_temp_engine();
    for name in ["", "../escape", "a/b"] {
        assert!(matches!(engine.wal_replica(name), Err(VaultError::Config(_))));
    }
}
