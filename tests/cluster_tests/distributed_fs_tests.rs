//! Tests for DistributedFs against live storage nodes

use std::sync::Arc;

use pagevault::cluster::{DistributedFs, HashRing, StorageConnectionManager};
use pagevault::fs::OpenFlags;

use crate::support::TestNode;

// =============================================================================
// Helper Functions
// =============================================================================

fn single_node() -> (TestNode, DistributedFs) {
    let node = TestNode::start();
    let ring = Arc::new(HashRing::new([node.addr.clone()], 10));
    let dfs = DistributedFs::new(Arc::new(StorageConnectionManager::new(ring)));
    (node, dfs)
}

/// Two paths the ring assigns to different nodes
fn split_paths(ring: &HashRing) -> (String, String) {
    let first = "split/0".to_string();
    let owner = ring.get_node(&first).unwrap();
    for i in 1..1000 {
        let candidate = format!("split/{}", i);
        if ring.get_node(&candidate).unwrap() != owner {
            return (first, candidate);
        }
    }
    panic!("every candidate path hashed to one node");
}

// =============================================================================
// File Operation Tests
// =============================================================================

#[test]
fn test_whole_file_round_trip() {
    let (_node, dfs) = single_node();

    dfs.write_file("a/b/file", b"distributed").unwrap();
    assert_eq!(dfs.read_file("a/b/file").unwrap(), b"distributed");

    let info = dfs.stat("a/b/file").unwrap();
    assert_eq!(info.name, "file");
    assert_eq!(info.size, 11);
    assert!(dfs.exists("a/b/file").unwrap());
}

#[test]
fn test_positional_io() {
    let (_node, dfs) = single_node();

    assert_eq!(dfs.write_at("pos", b"world", 6).unwrap(), 5);
    dfs.write_at("pos", b"hello ", 0).unwrap();

    assert_eq!(dfs.read_at("pos", 5, 6).unwrap(), b"world");
    // Short read at end of file
    assert_eq!(dfs.read_at("pos", 100, 8).unwrap(), b"rld");

    dfs.truncate("pos", 5).unwrap();
    assert_eq!(dfs.read_file("pos").unwrap(), b"hello");
}

#[test]
fn test_missing_file_is_not_found() {
    let (_node, dfs) = single_node();

    assert!(dfs.read_file("nope").unwrap_err().is_not_found());
    assert!(dfs.stat("nope").unwrap_err().is_not_found());
    assert!(!dfs.exists("nope").unwrap());
}

#[test]
fn test_directories() {
    let (node, dfs) = single_node();

    dfs.mkdir_all("d/sub").unwrap();
    dfs.mkdir("d/other", 0o755).unwrap();
    dfs.write_file("d/file", b"123").unwrap();

    let entries = dfs.read_dir("d").unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["file", "other", "sub"]);

    dfs.remove("d/file").unwrap();
    assert!(!node.fs.exists("d/file"));

    dfs.remove_all("d").unwrap();
    assert!(!node.fs.exists("d"));
}

#[test]
fn test_open_sync_close() {
    let (_node, dfs) = single_node();

    dfs.open_file("h", OpenFlags::read_write_create()).unwrap();
    dfs.write_at("h", b"handle", 0).unwrap();
    dfs.sync("h").unwrap();
    dfs.close("h").unwrap();

    assert_eq!(dfs.read_file("h").unwrap(), b"handle");
    dfs.ping("anything").unwrap();
}

// =============================================================================
// Multi-Node Tests
// =============================================================================

#[test]
fn test_rename_within_one_node() {
    let (node, dfs) = single_node();
    dfs.write_file("old", b"v").unwrap();

    dfs.rename("old", "new").unwrap();

    assert!(!node.fs.exists("old"));
    assert_eq!(node.fs.read_file("new").unwrap(), b"v");
}

#[test]
fn test_rename_across_nodes_copies_contents() {
    let a = TestNode::start();
    let b = TestNode::start();
    let ring = Arc::new(HashRing::new([a.addr.clone(), b.addr.clone()], 50));
    let dfs = DistributedFs::new(Arc::new(StorageConnectionManager::new(Arc::clone(&ring))));

    let (from, to) = split_paths(&ring);
    dfs.write_file(&from, b"moving house").unwrap();

    dfs.rename(&from, &to).unwrap();

    assert!(!dfs.exists(&from).unwrap());
    assert_eq!(dfs.read_file(&to).unwrap(), b"moving house");

    let to_owner = ring.get_node(&to).unwrap();
    let home = if to_owner == a.addr { &a } else { &b };
    assert_eq!(home.fs.read_file(&to).unwrap(), b"moving house");
}
