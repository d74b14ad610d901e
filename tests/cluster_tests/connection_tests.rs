//! Tests for StorageConnection and StorageConnectionManager
//!
//! These tests verify:
//! - Requests and responses round-trip over a live node
//! - Concurrent callers share one connection without mixing responses
//! - Closing fails later requests with ConnectionClosed
//! - A peer hanging up fails the waiting caller with ConnectionClosed
//! - The manager routes by path and follows membership changes

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use pagevault::cluster::{HashRing, StorageConnection, StorageConnectionManager};
use pagevault::protocol::{decode_request, read_frame, CommandType, DfsRequest};
use pagevault::VaultError;

use crate::support::TestNode;

fn write_request(path: &str, data: &[u8]) -> DfsRequest {
    let mut request = DfsRequest::with_path(CommandType::WriteFile, path);
    request.data = data.to_vec();
    request
}

// =============================================================================
// StorageConnection Tests
// =============================================================================

#[test]
fn test_connection_round_trip() {
    let node = TestNode::start();
    let conn = StorageConnection::connect(&node.addr).unwrap();

    let pong = conn.send(&DfsRequest::new(CommandType::Connection)).unwrap();
    assert!(pong.is_ok());

    conn.send(&write_request("dir/file", b"over the wire")).unwrap().into_result().unwrap();
    let response = conn
        .send(&DfsRequest::with_path(CommandType::ReadFile, "dir/file"))
        .unwrap();

    assert_eq!(response.command, CommandType::ReadFile);
    assert_eq!(response.path, "dir/file");
    assert_eq!(response.data, b"over the wire");
    assert_eq!(node.fs.read_file("dir/file").unwrap(), b"over the wire");
}

#[test]
fn test_remote_failure_is_a_response() {
    let node = TestNode::start();
    let conn = StorageConnection::connect(&node.addr).unwrap();

    let response = conn
        .send(&DfsRequest::with_path(CommandType::ReadFile, "missing"))
        .unwrap();
    assert!(!response.is_ok());

    let err = response.into_result().unwrap_err();
    assert!(err.is_not_found());
    assert!(conn.is_open());
}

#[test]
fn test_concurrent_callers_share_connection() {
    let node = TestNode::start();
    let conn = Arc::new(StorageConnection::connect(&node.addr).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let conn = Arc::clone(&conn);
            thread::spawn(move || {
                for i in 0..25 {
                    let path = format!("t{}/f{}", t, i);
                    let body = format!("thread {} item {}", t, i);
                    conn.send(&write_request(&path, body.as_bytes()))
                        .unwrap()
                        .into_result()
                        .unwrap();
                    let back = conn
                        .send(&DfsRequest::with_path(CommandType::ReadFile, path.as_str()))
                        .unwrap();
                    assert_eq!(back.path, path);
                    assert_eq!(back.data, body.as_bytes());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(conn.pending_count(), 0);
}

#[test]
fn test_closed_connection_rejects_requests() {
    let node = TestNode::start();
    let conn = StorageConnection::connect(&node.addr).unwrap();
    conn.send(&DfsRequest::new(CommandType::Connection)).unwrap();

    conn.close();
    conn.close();

    assert!(!conn.is_open());
    assert!(matches!(
        conn.send(&DfsRequest::new(CommandType::Connection)),
        Err(VaultError::ConnectionClosed)
    ));
}

#[test]
fn test_peer_hangup_fails_waiting_request() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // Accept one request and hang up without answering
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let (_, message) = read_frame(&mut stream).unwrap();
        decode_request(&message).unwrap().command
    });

    let conn = StorageConnection::connect(&addr).unwrap();
    let result = conn.send(&DfsRequest::with_path(CommandType::ReadFile, "never/answered"));

    assert_eq!(peer.join().unwrap(), CommandType::ReadFile);
    assert!(matches!(result, Err(VaultError::ConnectionClosed)));
    assert!(!conn.is_open());
    assert_eq!(conn.pending_count(), 0);
}

#[test]
fn test_connect_refused() {
    let addr = {
        let node = TestNode::start();
        node.addr.clone()
    };
    // The node is gone; its port no longer accepts
    assert!(StorageConnection::connect(&addr).is_err());
}

// =============================================================================
// StorageConnectionManager Tests
// =============================================================================

#[test]
fn test_manager_routes_to_owner() {
    let a = TestNode::start();
    let b = TestNode::start();
    let ring = Arc::new(HashRing::new([a.addr.clone(), b.addr.clone()], 50));
    let manager = StorageConnectionManager::new(Arc::clone(&ring));

    for i in 0..40 {
        let path = format!("databases/db/main/ranges/{:010}", i);
        manager.send(&write_request(&path, b"x")).unwrap().into_result().unwrap();

        let owner = ring.get_node(&path).unwrap();
        let (home, other) = if owner == a.addr { (&a, &b) } else { (&b, &a) };
        assert!(home.fs.exists(&path));
        assert!(!other.fs.exists(&path));
    }

    assert_eq!(manager.connection_count(), 2);
    let first = manager.connection_to(&a.addr).unwrap();
    let second = manager.connection_to(&a.addr).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_manager_replaces_closed_connection() {
    let node = TestNode::start();
    let manager = StorageConnectionManager::new(Arc::new(HashRing::new([node.addr.clone()], 10)));

    let first = manager.get_connection("k").unwrap();
    first.close();

    let second = manager.get_connection("k").unwrap();
    assert!(second.is_open());
    assert!(!Arc::ptr_eq(&first, &second));
    second.send(&DfsRequest::new(CommandType::Connection)).unwrap();
}

#[test]
fn test_update_nodes_drops_departed_connections() {
    let a = TestNode::start();
    let b = TestNode::start();
    let manager =
        StorageConnectionManager::new(Arc::new(HashRing::new([a.addr.clone(), b.addr.clone()], 20)));

    let to_b = manager.connection_to(&b.addr).unwrap();
    manager.connection_to(&a.addr).unwrap();
    assert_eq!(manager.connection_count(), 2);

    manager.update_nodes([a.addr.clone()]);

    assert_eq!(manager.connection_count(), 1);
    assert!(!to_b.is_open());
    for i in 0..20 {
        let conn = manager.get_connection(&format!("key-{}", i)).unwrap();
        assert_eq!(conn.address(), a.addr);
    }
}

#[test]
fn test_empty_manager_has_no_route() {
    let manager = StorageConnectionManager::new(Arc::new(HashRing::new(Vec::<String>::new(), 10)));
    assert!(matches!(
        manager.send(&DfsRequest::with_path(CommandType::Stat, "x")),
        Err(VaultError::NoStorageNodes)
    ));
}
