//! Tests for an engine acting as cluster client and storage node

use std::sync::atomic::Ordering;
use std::thread;

use pagevault::network::Server;
use pagevault::{Config, Engine, VaultError};
use tempfile::TempDir;

#[test]
fn test_engine_reaches_peer_storage_node() {
    let temp_dir = TempDir::new().unwrap();

    // Storage node serving its node directory
    let node_config = Config::builder()
        .data_dir(temp_dir.path().join("storage"))
        .listen_addr("127.0.0.1:0")
        .build();
    let node = Engine::open(node_config.clone()).unwrap();
    let mut server = Server::new(node_config, node.node_fs());
    let addr = server.bind().unwrap().to_string();
    let shutdown = server.shutdown_handle();
    let serving = thread::spawn(move || server.run().unwrap());

    // Client engine routing to that node
    let client = Engine::open(
        Config::builder()
            .data_dir(temp_dir.path().join("client"))
            .storage_nodes([addr.clone()])
            .build(),
    )
    .unwrap();
    assert_eq!(client.hash_ring().nodes(), vec![addr.clone()]);

    let dfs = client.distributed_fs();
    dfs.write_file("shared/blob", b"replicated bytes").unwrap();
    assert_eq!(dfs.read_file("shared/blob").unwrap(), b"replicated bytes");
    assert_eq!(node.node_fs().read_file("shared/blob").unwrap(), b"replicated bytes");
    assert_eq!(client.connection_manager().connection_count(), 1);

    // Leaving the ring drops the route
    client.update_storage_nodes(Vec::<String>::new());
    assert!(matches!(
        dfs.read_file("shared/blob"),
        Err(VaultError::NoStorageNodes)
    ));
    assert_eq!(client.connection_manager().connection_count(), 0);

    client.close().unwrap();
    shutdown.store(true, Ordering::SeqCst);
    serving.join().unwrap();
    node.close().unwrap();
}

#[test]
fn test_engine_without_nodes_has_no_route() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(temp_dir.path()).unwrap();

    assert!(engine.hash_ring().is_empty());
    assert!(matches!(
        engine.distributed_fs().ping("anything"),
        Err(VaultError::NoStorageNodes)
    ));
}
