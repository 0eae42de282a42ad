//! Nodes talking to each other over loopback.

use blockbard_core::{Payload, Position};
use blockbard_node::{
    BlockDisposition, Node, NodeConfig, PeerClient, PeerNetwork, PeerService, VerseNarrator,
};
use blockbard_tracker::{FrameLimits, TrackerClient, TrackerConfig, TrackerServer};
use std::time::Duration;

async fn start_tracker() -> String {
    let server = TrackerServer::bind(&TrackerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        read_timeout_ms: 1000,
    })
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr.to_string()
}

fn config(tracker: &str) -> NodeConfig {
    NodeConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        tracker_addr: tracker.to_string(),
        initial_difficulty: 1,
        connect_timeout_ms: 500,
        read_timeout_ms: 2000,
        mine_interval_ms: 200,
        max_jitter_ms: 50,
        ..NodeConfig::default()
    }
}

fn client() -> PeerClient {
    PeerClient::new(Duration::from_millis(500), FrameLimits::default())
}

async fn append_verses(node: &Node, verses: u64) {
    append_verse_range(node, 1, verses).await;
}

async fn append_verse_range(node: &Node, first: u64, last: u64) {
    let ledger = node.ledger();
    let mut ledger = ledger.lock().await;
    for verse in first..=last {
        let previous = (verse > 1).then(|| Position::verse(1, 1, verse - 1));
        ledger
            .add_block(Payload::structured(
                format!("verse {verse}"),
                Some(node.node_id().to_string()),
                Some(Position::verse(1, 1, verse)),
                previous,
            ))
            .unwrap();
    }
}

async fn wait_for_length(node: &Node, length: usize) -> bool {
    for _ in 0..400 {
        if node.chain_length().await >= length {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn test_getchain_serves_snapshot() {
    let tracker = start_tracker().await;
    let node = Node::start(config(&tracker), None).await.unwrap();
    append_verses(&node, 2).await;

    let fetched = client().fetch_chain(node.node_id()).await.unwrap();
    assert_eq!(fetched, node.records().await);
    assert_eq!(fetched.len(), 3);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_new_node_syncs_on_start() {
    let tracker = start_tracker().await;
    let a = Node::start(config(&tracker), None).await.unwrap();
    append_verses(&a, 3).await;

    let b = Node::start(config(&tracker), None).await.unwrap();
    assert_eq!(b.records().await, a.records().await);

    b.shutdown().await.unwrap();
    a.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_out_of_order_block_triggers_sync() {
    let tracker = start_tracker().await;
    let a = Node::start(config(&tracker), None).await.unwrap();
    let b = Node::start(config(&tracker), None).await.unwrap();
    append_verses(&a, 3).await;

    let tip = a.records().await.pop().unwrap();
    client().send_block(b.node_id(), &tip).await.unwrap();

    assert!(wait_for_length(&b, 4).await);
    assert_eq!(b.records().await, a.records().await);

    b.shutdown().await.unwrap();
    a.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_mined_blocks_are_gossiped() {
    let tracker = start_tracker().await;
    let listener = Node::start(config(&tracker), None).await.unwrap();
    let miner = Node::start(config(&tracker), Some(Box::new(VerseNarrator::new())))
        .await
        .unwrap();
    let miner_id = miner.node_id().to_string();

    assert!(wait_for_length(&listener, 2).await);
    miner.shutdown().await.unwrap();

    {
        let ledger = listener.ledger();
        let ledger = ledger.lock().await;
        assert!(ledger.is_valid());
        assert_eq!(
            ledger.get_block(1).unwrap().author.as_deref(),
            Some(miner_id.as_str())
        );
    }
    listener.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_gossip_at_taken_position_is_dropped() {
    let tracker = start_tracker().await;
    let a = Node::start(config(&tracker), None).await.unwrap();
    let b = Node::start(config(&tracker), None).await.unwrap();
    append_verses(&a, 1).await;
    append_verses(&b, 1).await;

    // Both chains hold verse 1:1:1; B must not take A's copy.
    let service = PeerService::new(
        b.ledger(),
        PeerNetwork::new(b.node_id(), TrackerClient::new(tracker.clone()), client()),
        FrameLimits::default(),
    );
    let foreign = a.records().await.pop().unwrap();
    assert_eq!(
        service.handle_block(foreign).await,
        BlockDisposition::DuplicatePosition
    );
    assert_eq!(b.chain_length().await, 2);

    b.shutdown().await.unwrap();
    a.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_successor_block_is_appended() {
    let tracker = start_tracker().await;
    let a = Node::start(config(&tracker), None).await.unwrap();
    let b = Node::start(config(&tracker), None).await.unwrap();
    append_verses(&a, 1).await;
    assert!(b.sync().await);
    assert_eq!(b.records().await, a.records().await);

    append_verse_range(&a, 2, 2).await;
    let service = PeerService::new(
        b.ledger(),
        PeerNetwork::new(b.node_id(), TrackerClient::new(tracker.clone()), client()),
        FrameLimits::default(),
    );
    let successor = a.records().await.pop().unwrap();
    assert_eq!(
        service.handle_block(successor).await,
        BlockDisposition::Appended
    );
    assert_eq!(b.records().await, a.records().await);

    b.shutdown().await.unwrap();
    a.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_successor_does_not_sync() {
    let tracker = start_tracker().await;
    let a = Node::start(config(&tracker), None).await.unwrap();
    let b = Node::start(config(&tracker), None).await.unwrap();
    append_verses(&a, 1).await;
    assert!(b.sync().await);

    // A is now longer than B, so any sync would adopt A's chain.
    append_verse_range(&a, 2, 3).await;
    let mut forged = a.records().await[2].clone();
    forged.data = "rewritten verse".to_string();

    let service = PeerService::new(
        b.ledger(),
        PeerNetwork::new(b.node_id(), TrackerClient::new(tracker.clone()), client()),
        FrameLimits::default(),
    );
    assert_eq!(
        service.handle_block(forged).await,
        BlockDisposition::Rejected
    );
    assert_eq!(b.chain_length().await, 2);
    assert_ne!(b.records().await, a.records().await);

    b.shutdown().await.unwrap();
    a.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_leaves_tracker() {
    let tracker = start_tracker().await;
    let node = Node::start(config(&tracker), None).await.unwrap();
    let id = node.node_id().to_string();

    let registry = TrackerClient::new(tracker.clone());
    assert_eq!(registry.peers().await.unwrap(), vec![id]);

    node.shutdown().await.unwrap();
    assert!(registry.peers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restart_resumes_from_snapshot() {
    let tracker = start_tracker().await;
    let dir = tempfile::tempdir().unwrap();
    let persistent = NodeConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..config(&tracker)
    };

    let first = Node::start(persistent.clone(), None).await.unwrap();
    append_verses(&first, 2).await;
    let records = first.records().await;
    first.shutdown().await.unwrap();

    let second = Node::start(persistent, None).await.unwrap();
    assert_eq!(second.records().await, records);
    second.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_tracker_is_not_fatal() {
    let node = Node::start(
        NodeConfig {
            connect_timeout_ms: 200,
            ..config("127.0.0.1:1")
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!(node.chain_length().await, 1);
    node.shutdown().await.unwrap();
}
