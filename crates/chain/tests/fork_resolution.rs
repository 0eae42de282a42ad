use blockbard_chain::Blockchain;
use blockbard_consensus::SteppingClock;
use blockbard_core::BlockRecord;
use std::sync::Arc;

/// Every search on these ledgers appears to take exactly the target block
/// time, so difficulty stays at its starting value.
fn ledger(start: f64) -> Blockchain {
    Blockchain::with_clock(1, Arc::new(SteppingClock::new(start, 5.0)))
}

#[test]
fn test_competing_miners_converge() {
    // Both nodes start fresh from the same genesis.
    let mut a = ledger(1_700_000_000.0);
    let mut b = ledger(1_700_000_000.0);
    assert_eq!(a.latest_block().hash, b.latest_block().hash);

    // Both mine block #1 differently.
    a.add_block("A's block 1").unwrap();
    b.add_block("B's block 1").unwrap();
    assert_ne!(a.latest_block().hash, b.latest_block().hash);

    // Node A mines block #2 on top of its own block #1.
    let a2 = a.add_block("A's block 2").unwrap();
    assert_eq!(a.len(), 3);

    // B rejects A's #2: its parent is not B's tip.
    assert!(!b.add_block_from_record(a2.to_record()));
    assert_eq!(b.len(), 2);

    // B resolves conflicts against A's longer chain.
    assert!(b.resolve_conflicts(vec![a.records()]));
    assert_eq!(b.len(), a.len());

    let a_json = BlockRecord::list_to_json(&a.records()).unwrap();
    let b_json = BlockRecord::list_to_json(&b.records()).unwrap();
    assert_eq!(a_json, b_json);
    assert!(b.is_valid());
}

#[test]
fn test_fresh_node_follows_remote_history() {
    let mut remote = ledger(1_600_000_000.0);
    let mut fresh = ledger(1_700_000_000.0);
    assert_ne!(remote.latest_block().hash, fresh.latest_block().hash);

    let blocks: Vec<_> = (1..=3)
        .map(|i| remote.add_block(format!("remote {i}")).unwrap())
        .collect();

    for block in &blocks {
        assert!(fresh.add_block_from_record(block.to_record()));
    }

    assert_eq!(fresh.len(), 4);
    assert_eq!(fresh.latest_block().hash, remote.latest_block().hash);
    assert!(fresh.is_valid());
}

#[test]
fn test_shorter_chain_never_adopted() {
    let mut a = ledger(1_700_000_000.0);
    let mut b = ledger(1_700_000_000.0);
    a.add_block("a1").unwrap();
    a.add_block("a2").unwrap();
    b.add_block("b1").unwrap();

    let before = a.records();
    assert!(!a.resolve_conflicts(vec![b.records()]));
    assert_eq!(a.records(), before);
}
