use lattice_core::{Amount, BlockHash};
use lattice_ledger::{InMemoryStore, Ledger, LedgerConstants, LedgerContext};
use lattice_node::{
    consensus::ElectionBehavior,
    stats::{DetailType, Direction, StatType},
};
use std::{sync::Arc, time::Duration};
use test_helpers::{assert_always_eq, assert_timely, System};

/// Creates a store that contains `count` unconfirmed sends from the genesis account.
/// Returns the hashes of the sends.
fn store_with_unconfirmed_chain(count: usize) -> (Arc<InMemoryStore>, Vec<BlockHash>) {
    let store = Arc::new(InMemoryStore::new());
    let ctx = LedgerContext {
        ledger: Arc::new(Ledger::new(store.clone(), LedgerConstants::dev()).unwrap()),
    };
    let genesis = ctx.genesis_block_factory();
    let mut hashes = Vec::new();
    for _ in 0..count {
        let send = genesis.send(&ctx.ledger.read_txn(), 1000, Amount::raw(1));
        ctx.process(&send).unwrap();
        hashes.push(send.hash());
    }
    (store, hashes)
}

#[test]
fn backlog_activates_unconfirmed_account() {
    let (store, hashes) = store_with_unconfirmed_chain(1);
    let mut system = System::new();
    let node = system.build_node().store(store).finish();

    assert_timely(Duration::from_secs(5), || node.active.active(&hashes[0]));
    assert!(node.stats.count(StatType::Backlog, DetailType::Activated, Direction::In) > 0);
}

#[test]
fn backlog_starts_election_for_first_unconfirmed_block() {
    let (store, hashes) = store_with_unconfirmed_chain(3);
    let mut system = System::new();
    let node = system.build_node().store(store).finish();

    assert_timely(Duration::from_secs(5), || node.active.active(&hashes[0]));
    assert!(!node.active.active(&hashes[1]));
}

#[test]
fn optimistic_election_for_long_unconfirmed_chain() {
    let (store, hashes) = store_with_unconfirmed_chain(5);
    let mut system = System::new();
    let mut config = system.default_config();
    config.optimistic_scheduler.gap_threshold = 2;
    let node = system.build_node().config(config).store(store).finish();

    let head = *hashes.last().unwrap();
    assert_timely(Duration::from_secs(5), || node.active.active(&head));
    assert_eq!(
        node.active.election_for_block(&head).unwrap().behavior,
        ElectionBehavior::Optimistic
    );
}

#[test]
fn optimistic_scheduler_skips_accounts_below_gap_threshold() {
    let (store, hashes) = store_with_unconfirmed_chain(3);
    let mut system = System::new();
    let mut config = system.default_config();
    config.optimistic_scheduler.gap_threshold = 10;
    let node = system.build_node().config(config).store(store).finish();

    assert_timely(Duration::from_secs(5), || node.active.active(&hashes[0]));
    assert_always_eq(
        Duration::from_millis(500),
        || {
            node.stats.count(
                StatType::OptimisticScheduler,
                DetailType::Activated,
                Direction::In,
            )
        },
        0,
    );
    assert_eq!(node.active.count_by_behavior(ElectionBehavior::Optimistic), 0);
}
