use lattice_core::{Account, Amount, Block, BlockHash, Vote};
use lattice_ledger::{
    AccountBlockFactory, BlockStatus, InMemoryStore, Ledger, LedgerConstants, LedgerContext,
    DEV_GENESIS_ACCOUNT, DEV_GENESIS_KEY,
};
use lattice_node::{
    consensus::{ActiveElectionsExt, ElectionBehavior},
    stats::{DetailType, Direction, StatType},
    transport::{ChannelId, Message},
};
use std::{sync::Arc, time::Duration};
use test_helpers::{assert_timely, assert_timely_eq, start_election, System};

#[test]
fn fork_creates_single_election_with_both_candidates() {
    let mut system = System::new();
    let node = system.make_node();

    let (send1, fork) = {
        let genesis = AccountBlockFactory::genesis(&node.ledger);
        let txn = node.ledger.read_txn();
        (
            genesis.send(&txn, 1000, Amount::raw(100)),
            genesis.send(&txn, 2000, Amount::raw(100)),
        )
    };
    assert_eq!(send1.qualified_root(), fork.qualified_root());

    assert_eq!(node.process_local(send1.clone()), Some(BlockStatus::Progress));
    assert_timely(Duration::from_secs(5), || {
        node.active.active(&send1.hash())
    });

    node.inbound(Message::Publish(fork.clone()), ChannelId::from(1));

    let election = node.active.election(&send1.qualified_root()).unwrap();
    assert_timely_eq(Duration::from_secs(5), || election.candidates().len(), 2);
    assert!(election.contains(&fork.hash()));
    assert_eq!(node.active.len(), 1);
    // The ledger keeps the first block until the election decides otherwise
    assert!(node
        .ledger
        .block_exists(&node.ledger.read_txn(), &send1.hash()));
}

#[test]
fn final_vote_confirms_and_cements() {
    let mut system = System::new();
    let node = system.make_node();

    let send = AccountBlockFactory::genesis(&node.ledger).send(
        &node.ledger.read_txn(),
        1000,
        Amount::raw(100),
    );
    assert_eq!(node.process_local(send.clone()), Some(BlockStatus::Progress));
    let election = start_election(&node, &send.hash());

    let vote = Arc::new(Vote::new_final(*DEV_GENESIS_KEY, vec![send.hash()]));
    node.inbound(Message::ConfirmAck(vote), ChannelId::from(1));

    assert_timely(Duration::from_secs(5), || election.is_confirmed());
    assert_eq!(election.winner().hash(), send.hash());
    assert_timely(Duration::from_secs(5), || {
        node.ledger
            .block_confirmed(&node.ledger.read_txn(), &send.hash())
    });
    assert_eq!(node.ledger.cemented_count(), 2);
    assert_timely_eq(Duration::from_secs(5), || node.active.len(), 0);
}

#[test]
fn non_final_vote_does_not_confirm() {
    let mut system = System::new();
    let node = system.make_node();

    let send = AccountBlockFactory::genesis(&node.ledger).send(
        &node.ledger.read_txn(),
        1000,
        Amount::raw(100),
    );
    node.process_local(send.clone());
    let election = start_election(&node, &send.hash());

    let vote = Arc::new(Vote::new(*DEV_GENESIS_KEY, 1, vec![send.hash()]));
    node.inbound(Message::ConfirmAck(vote), ChannelId::from(1));

    assert_timely_eq(
        Duration::from_secs(5),
        || node.stats.count(StatType::Election, DetailType::VoteNew, Direction::In),
        1,
    );
    assert!(!election.is_confirmed());
}

/// Two accounts with one unconfirmed block each. The dependencies of both
/// blocks are cemented.
fn store_with_two_unconfirmed_accounts() -> (Arc<InMemoryStore>, Account, BlockHash, BlockHash) {
    let store = Arc::new(InMemoryStore::new());
    let ctx = LedgerContext {
        ledger: Arc::new(Ledger::new(store.clone(), LedgerConstants::dev()).unwrap()),
    };
    let destination = Account::from(1000);
    let genesis = ctx.genesis_block_factory();
    let send1 = genesis.send(&ctx.ledger.read_txn(), destination, Amount::raw(100));
    ctx.process(&send1).unwrap();
    ctx.confirm(send1.hash());

    let open = ctx
        .block_factory(destination)
        .receive(&ctx.ledger.read_txn(), send1.hash());
    ctx.process(&open).unwrap();
    let send2 = genesis.send(&ctx.ledger.read_txn(), 2000, Amount::raw(100));
    ctx.process(&send2).unwrap();
    (store, destination, open.hash(), send2.hash())
}

#[test]
fn priority_capacity_is_enforced() {
    let (store, destination, open, send2) = store_with_two_unconfirmed_accounts();
    let mut system = System::new();
    let mut config = system.default_config();
    config.active_elections.size = 1;
    config.backlog.enabled = false;
    let node = system.build_node().config(config).store(store).finish();

    assert!(node
        .election_schedulers
        .activate(&node.ledger.read_txn(), &DEV_GENESIS_ACCOUNT));
    assert!(node.active.active(&send2));

    assert!(!node
        .election_schedulers
        .activate(&node.ledger.read_txn(), &destination));
    assert!(!node.active.active(&open));
    assert_eq!(
        node.stats.count(
            StatType::ElectionScheduler,
            DetailType::ActivateFull,
            Direction::In
        ),
        1
    );

    let vote = Arc::new(Vote::new_final(*DEV_GENESIS_KEY, vec![send2]));
    node.inbound(Message::ConfirmAck(vote), ChannelId::from(1));
    assert_timely_eq(Duration::from_secs(5), || node.active.len(), 0);

    assert!(node
        .election_schedulers
        .activate(&node.ledger.read_txn(), &destination));
    assert!(node.active.active(&open));
}

#[test]
fn manual_elections_ignore_capacity() {
    let mut system = System::new();
    let mut config = system.default_config();
    config.active_elections.size = 1;
    let node = system.build_node().config(config).finish();

    let send = AccountBlockFactory::genesis(&node.ledger).send(
        &node.ledger.read_txn(),
        1000,
        Amount::raw(100),
    );
    node.process_local(send.clone());
    assert_timely(Duration::from_secs(5), || node.active.active(&send.hash()));

    let other = Arc::new(Block::new_test_instance());
    let insertion = node
        .active
        .insert(&other, ElectionBehavior::Manual)
        .unwrap();
    assert!(insertion.inserted);
    assert_eq!(node.active.len(), 2);
}
