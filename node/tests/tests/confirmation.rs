use lattice_core::{Amount, Vote};
use lattice_ledger::{AccountBlockFactory, BlockStatus, DEV_GENESIS_KEY};
use lattice_node::{
    consensus::{ElectionStatus, ElectionStatusType},
    stats::{DetailType, Direction, StatType},
    transport::{ChannelId, Message},
    NodeCallbacks,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use test_helpers::{assert_timely, assert_timely_eq, start_election, System};

#[test]
fn failed_cementing_commit_is_retried() {
    let mut system = System::new();
    let node = system.make_node();

    let send = AccountBlockFactory::genesis(&node.ledger).send(
        &node.ledger.read_txn(),
        1000,
        Amount::raw(100),
    );
    assert_eq!(node.process_local(send.clone()), Some(BlockStatus::Progress));
    start_election(&node, &send.hash());

    node.store.fail_next_commit();
    let vote = Arc::new(Vote::new_final(*DEV_GENESIS_KEY, vec![send.hash()]));
    node.inbound(Message::ConfirmAck(vote), ChannelId::from(1));

    assert_timely(Duration::from_secs(5), || {
        node.ledger
            .block_confirmed(&node.ledger.read_txn(), &send.hash())
    });
    assert_eq!(
        node.stats.count(
            StatType::ConfirmingSet,
            DetailType::CementingFailed,
            Direction::In
        ),
        1
    );
    assert_eq!(node.ledger.cemented_count(), 2);
}

#[test]
fn election_end_is_reported() {
    let mut system = System::new();
    let ended: Arc<Mutex<Vec<ElectionStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let ended_l = ended.clone();
    let callbacks = NodeCallbacks::builder()
        .on_election_end(move |status| ended_l.lock().unwrap().push(status.clone()))
        .finish();
    let node = system.build_node().callbacks(callbacks).finish();

    let send = AccountBlockFactory::genesis(&node.ledger).send(
        &node.ledger.read_txn(),
        1000,
        Amount::raw(100),
    );
    node.process_local(send.clone());
    start_election(&node, &send.hash());

    let vote = Arc::new(Vote::new_final(*DEV_GENESIS_KEY, vec![send.hash()]));
    node.inbound(Message::ConfirmAck(vote), ChannelId::from(1));

    assert_timely_eq(Duration::from_secs(5), || ended.lock().unwrap().len(), 1);
    let status = ended.lock().unwrap()[0].clone();
    assert_eq!(status.winner.hash(), send.hash());
    assert_eq!(status.status_type, ElectionStatusType::ActiveConfirmedQuorum);
}

#[test]
fn cementing_confirms_the_active_election() {
    let mut system = System::new();
    let node = system.make_node();

    let send = AccountBlockFactory::genesis(&node.ledger).send(
        &node.ledger.read_txn(),
        1000,
        Amount::raw(100),
    );
    node.process_local(send.clone());
    let election = start_election(&node, &send.hash());

    node.confirming_set.add(send.hash());

    assert_timely(Duration::from_secs(5), || election.is_confirmed());
    assert_timely_eq(
        Duration::from_secs(5),
        || {
            node.stats.count(
                StatType::ActiveElectionsCemented,
                DetailType::ActiveConfirmationHeight,
                Direction::In,
            )
        },
        1,
    );
}
