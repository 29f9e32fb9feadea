use lattice_core::{Amount, BlockHash, Networks, Root};
use lattice_ledger::{
    AccountBlockFactory, BlockStatus, DEV_GENESIS_BLOCK, DEV_GENESIS_HASH, DEV_GENESIS_KEY,
};
use lattice_node::{
    config::NodeConfig,
    stats::{DetailType, Direction, StatType},
    transport::{ChannelId, Message},
    NodeBuilder,
};
use std::time::Duration;
use test_helpers::{assert_timely, System};

#[test]
fn invalid_config_is_rejected() {
    let mut config = NodeConfig::new_test_instance();
    config.active_elections.size = 0;
    assert!(NodeBuilder::new(Networks::Dev).config(config).finish().is_err());
}

#[test]
fn process_local_reports_block_status() {
    let mut system = System::new();
    let node = system.make_node();

    let send = AccountBlockFactory::genesis(&node.ledger).send(
        &node.ledger.read_txn(),
        1000,
        Amount::raw(100),
    );
    assert_eq!(node.process_local(send.clone()), Some(BlockStatus::Progress));
    assert_eq!(node.process_local(send), Some(BlockStatus::Old));
    assert_eq!(node.ledger.block_count(), 2);
}

#[test]
fn inbound_publish_is_processed() {
    let mut system = System::new();
    let node = system.make_node();

    let send = AccountBlockFactory::genesis(&node.ledger).send(
        &node.ledger.read_txn(),
        1000,
        Amount::raw(100),
    );
    node.inbound(Message::Publish(send.clone()), ChannelId::from(7));

    assert_timely(Duration::from_secs(5), || {
        node.ledger
            .block_exists(&node.ledger.read_txn(), &send.hash())
    });
    assert_eq!(
        node.stats
            .count(StatType::Message, DetailType::Publish, Direction::In),
        1
    );
}

#[test]
fn confirm_req_for_confirmed_block_is_answered_with_final_vote() {
    let mut system = System::new();
    let mut config = system.default_config();
    config.enable_voting = true;
    config.voting_representatives = vec![*DEV_GENESIS_KEY];
    let node = system.build_node().config(config).finish();

    let channel = ChannelId::from(5);
    node.inbound(
        Message::ConfirmReq(vec![(*DEV_GENESIS_HASH, Root::from(DEV_GENESIS_BLOCK.account))]),
        channel,
    );

    assert_timely(Duration::from_secs(5), || {
        node.published.output().iter().any(|published| {
            published.channel_id == Some(channel)
                && matches!(&published.message, Message::ConfirmAck(vote)
                    if vote.is_final() && vote.hashes == vec![*DEV_GENESIS_HASH])
        })
    });
}

#[test]
fn confirm_req_without_known_blocks_is_discarded() {
    let mut system = System::new();
    let node = system.make_node();

    let unknown = BlockHash::from(12345);
    node.inbound(
        Message::ConfirmReq(vec![(unknown, Root::from(1))]),
        ChannelId::from(5),
    );

    assert_eq!(
        node.stats.count(
            StatType::VoteGenerator,
            DetailType::GeneratorRepliesDiscarded,
            Direction::In
        ),
        1
    );
}

#[test]
fn container_info_lists_components() {
    let mut system = System::new();
    let node = system.make_node();

    let info = node.container_info();
    let names: Vec<&str> = info.entries().iter().map(|e| e.name()).collect();

    assert!(names.contains(&"active"));
    assert!(names.contains(&"confirming_set"));
    assert!(names.contains(&"block_processor"));
}
