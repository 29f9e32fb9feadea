use super::{
    vote_generator::{VoteGenerator, VoteGeneratorExt},
    LocalVoteHistory,
};
use crate::{
    config::{NetworkParams, NodeConfig},
    stats::Stats,
    transport::{ChannelId, Message, MessagePublisher},
};
use lattice_core::{utils::ContainerInfo, Block, BlockHash, Root, Vote};
use lattice_ledger::Ledger;
use std::sync::{Arc, RwLock};

pub type VoteGeneratedCallback = Box<dyn Fn(&Arc<Vote>) + Send + Sync>;

/// Share of the non representative peers that receive a generated vote
const VOTE_FLOOD_SCALE: f32 = 2.0;

/// Owns the normal and the final vote generator
pub struct VoteGenerators {
    non_final_vote_generator: Arc<VoteGenerator>,
    final_vote_generator: Arc<VoteGenerator>,
    vote_generated_observers: Arc<RwLock<Vec<VoteGeneratedCallback>>>,
}

impl VoteGenerators {
    pub fn new(
        ledger: Arc<Ledger>,
        history: Arc<LocalVoteHistory>,
        stats: Arc<Stats>,
        publisher: Arc<dyn MessagePublisher>,
        config: &NodeConfig,
        network_params: &NetworkParams,
    ) -> Self {
        let representatives = if config.is_voting() {
            config.voting_representatives.clone()
        } else {
            Vec::new()
        };
        let observers: Arc<RwLock<Vec<VoteGeneratedCallback>>> = Arc::new(RwLock::new(Vec::new()));

        let create = |is_final: bool| {
            let publisher_l = publisher.clone();
            let observers_l = observers.clone();
            Arc::new(VoteGenerator::new(
                ledger.clone(),
                history.clone(),
                stats.clone(),
                publisher.clone(),
                is_final,
                representatives.clone(),
                network_params.network.voting_delay,
                config.vote_generator_delay,
                config.vote_generator_threshold,
                Box::new(move |vote| {
                    publisher_l.flood(&Message::ConfirmAck(vote.clone()), VOTE_FLOOD_SCALE);
                    for observer in observers_l.read().unwrap().iter() {
                        observer(vote);
                    }
                }),
            ))
        };

        Self {
            non_final_vote_generator: create(false),
            final_vote_generator: create(true),
            vote_generated_observers: observers,
        }
    }

    pub fn start(&self) {
        self.non_final_vote_generator.start();
        self.final_vote_generator.start();
    }

    pub fn stop(&self) {
        self.non_final_vote_generator.stop();
        self.final_vote_generator.stop();
    }

    /// Called for every vote that was broadcast by this node
    pub fn add_vote_generated_observer(&self, observer: VoteGeneratedCallback) {
        self.vote_generated_observers.write().unwrap().push(observer);
    }

    pub fn generate_final_vote(&self, root: &Root, hash: &BlockHash) {
        self.final_vote_generator.add(root, hash);
    }

    pub fn generate_final_votes(&self, blocks: &[Arc<Block>], channel_id: ChannelId) -> usize {
        self.final_vote_generator.generate(blocks, channel_id)
    }

    pub fn generate_non_final_vote(&self, root: &Root, hash: &BlockHash) {
        self.non_final_vote_generator.add(root, hash);
    }

    pub fn generate_non_final_votes(&self, blocks: &[Arc<Block>], channel_id: ChannelId) -> usize {
        self.non_final_vote_generator.generate(blocks, channel_id)
    }

    pub fn container_info(&self) -> ContainerInfo {
        ContainerInfo::builder()
            .node("non_final", self.non_final_vote_generator.container_info())
            .node("final", self.final_vote_generator.container_info())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{NullMessagePublisher, PublishedMessage};
    use lattice_core::Networks;
    use lattice_ledger::{LedgerContext, DEV_GENESIS_BLOCK, DEV_GENESIS_HASH, DEV_GENESIS_KEY};
    use std::{
        sync::{mpsc, Mutex},
        time::Duration,
    };

    fn voting_config() -> NodeConfig {
        NodeConfig {
            enable_voting: true,
            voting_representatives: vec![*DEV_GENESIS_KEY],
            vote_generator_delay: Duration::from_millis(10),
            ..NodeConfig::new_test_instance()
        }
    }

    #[test]
    fn floods_generated_votes_and_notifies_observers() {
        let ctx = LedgerContext::empty();
        let publisher = Arc::new(NullMessagePublisher::new());
        let tracker = publisher.track();
        let generators = VoteGenerators::new(
            ctx.ledger.clone(),
            Arc::new(LocalVoteHistory::new(256)),
            Arc::new(Stats::default()),
            publisher,
            &voting_config(),
            &NetworkParams::new(Networks::Dev),
        );
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        generators.add_vote_generated_observer(Box::new(move |vote| {
            let _ = tx.lock().unwrap().send(vote.clone());
        }));
        generators.start();

        generators.generate_final_vote(&DEV_GENESIS_BLOCK.root(), &DEV_GENESIS_HASH);

        let vote = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(vote.is_final());
        assert_eq!(
            tracker.output(),
            vec![PublishedMessage {
                channel_id: None,
                message: Message::ConfirmAck(vote)
            }]
        );
        generators.stop();
    }

    #[test]
    fn reply_is_sent_to_requesting_channel() {
        let ctx = LedgerContext::empty();
        let publisher = Arc::new(NullMessagePublisher::new());
        let tracker = publisher.track();
        let generators = VoteGenerators::new(
            ctx.ledger.clone(),
            Arc::new(LocalVoteHistory::new(256)),
            Arc::new(Stats::default()),
            publisher,
            &voting_config(),
            &NetworkParams::new(Networks::Dev),
        );
        generators.start();

        let genesis = Arc::new(DEV_GENESIS_BLOCK.clone());
        let queued = generators.generate_non_final_votes(&[genesis], ChannelId::from(7));
        assert_eq!(queued, 1);

        let start = std::time::Instant::now();
        while tracker.output().is_empty() && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        let output = tracker.output();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].channel_id, Some(ChannelId::from(7)));
        generators.stop();
    }

    #[test]
    fn no_votes_when_voting_is_disabled() {
        let ctx = LedgerContext::empty();
        let publisher = Arc::new(NullMessagePublisher::new());
        let tracker = publisher.track();
        let config = NodeConfig {
            enable_voting: false,
            ..voting_config()
        };
        let generators = VoteGenerators::new(
            ctx.ledger.clone(),
            Arc::new(LocalVoteHistory::new(256)),
            Arc::new(Stats::default()),
            publisher,
            &config,
            &NetworkParams::new(Networks::Dev),
        );
        generators.start();
        generators.generate_non_final_vote(&DEV_GENESIS_BLOCK.root(), &DEV_GENESIS_HASH);
        std::thread::sleep(Duration::from_millis(100));
        assert!(tracker.output().is_empty());
        generators.stop();
    }
}
