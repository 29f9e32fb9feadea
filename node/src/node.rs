use crate::{
    block_processing::{
        BacklogPopulation, BlockProcessor, BlockProcessorExt, BlockSource,
    },
    cementation::ConfirmingSet,
    config::{NetworkParams, NodeConfig, NodeFlags},
    consensus::{
        election_schedulers::ElectionSchedulers, ActiveElections, ActiveElectionsExt,
        ElectionEndedCallback, LocalVoteHistory, VoteCache, VoteCacheProcessor,
        VoteCacheProcessorExt, VoteGenerators, VoteProcessor, VoteProcessorCallback,
        VoteProcessorExt, VoteVerifier,
    },
    pruning::{LedgerPruning, LedgerPruningExt},
    representatives::{
        OnlineReps, OnlineWeightSampler, OnlineWeightSamplerExt, RepresentativeRegister,
    },
    stats::{DetailType, Direction, LedgerStats, StatType, Stats},
    transport::{ChannelId, Message, MessagePublisher},
    utils::ThreadPoolImpl,
};
use lattice_core::{utils::ContainerInfo, Block, VoteSource};
use lattice_ledger::{BlockStatus, Ledger, LedgerStore};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tracing::{debug, info};

/// Callbacks for library users that want to follow the node's decisions
#[derive(Default)]
pub struct NodeCallbacks {
    pub on_election_end: Option<ElectionEndedCallback>,
    pub on_vote: Option<VoteProcessorCallback>,
}

pub struct NodeArgs {
    pub network_params: NetworkParams,
    pub config: NodeConfig,
    pub flags: NodeFlags,
    pub store: Arc<dyn LedgerStore>,
    pub publisher: Arc<dyn MessagePublisher>,
    pub vote_verifier: Box<dyn VoteVerifier>,
    pub callbacks: NodeCallbacks,
}

/// Wires all consensus components together. Peers talk to the node through
/// `inbound` and the `MessagePublisher` it was created with.
pub struct Node {
    pub network_params: NetworkParams,
    pub config: NodeConfig,
    pub flags: NodeFlags,
    pub stats: Arc<Stats>,
    pub ledger: Arc<Ledger>,
    pub workers: Arc<ThreadPoolImpl>,
    pub online_reps: Arc<Mutex<OnlineReps>>,
    pub online_weight_sampler: Arc<OnlineWeightSampler>,
    pub representative_register: Arc<Mutex<RepresentativeRegister>>,
    pub history: Arc<LocalVoteHistory>,
    pub vote_cache: Arc<Mutex<VoteCache>>,
    pub vote_generators: Arc<VoteGenerators>,
    pub confirming_set: Arc<ConfirmingSet>,
    pub block_processor: Arc<BlockProcessor>,
    pub active: Arc<ActiveElections>,
    pub vote_processor: Arc<VoteProcessor>,
    pub vote_cache_processor: Arc<VoteCacheProcessor>,
    pub election_schedulers: Arc<ElectionSchedulers>,
    pub backlog_population: Arc<BacklogPopulation>,
    pub ledger_pruning: Arc<LedgerPruning>,
    pub publisher: Arc<dyn MessagePublisher>,
    stopped: AtomicBool,
}

impl Node {
    pub fn new(args: NodeArgs) -> anyhow::Result<Self> {
        let NodeArgs {
            network_params,
            config,
            flags,
            store,
            publisher,
            vote_verifier,
            callbacks,
        } = args;
        config.validate()?;

        let stats = Arc::new(Stats::new(config.stats.clone()));

        let mut ledger = Ledger::new(store, network_params.ledger.clone())?;
        ledger.set_observer(Arc::new(LedgerStats::new(stats.clone())));
        if flags.enable_pruning {
            ledger.enable_pruning();
        }
        let ledger = Arc::new(ledger);

        let workers = Arc::new(ThreadPoolImpl::new(
            config.background_threads.max(1),
            "Worker",
        ));

        let online_reps = Arc::new(Mutex::new(
            OnlineReps::builder(ledger.rep_weights.clone())
                .weight_period(network_params.node.weight_period)
                .max_samples(network_params.node.max_weight_samples)
                .online_weight_minimum(config.online_weight_minimum)
                .quorum_percent(config.online_weight_quorum)
                .finish(),
        ));
        let online_weight_sampler = Arc::new(OnlineWeightSampler::new(
            online_reps.clone(),
            stats.clone(),
            network_params.node.weight_period,
        ));
        let representative_register = Arc::new(Mutex::new(RepresentativeRegister::new(
            ledger.rep_weights.clone(),
        )));

        let history = Arc::new(LocalVoteHistory::new(
            if network_params.network.is_dev_network() {
                256
            } else {
                128 * 1024
            },
        ));
        let vote_cache = Arc::new(Mutex::new(VoteCache::new(
            config.vote_cache.clone(),
            stats.clone(),
        )));
        let vote_generators = Arc::new(VoteGenerators::new(
            ledger.clone(),
            history.clone(),
            stats.clone(),
            publisher.clone(),
            &config,
            &network_params,
        ));

        let confirming_set = Arc::new(ConfirmingSet::new(
            config.confirming_set.clone(),
            ledger.clone(),
            stats.clone(),
        ));
        let block_processor = Arc::new(BlockProcessor::new(
            config.block_processor.clone(),
            ledger.clone(),
            stats.clone(),
        ));

        let active = Arc::new(ActiveElections::new(
            network_params.clone(),
            config.clone(),
            flags.clone(),
            ledger.clone(),
            online_reps.clone(),
            confirming_set.clone(),
            workers.clone(),
            history.clone(),
            block_processor.clone(),
            vote_generators.clone(),
            publisher.clone(),
            vote_cache.clone(),
            stats.clone(),
            representative_register.clone(),
        ));

        let vote_processor = Arc::new(VoteProcessor::new(
            config.vote_processor.clone(),
            vote_verifier,
            active.clone(),
            vote_cache.clone(),
            online_reps.clone(),
            representative_register.clone(),
            ledger.clone(),
            stats.clone(),
        ));
        let vote_cache_processor = Arc::new(VoteCacheProcessor::new(
            stats.clone(),
            vote_cache.clone(),
            active.clone(),
            config.vote_processor.max_triggered,
        ));

        let election_schedulers = Arc::new(ElectionSchedulers::new(
            &config,
            &network_params,
            active.clone(),
            ledger.clone(),
            stats.clone(),
            vote_cache.clone(),
            online_reps.clone(),
        ));

        let backlog_population = Arc::new(BacklogPopulation::new(
            config.backlog.clone(),
            ledger.clone(),
            stats.clone(),
        ));

        let ledger_pruning = Arc::new(LedgerPruning::new(
            config.clone(),
            flags.clone(),
            ledger.clone(),
            stats.clone(),
            workers.clone(),
        ));

        // Replay cached votes into new elections
        let cache_processor_w = Arc::downgrade(&vote_cache_processor);
        active.add_active_started_observer(Box::new(move |hash| {
            if let Some(processor) = cache_processor_w.upgrade() {
                processor.trigger(hash);
            }
        }));

        let schedulers_w = Arc::downgrade(&election_schedulers);
        active.add_vacancy_update_observer(Box::new(move || {
            if let Some(schedulers) = schedulers_w.upgrade() {
                schedulers.notify();
            }
        }));

        let schedulers_w = Arc::downgrade(&election_schedulers);
        active.set_activate_successors_callback(Box::new(move |txn, block| {
            if let Some(schedulers) = schedulers_w.upgrade() {
                schedulers.activate_successors(txn, block);
            }
        }));

        if let Some(callback) = callbacks.on_election_end {
            active.add_election_ended_observer(callback);
        }

        if let Some(callback) = callbacks.on_vote {
            vote_processor.add_vote_processed_callback(callback);
        }

        let active_w = Arc::downgrade(&active);
        confirming_set.on_cemented(Box::new(move |block| {
            if let Some(active) = active_w.upgrade() {
                active.block_cemented(block);
            }
        }));

        let active_w = Arc::downgrade(&active);
        confirming_set.on_already_cemented(Box::new(move |hashes| {
            if let Some(active) = active_w.upgrade() {
                for hash in hashes {
                    active.remove_election_winner_details(hash);
                }
            }
        }));

        let active_w = Arc::downgrade(&active);
        let schedulers_w = Arc::downgrade(&election_schedulers);
        let ledger_l = ledger.clone();
        block_processor.add_batch_processed_observer(Box::new(move |batch| {
            let (Some(active), Some(schedulers)) = (active_w.upgrade(), schedulers_w.upgrade())
            else {
                return;
            };
            let txn = ledger_l.read_txn();
            for (status, context) in batch {
                match status {
                    BlockStatus::Progress => {
                        schedulers.activate(&txn, &context.block.account);
                    }
                    BlockStatus::Fork if context.source != BlockSource::Forced => {
                        active.publish_block(&context.block);
                    }
                    _ => {}
                }
            }
        }));

        let active_w = Arc::downgrade(&active);
        block_processor.add_rolled_back_observer(Box::new(move |blocks, rollback_root| {
            let Some(active) = active_w.upgrade() else {
                return;
            };
            // Elections of rolled back blocks are obsolete, except the one that forced the rollback
            for block in blocks {
                let root = block.qualified_root();
                if root != rollback_root {
                    active.erase(&root);
                }
            }
        }));

        let schedulers_w = Arc::downgrade(&election_schedulers);
        backlog_population.set_activate_callback(Box::new(
            move |txn, account, account_info, conf_info| {
                if let Some(schedulers) = schedulers_w.upgrade() {
                    schedulers.activate_backlog(txn, account, account_info, conf_info);
                }
            },
        ));

        // Votes of local representatives are processed like votes from the network
        let vote_processor_w = Arc::downgrade(&vote_processor);
        vote_generators.add_vote_generated_observer(Box::new(move |vote| {
            if let Some(processor) = vote_processor_w.upgrade() {
                processor.vote(vote, ChannelId::LOOPBACK, VoteSource::Live);
            }
        }));

        debug!(
            network = network_params.network.current_network.as_str(),
            voting = config.is_voting(),
            "node created"
        );

        Ok(Self {
            network_params,
            config,
            flags,
            stats,
            ledger,
            workers,
            online_reps,
            online_weight_sampler,
            representative_register,
            history,
            vote_cache,
            vote_generators,
            confirming_set,
            block_processor,
            active,
            vote_processor,
            vote_cache_processor,
            election_schedulers,
            backlog_population,
            ledger_pruning,
            publisher,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn start(&self) {
        self.stats.start();
        self.block_processor.start();
        self.confirming_set.start();
        self.active.start();
        self.vote_processor.start();
        self.vote_cache_processor.start();
        self.vote_generators.start();
        self.election_schedulers.start();
        if !self.flags.disable_backlog_population {
            self.backlog_population.start();
        }
        if !self.flags.disable_online_weight_sampling {
            self.online_weight_sampler.start();
        }
        self.ledger_pruning.start();
        info!(
            blocks = self.ledger.block_count(),
            cemented = self.ledger.cemented_count(),
            "Node started"
        );
    }

    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Node stopping");
        self.ledger_pruning.stop();
        self.online_weight_sampler.stop();
        self.backlog_population.stop();
        self.election_schedulers.stop();
        self.vote_generators.stop();
        self.vote_cache_processor.stop();
        self.vote_processor.stop();
        self.active.stop();
        self.block_processor.stop();
        self.confirming_set.stop();
        self.workers.stop();
        self.stats.stop();
    }

    /// Handles a message received from a peer
    pub fn inbound(&self, message: Message, channel_id: ChannelId) {
        self.stats.inc_dir(
            StatType::Message,
            message.message_type().into(),
            Direction::In,
        );
        match message {
            Message::Publish(block) => {
                self.block_processor
                    .add(Arc::new(block), BlockSource::Live);
            }
            Message::ConfirmReq(hashes) => self.reply_to_confirm_req(&hashes, channel_id),
            Message::ConfirmAck(vote) => {
                self.vote_processor
                    .vote(&vote, channel_id, VoteSource::Live);
            }
        }
    }

    fn reply_to_confirm_req(
        &self,
        hashes: &[(lattice_core::BlockHash, lattice_core::Root)],
        channel_id: ChannelId,
    ) {
        let mut final_blocks = Vec::new();
        let mut blocks = Vec::new();
        {
            let txn = self.ledger.read_txn();
            for (hash, _root) in hashes {
                let Some(block) = self.ledger.get_block(&txn, hash) else {
                    continue;
                };
                if self.ledger.block_confirmed(&txn, hash) {
                    final_blocks.push(Arc::new(block.into_block()));
                } else {
                    blocks.push(Arc::new(block.into_block()));
                }
            }
        }
        let mut replies = 0;
        if !final_blocks.is_empty() {
            replies += self
                .vote_generators
                .generate_final_votes(&final_blocks, channel_id);
        }
        if !blocks.is_empty() {
            replies += self
                .vote_generators
                .generate_non_final_votes(&blocks, channel_id);
        }
        if replies == 0 {
            self.stats
                .inc(StatType::VoteGenerator, DetailType::GeneratorRepliesDiscarded);
        }
    }

    /// Processes a block created by this node and waits for the result
    pub fn process_local(&self, block: Block) -> Option<BlockStatus> {
        self.block_processor
            .add_blocking(Arc::new(block), BlockSource::Local)
    }

    pub fn process_active(&self, block: Block) {
        self.block_processor.process_active(Arc::new(block));
    }

    pub fn container_info(&self) -> ContainerInfo {
        ContainerInfo::builder()
            .node("ledger", self.ledger.container_info())
            .node("active", self.active.container_info())
            .node("block_processor", self.block_processor.container_info())
            .node("confirming_set", self.confirming_set.container_info())
            .node("vote_processor", self.vote_processor.container_info())
            .node("vote_cache_processor", self.vote_cache_processor.container_info())
            .node("vote_cache", self.vote_cache.lock().unwrap().container_info())
            .node("vote_generators", self.vote_generators.container_info())
            .node("history", self.history.container_info())
            .node("election_schedulers", self.election_schedulers.container_info())
            .node("online_reps", self.online_reps.lock().unwrap().container_info())
            .finish()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop();
    }
}
