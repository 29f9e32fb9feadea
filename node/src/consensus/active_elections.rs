use super::{
    confirmation_solicitor::ConfirmationSolicitor, Election, ElectionBehavior, ElectionData,
    ElectionState, ElectionStatus, ElectionStatusType, LocalVoteHistory, RecentlyCemented,
    RecentlyConfirmed, VoteCache, VoteGenerators, VoteInfo, ELECTION_MAX_BLOCKS,
};
use crate::{
    block_processing::BlockProcessor,
    cementation::ConfirmingSet,
    config::{NetworkParams, NodeConfig, NodeFlags},
    representatives::{OnlineReps, RepresentativeRegister},
    stats::{DetailType, Sample, StatType, Stats},
    transport::MessagePublisher,
    utils::ThreadPool,
};
use lattice_core::{
    utils::ContainerInfo, Amount, Block, BlockHash, PublicKey, QualifiedRoot, SavedBlock, Vote,
    VoteCode, VoteSource,
};
use lattice_ledger::{Ledger, Transaction};
#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;
use std::{
    cmp::max,
    collections::HashMap,
    mem::size_of,
    sync::{atomic::Ordering, Arc, Condvar, Mutex, MutexGuard, RwLock},
    thread::JoinHandle,
    time::{Duration, SystemTime},
};
use tracing::{debug, trace};

#[derive(Clone, Debug, PartialEq)]
pub struct ActiveElectionsConfig {
    /// Maximum number of simultaneous active elections (AEC size)
    pub size: usize,
    /// Limit of hinted elections as percentage of `size`
    pub hinted_limit_percentage: usize,
    /// Limit of optimistic elections as percentage of `size`
    pub optimistic_limit_percentage: usize,
    /// Maximum confirmation history size
    pub confirmation_history_size: usize,
    /// Maximum cache size for recently_confirmed
    pub confirmation_cache: usize,
    pub priority_ttl: Duration,
    pub manual_ttl: Duration,
    pub hinted_ttl: Duration,
    pub optimistic_ttl: Duration,
}

impl ActiveElectionsConfig {
    pub fn ttl(&self, behavior: ElectionBehavior) -> Duration {
        match behavior {
            ElectionBehavior::Priority => self.priority_ttl,
            ElectionBehavior::Manual => self.manual_ttl,
            ElectionBehavior::Hinted => self.hinted_ttl,
            ElectionBehavior::Optimistic => self.optimistic_ttl,
        }
    }
}

impl Default for ActiveElectionsConfig {
    fn default() -> Self {
        Self {
            size: 5000,
            hinted_limit_percentage: 20,
            optimistic_limit_percentage: 10,
            confirmation_history_size: 2048,
            confirmation_cache: 65536,
            priority_ttl: Duration::from_secs(5 * 60),
            manual_ttl: Duration::from_secs(5 * 60),
            hinted_ttl: Duration::from_secs(30),
            optimistic_ttl: Duration::from_secs(30),
        }
    }
}

pub type VoteProcessedCallback =
    Box<dyn Fn(&Arc<Vote>, VoteSource, &HashMap<BlockHash, VoteCode>) + Send + Sync>;
pub type ElectionEndedCallback = Box<dyn Fn(&ElectionStatus) + Send + Sync>;
pub type ActivateSuccessorsCallback = Box<dyn Fn(&dyn Transaction, &SavedBlock) + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InsertError {
    Stopped,
    /// The root was confirmed a short time ago
    RecentlyConfirmed,
    /// No vacancy for the election behavior and nothing could be evicted
    CapacityExceeded,
}

#[derive(Clone, Debug)]
pub struct ElectionInsertion {
    pub election: Arc<Election>,
    /// False if an election for the root existed already
    pub inserted: bool,
}

/// Container of the ongoing elections. Drives the elections with a request loop
/// and routes incoming votes to them.
pub struct ActiveElections {
    mutex: Mutex<ActiveElectionsData>,
    condition: Condvar,
    network: NetworkParams,
    config: NodeConfig,
    flags: NodeFlags,
    ledger: Arc<Ledger>,
    online_reps: Arc<Mutex<OnlineReps>>,
    confirming_set: Arc<ConfirmingSet>,
    workers: Arc<dyn ThreadPool>,
    history: Arc<LocalVoteHistory>,
    block_processor: Arc<BlockProcessor>,
    vote_generators: Arc<VoteGenerators>,
    publisher: Arc<dyn MessagePublisher>,
    vote_cache: Arc<Mutex<VoteCache>>,
    stats: Arc<Stats>,
    representative_register: Arc<Mutex<RepresentativeRegister>>,
    /// Elections that were confirmed but whose winner is not cemented yet
    election_winner_details: Mutex<HashMap<BlockHash, Arc<Election>>>,
    pub recently_confirmed: Arc<RecentlyConfirmed>,
    pub recently_cemented: Arc<RecentlyCemented>,
    vote_processed_observers: RwLock<Vec<VoteProcessedCallback>>,
    active_started_observers: RwLock<Vec<Box<dyn Fn(BlockHash) + Send + Sync>>>,
    active_stopped_observers: RwLock<Vec<Box<dyn Fn(BlockHash) + Send + Sync>>>,
    election_ended_observers: RwLock<Vec<ElectionEndedCallback>>,
    vacancy_update_observers: RwLock<Vec<Box<dyn Fn() + Send + Sync>>>,
    activate_successors: Mutex<ActivateSuccessorsCallback>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ActiveElections {
    pub fn new(
        network: NetworkParams,
        config: NodeConfig,
        flags: NodeFlags,
        ledger: Arc<Ledger>,
        online_reps: Arc<Mutex<OnlineReps>>,
        confirming_set: Arc<ConfirmingSet>,
        workers: Arc<dyn ThreadPool>,
        history: Arc<LocalVoteHistory>,
        block_processor: Arc<BlockProcessor>,
        vote_generators: Arc<VoteGenerators>,
        publisher: Arc<dyn MessagePublisher>,
        vote_cache: Arc<Mutex<VoteCache>>,
        stats: Arc<Stats>,
        representative_register: Arc<Mutex<RepresentativeRegister>>,
    ) -> Self {
        Self {
            mutex: Mutex::new(ActiveElectionsData {
                roots: OrderedRoots::default(),
                blocks: HashMap::new(),
                stopped: false,
                priority_count: 0,
                manual_count: 0,
                hinted_count: 0,
                optimistic_count: 0,
                next_id: 1,
            }),
            condition: Condvar::new(),
            recently_confirmed: Arc::new(RecentlyConfirmed::new(
                config.active_elections.confirmation_cache,
            )),
            recently_cemented: Arc::new(RecentlyCemented::new(
                config.active_elections.confirmation_history_size,
            )),
            network,
            config,
            flags,
            ledger,
            online_reps,
            confirming_set,
            workers,
            history,
            block_processor,
            vote_generators,
            publisher,
            vote_cache,
            stats,
            representative_register,
            election_winner_details: Mutex::new(HashMap::new()),
            vote_processed_observers: RwLock::new(Vec::new()),
            active_started_observers: RwLock::new(Vec::new()),
            active_stopped_observers: RwLock::new(Vec::new()),
            election_ended_observers: RwLock::new(Vec::new()),
            vacancy_update_observers: RwLock::new(Vec::new()),
            activate_successors: Mutex::new(Box::new(|_txn, _block| {})),
            thread: Mutex::new(None),
        }
    }

    /*
     * Callbacks
     */
    pub fn add_vote_processed_observer(&self, observer: VoteProcessedCallback) {
        self.vote_processed_observers.write().unwrap().push(observer);
    }

    /// Called with the hash of the initial block of a new election
    pub fn add_active_started_observer(&self, observer: Box<dyn Fn(BlockHash) + Send + Sync>) {
        self.active_started_observers.write().unwrap().push(observer);
    }

    /// Called for every candidate of an erased election that didn't win
    pub fn add_active_stopped_observer(&self, observer: Box<dyn Fn(BlockHash) + Send + Sync>) {
        self.active_stopped_observers.write().unwrap().push(observer);
    }

    pub fn add_election_ended_observer(&self, observer: ElectionEndedCallback) {
        self.election_ended_observers.write().unwrap().push(observer);
    }

    /// Called whenever the number of free election slots may have changed
    pub fn add_vacancy_update_observer(&self, observer: Box<dyn Fn() + Send + Sync>) {
        self.vacancy_update_observers.write().unwrap().push(observer);
    }

    pub fn set_activate_successors_callback(&self, callback: ActivateSuccessorsCallback) {
        *self.activate_successors.lock().unwrap() = callback;
    }

    //--------------------------------------------------------------------------------

    fn vacancy_update(&self) {
        for observer in self.vacancy_update_observers.read().unwrap().iter() {
            observer();
        }
    }

    /// Maximum number of elections of the given behavior.
    /// Manual elections are not limited.
    pub fn limit(&self, behavior: ElectionBehavior) -> usize {
        let config = &self.config.active_elections;
        match behavior {
            ElectionBehavior::Manual => usize::MAX,
            ElectionBehavior::Priority => config.size,
            ElectionBehavior::Hinted => config.size * config.hinted_limit_percentage / 100,
            ElectionBehavior::Optimistic => {
                config.size * config.optimistic_limit_percentage / 100
            }
        }
    }

    /// How many election slots are available for the specified election behavior
    pub fn vacancy(&self, behavior: ElectionBehavior) -> i64 {
        let guard = self.mutex.lock().unwrap();
        self.vacancy_locked(&guard, behavior)
    }

    fn vacancy_locked(&self, data: &ActiveElectionsData, behavior: ElectionBehavior) -> i64 {
        match behavior {
            ElectionBehavior::Manual => i64::MAX,
            ElectionBehavior::Priority => {
                self.limit(ElectionBehavior::Priority) as i64 - data.roots.len() as i64
            }
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => {
                self.limit(behavior) as i64 - data.count_by_behavior(behavior) as i64
            }
        }
    }

    pub fn len(&self) -> usize {
        self.mutex.lock().unwrap().roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_by_behavior(&self, behavior: ElectionBehavior) -> usize {
        self.mutex.lock().unwrap().count_by_behavior(behavior)
    }

    /// Is the block a candidate of an active election?
    pub fn active(&self, hash: &BlockHash) -> bool {
        self.mutex.lock().unwrap().blocks.contains_key(hash)
    }

    pub fn active_root(&self, root: &QualifiedRoot) -> bool {
        self.mutex.lock().unwrap().roots.get(root).is_some()
    }

    pub fn election(&self, root: &QualifiedRoot) -> Option<Arc<Election>> {
        self.mutex.lock().unwrap().roots.get(root).cloned()
    }

    pub fn election_for_block(&self, hash: &BlockHash) -> Option<Arc<Election>> {
        self.mutex.lock().unwrap().blocks.get(hash).cloned()
    }

    /// Elections in insertion order
    pub fn list_active(&self, max: usize) -> Vec<Arc<Election>> {
        let guard = self.mutex.lock().unwrap();
        guard
            .roots
            .iter_sequenced()
            .map(|(_, election)| Arc::clone(election))
            .take(max)
            .collect()
    }

    pub fn winner_details_len(&self) -> usize {
        self.election_winner_details.lock().unwrap().len()
    }

    pub fn remove_election_winner_details(&self, hash: &BlockHash) -> Option<Arc<Election>> {
        self.election_winner_details.lock().unwrap().remove(hash)
    }

    /// Calculates minimum time delay between subsequent votes when processing non-final votes
    pub fn cooldown_time(&self, weight: Amount) -> Duration {
        let online_stake = self.online_reps.lock().unwrap().trended();
        if weight > online_stake / 20 {
            // Reps with more than 5% weight
            Duration::from_secs(1)
        } else if weight > online_stake / 100 {
            // Reps with more than 1% weight
            Duration::from_secs(5)
        } else {
            // The rest of smaller reps
            Duration::from_secs(15)
        }
    }

    /// Calculates time delay between broadcasting confirmation requests
    pub fn confirm_req_time(&self, election: &Election) -> Duration {
        let base_latency = self.network.network.base_latency();
        match election.behavior {
            ElectionBehavior::Optimistic => base_latency * 2,
            _ => base_latency * 5,
        }
    }

    fn max_block_broadcasts(&self) -> usize {
        if self.network.network.is_dev_network() {
            4
        } else {
            30
        }
    }

    pub fn erase(&self, root: &QualifiedRoot) -> bool {
        let mut guard = self.mutex.lock().unwrap();
        let Some(election) = guard.roots.get(root).cloned() else {
            return false;
        };
        let erased = self.erase_locked(&mut guard, &election);
        drop(guard);
        self.notify_erased(erased);
        true
    }

    /// Removes all elections without notifying the stopped observers
    pub fn clear(&self) {
        {
            let mut guard = self.mutex.lock().unwrap();
            guard.blocks.clear();
            guard.roots.clear();
            guard.priority_count = 0;
            guard.manual_count = 0;
            guard.hinted_count = 0;
            guard.optimistic_count = 0;
        }
        self.vacancy_update();
    }

    fn erase_locked(
        &self,
        guard: &mut ActiveElectionsData,
        election: &Arc<Election>,
    ) -> ErasedElection {
        debug_assert!(guard.count_by_behavior(election.behavior) > 0);
        *guard.count_by_behavior_mut(election.behavior) -= 1;

        let (blocks, winner, completion) = {
            let mut election_guard = election.mutex.lock().unwrap();
            let completion = if election_guard.is_confirmed() {
                StatType::ActiveElectionsConfirmed
            } else if election_guard.state == ElectionState::ExpiredUnconfirmed {
                StatType::ActiveElectionsTimeout
            } else {
                let state = election_guard.state;
                let _ = election_guard.state_change(state, ElectionState::ExpiredUnconfirmed);
                StatType::ActiveElectionsDropped
            };
            let blocks: Vec<BlockHash> = election_guard.last_blocks.keys().cloned().collect();
            (blocks, election_guard.winner_hash(), completion)
        };

        for hash in &blocks {
            let erased = guard.blocks.remove(hash);
            debug_assert!(erased.is_some());
        }
        guard.roots.erase(&election.qualified_root);

        self.stats.inc(completion, election.behavior.into());
        self.stats.sample(
            Sample::ActiveElectionDuration,
            election.duration().as_millis() as i64,
            (0, 1000 * 60 * 10),
        );
        trace!(election = ?election, "active stopped");

        ErasedElection {
            blocks,
            winner,
            confirmed: completion == StatType::ActiveElectionsConfirmed,
        }
    }

    /// Must be called without holding the container lock
    fn notify_erased(&self, erased: ErasedElection) {
        self.vacancy_update();
        let observers = self.active_stopped_observers.read().unwrap();
        for hash in erased.blocks {
            // Notify observers about dropped elections and blocks that lost confirmed elections
            if !erased.confirmed || hash != erased.winner {
                for observer in observers.iter() {
                    observer(hash);
                }
            }
        }
    }

    /// Lowest class first, then lowest tally, then oldest
    fn find_eviction_candidate(
        &self,
        guard: &ActiveElectionsData,
        behavior: ElectionBehavior,
    ) -> Option<Arc<Election>> {
        guard
            .roots
            .iter_sequenced()
            .filter(|(_, election)| election.behavior < behavior)
            .filter_map(|(_, election)| {
                let election_guard = election.mutex.lock().unwrap();
                if election_guard.is_confirmed() {
                    None
                } else {
                    Some((
                        (election.behavior, election_guard.tally, election.id),
                        Arc::clone(election),
                    ))
                }
            })
            .min_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, election)| election)
    }

    fn remove_votes(&self, election: &Election, guard: &mut ElectionData, hash: &BlockHash) {
        if self.config.is_voting() {
            // Remove votes from election
            let list_generated_votes = self.history.votes(&election.root, hash, false);
            for vote in list_generated_votes {
                guard.last_votes.remove(&vote.voting_account);
            }
            // Clear votes cache
            self.history.erase(&election.root);
        }
    }

    fn broadcast_vote(&self, election: &Election, guard: &mut ElectionData) {
        if guard.last_vote_elapsed() >= self.network.network.vote_broadcast_interval {
            self.broadcast_vote_locked(election, guard);
            guard.set_last_vote();
        }
    }

    /// Broadcast vote for current election winner. Generates a final vote if the
    /// election reached quorum or is confirmed already.
    fn broadcast_vote_locked(&self, election: &Election, guard: &mut ElectionData) {
        if !self.config.is_voting() {
            return;
        }
        self.stats.inc(StatType::Election, DetailType::BroadcastVote);
        let winner = guard.winner_hash();
        if guard.is_confirmed() || election.is_quorum.load(Ordering::SeqCst) {
            self.stats
                .inc(StatType::Election, DetailType::GenerateVoteFinal);
            trace!(qualified_root = ?election.qualified_root, %winner, "type" = "final", "broadcast vote");
            self.vote_generators
                .generate_final_vote(&election.root, &winner);
        } else {
            self.stats
                .inc(StatType::Election, DetailType::GenerateVoteNormal);
            trace!(qualified_root = ?election.qualified_root, %winner, "type" = "normal", "broadcast vote");
            self.vote_generators
                .generate_non_final_vote(&election.root, &winner);
        }
    }

    fn broadcast_block(
        &self,
        solicitor: &mut ConfirmationSolicitor,
        election: &Election,
        guard: &mut ElectionData,
    ) {
        if self.broadcast_block_predicate(election, guard) && solicitor.broadcast(guard).is_ok() {
            self.stats.inc(
                StatType::Election,
                if guard.last_block_hash.is_zero() {
                    DetailType::BroadcastBlockInitial
                } else {
                    DetailType::BroadcastBlockRepeat
                },
            );
            election.set_last_block();
            guard.last_block_hash = guard.winner_hash();
        }
    }

    fn broadcast_block_predicate(&self, election: &Election, guard: &ElectionData) -> bool {
        // Broadcast the block if enough time has passed since the last broadcast (or it's the first broadcast)
        election.last_block_elapsed() >= self.network.network.block_broadcast_interval
            // Or the current election winner has changed
            || guard.winner_hash() != guard.last_block_hash
    }

    fn send_confirm_req(
        &self,
        solicitor: &mut ConfirmationSolicitor,
        election: &Election,
        guard: &ElectionData,
    ) {
        if election.last_req_elapsed() > self.confirm_req_time(election)
            && solicitor.add(election, guard)
        {
            election.set_last_req();
            election
                .confirmation_request_count
                .fetch_add(1, Ordering::SeqCst);
            self.stats
                .inc(StatType::Election, DetailType::ConfirmationRequest);
        }
    }

    /// Advances the election state. Returns true if the election should be erased.
    fn transition_time(&self, solicitor: &mut ConfirmationSolicitor, election: &Election) -> bool {
        let mut guard = election.mutex.lock().unwrap();
        let mut result = false;
        match guard.state {
            ElectionState::Passive => {
                if election.election_start.elapsed()
                    >= self.network.network.base_latency() * Election::PASSIVE_DURATION_FACTOR
                {
                    let _ = guard.state_change(ElectionState::Passive, ElectionState::Active);
                }
            }
            ElectionState::Active => {
                self.broadcast_vote(election, &mut guard);
                self.broadcast_block(solicitor, election, &mut guard);
                self.send_confirm_req(solicitor, election, &guard);
            }
            ElectionState::Confirmed => {
                result = true;
                // Ensure election winner is broadcasted
                self.broadcast_block(solicitor, election, &mut guard);
                let _ = guard.state_change(ElectionState::Confirmed, ElectionState::ExpiredConfirmed);
            }
            ElectionState::ExpiredConfirmed | ElectionState::ExpiredUnconfirmed => return true,
        }

        if !guard.is_confirmed() && election.expired() {
            let state = guard.state;
            if guard
                .state_change(state, ElectionState::ExpiredUnconfirmed)
                .is_ok()
            {
                trace!(qualified_root = ?election.qualified_root, "election expired");
                result = true;
                guard.status_type = ElectionStatusType::Stopped;
            }
        }

        result
    }

    fn request_confirm(&self) {
        let elections = self.list_active(usize::MAX);
        let representatives = {
            let minimum_weight = self.online_reps.lock().unwrap().minimum_principal_weight();
            self.representative_register
                .lock()
                .unwrap()
                .principal_representatives(minimum_weight)
        };

        let mut solicitor =
            ConfirmationSolicitor::new(self.publisher.as_ref(), self.max_block_broadcasts());
        solicitor.prepare(&representatives);

        for election in elections {
            if self.transition_time(&mut solicitor, &election) {
                self.erase(&election.qualified_root);
            }
        }

        solicitor.flush();
    }

    fn run(&self) {
        let mut guard = self.mutex.lock().unwrap();
        while !guard.stopped {
            let stamp = Instant::now();
            self.stats.inc(StatType::ActiveElections, DetailType::Loop);
            drop(guard);
            self.request_confirm();
            guard = self.mutex.lock().unwrap();
            guard = self.wait_for_next_loop(stamp, guard);
        }
    }

    fn wait_for_next_loop<'a>(
        &self,
        stamp: Instant,
        guard: MutexGuard<'a, ActiveElectionsData>,
    ) -> MutexGuard<'a, ActiveElectionsData> {
        if guard.stopped {
            return guard;
        }
        let loop_interval = self.network.network.aec_loop_interval;
        let min_sleep = loop_interval / 2;
        let wait_duration = max(min_sleep, loop_interval.saturating_sub(stamp.elapsed()));
        self.condition
            .wait_timeout_while(guard, wait_duration, |data| !data.stopped)
            .unwrap()
            .0
    }

    pub fn stop(&self) {
        self.mutex.lock().unwrap().stopped = true;
        self.condition.notify_all();
        let thread = self.thread.lock().unwrap().take();
        if let Some(thread) = thread {
            thread.join().unwrap();
        }
        self.clear();
    }

    pub fn container_info(&self) -> ContainerInfo {
        let guard = self.mutex.lock().unwrap();
        ContainerInfo::builder()
            .leaf(
                "roots",
                guard.roots.len(),
                size_of::<QualifiedRoot>() + size_of::<Arc<Election>>(),
            )
            .leaf(
                "blocks",
                guard.blocks.len(),
                size_of::<BlockHash>() + size_of::<Arc<Election>>(),
            )
            .leaf(
                "election_winner_details",
                self.election_winner_details.lock().unwrap().len(),
                size_of::<BlockHash>() + size_of::<Arc<Election>>(),
            )
            .leaf("normal", guard.priority_count, 0)
            .leaf("manual", guard.manual_count, 0)
            .leaf("hinted", guard.hinted_count, 0)
            .leaf("optimistic", guard.optimistic_count, 0)
            .node("recently_confirmed", self.recently_confirmed.container_info())
            .node("recently_cemented", self.recently_cemented.container_info())
            .finish()
    }
}

impl Drop for ActiveElections {
    fn drop(&mut self) {
        debug_assert!(self.thread.lock().unwrap().is_none())
    }
}

struct ErasedElection {
    blocks: Vec<BlockHash>,
    winner: BlockHash,
    confirmed: bool,
}

pub trait ActiveElectionsExt {
    fn start(&self);
    /// Starts an election for the block. Returns the existing election if the root is active already.
    fn insert(
        &self,
        block: &Arc<Block>,
        behavior: ElectionBehavior,
    ) -> Result<ElectionInsertion, InsertError>;
    /// Adds a fork to an existing election. Returns true if the block was added as new candidate.
    fn publish_block(&self, block: &Arc<Block>) -> bool;
    /// Distinguishes replay votes, cannot be determined if the block is not in any election
    fn vote(&self, vote: &Arc<Vote>, source: VoteSource) -> HashMap<BlockHash, VoteCode>;
    /// Applies the vote only for a single hash
    fn vote_filter(
        &self,
        vote: &Arc<Vote>,
        source: VoteSource,
        hash: &BlockHash,
    ) -> HashMap<BlockHash, VoteCode>;
    fn trigger_vote_cache(&self, hash: &BlockHash) -> bool;
    fn block_cemented(&self, block: &SavedBlock);
    fn try_confirm(&self, election: &Arc<Election>, hash: &BlockHash);
    fn force_confirm(&self, election: &Arc<Election>);
    fn process_confirmed(&self, status: ElectionStatus, iteration: u64);
}

impl ActiveElectionsExt for Arc<ActiveElections> {
    fn start(&self) {
        if self.flags.disable_request_loop {
            return;
        }
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Request loop".to_owned())
                .spawn(move || self_l.run())
                .unwrap(),
        );
    }

    fn insert(
        &self,
        block: &Arc<Block>,
        behavior: ElectionBehavior,
    ) -> Result<ElectionInsertion, InsertError> {
        let mut guard = self.mutex.lock().unwrap();
        if guard.stopped {
            return Err(InsertError::Stopped);
        }

        let root = block.qualified_root();
        let hash = block.hash();

        if let Some(existing) = guard.roots.get(&root).cloned() {
            drop(guard);
            let mut election_guard = existing.mutex.lock().unwrap();
            self.broadcast_vote(&existing, &mut election_guard);
            drop(election_guard);
            return Ok(ElectionInsertion {
                election: existing,
                inserted: false,
            });
        }

        if self.recently_confirmed.root_exists(&root) {
            self.stats
                .inc(StatType::ActiveElections, DetailType::RecentlyConfirmed);
            return Err(InsertError::RecentlyConfirmed);
        }

        let mut evicted = None;
        if self.vacancy_locked(&guard, behavior) <= 0 {
            let candidate = if behavior == ElectionBehavior::Priority {
                self.find_eviction_candidate(&guard, behavior)
            } else {
                None
            };
            match candidate {
                Some(candidate) => {
                    self.stats
                        .inc(StatType::ActiveElections, DetailType::Evicted);
                    debug!(election = ?candidate, "evicting election");
                    evicted = Some(self.erase_locked(&mut guard, &candidate));
                }
                None => {
                    self.stats
                        .inc(StatType::ActiveElections, DetailType::CapacityExceeded);
                    return Err(InsertError::CapacityExceeded);
                }
            }
        }

        let id = guard.next_id;
        guard.next_id += 1;
        let election = Arc::new(Election::new(
            id,
            Arc::clone(block),
            behavior,
            self.config.active_elections.ttl(behavior),
        ));
        guard.roots.insert(root, Arc::clone(&election));
        guard.blocks.insert(hash, Arc::clone(&election));
        *guard.count_by_behavior_mut(behavior) += 1;

        self.stats
            .inc(StatType::ActiveElectionsStarted, behavior.into());
        trace!(?behavior, election = ?election, "active started");
        drop(guard);

        if let Some(evicted) = evicted {
            self.notify_erased(evicted);
        }

        for observer in self.active_started_observers.read().unwrap().iter() {
            observer(hash);
        }
        self.vacancy_update();

        // Votes are generated for inserted or ongoing elections
        let mut election_guard = election.mutex.lock().unwrap();
        self.broadcast_vote(&election, &mut election_guard);
        drop(election_guard);

        Ok(ElectionInsertion {
            election,
            inserted: true,
        })
    }

    fn publish_block(&self, block: &Arc<Block>) -> bool {
        let Some(election) = self.election(&block.qualified_root()) else {
            return false;
        };

        let (added, replaced) = publish(self, block, &election);
        if added {
            let hash = block.hash();
            {
                let mut guard = self.mutex.lock().unwrap();
                if let Some(replaced) = replaced {
                    guard.blocks.remove(&replaced);
                }
                guard.blocks.insert(hash, Arc::clone(&election));
            }

            self.trigger_vote_cache(&hash);
            self.stats
                .inc(StatType::ActiveElections, DetailType::ElectionBlockConflict);
        }
        added
    }

    fn vote(&self, vote: &Arc<Vote>, source: VoteSource) -> HashMap<BlockHash, VoteCode> {
        vote_impl(self, vote, source, None)
    }

    fn vote_filter(
        &self,
        vote: &Arc<Vote>,
        source: VoteSource,
        hash: &BlockHash,
    ) -> HashMap<BlockHash, VoteCode> {
        vote_impl(self, vote, source, Some(hash))
    }

    fn trigger_vote_cache(&self, hash: &BlockHash) -> bool {
        let cached = self.vote_cache.lock().unwrap().find(hash);
        for cached_vote in &cached {
            self.vote_filter(cached_vote, VoteSource::Cache, hash);
        }
        !cached.is_empty()
    }

    fn block_cemented(&self, block: &SavedBlock) {
        let hash = block.hash();
        if let Some(election) = self.election(&block.qualified_root()) {
            self.try_confirm(&election, &hash);
        }

        let status = match self.remove_election_winner_details(&hash) {
            Some(election) => election.status(),
            None => {
                let mut status = ElectionStatus::new(Arc::new(block.block().clone()));
                status.status_type = ElectionStatusType::InactiveConfirmationHeight;
                status
            }
        };

        self.recently_cemented.put(status.clone());
        self.stats.inc(
            StatType::ActiveElectionsCemented,
            status.status_type.into(),
        );
        trace!(%hash, status_type = status.status_type.as_str(), "block cemented");

        for observer in self.election_ended_observers.read().unwrap().iter() {
            observer(&status);
        }

        if !self.flags.disable_activate_successors {
            let txn = self.ledger.read_txn();
            (self.activate_successors.lock().unwrap())(&txn, block);
        }
    }

    fn try_confirm(&self, election: &Arc<Election>, hash: &BlockHash) {
        let guard = election.mutex.lock().unwrap();
        if guard.winner_hash() == *hash && !guard.is_confirmed() {
            confirm_once(
                self,
                guard,
                election,
                ElectionStatusType::ActiveConfirmationHeight,
            );
        }
    }

    fn force_confirm(&self, election: &Arc<Election>) {
        assert!(self.network.network.is_dev_network());
        let guard = election.mutex.lock().unwrap();
        self.stats
            .inc(StatType::Election, DetailType::ForceConfirmed);
        confirm_once(
            self,
            guard,
            election,
            ElectionStatusType::ActiveConfirmedQuorum,
        );
    }

    fn process_confirmed(&self, status: ElectionStatus, mut iteration: u64) {
        let hash = status.winner.hash();
        let interval = self.network.node.process_confirmed_interval;
        let num_iters = (self.config.block_processor.batch_max_time.as_millis()
            / max(interval.as_millis(), 1)) as u64
            * 4;
        let exists = {
            let txn = self.ledger.read_txn();
            self.ledger.block_exists(&txn, &hash)
        };
        if exists {
            trace!(%hash, "process confirmed");
            self.confirming_set.add(hash);
        } else if iteration < num_iters {
            iteration += 1;
            let self_w = Arc::downgrade(self);
            self.workers.add_delayed_task(
                interval,
                Box::new(move || {
                    if let Some(self_l) = self_w.upgrade() {
                        self_l.process_confirmed(status, iteration);
                    }
                }),
            );
        } else {
            // The block never reached the ledger, so it will never be cemented
            self.remove_election_winner_details(&hash);
        }
    }
}

fn vote_impl(
    active: &Arc<ActiveElections>,
    vote: &Arc<Vote>,
    source: VoteSource,
    filter: Option<&BlockHash>,
) -> HashMap<BlockHash, VoteCode> {
    let mut results = HashMap::new();
    let mut process = HashMap::new();
    {
        let guard = active.mutex.lock().unwrap();
        for hash in &vote.hashes {
            if filter.map(|f| f != hash).unwrap_or(false) {
                continue;
            }
            // Ignore duplicate hashes (should not happen with a well-behaved voting node)
            if results.contains_key(hash) || process.contains_key(hash) {
                continue;
            }

            if let Some(existing) = guard.blocks.get(hash) {
                process.insert(*hash, Arc::clone(existing));
            } else if !active.recently_confirmed.hash_exists(hash) {
                results.insert(*hash, VoteCode::Indeterminate);
            } else {
                results.insert(*hash, VoteCode::Replay);
            }
        }
    }

    for (block_hash, election) in process {
        let vote_result = vote2(
            active,
            &election,
            &vote.voting_account,
            vote.timestamp,
            &block_hash,
            source,
        );
        results.insert(block_hash, vote_result);
    }

    for observer in active.vote_processed_observers.read().unwrap().iter() {
        observer(vote, source, &results);
    }

    results
}

/// Applies a single representative vote to the election
fn vote2(
    active: &Arc<ActiveElections>,
    election: &Arc<Election>,
    rep: &PublicKey,
    timestamp: u64,
    block_hash: &BlockHash,
    vote_source: VoteSource,
) -> VoteCode {
    let weight = active.ledger.weight(rep);
    if !active.network.network.is_dev_network()
        && weight <= active.online_reps.lock().unwrap().minimum_principal_weight()
    {
        return VoteCode::Indeterminate;
    }

    let cooldown = active.cooldown_time(weight);
    let mut guard = election.mutex.lock().unwrap();

    if let Some(last_vote) = guard.last_votes.get(rep) {
        // A final vote locks the representative to its hash
        if last_vote.is_final() && last_vote.hash != *block_hash {
            return VoteCode::Replay;
        }
        if last_vote.timestamp > timestamp {
            return VoteCode::Replay;
        }
        if last_vote.timestamp == timestamp && !(last_vote.hash < *block_hash) {
            return VoteCode::Replay;
        }

        let is_final = timestamp == Vote::FINAL_TIMESTAMP;
        // Only cooldown live votes
        if vote_source == VoteSource::Live && !is_final && last_vote.time.elapsed() < cooldown {
            return VoteCode::Ignored;
        }
    }

    guard
        .last_votes
        .insert(*rep, VoteInfo::new(timestamp, *block_hash));

    active.stats.inc(
        StatType::Election,
        if vote_source == VoteSource::Live {
            DetailType::VoteNew
        } else {
            DetailType::VoteCached
        },
    );
    trace!(
        qualified_root = ?election.qualified_root,
        account = %rep,
        hash = %block_hash,
        timestamp,
        ?vote_source,
        ?weight,
        "vote processed"
    );

    if !guard.is_confirmed() {
        confirm_if_quorum(active, guard, election);
    }
    VoteCode::Vote
}

/// Confirms the election if the leading block reached quorum with final votes
fn confirm_if_quorum(
    active: &Arc<ActiveElections>,
    mut guard: MutexGuard<ElectionData>,
    election: &Arc<Election>,
) {
    let tally = guard.calculate_tally(|rep| active.ledger.weight(rep));
    let Some(leader) = tally.first() else {
        return;
    };
    guard.tally = leader.weight;
    guard.final_tally = leader.final_weight;

    let delta = active.online_reps.lock().unwrap().delta();
    let sum: Amount = tally.iter().map(|entry| entry.weight).sum();
    let winner_hash = guard.winner_hash();
    if sum >= delta && leader.hash != winner_hash {
        guard.winner = Arc::clone(&leader.block);
        active.remove_votes(election, &mut guard, &winner_hash);
        active
            .stats
            .inc(StatType::Election, DetailType::WinnerChanged);
        debug!(qualified_root = ?election.qualified_root, old = %winner_hash, new = %leader.hash, "election winner changed");
        active.block_processor.force(Arc::clone(&leader.block));
    }

    if leader.weight >= delta {
        if !election.is_quorum.swap(true, Ordering::SeqCst) && active.config.is_voting() {
            active
                .vote_generators
                .generate_final_vote(&election.root, &leader.hash);
        }
        if leader.final_weight >= delta {
            confirm_once(
                active,
                guard,
                election,
                ElectionStatusType::ActiveConfirmedQuorum,
            );
        }
    }
}

fn confirm_once(
    active: &Arc<ActiveElections>,
    mut guard: MutexGuard<ElectionData>,
    election: &Arc<Election>,
    status_type: ElectionStatusType,
) {
    // Must be updated before the election state, because dependent elections rely on it
    let mut winners = active.election_winner_details.lock().unwrap();
    let winner_hash = guard.winner_hash();
    let old_state = guard.state;
    let just_confirmed = matches!(old_state, ElectionState::Passive | ElectionState::Active)
        && guard
            .state_change(old_state, ElectionState::Confirmed)
            .is_ok();

    if !just_confirmed {
        drop(winners);
        active
            .stats
            .inc(StatType::Election, DetailType::ConfirmOnceFailed);
        return;
    }

    winners
        .entry(winner_hash)
        .or_insert_with(|| Arc::clone(election));
    drop(winners);

    guard.status_type = status_type;
    guard.election_end = Some(SystemTime::now());
    let status = election.status_locked(&guard);
    active
        .recently_confirmed
        .put(election.qualified_root, winner_hash);
    active
        .stats
        .inc(StatType::Election, DetailType::ConfirmOnce);
    trace!(qualified_root = ?election.qualified_root, winner = %winner_hash, "election confirmed");
    drop(guard);

    let active_l = Arc::clone(active);
    active.workers.push_task(Box::new(move || {
        active_l.process_confirmed(status, 0);
    }));
}

/// Returns (added, replaced candidate)
fn publish(
    active: &ActiveElections,
    block: &Arc<Block>,
    election: &Election,
) -> (bool, Option<BlockHash>) {
    let mut guard = election.mutex.lock().unwrap();

    // Do not insert new blocks if already confirmed
    if guard.is_confirmed() {
        return (false, None);
    }

    let hash = block.hash();
    if guard.last_blocks.contains_key(&hash) {
        // Refresh the block content
        guard.add_block(Arc::clone(block));
        return (false, None);
    }

    let mut replaced = None;
    if guard.last_blocks.len() >= ELECTION_MAX_BLOCKS {
        replaced = replace_by_weight(active, &mut guard, &hash);
        if replaced.is_none() {
            return (false, None);
        }
    }

    guard.add_block(Arc::clone(block));
    (true, replaced)
}

/// Replaces the candidate with the lowest tally if the cached votes for the
/// new block weigh more. Candidates with final votes are never replaced.
fn replace_by_weight(
    active: &ActiveElections,
    guard: &mut ElectionData,
    hash: &BlockHash,
) -> Option<BlockHash> {
    let cached_tally: Amount = active
        .vote_cache
        .lock()
        .unwrap()
        .find(hash)
        .iter()
        .map(|vote| active.ledger.weight(&vote.voting_account))
        .sum();
    if cached_tally.is_zero() {
        return None;
    }

    let winner = guard.winner_hash();
    let (lowest_tally, lowest_hash) = guard
        .last_blocks
        .keys()
        .filter(|h| **h != winner && !guard.has_final_votes(h))
        .map(|h| (guard.last_tally.get(h).cloned().unwrap_or_default(), *h))
        .min()?;

    if cached_tally > lowest_tally {
        guard.remove_block(&lowest_hash).map(|_| lowest_hash)
    } else {
        None
    }
}

pub struct ActiveElectionsData {
    roots: OrderedRoots,
    blocks: HashMap<BlockHash, Arc<Election>>,
    stopped: bool,
    priority_count: usize,
    manual_count: usize,
    hinted_count: usize,
    optimistic_count: usize,
    next_id: usize,
}

impl ActiveElectionsData {
    pub fn count_by_behavior(&self, behavior: ElectionBehavior) -> usize {
        match behavior {
            ElectionBehavior::Priority => self.priority_count,
            ElectionBehavior::Manual => self.manual_count,
            ElectionBehavior::Hinted => self.hinted_count,
            ElectionBehavior::Optimistic => self.optimistic_count,
        }
    }

    fn count_by_behavior_mut(&mut self, behavior: ElectionBehavior) -> &mut usize {
        match behavior {
            ElectionBehavior::Priority => &mut self.priority_count,
            ElectionBehavior::Manual => &mut self.manual_count,
            ElectionBehavior::Hinted => &mut self.hinted_count,
            ElectionBehavior::Optimistic => &mut self.optimistic_count,
        }
    }
}

/// Elections by qualified root, iterable in insertion order
#[derive(Default)]
pub struct OrderedRoots {
    by_root: HashMap<QualifiedRoot, Arc<Election>>,
    sequenced: Vec<QualifiedRoot>,
}

impl OrderedRoots {
    pub fn insert(&mut self, root: QualifiedRoot, election: Arc<Election>) {
        if self.by_root.insert(root, election).is_none() {
            self.sequenced.push(root);
        }
    }

    pub fn get(&self, root: &QualifiedRoot) -> Option<&Arc<Election>> {
        self.by_root.get(root)
    }

    pub fn erase(&mut self, root: &QualifiedRoot) {
        if self.by_root.remove(root).is_some() {
            self.sequenced.retain(|x| x != root)
        }
    }

    pub fn clear(&mut self) {
        self.sequenced.clear();
        self.by_root.clear();
    }

    pub fn len(&self) -> usize {
        self.sequenced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequenced.is_empty()
    }

    pub fn iter_sequenced(&self) -> impl Iterator<Item = (&QualifiedRoot, &Arc<Election>)> {
        self.sequenced
            .iter()
            .filter_map(|r| self.by_root.get(r).map(|e| (r, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block_processing::BlockProcessorConfig,
        cementation::ConfirmingSetConfig,
        consensus::VoteCacheConfig,
        transport::NullMessagePublisher,
        utils::ThreadPoolImpl,
    };
    use lattice_core::{BlockBuilder, Networks};
    use lattice_ledger::{DEV_GENESIS_BLOCK, DEV_GENESIS_KEY};
    use mock_instant::thread_local::MockClock;

    struct Fixture {
        active: Arc<ActiveElections>,
        stats: Arc<Stats>,
        vote_cache: Arc<Mutex<VoteCache>>,
    }

    fn create_active(config: ActiveElectionsConfig) -> Fixture {
        let network = NetworkParams::new(Networks::Dev);
        let node_config = NodeConfig {
            active_elections: config,
            ..NodeConfig::new(&network)
        };
        let ledger = Arc::new(Ledger::new_null());
        let stats = Arc::new(Stats::default());
        let publisher: Arc<dyn MessagePublisher> = Arc::new(NullMessagePublisher::new());
        let history = Arc::new(LocalVoteHistory::new(256));
        let vote_cache = Arc::new(Mutex::new(VoteCache::new(
            VoteCacheConfig::default(),
            stats.clone(),
        )));
        let vote_generators = Arc::new(VoteGenerators::new(
            ledger.clone(),
            history.clone(),
            stats.clone(),
            publisher.clone(),
            &node_config,
            &network,
        ));
        let active = Arc::new(ActiveElections::new(
            network.clone(),
            node_config.clone(),
            NodeFlags::default(),
            ledger.clone(),
            Arc::new(Mutex::new(OnlineReps::new(ledger.rep_weights.clone()))),
            Arc::new(ConfirmingSet::new(
                ConfirmingSetConfig::default(),
                ledger.clone(),
                stats.clone(),
            )),
            Arc::new(ThreadPoolImpl::new(1, "Worker")),
            history,
            Arc::new(BlockProcessor::new(
                BlockProcessorConfig::new(&network.network),
                ledger.clone(),
                stats.clone(),
            )),
            vote_generators,
            publisher,
            vote_cache.clone(),
            stats.clone(),
            Arc::new(Mutex::new(RepresentativeRegister::new(
                ledger.rep_weights.clone(),
            ))),
        ));
        Fixture {
            active,
            stats,
            vote_cache,
        }
    }

    fn test_block(balance: u128) -> Arc<Block> {
        Arc::new(
            BlockBuilder::new()
                .account(PublicKey::from(balance as u64 + 1000))
                .previous(BlockHash::from(balance as u64 + 1000))
                .representative(PublicKey::from(1))
                .balance(Amount::raw(balance))
                .link(PublicKey::from(2))
                .build(),
        )
    }

    /// A fork of `block` with a different balance
    fn fork_of(block: &Block, balance: u128) -> Arc<Block> {
        Arc::new(
            BlockBuilder::from_block(block)
                .balance(Amount::raw(balance))
                .build(),
        )
    }

    fn small_config(size: usize) -> ActiveElectionsConfig {
        ActiveElectionsConfig {
            size,
            hinted_limit_percentage: 50,
            optimistic_limit_percentage: 50,
            ..Default::default()
        }
    }

    #[test]
    fn insert_election() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);

        let insertion = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap();

        assert!(insertion.inserted);
        assert_eq!(insertion.election.winner(), block);
        assert_eq!(fixture.active.len(), 1);
        assert!(fixture.active.active(&block.hash()));
        assert!(fixture.active.active_root(&block.qualified_root()));
        assert_eq!(
            fixture.stats.count(
                StatType::ActiveElectionsStarted,
                DetailType::Priority,
                crate::stats::Direction::In
            ),
            1
        );
    }

    #[test]
    fn single_election_per_root() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let fork = fork_of(&block, 2);

        let first = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap();
        let second = fixture
            .active
            .insert(&fork, ElectionBehavior::Priority)
            .unwrap();

        assert!(!second.inserted);
        assert!(Arc::ptr_eq(&first.election, &second.election));
        assert_eq!(fixture.active.len(), 1);
    }

    #[test]
    fn insert_after_stop_fails() {
        let fixture = create_active(ActiveElectionsConfig::default());
        fixture.active.stop();
        assert_eq!(
            fixture
                .active
                .insert(&test_block(1), ElectionBehavior::Priority)
                .unwrap_err(),
            InsertError::Stopped
        );
    }

    #[test]
    fn reject_recently_confirmed_root() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        fixture
            .active
            .recently_confirmed
            .put(block.qualified_root(), block.hash());

        assert_eq!(
            fixture
                .active
                .insert(&block, ElectionBehavior::Priority)
                .unwrap_err(),
            InsertError::RecentlyConfirmed
        );
    }

    #[test]
    fn limits_by_behavior() {
        let fixture = create_active(ActiveElectionsConfig {
            size: 100,
            hinted_limit_percentage: 20,
            optimistic_limit_percentage: 10,
            ..Default::default()
        });
        assert_eq!(fixture.active.limit(ElectionBehavior::Priority), 100);
        assert_eq!(fixture.active.limit(ElectionBehavior::Hinted), 20);
        assert_eq!(fixture.active.limit(ElectionBehavior::Optimistic), 10);
        assert_eq!(fixture.active.vacancy(ElectionBehavior::Manual), i64::MAX);
    }

    #[test]
    fn capacity_exceeded() {
        let fixture = create_active(small_config(1));
        fixture
            .active
            .insert(&test_block(1), ElectionBehavior::Priority)
            .unwrap();

        let result = fixture
            .active
            .insert(&test_block(2), ElectionBehavior::Priority);

        assert_eq!(result.unwrap_err(), InsertError::CapacityExceeded);
        assert_eq!(fixture.active.vacancy(ElectionBehavior::Priority), 0);
    }

    #[test]
    fn hinted_limit_is_independent() {
        let fixture = create_active(small_config(2));
        fixture
            .active
            .insert(&test_block(1), ElectionBehavior::Hinted)
            .unwrap();
        assert_eq!(
            fixture
                .active
                .insert(&test_block(2), ElectionBehavior::Hinted)
                .unwrap_err(),
            InsertError::CapacityExceeded
        );
        assert!(fixture
            .active
            .insert(&test_block(3), ElectionBehavior::Priority)
            .is_ok());
    }

    #[test]
    fn priority_evicts_lower_class() {
        let fixture = create_active(small_config(2));
        let optimistic = test_block(1);
        let hinted = test_block(2);
        fixture
            .active
            .insert(&optimistic, ElectionBehavior::Optimistic)
            .unwrap();
        fixture
            .active
            .insert(&hinted, ElectionBehavior::Hinted)
            .unwrap();

        let result = fixture
            .active
            .insert(&test_block(3), ElectionBehavior::Priority)
            .unwrap();

        assert!(result.inserted);
        assert_eq!(fixture.active.len(), 2);
        assert!(!fixture.active.active(&optimistic.hash()));
        assert!(fixture.active.active(&hinted.hash()));
        assert_eq!(
            fixture.stats.count(
                StatType::ActiveElectionsDropped,
                DetailType::Optimistic,
                crate::stats::Direction::In
            ),
            1
        );
    }

    #[test]
    fn manual_election_never_fails_on_capacity() {
        let fixture = create_active(small_config(1));
        fixture
            .active
            .insert(&test_block(1), ElectionBehavior::Priority)
            .unwrap();
        assert!(fixture
            .active
            .insert(&test_block(2), ElectionBehavior::Manual)
            .is_ok());
        assert_eq!(fixture.active.len(), 2);
    }

    #[test]
    fn erase_notifies_stopped_observers() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap();
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let stopped_l = stopped.clone();
        fixture
            .active
            .add_active_stopped_observer(Box::new(move |hash| {
                stopped_l.lock().unwrap().push(hash)
            }));

        assert!(fixture.active.erase(&block.qualified_root()));
        assert!(!fixture.active.erase(&block.qualified_root()));

        assert!(fixture.active.is_empty());
        assert_eq!(*stopped.lock().unwrap(), vec![block.hash()]);
    }

    #[test]
    fn vote_for_unknown_block_is_indeterminate() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let hash = BlockHash::from(42);
        let vote = Arc::new(Vote::new(PublicKey::from(1), 1, vec![hash]));

        let result = fixture.active.vote(&vote, VoteSource::Live);

        assert_eq!(result.get(&hash), Some(&VoteCode::Indeterminate));
    }

    #[test]
    fn vote_for_recently_confirmed_is_replay() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        fixture
            .active
            .recently_confirmed
            .put(block.qualified_root(), block.hash());
        let vote = Arc::new(Vote::new(PublicKey::from(1), 1, vec![block.hash()]));

        let result = fixture.active.vote(&vote, VoteSource::Live);

        assert_eq!(result.get(&block.hash()), Some(&VoteCode::Replay));
    }

    #[test]
    fn final_vote_with_quorum_confirms() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let election = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap()
            .election;
        let vote = Arc::new(Vote::new_final(*DEV_GENESIS_KEY, vec![block.hash()]));

        let result = fixture.active.vote(&vote, VoteSource::Live);

        assert_eq!(result.get(&block.hash()), Some(&VoteCode::Vote));
        assert!(election.is_confirmed());
        assert!(fixture
            .active
            .recently_confirmed
            .root_exists(&block.qualified_root()));
        assert_eq!(
            election.status().status_type,
            ElectionStatusType::ActiveConfirmedQuorum
        );
    }

    #[test]
    fn confirmed_winner_does_not_change() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let fork = fork_of(&block, 2);
        let election = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap()
            .election;
        assert!(fixture.active.publish_block(&fork));
        let vote = Arc::new(Vote::new_final(*DEV_GENESIS_KEY, vec![block.hash()]));
        fixture.active.vote(&vote, VoteSource::Live);
        assert!(election.is_confirmed());

        let fork_vote = Arc::new(Vote::new_final(*DEV_GENESIS_KEY, vec![fork.hash()]));
        let result = fixture.active.vote(&fork_vote, VoteSource::Live);
        assert_ne!(result.get(&fork.hash()), Some(&VoteCode::Vote));

        let other_rep = Arc::new(Vote::new_final(PublicKey::from(5), vec![fork.hash()]));
        fixture.active.vote(&other_rep, VoteSource::Live);

        assert!(election.is_confirmed());
        assert_eq!(election.winner(), block);
        assert_eq!(election.status().winner.hash(), block.hash());
    }

    #[test]
    fn non_final_quorum_does_not_confirm() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let election = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap()
            .election;
        let vote = Arc::new(Vote::new(*DEV_GENESIS_KEY, 1, vec![block.hash()]));

        fixture.active.vote(&vote, VoteSource::Live);

        assert!(!election.is_confirmed());
        assert!(election.is_quorum.load(Ordering::SeqCst));
    }

    #[test]
    fn older_vote_is_replay() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap();
        let rep = PublicKey::from(5);
        let newer = Arc::new(Vote::new(rep, 10, vec![block.hash()]));
        let older = Arc::new(Vote::new(rep, 5, vec![block.hash()]));

        fixture.active.vote(&newer, VoteSource::Live);
        let result = fixture.active.vote(&older, VoteSource::Live);

        assert_eq!(result.get(&block.hash()), Some(&VoteCode::Replay));
    }

    #[test]
    fn final_vote_locks_representative() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let fork = fork_of(&block, 2);
        let (low, high) = if block.hash() < fork.hash() {
            (block.clone(), fork.clone())
        } else {
            (fork.clone(), block.clone())
        };
        fixture
            .active
            .insert(&low, ElectionBehavior::Priority)
            .unwrap();
        assert!(fixture.active.publish_block(&high));

        let rep = PublicKey::from(5);
        let first = Arc::new(Vote::new_final(rep, vec![low.hash()]));
        let second = Arc::new(Vote::new_final(rep, vec![high.hash()]));
        assert_eq!(
            fixture.active.vote(&first, VoteSource::Live).get(&low.hash()),
            Some(&VoteCode::Vote)
        );
        assert_eq!(
            fixture
                .active
                .vote(&second, VoteSource::Live)
                .get(&high.hash()),
            Some(&VoteCode::Replay)
        );
    }

    #[test]
    fn live_vote_cooldown() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let fork = fork_of(&block, 2);
        fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap();
        fixture.active.publish_block(&fork);
        let rep = PublicKey::from(5);

        fixture
            .active
            .vote(&Arc::new(Vote::new(rep, 1, vec![block.hash()])), VoteSource::Live);
        let result = fixture
            .active
            .vote(&Arc::new(Vote::new(rep, 2, vec![fork.hash()])), VoteSource::Live);
        assert_eq!(result.get(&fork.hash()), Some(&VoteCode::Ignored));

        MockClock::advance(Duration::from_secs(16));
        let result = fixture
            .active
            .vote(&Arc::new(Vote::new(rep, 3, vec![fork.hash()])), VoteSource::Live);
        assert_eq!(result.get(&fork.hash()), Some(&VoteCode::Vote));
    }

    #[test]
    fn publish_fork() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let fork = fork_of(&block, 2);
        let election = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap()
            .election;

        assert!(fixture.active.publish_block(&fork));
        assert!(!fixture.active.publish_block(&fork));

        assert_eq!(election.candidates().len(), 2);
        assert!(fixture.active.active(&fork.hash()));
    }

    #[test]
    fn publish_without_election_is_ignored() {
        let fixture = create_active(ActiveElectionsConfig::default());
        assert!(!fixture.active.publish_block(&test_block(1)));
    }

    #[test]
    fn full_election_replaces_candidate_by_cached_weight() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let election = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap()
            .election;
        for i in 2..=ELECTION_MAX_BLOCKS as u128 {
            assert!(fixture.active.publish_block(&fork_of(&block, i)));
        }
        let extra = fork_of(&block, 100);
        assert!(!fixture.active.publish_block(&extra));

        let vote = Arc::new(Vote::new(*DEV_GENESIS_KEY, 1, vec![extra.hash()]));
        fixture.vote_cache.lock().unwrap().insert(
            &vote,
            Amount::MAX,
            &HashMap::new(),
        );

        assert!(fixture.active.publish_block(&extra));
        assert_eq!(election.candidates().len(), ELECTION_MAX_BLOCKS);
        assert!(election.contains(&extra.hash()));
    }

    #[test]
    fn candidate_with_final_vote_is_not_replaced() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let election = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap()
            .election;
        let forks: Vec<_> = (2..=ELECTION_MAX_BLOCKS as u128)
            .map(|i| fork_of(&block, i))
            .collect();
        for fork in &forks {
            assert!(fixture.active.publish_block(fork));
        }

        // The fork with the lowest hash is the first replacement candidate
        let locked = forks.iter().map(|f| f.hash()).min().unwrap();
        let rep = PublicKey::from(5);
        let final_vote = Arc::new(Vote::new_final(rep, vec![locked]));
        assert_eq!(
            fixture.active.vote(&final_vote, VoteSource::Live).get(&locked),
            Some(&VoteCode::Vote)
        );

        let extra = fork_of(&block, 100);
        let cached = Arc::new(Vote::new(*DEV_GENESIS_KEY, 1, vec![extra.hash()]));
        fixture
            .vote_cache
            .lock()
            .unwrap()
            .insert(&cached, Amount::MAX, &HashMap::new());
        assert!(fixture.active.publish_block(&extra));

        assert!(election.contains(&locked));
        assert!(election.contains(&extra.hash()));
        let second = Arc::new(Vote::new_final(rep, vec![extra.hash()]));
        assert_eq!(
            fixture
                .active
                .vote(&second, VoteSource::Live)
                .get(&extra.hash()),
            Some(&VoteCode::Replay)
        );
    }

    #[test]
    fn winner_changes_to_block_with_quorum() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let fork = fork_of(&block, 2);
        let election = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap()
            .election;
        fixture.active.publish_block(&fork);

        let vote = Arc::new(Vote::new(*DEV_GENESIS_KEY, 1, vec![fork.hash()]));
        fixture.active.vote(&vote, VoteSource::Live);

        assert_eq!(election.winner(), fork);
        assert_eq!(
            fixture.stats.count(
                StatType::Election,
                DetailType::WinnerChanged,
                crate::stats::Direction::In
            ),
            1
        );
    }

    #[test]
    fn passive_election_becomes_active() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let election = fixture
            .active
            .insert(&test_block(1), ElectionBehavior::Priority)
            .unwrap()
            .election;

        fixture.active.request_confirm();
        assert_eq!(election.state(), ElectionState::Passive);

        MockClock::advance(Duration::from_secs(1));
        fixture.active.request_confirm();
        assert_eq!(election.state(), ElectionState::Active);
    }

    #[test]
    fn expired_election_is_erased() {
        let fixture = create_active(ActiveElectionsConfig {
            priority_ttl: Duration::from_secs(10),
            ..Default::default()
        });
        let election = fixture
            .active
            .insert(&test_block(1), ElectionBehavior::Priority)
            .unwrap()
            .election;

        MockClock::advance(Duration::from_secs(11));
        fixture.active.request_confirm();

        assert!(fixture.active.is_empty());
        assert_eq!(election.state(), ElectionState::ExpiredUnconfirmed);
        assert_eq!(
            fixture.stats.count(
                StatType::ActiveElectionsTimeout,
                DetailType::Priority,
                crate::stats::Direction::In
            ),
            1
        );
    }

    #[test]
    fn confirmed_election_is_erased_by_request_loop() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let block = test_block(1);
        let election = fixture
            .active
            .insert(&block, ElectionBehavior::Priority)
            .unwrap()
            .election;
        fixture.active.force_confirm(&election);

        fixture.active.request_confirm();

        assert!(fixture.active.is_empty());
        assert_eq!(election.state(), ElectionState::ExpiredConfirmed);
        assert_eq!(fixture.active.winner_details_len(), 1);
    }

    #[test]
    fn block_cemented_without_election() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let ended = Arc::new(Mutex::new(Vec::new()));
        let ended_l = ended.clone();
        fixture
            .active
            .add_election_ended_observer(Box::new(move |status| {
                ended_l.lock().unwrap().push(status.status_type)
            }));
        let genesis = {
            let txn = fixture.active.ledger.read_txn();
            fixture
                .active
                .ledger
                .get_block(&txn, &DEV_GENESIS_BLOCK.hash())
                .unwrap()
        };

        fixture.active.block_cemented(&genesis);

        assert_eq!(
            *ended.lock().unwrap(),
            vec![ElectionStatusType::InactiveConfirmationHeight]
        );
        assert_eq!(fixture.active.recently_cemented.len(), 1);
    }

    #[test]
    fn block_cemented_confirms_election() {
        let fixture = create_active(ActiveElectionsConfig::default());
        let genesis = {
            let txn = fixture.active.ledger.read_txn();
            fixture
                .active
                .ledger
                .get_block(&txn, &DEV_GENESIS_BLOCK.hash())
                .unwrap()
        };
        let election = fixture
            .active
            .insert(&Arc::new(genesis.block().clone()), ElectionBehavior::Priority)
            .unwrap()
            .election;

        fixture.active.block_cemented(&genesis);

        assert!(election.is_confirmed());
        let cemented = fixture.active.recently_cemented.list();
        assert_eq!(
            cemented[0].status_type,
            ElectionStatusType::ActiveConfirmationHeight
        );
    }
}
