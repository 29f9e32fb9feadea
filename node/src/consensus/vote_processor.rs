use super::{ActiveElections, ActiveElectionsExt, VoteCache};
use crate::{
    representatives::{OnlineReps, RepresentativeRegister},
    stats::{DetailType, StatType, Stats},
    transport::ChannelId,
};
use lattice_core::{utils::ContainerInfo, Vote, VoteCode, VoteSource};
use lattice_ledger::Ledger;
use std::{
    collections::VecDeque,
    mem::size_of,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
    thread::JoinHandle,
    time::Instant,
};
use tracing::{debug, trace};

#[derive(Clone, Debug, PartialEq)]
pub struct VoteProcessorConfig {
    /// Maximum number of votes waiting for processing
    pub max_queue: usize,
    /// Maximum number of hashes waiting for a vote cache replay
    pub max_triggered: usize,
    pub batch_size: usize,
}

impl Default for VoteProcessorConfig {
    fn default() -> Self {
        Self {
            max_queue: 1024 * 4,
            max_triggered: 1024 * 16,
            batch_size: 1024,
        }
    }
}

/// Checks vote signatures
pub trait VoteVerifier: Send + Sync {
    fn verify(&self, vote: &Vote) -> bool;
}

/// Signatures are checked before the vote reaches the node
pub struct AcceptAllVotes;

impl VoteVerifier for AcceptAllVotes {
    fn verify(&self, _vote: &Vote) -> bool {
        true
    }
}

impl<F> VoteVerifier for F
where
    F: Fn(&Vote) -> bool + Send + Sync,
{
    fn verify(&self, vote: &Vote) -> bool {
        self(vote)
    }
}

pub type VoteProcessorCallback = Box<dyn Fn(&Arc<Vote>, ChannelId, VoteCode) + Send + Sync>;

struct QueueEntry {
    vote: Arc<Vote>,
    channel_id: ChannelId,
    source: VoteSource,
}

struct VoteProcessorData {
    stopped: bool,
    queue: VecDeque<QueueEntry>,
}

/// Verifies incoming votes and applies them to the active elections
pub struct VoteProcessor {
    config: VoteProcessorConfig,
    data: Mutex<VoteProcessorData>,
    condition: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
    verifier: Box<dyn VoteVerifier>,
    active: Arc<ActiveElections>,
    vote_cache: Arc<Mutex<VoteCache>>,
    online_reps: Arc<Mutex<OnlineReps>>,
    representative_register: Arc<Mutex<RepresentativeRegister>>,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    vote_processed: Mutex<Vec<VoteProcessorCallback>>,
    pub total_processed: AtomicU64,
}

impl VoteProcessor {
    pub fn new(
        config: VoteProcessorConfig,
        verifier: Box<dyn VoteVerifier>,
        active: Arc<ActiveElections>,
        vote_cache: Arc<Mutex<VoteCache>>,
        online_reps: Arc<Mutex<OnlineReps>>,
        representative_register: Arc<Mutex<RepresentativeRegister>>,
        ledger: Arc<Ledger>,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            config,
            data: Mutex::new(VoteProcessorData {
                stopped: false,
                queue: VecDeque::new(),
            }),
            condition: Condvar::new(),
            thread: Mutex::new(None),
            verifier,
            active,
            vote_cache,
            online_reps,
            representative_register,
            ledger,
            stats,
            vote_processed: Mutex::new(Vec::new()),
            total_processed: AtomicU64::new(0),
        }
    }

    pub fn add_vote_processed_callback(&self, callback: VoteProcessorCallback) {
        self.vote_processed.lock().unwrap().push(callback);
    }

    /// Queues the vote. Returns false if the queue is full.
    pub fn vote(&self, vote: &Arc<Vote>, channel_id: ChannelId, source: VoteSource) -> bool {
        let added = {
            let mut guard = self.data.lock().unwrap();
            if guard.queue.len() < self.config.max_queue {
                guard.queue.push_back(QueueEntry {
                    vote: Arc::clone(vote),
                    channel_id,
                    source,
                });
                true
            } else {
                false
            }
        };

        if added {
            self.stats.inc(StatType::VoteProcessor, DetailType::Process);
            self.condition.notify_all();
        } else {
            self.stats
                .inc(StatType::VoteProcessor, DetailType::Overfill);
            self.stats
                .inc(StatType::VoteProcessorOverfill, source.into());
        }
        added
    }

    pub fn vote_blocking(
        &self,
        vote: &Arc<Vote>,
        channel_id: ChannelId,
        source: VoteSource,
    ) -> VoteCode {
        let result = if self.verifier.verify(vote) {
            self.process_valid(vote, channel_id, source)
        } else {
            VoteCode::Invalid
        };

        self.stats.inc(
            StatType::VoteProcessor,
            match result {
                VoteCode::Vote => DetailType::VoteValid,
                VoteCode::Replay => DetailType::VoteReplay,
                VoteCode::Indeterminate => DetailType::VoteIndeterminate,
                VoteCode::Ignored => DetailType::VoteIgnored,
                VoteCode::Invalid => DetailType::VoteInvalid,
            },
        );
        trace!(?vote, ?result, "vote processed");

        for callback in self.vote_processed.lock().unwrap().iter() {
            callback(vote, channel_id, result);
        }
        result
    }

    fn process_valid(&self, vote: &Arc<Vote>, channel_id: ChannelId, source: VoteSource) -> VoteCode {
        let rep = vote.voting_account;
        if source == VoteSource::Live {
            self.online_reps.lock().unwrap().observe(rep);
            self.representative_register
                .lock()
                .unwrap()
                .update_or_insert(rep, channel_id);
        }

        let vote_results = self.active.vote(vote, source);

        let rep_weight = self.ledger.weight(&rep);
        self.vote_cache
            .lock()
            .unwrap()
            .insert(vote, rep_weight, &vote_results);

        // Aggregate results for individual hashes
        let mut replay = false;
        let mut processed = false;
        let mut ignored = false;
        for hash_result in vote_results.values() {
            replay |= *hash_result == VoteCode::Replay;
            processed |= *hash_result == VoteCode::Vote;
            ignored |= *hash_result == VoteCode::Ignored;
        }

        if processed {
            VoteCode::Vote
        } else if replay {
            VoteCode::Replay
        } else if ignored {
            VoteCode::Ignored
        } else {
            VoteCode::Indeterminate
        }
    }

    fn run(&self) {
        loop {
            self.stats.inc(StatType::VoteProcessor, DetailType::Loop);
            let batch = self.wait_for_votes();
            if batch.is_empty() {
                break; // stopped
            }

            let start = Instant::now();
            for entry in &batch {
                self.vote_blocking(&entry.vote, entry.channel_id, entry.source);
            }
            self.total_processed
                .fetch_add(batch.len() as u64, Ordering::SeqCst);

            let elapsed_millis = start.elapsed().as_millis();
            if batch.len() == self.config.batch_size && elapsed_millis > 100 {
                debug!(
                    "Processed {} votes in {} milliseconds (rate of {} votes per second)",
                    batch.len(),
                    elapsed_millis,
                    (batch.len() * 1000) / elapsed_millis as usize
                );
            }
        }
    }

    fn wait_for_votes(&self) -> Vec<QueueEntry> {
        let mut guard = self
            .condition
            .wait_while(self.data.lock().unwrap(), |data| {
                !data.stopped && data.queue.is_empty()
            })
            .unwrap();
        if guard.stopped {
            return Vec::new();
        }
        let count = guard.queue.len().min(self.config.batch_size);
        guard.queue.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stop(&self) {
        self.data.lock().unwrap().stopped = true;
        self.condition.notify_all();
        let thread = self.thread.lock().unwrap().take();
        if let Some(handle) = thread {
            handle.join().unwrap()
        }
    }

    pub fn container_info(&self) -> ContainerInfo {
        [(
            "votes",
            self.len(),
            size_of::<(Arc<Vote>, ChannelId, VoteSource)>(),
        )]
        .into()
    }
}

impl Drop for VoteProcessor {
    fn drop(&mut self) {
        // Thread must be stopped before destruction
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub trait VoteProcessorExt {
    fn start(&self);
}

impl VoteProcessorExt for Arc<VoteProcessor> {
    fn start(&self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Vote processing".to_string())
                .spawn(move || self_l.run())
                .unwrap(),
        )
    }
}
