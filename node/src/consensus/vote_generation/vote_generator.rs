use super::{LocalVoteHistory, VoteSpacing};
use crate::{
    stats::{DetailType, StatType, Stats},
    transport::{ChannelId, Message, MessagePublisher},
};
use lattice_core::{utils::ContainerInfo, Block, BlockHash, PublicKey, Root, Vote};
use lattice_ledger::{Ledger, Table, Transaction, WriteTransaction, Writer};
use std::{
    collections::VecDeque,
    mem::size_of,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread::JoinHandle,
    time::Duration,
};
use tracing::{trace, warn};

pub type VoteBroadcastAction = Box<dyn Fn(&Arc<Vote>) + Send + Sync>;

/// Generates votes for the local representatives. One instance creates
/// normal votes, a second one creates final votes.
pub struct VoteGenerator {
    ledger: Arc<Ledger>,
    history: Arc<LocalVoteHistory>,
    stats: Arc<Stats>,
    publisher: Arc<dyn MessagePublisher>,
    is_final: bool,
    representatives: Vec<PublicKey>,
    state: Mutex<GeneratorState>,
    condition: Condvar,
    spacing: Mutex<VoteSpacing>,
    broadcast_action: VoteBroadcastAction,
    vote_generator_delay: Duration,
    vote_generator_threshold: usize,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl VoteGenerator {
    const MAX_REQUESTS: usize = 2048;
    const MAX_QUEUE: usize = 1024 * 32;
    const MAX_BATCH: usize = 256;

    pub fn new(
        ledger: Arc<Ledger>,
        history: Arc<LocalVoteHistory>,
        stats: Arc<Stats>,
        publisher: Arc<dyn MessagePublisher>,
        is_final: bool,
        representatives: Vec<PublicKey>,
        voting_delay: Duration,
        vote_generator_delay: Duration,
        vote_generator_threshold: usize,
        broadcast_action: VoteBroadcastAction,
    ) -> Self {
        Self {
            ledger,
            history,
            stats,
            publisher,
            is_final,
            representatives,
            state: Mutex::new(GeneratorState::default()),
            condition: Condvar::new(),
            spacing: Mutex::new(VoteSpacing::new(voting_delay)),
            broadcast_action,
            vote_generator_delay,
            vote_generator_threshold,
            thread: Mutex::new(None),
        }
    }

    pub fn stop(&self) {
        self.state.lock().unwrap().stopped = true;
        self.condition.notify_all();
        let thread = self.thread.lock().unwrap().take();
        if let Some(thread) = thread {
            thread.join().unwrap();
        }
    }

    /// Queue a candidate for vote generation
    pub fn add(&self, root: &Root, hash: &BlockHash) {
        {
            let mut state = self.state.lock().unwrap();
            if state.queue.len() >= Self::MAX_QUEUE {
                self.stats.inc(StatType::VoteGenerator, DetailType::Overfill);
                return;
            }
            state.queue.push_back((*root, *hash));
        }
        self.condition.notify_all();
    }

    /// Queue blocks for a direct reply to `channel_id`. Returns the number of
    /// blocks whose dependents are confirmed.
    pub fn generate(&self, blocks: &[Arc<Block>], channel_id: ChannelId) -> usize {
        let candidates = {
            let txn = self.ledger.read_txn();
            blocks
                .iter()
                .filter(|b| self.ledger.dependents_confirmed(&txn, b))
                .map(|b| (b.root(), b.hash()))
                .collect::<Vec<_>>()
        };

        let result = candidates.len();
        {
            let mut state = self.state.lock().unwrap();
            state.requests.push_back((candidates, channel_id));
            while state.requests.len() > Self::MAX_REQUESTS {
                // On a large queue of requests, erase the oldest one
                state.requests.pop_front();
                self.stats.inc(
                    StatType::VoteGenerator,
                    DetailType::GeneratorRepliesDiscarded,
                );
            }
        }
        self.condition.notify_all();
        result
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.queue.len() + state.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn container_info(&self) -> ContainerInfo {
        let state = self.state.lock().unwrap();
        [
            (
                "queue",
                state.queue.len(),
                size_of::<Root>() + size_of::<BlockHash>(),
            ),
            (
                "candidates",
                state.candidates.len(),
                size_of::<Root>() + size_of::<BlockHash>(),
            ),
            (
                "requests",
                state.requests.len(),
                size_of::<ChannelId>() + size_of::<Vec<(Root, BlockHash)>>(),
            ),
        ]
        .into()
    }

    fn run(&self) {
        let mut state = self.state.lock().unwrap();
        while !state.stopped {
            if !state.queue.is_empty() {
                let count = state.queue.len().min(Self::MAX_BATCH);
                let batch: Vec<_> = state.queue.drain(..count).collect();
                drop(state);
                self.process_batch(batch);
                state = self.state.lock().unwrap();
            } else if state.candidates.len() >= Vote::MAX_HASHES {
                state = self.broadcast(state);
            } else if let Some(request) = state.requests.pop_front() {
                drop(state);
                self.reply(request);
                state = self.state.lock().unwrap();
            } else {
                state = self.wait_for_candidates(state);
                if state.stopped || !state.queue.is_empty() {
                    continue;
                }

                if state.candidates.len() >= self.vote_generator_threshold
                    && state.candidates.len() < Vote::MAX_HASHES
                {
                    state = self.wait_for_candidates(state);
                }

                if !state.candidates.is_empty() {
                    state = self.broadcast(state);
                }
            }
        }
    }

    fn wait_for_candidates<'a>(
        &'a self,
        state: MutexGuard<'a, GeneratorState>,
    ) -> MutexGuard<'a, GeneratorState> {
        self.condition
            .wait_timeout_while(state, self.vote_generator_delay, |s| {
                !s.stopped
                    && s.queue.is_empty()
                    && s.requests.is_empty()
                    && s.candidates.len() < Vote::MAX_HASHES
            })
            .unwrap()
            .0
    }

    fn broadcast<'a>(
        &'a self,
        mut state: MutexGuard<'a, GeneratorState>,
    ) -> MutexGuard<'a, GeneratorState> {
        let mut hashes = Vec::with_capacity(Vote::MAX_HASHES);
        let mut roots = Vec::with_capacity(Vote::MAX_HASHES);
        {
            let spacing = self.spacing.lock().unwrap();
            while let Some((root, hash)) = state.candidates.pop_front() {
                if !roots.contains(&root) {
                    if spacing.votable(&root, &hash) {
                        roots.push(root);
                        hashes.push(hash);
                    } else {
                        self.stats
                            .inc(StatType::VoteGenerator, DetailType::GeneratorSpacing);
                    }
                }
                if hashes.len() == Vote::MAX_HASHES {
                    break;
                }
            }
        }

        if !hashes.is_empty() {
            drop(state);
            self.vote(&hashes, &roots, |vote| {
                (self.broadcast_action)(vote);
                self.stats
                    .inc(StatType::VoteGenerator, DetailType::GeneratorBroadcasts);
            });
            state = self.state.lock().unwrap();
        }

        state
    }

    fn vote<F>(&self, hashes: &[BlockHash], roots: &[Root], action: F)
    where
        F: Fn(&Arc<Vote>),
    {
        debug_assert_eq!(hashes.len(), roots.len());
        for rep in &self.representatives {
            let vote = Arc::new(if self.is_final {
                Vote::new_final(*rep, hashes.to_vec())
            } else {
                Vote::new_now(*rep, hashes.to_vec())
            });
            {
                let mut spacing = self.spacing.lock().unwrap();
                for (root, hash) in roots.iter().zip(hashes) {
                    self.history.add(root, hash, &vote);
                    spacing.flag(root, hash);
                }
            }
            self.stats
                .inc(StatType::VoteGenerator, DetailType::GeneratorVotes);
            trace!(
                representative = %rep,
                hashes = hashes.len(),
                is_final = self.is_final,
                "vote generated"
            );
            action(&vote);
        }
    }

    fn reply(&self, request: (Vec<(Root, BlockHash)>, ChannelId)) {
        let (candidates, channel_id) = request;
        for chunk in candidates.chunks(Vote::MAX_HASHES) {
            let mut hashes = Vec::with_capacity(chunk.len());
            let mut roots = Vec::with_capacity(chunk.len());
            {
                let spacing = self.spacing.lock().unwrap();
                for (root, hash) in chunk {
                    if roots.contains(root) {
                        continue;
                    }
                    if spacing.votable(root, hash) {
                        roots.push(*root);
                        hashes.push(*hash);
                    } else {
                        self.stats
                            .inc(StatType::VoteGenerator, DetailType::GeneratorSpacing);
                    }
                }
            }
            if !hashes.is_empty() {
                self.vote(&hashes, &roots, |vote| {
                    self.publisher
                        .send(channel_id, &Message::ConfirmAck(vote.clone()));
                });
            }
        }
        self.stats
            .inc(StatType::VoteGenerator, DetailType::GeneratorReplies);
    }

    fn process_batch(&self, batch: Vec<(Root, BlockHash)>) {
        let verified = if self.is_final {
            self.verify_final(batch)
        } else {
            let txn = self.ledger.read_txn();
            batch
                .into_iter()
                .filter(|(root, hash)| self.should_vote(&txn, root, hash))
                .collect()
        };

        if !verified.is_empty() {
            let should_notify = {
                let mut state = self.state.lock().unwrap();
                state.candidates.extend(verified);
                state.candidates.len() >= Vote::MAX_HASHES
            };

            if should_notify {
                self.condition.notify_all();
            }
        }
    }

    /// Persists the final vote decisions. A root that already has a final
    /// vote for a different hash is never voted for again.
    fn verify_final(&self, batch: Vec<(Root, BlockHash)>) -> Vec<(Root, BlockHash)> {
        let _guard = self.ledger.write_queue.wait(Writer::VotingFinal);
        let mut txn = self.ledger.rw_txn_for(&[Table::FinalVotes]);
        let verified: Vec<_> = batch
            .into_iter()
            .filter(|(root, hash)| self.should_vote_final(&mut txn, root, hash))
            .collect();

        if let Err(e) = txn.commit() {
            warn!("Could not store final votes: {:?}", e);
            return Vec::new();
        }
        verified
    }

    fn should_vote(&self, txn: &dyn Transaction, root: &Root, hash: &BlockHash) -> bool {
        let Some(block) = self.ledger.get_block(txn, hash) else {
            return false;
        };
        debug_assert!(block.root() == *root);
        let result = self.ledger.dependents_confirmed(txn, &block);
        self.count_should_vote(result);
        result
    }

    fn should_vote_final(
        &self,
        txn: &mut WriteTransaction,
        root: &Root,
        hash: &BlockHash,
    ) -> bool {
        let Some(block) = self.ledger.get_block(&*txn, hash) else {
            return false;
        };
        debug_assert!(block.root() == *root);
        if !self.ledger.dependents_confirmed(&*txn, &block) {
            self.stats.inc(
                StatType::VoteGenerator,
                DetailType::DependentsUnconfirmed,
            );
            return false;
        }
        let result = self
            .ledger
            .final_vote_put(txn, &block.qualified_root(), hash);
        if !result {
            self.stats
                .inc(StatType::VoteGenerator, DetailType::FinalVoteConflict);
        }
        self.count_should_vote(result);
        result
    }

    fn count_should_vote(&self, should_vote: bool) {
        self.stats.inc(
            StatType::VoteGenerator,
            if should_vote {
                DetailType::ShouldVote
            } else {
                DetailType::ShouldNotVote
            },
        );
    }
}

impl Drop for VoteGenerator {
    fn drop(&mut self) {
        debug_assert!(self.thread.lock().unwrap().is_none())
    }
}

pub trait VoteGeneratorExt {
    fn start(&self);
}

impl VoteGeneratorExt for Arc<VoteGenerator> {
    fn start(&self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Voting".to_owned())
                .spawn(move || self_l.run())
                .unwrap(),
        );
    }
}

#[derive(Default)]
struct GeneratorState {
    stopped: bool,
    /// Candidates that still need to be verified against the ledger
    queue: VecDeque<(Root, BlockHash)>,
    candidates: VecDeque<(Root, BlockHash)>,
    requests: VecDeque<(Vec<(Root, BlockHash)>, ChannelId)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::NullMessagePublisher;
    use lattice_ledger::{LedgerContext, DEV_GENESIS_BLOCK, DEV_GENESIS_HASH, DEV_GENESIS_KEY};
    use std::sync::mpsc;

    struct Fixture {
        generator: Arc<VoteGenerator>,
        history: Arc<LocalVoteHistory>,
        votes: mpsc::Receiver<Arc<Vote>>,
        ledger: Arc<Ledger>,
    }

    fn create_generator(is_final: bool, ctx: &LedgerContext) -> Fixture {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let history = Arc::new(LocalVoteHistory::new(256));
        let generator = Arc::new(VoteGenerator::new(
            ctx.ledger.clone(),
            history.clone(),
            Arc::new(Stats::default()),
            Arc::new(NullMessagePublisher::new()),
            is_final,
            vec![*DEV_GENESIS_KEY],
            Duration::from_secs(1),
            Duration::from_millis(10),
            3,
            Box::new(move |vote| {
                let _ = tx.lock().unwrap().send(vote.clone());
            }),
        ));
        generator.start();
        Fixture {
            generator,
            history,
            votes: rx,
            ledger: ctx.ledger.clone(),
        }
    }

    #[test]
    fn generates_normal_vote_for_genesis() {
        let ctx = LedgerContext::empty();
        let fixture = create_generator(false, &ctx);
        let root = DEV_GENESIS_BLOCK.root();
        fixture.generator.add(&root, &DEV_GENESIS_HASH);

        let vote = fixture
            .votes
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(vote.voting_account, *DEV_GENESIS_KEY);
        assert_eq!(vote.hashes, vec![*DEV_GENESIS_HASH]);
        assert!(!vote.is_final());
        assert!(fixture.history.exists(&root));
        fixture.generator.stop();
    }

    #[test]
    fn final_vote_is_persisted() {
        let ctx = LedgerContext::empty();
        let fixture = create_generator(true, &ctx);
        let root = DEV_GENESIS_BLOCK.root();
        fixture.generator.add(&root, &DEV_GENESIS_HASH);

        let vote = fixture
            .votes
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert!(vote.is_final());
        let txn = fixture.ledger.read_txn();
        assert_eq!(
            fixture
                .ledger
                .final_vote(&txn, &DEV_GENESIS_BLOCK.qualified_root()),
            Some(*DEV_GENESIS_HASH)
        );
        fixture.generator.stop();
    }

    #[test]
    fn no_vote_for_unknown_block() {
        let ctx = LedgerContext::empty();
        let fixture = create_generator(false, &ctx);
        fixture
            .generator
            .add(&Root::from(1), &BlockHash::from(2));
        assert!(fixture
            .votes
            .recv_timeout(Duration::from_millis(200))
            .is_err());
        fixture.generator.stop();
    }
}
