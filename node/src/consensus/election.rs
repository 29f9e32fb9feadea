use lattice_core::{Amount, Block, BlockHash, PublicKey, QualifiedRoot, Root, Vote};
#[cfg(test)]
use mock_instant::thread_local::Instant;
use serde::Serialize;
#[cfg(not(test))]
use std::time::Instant;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::{Duration, SystemTime},
};

/// Maximum number of competing blocks in a single election
pub const ELECTION_MAX_BLOCKS: usize = 10;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionBehavior {
    Optimistic,
    Hinted,
    Priority,
    /// Elections started by an explicit request. Never evicted for capacity reasons.
    Manual,
}

impl ElectionBehavior {
    pub fn as_str(&self) -> &'static str {
        serde_variant::to_variant_name(self).unwrap_or_default()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionState {
    /// Only listening for incoming votes
    Passive,
    /// Actively request confirmations
    Active,
    Confirmed,
    /// Confirmed election that was erased from the active container
    ExpiredConfirmed,
    ExpiredUnconfirmed,
}

impl ElectionState {
    pub fn as_str(&self) -> &'static str {
        serde_variant::to_variant_name(self).unwrap_or_default()
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed | Self::ExpiredConfirmed)
    }

    fn valid_change(self, to: ElectionState) -> bool {
        match self {
            Self::Passive => matches!(
                to,
                Self::Active | Self::Confirmed | Self::ExpiredUnconfirmed
            ),
            Self::Active => matches!(to, Self::Confirmed | Self::ExpiredUnconfirmed),
            Self::Confirmed => matches!(to, Self::ExpiredConfirmed),
            Self::ExpiredConfirmed | Self::ExpiredUnconfirmed => false,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ElectionStatusType {
    #[default]
    Ongoing,
    ActiveConfirmedQuorum,
    ActiveConfirmationHeight,
    InactiveConfirmationHeight,
    Stopped,
}

impl ElectionStatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionStatusType::Ongoing => "ongoing",
            ElectionStatusType::ActiveConfirmedQuorum => "active_quorum",
            ElectionStatusType::ActiveConfirmationHeight => "active_confirmation_height",
            ElectionStatusType::InactiveConfirmationHeight => "inactive",
            ElectionStatusType::Stopped => "stopped",
        }
    }
}

/// Outcome of an election
#[derive(Clone, Debug)]
pub struct ElectionStatus {
    pub winner: Arc<Block>,
    pub tally: Amount,
    pub final_tally: Amount,
    pub confirmation_request_count: u32,
    pub block_count: u32,
    pub voter_count: u32,
    pub election_end: SystemTime,
    pub election_duration: Duration,
    pub status_type: ElectionStatusType,
}

impl ElectionStatus {
    pub fn new(winner: Arc<Block>) -> Self {
        Self {
            winner,
            tally: Amount::zero(),
            final_tally: Amount::zero(),
            confirmation_request_count: 0,
            block_count: 1,
            voter_count: 0,
            election_end: SystemTime::now(),
            election_duration: Duration::ZERO,
            status_type: ElectionStatusType::Ongoing,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VoteInfo {
    pub time: Instant,
    pub timestamp: u64,
    pub hash: BlockHash,
}

impl VoteInfo {
    pub fn new(timestamp: u64, hash: BlockHash) -> Self {
        Self {
            time: Instant::now(),
            timestamp,
            hash,
        }
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == Vote::FINAL_TIMESTAMP
    }
}

/// A block together with the weight that voted for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TallyEntry {
    pub block: Arc<Block>,
    pub hash: BlockHash,
    pub weight: Amount,
    pub final_weight: Amount,
}

pub struct ElectionData {
    pub state: ElectionState,
    pub state_start: Instant,
    pub winner: Arc<Block>,
    pub last_blocks: HashMap<BlockHash, Arc<Block>>,
    /// Arrival sequence of the candidates. Used as tie break when tallies are equal.
    arrival: HashMap<BlockHash, u64>,
    next_arrival: u64,
    pub last_votes: HashMap<PublicKey, VoteInfo>,
    pub last_tally: HashMap<BlockHash, Amount>,
    pub tally: Amount,
    pub final_tally: Amount,
    /// Time of the last locally generated vote broadcast
    pub last_vote: Option<Instant>,
    /// Hash of the winner that was broadcasted last
    pub last_block_hash: BlockHash,
    pub status_type: ElectionStatusType,
    pub election_end: Option<SystemTime>,
}

impl ElectionData {
    fn new(block: Arc<Block>) -> Self {
        let hash = block.hash();
        Self {
            state: ElectionState::Passive,
            state_start: Instant::now(),
            winner: block.clone(),
            last_blocks: HashMap::from([(hash, block)]),
            arrival: HashMap::from([(hash, 0)]),
            next_arrival: 1,
            last_votes: HashMap::new(),
            last_tally: HashMap::new(),
            tally: Amount::zero(),
            final_tally: Amount::zero(),
            last_vote: None,
            last_block_hash: BlockHash::zero(),
            status_type: ElectionStatusType::Ongoing,
            election_end: None,
        }
    }

    pub fn state_change(
        &mut self,
        expected: ElectionState,
        desired: ElectionState,
    ) -> Result<(), ()> {
        if self.state == expected && expected.valid_change(desired) {
            self.state = desired;
            self.state_start = Instant::now();
            Ok(())
        } else {
            Err(())
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.state.is_confirmed()
    }

    pub fn winner_hash(&self) -> BlockHash {
        self.winner.hash()
    }

    pub fn add_block(&mut self, block: Arc<Block>) {
        let hash = block.hash();
        if !self.arrival.contains_key(&hash) {
            self.arrival.insert(hash, self.next_arrival);
            self.next_arrival += 1;
        }
        if self.winner.hash() == hash {
            self.winner = block.clone();
        }
        self.last_blocks.insert(hash, block);
    }

    /// Removes a losing candidate together with the non final votes for it.
    /// Final votes stay, they lock their representative to the removed hash.
    pub fn remove_block(&mut self, hash: &BlockHash) -> Option<Arc<Block>> {
        if self.winner.hash() == *hash {
            return None;
        }
        let removed = self.last_blocks.remove(hash)?;
        self.arrival.remove(hash);
        self.last_tally.remove(hash);
        self.last_votes
            .retain(|_, v| v.hash != *hash || v.is_final());
        Some(removed)
    }

    pub fn has_final_votes(&self, hash: &BlockHash) -> bool {
        self.last_votes
            .values()
            .any(|v| v.hash == *hash && v.is_final())
    }

    pub fn last_vote_elapsed(&self) -> Duration {
        self.last_vote
            .map(|i| i.elapsed())
            .unwrap_or(Duration::MAX)
    }

    pub fn set_last_vote(&mut self) {
        self.last_vote = Some(Instant::now());
    }

    /// Sums the current weight of each representative's last vote. Candidates are
    /// ordered by tally, ties go to the candidate that arrived first.
    pub fn calculate_tally(&mut self, weight: impl Fn(&PublicKey) -> Amount) -> Vec<TallyEntry> {
        let mut weights: HashMap<BlockHash, (Amount, Amount)> = HashMap::new();
        for (rep, info) in &self.last_votes {
            let rep_weight = weight(rep);
            let entry = weights.entry(info.hash).or_default();
            entry.0 += rep_weight;
            if info.is_final() {
                entry.1 += rep_weight;
            }
        }

        let mut result: Vec<TallyEntry> = self
            .last_blocks
            .iter()
            .map(|(hash, block)| {
                let (weight, final_weight) = weights.get(hash).cloned().unwrap_or_default();
                TallyEntry {
                    block: block.clone(),
                    hash: *hash,
                    weight,
                    final_weight,
                }
            })
            .collect();

        result.sort_by(|a, b| {
            b.weight
                .cmp(&a.weight)
                .then_with(|| self.arrival_of(&a.hash).cmp(&self.arrival_of(&b.hash)))
        });

        self.last_tally = result.iter().map(|e| (e.hash, e.weight)).collect();
        result
    }

    fn arrival_of(&self, hash: &BlockHash) -> u64 {
        self.arrival.get(hash).cloned().unwrap_or(u64::MAX)
    }
}

pub struct Election {
    pub id: usize,
    pub mutex: Mutex<ElectionData>,
    pub root: Root,
    pub qualified_root: QualifiedRoot,
    pub behavior: ElectionBehavior,
    pub election_start: Instant,
    /// Quorum for a non final tally was reached and the final vote was triggered
    pub is_quorum: AtomicBool,
    pub confirmation_request_count: AtomicU32,
    last_block: Mutex<Option<Instant>>,
    last_req: Mutex<Option<Instant>>,
    ttl: Duration,
}

impl Election {
    /// Passive elections are transitioned to active after this many base latencies
    pub const PASSIVE_DURATION_FACTOR: u32 = 5;

    pub fn new(id: usize, block: Arc<Block>, behavior: ElectionBehavior, ttl: Duration) -> Self {
        let root = block.root();
        let qualified_root = block.qualified_root();
        Self {
            id,
            mutex: Mutex::new(ElectionData::new(block)),
            root,
            qualified_root,
            behavior,
            election_start: Instant::now(),
            is_quorum: AtomicBool::new(false),
            confirmation_request_count: AtomicU32::new(0),
            last_block: Mutex::new(None),
            last_req: Mutex::new(None),
            ttl,
        }
    }

    /// Moves a passive election to active immediately
    pub fn transition_active(&self) {
        let mut guard = self.mutex.lock().unwrap();
        let _ = guard.state_change(ElectionState::Passive, ElectionState::Active);
    }

    pub fn state(&self) -> ElectionState {
        self.mutex.lock().unwrap().state
    }

    pub fn is_confirmed(&self) -> bool {
        self.mutex.lock().unwrap().is_confirmed()
    }

    pub fn failed(&self) -> bool {
        self.mutex.lock().unwrap().state == ElectionState::ExpiredUnconfirmed
    }

    pub fn winner(&self) -> Arc<Block> {
        self.mutex.lock().unwrap().winner.clone()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.mutex.lock().unwrap().last_blocks.contains_key(hash)
    }

    pub fn candidates(&self) -> Vec<BlockHash> {
        self.mutex.lock().unwrap().last_blocks.keys().cloned().collect()
    }

    pub fn votes(&self) -> HashMap<PublicKey, VoteInfo> {
        self.mutex.lock().unwrap().last_votes.clone()
    }

    pub fn time_to_live(&self) -> Duration {
        self.ttl
    }

    pub fn duration(&self) -> Duration {
        self.election_start.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.election_start.elapsed() > self.ttl
    }

    pub fn last_block_elapsed(&self) -> Duration {
        self.last_block
            .lock()
            .unwrap()
            .map(|i| i.elapsed())
            .unwrap_or(Duration::MAX)
    }

    pub fn set_last_block(&self) {
        *self.last_block.lock().unwrap() = Some(Instant::now());
    }

    pub fn last_req_elapsed(&self) -> Duration {
        self.last_req
            .lock()
            .unwrap()
            .map(|i| i.elapsed())
            .unwrap_or(Duration::MAX)
    }

    pub fn set_last_req(&self) {
        *self.last_req.lock().unwrap() = Some(Instant::now());
    }

    /// Snapshot of the current election outcome
    pub fn status(&self) -> ElectionStatus {
        let guard = self.mutex.lock().unwrap();
        self.status_locked(&guard)
    }

    pub fn status_locked(&self, guard: &ElectionData) -> ElectionStatus {
        ElectionStatus {
            winner: guard.winner.clone(),
            tally: guard.tally,
            final_tally: guard.final_tally,
            confirmation_request_count: self.confirmation_request_count.load(Ordering::SeqCst),
            block_count: guard.last_blocks.len() as u32,
            voter_count: guard.last_votes.len() as u32,
            election_end: guard.election_end.unwrap_or_else(SystemTime::now),
            election_duration: self.election_start.elapsed(),
            status_type: guard.status_type,
        }
    }
}

impl Debug for Election {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Election")
            .field("id", &self.id)
            .field("qualified_root", &self.qualified_root)
            .field("behavior", &self.behavior)
            .finish()
    }
}
