use crate::stats::{DetailType, StatType, Stats};
use lattice_core::{utils::ContainerInfo, Amount, BlockHash, PublicKey, Vote, VoteCode};
#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;
use std::{
    collections::{BTreeSet, HashMap},
    mem::size_of,
    sync::Arc,
    time::Duration,
};

#[derive(Clone, Debug, PartialEq)]
pub struct VoteCacheConfig {
    pub max_size: usize,
    pub max_voters: usize,
    pub age_cutoff: Duration,
}

impl Default for VoteCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1024 * 64,
            max_voters: 64,
            age_cutoff: Duration::from_secs(15 * 60),
        }
    }
}

/// Holds votes for blocks that have no election yet. When an election for
/// such a block starts, the cached votes are replayed into it.
pub struct VoteCache {
    config: VoteCacheConfig,
    entries: HashMap<BlockHash, CacheEntry>,
    /// (tally, insertion id, hash); the first element is evicted first
    by_tally: BTreeSet<(Amount, u64, BlockHash)>,
    next_id: u64,
    last_cleanup: Instant,
    stats: Arc<Stats>,
}

impl VoteCache {
    pub fn new(config: VoteCacheConfig, stats: Arc<Stats>) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            by_tally: BTreeSet::new(),
            next_id: 0,
            last_cleanup: Instant::now(),
            stats,
        }
    }

    /// Caches the vote for every hash that has no election. With an empty
    /// result map all hashes of the vote are cached.
    pub fn insert(
        &mut self,
        vote: &Arc<Vote>,
        rep_weight: Amount,
        results: &HashMap<BlockHash, VoteCode>,
    ) {
        let hashes: Vec<BlockHash> = if results.is_empty() {
            vote.hashes.clone()
        } else {
            vote.hashes
                .iter()
                .filter(|h| results.get(h) == Some(&VoteCode::Indeterminate))
                .cloned()
                .collect()
        };

        for hash in hashes {
            self.insert_impl(vote, hash, rep_weight);
        }
    }

    fn insert_impl(&mut self, vote: &Arc<Vote>, hash: BlockHash, rep_weight: Amount) {
        let max_voters = self.config.max_voters;
        if let Some(entry) = self.entries.get_mut(&hash) {
            self.stats.inc(StatType::VoteCache, DetailType::Update);
            let old_key = entry.tally_key();
            if entry.vote(vote, rep_weight, max_voters) {
                self.by_tally.remove(&old_key);
                self.by_tally.insert(entry.tally_key());
            }
            return;
        }

        self.stats.inc(StatType::VoteCache, DetailType::Insert);
        let mut entry = CacheEntry::new(self.next_id, hash);
        self.next_id += 1;
        entry.vote(vote, rep_weight, max_voters);
        self.by_tally.insert(entry.tally_key());
        self.entries.insert(hash, entry);

        while self.entries.len() > self.config.max_size {
            let Some((_, _, lowest)) = self.by_tally.pop_first() else {
                break;
            };
            self.entries.remove(&lowest);
            self.stats.inc(StatType::VoteCache, DetailType::Overfill);
        }
    }

    pub fn find(&self, hash: &BlockHash) -> Vec<Arc<Vote>> {
        self.entries
            .get(hash)
            .map(|e| e.votes())
            .unwrap_or_default()
    }

    /// Returns true if the hash existed
    pub fn erase(&mut self, hash: &BlockHash) -> bool {
        match self.entries.remove(hash) {
            Some(entry) => {
                self.by_tally.remove(&entry.tally_key());
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_tally.clear();
    }

    /// Entries with a tally of at least `min_tally`, highest tally first.
    /// Entries that received no vote within `age_cutoff` are removed first.
    pub fn top(&mut self, min_tally: impl Into<Amount>) -> Vec<TopEntry> {
        let min_tally = min_tally.into();
        self.stats.inc(StatType::VoteCache, DetailType::Top);
        if self.last_cleanup.elapsed() >= self.config.age_cutoff / 2 {
            self.cleanup();
            self.last_cleanup = Instant::now();
        }

        let mut result: Vec<TopEntry> = self
            .by_tally
            .iter()
            .rev()
            .take_while(|(tally, _, _)| *tally >= min_tally)
            .filter_map(|(_, _, hash)| self.entries.get(hash))
            .map(|e| TopEntry {
                hash: e.hash,
                tally: e.tally,
                final_tally: e.final_tally,
            })
            .collect();

        result.sort_by(|a, b| {
            b.tally
                .cmp(&a.tally)
                .then_with(|| b.final_tally.cmp(&a.final_tally))
        });
        result
    }

    fn cleanup(&mut self) {
        self.stats.inc(StatType::VoteCache, DetailType::Cleanup);
        let cutoff = self.config.age_cutoff;
        let expired: Vec<BlockHash> = self
            .entries
            .values()
            .filter(|e| e.last_vote.elapsed() >= cutoff)
            .map(|e| e.hash)
            .collect();
        for hash in expired {
            self.erase(&hash);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("cache", self.len(), size_of::<CacheEntry>())].into()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TopEntry {
    pub hash: BlockHash,
    pub tally: Amount,
    pub final_tally: Amount,
}

#[derive(Clone)]
struct Voter {
    weight: Amount,
    vote: Arc<Vote>,
}

/// Votes for a single block hash
struct CacheEntry {
    id: u64,
    hash: BlockHash,
    voters: HashMap<PublicKey, Voter>,
    last_vote: Instant,
    tally: Amount,
    final_tally: Amount,
}

impl CacheEntry {
    fn new(id: u64, hash: BlockHash) -> Self {
        Self {
            id,
            hash,
            voters: HashMap::new(),
            last_vote: Instant::now(),
            tally: Amount::zero(),
            final_tally: Amount::zero(),
        }
    }

    fn tally_key(&self) -> (Amount, u64, BlockHash) {
        (self.tally, self.id, self.hash)
    }

    fn votes(&self) -> Vec<Arc<Vote>> {
        self.voters.values().map(|v| v.vote.clone()).collect()
    }

    /// Returns true if the tally changed
    fn vote(&mut self, vote: &Arc<Vote>, rep_weight: Amount, max_voters: usize) -> bool {
        let rep = vote.voting_account;
        if let Some(existing) = self.voters.get_mut(&rep) {
            if vote.timestamp <= existing.vote.timestamp {
                return false;
            }
            existing.vote = vote.clone();
            existing.weight = rep_weight;
        } else {
            if self.voters.len() >= max_voters {
                let lowest = self
                    .voters
                    .iter()
                    .min_by_key(|(_, v)| v.weight)
                    .map(|(rep, v)| (*rep, v.weight));
                match lowest {
                    Some((lowest_rep, lowest_weight)) if rep_weight > lowest_weight => {
                        self.voters.remove(&lowest_rep);
                    }
                    _ => return false,
                }
            }
            self.voters.insert(
                rep,
                Voter {
                    weight: rep_weight,
                    vote: vote.clone(),
                },
            );
        }

        self.last_vote = Instant::now();
        let old = (self.tally, self.final_tally);
        self.recalculate_tally();
        old != (self.tally, self.final_tally)
    }

    fn recalculate_tally(&mut self) {
        self.tally = Amount::zero();
        self.final_tally = Amount::zero();
        for voter in self.voters.values() {
            self.tally = self.tally.saturating_add(voter.weight);
            if voter.vote.is_final() {
                self.final_tally = self.final_tally.saturating_add(voter.weight);
            }
        }
    }
}
