use lattice_core::{BlockHash, Root};
#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;
use std::{collections::HashMap, time::Duration};

/// Prevents voting for a different block of the same root too soon after
/// the last vote for that root
pub struct VoteSpacing {
    delay: Duration,
    recent: HashMap<Root, SpacingEntry>,
}

struct SpacingEntry {
    hash: BlockHash,
    time: Instant,
}

impl VoteSpacing {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            recent: HashMap::new(),
        }
    }

    pub fn votable(&self, root: &Root, hash: &BlockHash) -> bool {
        match self.recent.get(root) {
            Some(entry) => entry.hash == *hash || entry.time.elapsed() >= self.delay,
            None => true,
        }
    }

    /// Remembers that a vote for `hash` was generated. A repeated flag for the
    /// same root only refreshes the time, the first hash is kept.
    pub fn flag(&mut self, root: &Root, hash: &BlockHash) {
        self.trim();
        let now = Instant::now();
        self.recent
            .entry(*root)
            .and_modify(|e| e.time = now)
            .or_insert(SpacingEntry {
                hash: *hash,
                time: now,
            });
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    fn trim(&mut self) {
        let delay = self.delay;
        self.recent.retain(|_, e| e.time.elapsed() < delay);
    }
}
