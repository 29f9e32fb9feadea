use super::{ActiveElections, ActiveElectionsExt, VoteCache};
use crate::stats::{DetailType, StatType, Stats};
use lattice_core::{utils::ContainerInfo, BlockHash, VoteSource};
use std::{
    collections::{HashSet, VecDeque},
    mem::size_of,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread::JoinHandle,
};

/// Replays cached votes into elections that were started after the votes arrived
pub struct VoteCacheProcessor {
    state: Mutex<State>,
    condition: Condvar,
    stats: Arc<Stats>,
    vote_cache: Arc<Mutex<VoteCache>>,
    active: Arc<ActiveElections>,
    max_triggered: usize,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl VoteCacheProcessor {
    pub fn new(
        stats: Arc<Stats>,
        vote_cache: Arc<Mutex<VoteCache>>,
        active: Arc<ActiveElections>,
        max_triggered: usize,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                stopped: false,
                triggered: VecDeque::new(),
            }),
            condition: Condvar::new(),
            stats,
            vote_cache,
            active,
            max_triggered,
            thread: Mutex::new(None),
        }
    }

    pub fn stop(&self) {
        self.state.lock().unwrap().stopped = true;
        self.condition.notify_all();
        let thread = self.thread.lock().unwrap().take();
        if let Some(handle) = thread {
            handle.join().unwrap();
        }
    }

    pub fn trigger(&self, hash: BlockHash) {
        {
            let mut state = self.state.lock().unwrap();
            if state.triggered.len() >= self.max_triggered {
                state.triggered.pop_front();
                self.stats
                    .inc(StatType::VoteCacheProcessor, DetailType::Overfill);
            }
            state.triggered.push_back(hash);
        }
        self.condition.notify_all();
        self.stats
            .inc(StatType::VoteCacheProcessor, DetailType::Triggered);
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().triggered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn run(&self) {
        let mut guard = self.state.lock().unwrap();
        while !guard.stopped {
            if !guard.triggered.is_empty() {
                self.run_batch(guard);
                guard = self.state.lock().unwrap();
            } else {
                guard = self
                    .condition
                    .wait_while(guard, |i| !i.stopped && i.triggered.is_empty())
                    .unwrap();
            }
        }
    }

    fn run_batch(&self, mut state: MutexGuard<'_, State>) {
        let triggered = std::mem::take(&mut state.triggered);
        drop(state);

        let hashes: HashSet<BlockHash> = triggered.into_iter().collect();
        self.stats.add(
            StatType::VoteCacheProcessor,
            DetailType::Processed,
            hashes.len() as u64,
        );

        for hash in hashes {
            let cached = self.vote_cache.lock().unwrap().find(&hash);
            for vote in cached {
                self.active.vote_filter(&vote, VoteSource::Cache, &hash);
            }
        }
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("triggered", self.len(), size_of::<BlockHash>())].into()
    }
}

impl Drop for VoteCacheProcessor {
    fn drop(&mut self) {
        debug_assert!(self.thread.lock().unwrap().is_none())
    }
}

struct State {
    stopped: bool,
    triggered: VecDeque<BlockHash>,
}

pub trait VoteCacheProcessorExt {
    fn start(&self);
}

impl VoteCacheProcessorExt for Arc<VoteCacheProcessor> {
    fn start(&self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Vote cache proc".to_owned())
                .spawn(move || self_l.run())
                .unwrap(),
        );
    }
}
