use crate::{
    consensus::{ActiveElections, ActiveElectionsExt, ElectionBehavior, VoteCache},
    representatives::OnlineReps,
    stats::{DetailType, StatType, Stats},
};
use lattice_core::{utils::ContainerInfo, Amount, BlockHash};
use lattice_ledger::{Ledger, Transaction};
#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;
use std::{
    collections::HashMap,
    mem::size_of,
    sync::{Arc, Condvar, Mutex},
    thread::JoinHandle,
    time::Duration,
};
use tracing::trace;

#[derive(Clone, Debug, PartialEq)]
pub struct HintedSchedulerConfig {
    pub enabled: bool,
    pub check_interval: Duration,
    pub block_cooldown: Duration,
    /// Minimum cached tally as percentage of the trended online weight
    pub hinting_threshold_percent: u32,
    /// Hinted elections are only started while more than this percentage of
    /// the hinted slots are free
    pub vacancy_threshold_percent: u32,
}

impl HintedSchedulerConfig {
    pub fn default_for_dev_network() -> Self {
        Self {
            check_interval: Duration::from_millis(100),
            block_cooldown: Duration::from_millis(100),
            ..Default::default()
        }
    }
}

impl Default for HintedSchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: Duration::from_millis(1000),
            block_cooldown: Duration::from_millis(5000),
            hinting_threshold_percent: 10,
            vacancy_threshold_percent: 20,
        }
    }
}

/// Monitors the vote cache and starts elections for blocks that have a lot of
/// cached vote weight but no election yet
pub struct HintedScheduler {
    thread: Mutex<Option<JoinHandle<()>>>,
    config: HintedSchedulerConfig,
    active: Arc<ActiveElections>,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    vote_cache: Arc<Mutex<VoteCache>>,
    online_reps: Arc<Mutex<OnlineReps>>,
    stopped: Mutex<bool>,
    condition: Condvar,
    cooldowns: Mutex<HashMap<BlockHash, Instant>>,
}

impl HintedScheduler {
    pub fn new(
        config: HintedSchedulerConfig,
        active: Arc<ActiveElections>,
        ledger: Arc<Ledger>,
        stats: Arc<Stats>,
        vote_cache: Arc<Mutex<VoteCache>>,
        online_reps: Arc<Mutex<OnlineReps>>,
    ) -> Self {
        Self {
            thread: Mutex::new(None),
            config,
            active,
            ledger,
            stats,
            vote_cache,
            online_reps,
            stopped: Mutex::new(false),
            condition: Condvar::new(),
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    pub fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.notify();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    /// Notify about changes in AEC vacancy
    pub fn notify(&self) {
        // Avoid notifying when there is very little space inside AEC
        let limit = self.active.limit(ElectionBehavior::Hinted);
        if self.active.vacancy(ElectionBehavior::Hinted)
            >= (limit * self.config.vacancy_threshold_percent as usize / 100) as i64
        {
            self.condition.notify_all();
        }
    }

    fn predicate(&self) -> bool {
        // Check if there is space inside AEC for a new hinted election
        let limit = self.active.limit(ElectionBehavior::Hinted);
        self.active.vacancy(ElectionBehavior::Hinted)
            > (limit * self.config.vacancy_threshold_percent as usize / 100) as i64
    }

    fn activate(&self, txn: &dyn Transaction, hash: &BlockHash, check_dependents: bool) {
        let Some(block) = self.ledger.get_block(txn, hash) else {
            // Missing blocks have to be fetched by the bootstrapper
            self.stats.inc(StatType::Hinting, DetailType::MissingBlock);
            return;
        };

        if self.ledger.block_confirmed(txn, hash) {
            self.stats
                .inc(StatType::Hinting, DetailType::AlreadyConfirmed);
            // Cached votes are no longer needed
            self.vote_cache.lock().unwrap().erase(hash);
            return;
        }

        if check_dependents && !self.ledger.dependents_confirmed(txn, &block) {
            self.stats
                .inc(StatType::Hinting, DetailType::DependentUnconfirmed);
            for dependent in self.ledger.dependent_blocks(txn, &block) {
                if !dependent.is_zero() && !self.ledger.block_confirmed(txn, &dependent) {
                    self.activate(txn, &dependent, false);
                }
            }
            return;
        }

        match self
            .active
            .insert(&Arc::new(block.into_block()), ElectionBehavior::Hinted)
        {
            Ok(insertion) if insertion.inserted => {
                self.stats.inc(StatType::Hinting, DetailType::Insert);
                trace!(%hash, "hinted election started");
            }
            _ => self.stats.inc(StatType::Hinting, DetailType::InsertFailed),
        }
    }

    fn run_iterative(&self) {
        let minimum_tally = self.tally_threshold();
        let top = self.vote_cache.lock().unwrap().top(minimum_tally);
        let txn = self.ledger.read_txn();

        for entry in top {
            if *self.stopped.lock().unwrap() {
                return;
            }
            if !self.predicate() {
                return;
            }
            if self.cooldown(&entry.hash) {
                continue;
            }
            self.activate(&txn, &entry.hash, true);
        }
    }

    fn run(&self) {
        let mut stopped = self.stopped.lock().unwrap();
        while !*stopped {
            self.stats.inc(StatType::Hinting, DetailType::Loop);
            stopped = self
                .condition
                .wait_timeout_while(stopped, self.config.check_interval, |s| !*s)
                .unwrap()
                .0;
            if !*stopped {
                drop(stopped);
                if self.predicate() {
                    self.run_iterative();
                }
                stopped = self.stopped.lock().unwrap();
            }
        }
    }

    fn tally_threshold(&self) -> Amount {
        let trended = self.online_reps.lock().unwrap().trended();
        trended.percent(self.config.hinting_threshold_percent as u128)
    }

    /// Returns true if the hash was activated recently and must not be tried again yet
    fn cooldown(&self, hash: &BlockHash) -> bool {
        let now = Instant::now();
        let mut cooldowns = self.cooldowns.lock().unwrap();
        if let Some(timeout) = cooldowns.get(hash) {
            if *timeout > now {
                return true;
            }
        }
        cooldowns.insert(*hash, now + self.config.block_cooldown);
        cooldowns.retain(|_, timeout| *timeout > now);
        false
    }

    pub fn container_info(&self) -> ContainerInfo {
        [(
            "cooldowns",
            self.cooldowns.lock().unwrap().len(),
            size_of::<BlockHash>() + size_of::<Instant>(),
        )]
        .into()
    }
}

impl Drop for HintedScheduler {
    fn drop(&mut self) {
        // Thread must be stopped before destruction
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub trait HintedSchedulerExt {
    fn start(&self);
}

impl HintedSchedulerExt for Arc<HintedScheduler> {
    fn start(&self) {
        if !self.config.enabled {
            return;
        }
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Sched Hinted".to_string())
                .spawn(move || self_l.run())
                .unwrap(),
        );
    }
}
