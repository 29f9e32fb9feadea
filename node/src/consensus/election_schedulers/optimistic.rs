use crate::{
    consensus::{ActiveElections, ActiveElectionsExt, ElectionBehavior},
    stats::{DetailType, StatType, Stats},
};
use lattice_core::{utils::ContainerInfo, Account, AccountInfo, ConfirmationHeightInfo};
use lattice_ledger::Ledger;
#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;
use std::{
    collections::{HashSet, VecDeque},
    mem::size_of,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread::JoinHandle,
    time::Duration,
};
use tracing::trace;

#[derive(Clone, Debug, PartialEq)]
pub struct OptimisticSchedulerConfig {
    pub enabled: bool,
    /// Minimum difference between confirmation frontier and account frontier to become a candidate for optimistic confirmation
    pub gap_threshold: u64,
    /// Maximum number of candidates stored in memory
    pub max_size: usize,
}

impl OptimisticSchedulerConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            gap_threshold: 32,
            max_size: 1024 * 64,
        }
    }
}

impl Default for OptimisticSchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts elections for the head block of accounts with a long unconfirmed chain.
/// Confirming the head cements all blocks below it at once.
pub struct OptimisticScheduler {
    thread: Mutex<Option<JoinHandle<()>>>,
    config: OptimisticSchedulerConfig,
    activation_delay: Duration,
    stats: Arc<Stats>,
    active: Arc<ActiveElections>,
    ledger: Arc<Ledger>,
    mutex: Mutex<OptimisticSchedulerData>,
    condition: Condvar,
}

impl OptimisticScheduler {
    pub fn new(
        config: OptimisticSchedulerConfig,
        activation_delay: Duration,
        stats: Arc<Stats>,
        active: Arc<ActiveElections>,
        ledger: Arc<Ledger>,
    ) -> Self {
        Self {
            thread: Mutex::new(None),
            config,
            activation_delay,
            stats,
            active,
            ledger,
            mutex: Mutex::new(OptimisticSchedulerData {
                candidates: VecDeque::new(),
                accounts: HashSet::new(),
                stopped: false,
            }),
            condition: Condvar::new(),
        }
    }

    pub fn stop(&self) {
        self.mutex.lock().unwrap().stopped = true;
        self.notify();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    /// Notify about changes in AEC vacancy
    pub fn notify(&self) {
        self.condition.notify_all();
    }

    /// Called from backlog population to process accounts with unconfirmed blocks.
    /// Returns true if the account was queued as candidate.
    pub fn activate(
        &self,
        account: &Account,
        account_info: &AccountInfo,
        conf_info: &ConfirmationHeightInfo,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }

        debug_assert!(account_info.block_count >= conf_info.height);
        if account_info.block_count - conf_info.height <= self.config.gap_threshold {
            return false;
        }

        {
            let mut guard = self.mutex.lock().unwrap();
            if guard.accounts.contains(account) {
                return false;
            }
            // Prevent the candidates from growing without bound
            if guard.candidates.len() >= self.config.max_size {
                if let Some((evicted, _)) = guard.candidates.pop_front() {
                    guard.accounts.remove(&evicted);
                }
            }
            guard.candidates.push_back((*account, Instant::now()));
            guard.accounts.insert(*account);
        }
        self.stats
            .inc(StatType::OptimisticScheduler, DetailType::Activated);
        trace!(%account, "optimistic candidate queued");
        true
    }

    pub fn len(&self) -> usize {
        self.mutex.lock().unwrap().candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn vacancy_predicate(&self) -> bool {
        self.active.vacancy(ElectionBehavior::Optimistic) > 0
    }

    fn predicate(&self, data: &OptimisticSchedulerData) -> bool {
        if !self.vacancy_predicate() {
            return false;
        }
        match data.candidates.front() {
            Some((_, queued)) => queued.elapsed() >= self.activation_delay,
            None => false,
        }
    }

    fn run(&self) {
        let mut guard = self.mutex.lock().unwrap();
        while !guard.stopped {
            self.stats
                .inc(StatType::OptimisticScheduler, DetailType::Loop);

            if self.predicate(&guard) {
                guard = self.run_one(guard);
            } else {
                let wait = if guard.candidates.is_empty() {
                    self.activation_delay
                } else {
                    self.activation_delay / 2
                };
                guard = self
                    .condition
                    .wait_timeout_while(guard, wait.max(Duration::from_millis(1)), |g| {
                        !g.stopped && !self.predicate(g)
                    })
                    .unwrap()
                    .0;
            }
        }
    }

    fn run_one<'a>(
        &'a self,
        mut guard: MutexGuard<'a, OptimisticSchedulerData>,
    ) -> MutexGuard<'a, OptimisticSchedulerData> {
        let Some((account, _)) = guard.candidates.pop_front() else {
            return guard;
        };
        guard.accounts.remove(&account);
        drop(guard);

        let txn = self.ledger.read_txn();
        let head = self
            .ledger
            .account_info(&txn, &account)
            .and_then(|info| self.ledger.get_block(&txn, &info.head));
        if let Some(block) = head {
            // Ensure block is not already confirmed
            if !self.ledger.block_confirmed(&txn, &block.hash()) {
                let inserted = self
                    .active
                    .insert(&Arc::new(block.into_block()), ElectionBehavior::Optimistic)
                    .map(|i| i.inserted)
                    .unwrap_or(false);
                self.stats.inc(
                    StatType::OptimisticScheduler,
                    if inserted {
                        DetailType::Insert
                    } else {
                        DetailType::InsertFailed
                    },
                );
            }
        }
        drop(txn);

        self.mutex.lock().unwrap()
    }

    pub fn container_info(&self) -> ContainerInfo {
        [(
            "candidates",
            self.len(),
            size_of::<Account>() + size_of::<Instant>(),
        )]
        .into()
    }
}

impl Drop for OptimisticScheduler {
    fn drop(&mut self) {
        // Thread must be stopped before destruction
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

struct OptimisticSchedulerData {
    candidates: VecDeque<(Account, Instant)>,
    accounts: HashSet<Account>,
    stopped: bool,
}

pub trait OptimisticSchedulerExt {
    fn start(&self);
}

impl OptimisticSchedulerExt for Arc<OptimisticScheduler> {
    fn start(&self) {
        if !self.config.enabled {
            return;
        }
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Sched Opt".to_string())
                .spawn(move || self_l.run())
                .unwrap(),
        );
    }
}
