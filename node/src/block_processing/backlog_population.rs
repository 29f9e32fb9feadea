use crate::stats::{DetailType, StatType, Stats};
use lattice_core::{Account, AccountInfo, ConfirmationHeightInfo};
use lattice_ledger::{Ledger, Transaction};
use std::{
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::debug;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BacklogPopulationConfig {
    /// Control if ongoing backlog population is enabled. If not, backlog population can still be triggered manually
    pub enabled: bool,

    /// Number of accounts per second to process. Number of accounts per single batch is this value divided by `frequency`
    pub batch_size: u32,

    /// Number of batches to run per second. Batches run in 1 second / `frequency` intervals
    pub frequency: u32,
}

impl Default for BacklogPopulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 10 * 1000,
            frequency: 10,
        }
    }
}

struct BacklogPopulationFlags {
    stopped: bool,
    /// This is a manual trigger, the ongoing backlog population does not use this.
    /// It can be triggered even when backlog population is disabled.
    triggered: bool,
    /// Position of the scan that is in progress
    scan: Option<BacklogScan>,
}

struct BacklogScan {
    next: Account,
    accounts: usize,
}

impl BacklogScan {
    fn new() -> Self {
        Self {
            next: Account::zero(),
            accounts: 0,
        }
    }
}

/// Called for each account that has unconfirmed blocks
pub type ActivateCallback =
    Box<dyn Fn(&dyn Transaction, &Account, &AccountInfo, &ConfirmationHeightInfo) + Send + Sync>;

/// Periodically scans all accounts and hands the ones with unconfirmed
/// blocks to the election schedulers
pub struct BacklogPopulation {
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    activate_callback: Arc<Mutex<Option<ActivateCallback>>>,
    config: BacklogPopulationConfig,
    mutex: Arc<Mutex<BacklogPopulationFlags>>,
    condition: Arc<Condvar>,
    /// Thread that runs the backlog implementation logic. The thread always runs, even if
    /// backlog population is disabled, so that it can service a manual trigger.
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl BacklogPopulation {
    pub fn new(config: BacklogPopulationConfig, ledger: Arc<Ledger>, stats: Arc<Stats>) -> Self {
        Self {
            config,
            ledger,
            stats,
            activate_callback: Arc::new(Mutex::new(None)),
            mutex: Arc::new(Mutex::new(BacklogPopulationFlags {
                stopped: false,
                triggered: false,
                scan: None,
            })),
            condition: Arc::new(Condvar::new()),
            thread: Mutex::new(None),
        }
    }

    pub fn set_activate_callback(&self, callback: ActivateCallback) {
        *self.activate_callback.lock().unwrap() = Some(callback);
    }

    pub fn start(&self) {
        debug_assert!(self.thread.lock().unwrap().is_none());

        let thread = BacklogPopulationThread {
            ledger: self.ledger.clone(),
            stats: self.stats.clone(),
            activate_callback: self.activate_callback.clone(),
            config: self.config.clone(),
            mutex: self.mutex.clone(),
            condition: self.condition.clone(),
        };

        *self.thread.lock().unwrap() = Some(
            thread::Builder::new()
                .name("Backlog".to_owned())
                .spawn(move || {
                    thread.run();
                })
                .unwrap(),
        );
    }

    pub fn stop(&self) {
        self.mutex.lock().unwrap().stopped = true;
        self.notify();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap()
        }
    }

    /// Manually trigger backlog population
    pub fn trigger(&self) {
        self.mutex.lock().unwrap().triggered = true;
        self.notify();
    }

    /// Notify about AEC vacancy
    pub fn notify(&self) {
        self.condition.notify_all();
    }
}

impl Drop for BacklogPopulation {
    fn drop(&mut self) {
        self.stop();
    }
}

struct BacklogPopulationThread {
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    activate_callback: Arc<Mutex<Option<ActivateCallback>>>,
    config: BacklogPopulationConfig,
    mutex: Arc<Mutex<BacklogPopulationFlags>>,
    condition: Arc<Condvar>,
}

impl BacklogPopulationThread {
    /// Scans the accounts one chunk at a time. The position of the scan is
    /// kept between chunks so that the write lock holders can progress.
    fn run(&self) {
        let mut lock = self.mutex.lock().unwrap();
        while !lock.stopped {
            let scan = match lock.scan.take() {
                Some(scan) => scan,
                None if self.should_scan(&lock) => {
                    self.stats.inc(StatType::Backlog, DetailType::Loop);
                    lock.triggered = false;
                    BacklogScan::new()
                }
                None => {
                    lock = self
                        .condition
                        .wait_while(lock, |l| !l.stopped && !self.should_scan(l))
                        .unwrap();
                    continue;
                }
            };

            drop(lock);
            let next = self.scan_chunk(scan);
            lock = self.mutex.lock().unwrap();
            lock.scan = next;

            lock = self
                .condition
                .wait_timeout_while(lock, self.chunk_interval(), |l| !l.stopped)
                .unwrap()
                .0;
        }
    }

    fn should_scan(&self, lock: &BacklogPopulationFlags) -> bool {
        lock.triggered || self.config.enabled
    }

    fn chunk_size(&self) -> usize {
        (self.config.batch_size / self.config.frequency.max(1)).max(1) as usize
    }

    fn chunk_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.config.frequency.max(1) as u64)
    }

    /// Returns the scan position after this chunk, or None when all accounts were visited
    fn scan_chunk(&self, mut scan: BacklogScan) -> Option<BacklogScan> {
        let chunk_size = self.chunk_size();
        let txn = self.ledger.read_txn();
        let accounts = txn.accounts_from(&scan.next, chunk_size);
        for (account, info) in &accounts {
            self.stats.inc(StatType::Backlog, DetailType::Total);
            self.activate(&txn, account, info);
        }
        scan.accounts += accounts.len();

        let next = match accounts.last() {
            Some((last, _)) if accounts.len() == chunk_size => last.inc(),
            _ => None,
        };
        match next {
            Some(next) => {
                scan.next = next;
                Some(scan)
            }
            None => {
                debug!(accounts = scan.accounts, "backlog population finished");
                None
            }
        }
    }

    fn activate(&self, txn: &dyn Transaction, account: &Account, account_info: &AccountInfo) {
        let conf_info = self.ledger.confirmation_height(txn, account);
        if !has_unconfirmed_blocks(account_info, &conf_info) {
            return;
        }

        self.stats.inc(StatType::Backlog, DetailType::Activated);
        let callback_lock = self.activate_callback.lock().unwrap();
        if let Some(callback) = &*callback_lock {
            callback(txn, account, account_info, &conf_info);
        }
    }
}

/// An empty confirmation height means nothing of the account is confirmed yet
fn has_unconfirmed_blocks(account_info: &AccountInfo, conf_info: &ConfirmationHeightInfo) -> bool {
    conf_info.height < account_info.block_count
}
