use crate::{
    stats::{DetailType, Sample, StatType, Stats},
    utils::{ThreadPool, ThreadPoolImpl},
};
use lattice_core::{utils::ContainerInfo, BlockHash, SavedBlock};
use lattice_ledger::{Ledger, Table, Writer};
use std::{
    collections::{HashSet, VecDeque},
    mem::size_of,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, MutexGuard,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmingSetConfig {
    /// Maximum time spent cementing within one write transaction
    pub batch_time: Duration,
    /// Maximum number of dependent blocks to be stored in memory during processing
    pub max_blocks: usize,
    pub max_queued_notifications: usize,
}

impl Default for ConfirmingSetConfig {
    fn default() -> Self {
        Self {
            batch_time: Duration::from_millis(500),
            max_blocks: 128 * 128,
            max_queued_notifications: 8,
        }
    }
}

/// Delay before a batch is retried after its commit failed
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Set of blocks to be durably confirmed
pub struct ConfirmingSet {
    thread: Arc<ConfirmingSetThread>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConfirmingSet {
    pub fn new(config: ConfirmingSetConfig, ledger: Arc<Ledger>, stats: Arc<Stats>) -> Self {
        Self {
            join_handle: Mutex::new(None),
            thread: Arc::new(ConfirmingSetThread {
                mutex: Mutex::new(ConfirmingSetImpl {
                    set: VecDeque::new(),
                    members: HashSet::new(),
                    current: HashSet::new(),
                }),
                stopped: AtomicBool::new(false),
                condition: Condvar::new(),
                ledger,
                stats,
                config,
                observers: Arc::new(Mutex::new(Observers::default())),
                notification_workers: ThreadPoolImpl::new(1, "Conf notif"),
            }),
        }
    }

    /// Called for every cemented block, after the write transaction was committed
    pub fn on_cemented(&self, callback: BlockCallback) {
        self.thread
            .observers
            .lock()
            .unwrap()
            .cemented
            .push(callback);
    }

    /// Called with the hashes that were cemented by someone else already
    pub fn on_already_cemented(&self, callback: AlreadyCementedCallback) {
        self.thread
            .observers
            .lock()
            .unwrap()
            .already_cemented
            .push(callback);
    }

    /// Adds a block to the set of blocks to be confirmed
    pub fn add(&self, hash: BlockHash) {
        self.thread.add(hash);
    }

    pub fn start(&self) {
        debug_assert!(self.join_handle.lock().unwrap().is_none());

        let thread = Arc::clone(&self.thread);
        *self.join_handle.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Conf height".to_string())
                .spawn(move || thread.run())
                .unwrap(),
        );
    }

    pub fn stop(&self) {
        self.thread.stop();
        let handle = self.join_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
        self.thread.notification_workers.stop();
    }

    /// Added blocks will remain in this set until after ledger has them marked as confirmed.
    pub fn exists(&self, hash: &BlockHash) -> bool {
        self.thread.exists(hash)
    }

    pub fn len(&self) -> usize {
        self.thread.mutex.lock().unwrap().set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn container_info(&self) -> ContainerInfo {
        let guard = self.thread.mutex.lock().unwrap();
        [
            ("set", guard.set.len(), size_of::<BlockHash>()),
            ("current", guard.current.len(), size_of::<BlockHash>()),
        ]
        .into()
    }
}

impl Drop for ConfirmingSet {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ConfirmingSetThread {
    mutex: Mutex<ConfirmingSetImpl>,
    stopped: AtomicBool,
    condition: Condvar,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    config: ConfirmingSetConfig,
    notification_workers: ThreadPoolImpl,
    observers: Arc<Mutex<Observers>>,
}

impl ConfirmingSetThread {
    fn stop(&self) {
        {
            let _guard = self.mutex.lock().unwrap();
            self.stopped.store(true, Ordering::SeqCst);
        }
        self.condition.notify_all();
    }

    fn add(&self, hash: BlockHash) {
        let added = self.mutex.lock().unwrap().push_back(hash);
        if added {
            self.condition.notify_all();
            self.stats.inc(StatType::ConfirmingSet, DetailType::Insert);
        } else {
            self.stats
                .inc(StatType::ConfirmingSet, DetailType::Duplicate);
        }
    }

    fn exists(&self, hash: &BlockHash) -> bool {
        let guard = self.mutex.lock().unwrap();
        guard.members.contains(hash) || guard.current.contains(hash)
    }

    fn run(&self) {
        let mut guard = self.mutex.lock().unwrap();
        while !self.stopped.load(Ordering::SeqCst) {
            if !guard.set.is_empty() {
                let batch = guard.next_batch(self.config.max_blocks);

                // Keep track of the blocks we're currently cementing, so that the exists check is accurate
                debug_assert!(guard.current.is_empty());
                guard.current.extend(batch.iter().cloned());
                drop(guard);

                let success = self.run_batch(batch);
                guard = self.mutex.lock().unwrap();
                guard.current.clear();
                if !success {
                    guard = self
                        .condition
                        .wait_timeout_while(guard, RETRY_DELAY, |_| {
                            !self.stopped.load(Ordering::SeqCst)
                        })
                        .unwrap()
                        .0;
                }
            } else {
                guard = self
                    .condition
                    .wait_while(guard, |i| {
                        i.set.is_empty() && !self.stopped.load(Ordering::SeqCst)
                    })
                    .unwrap();
            }
        }
    }

    /// Cements the batch in a single write transaction. Returns false if the
    /// commit failed and the batch was queued again. A batch interrupted by
    /// `stop` is queued again without being committed.
    fn run_batch(&self, batch: Vec<BlockHash>) -> bool {
        let start = Instant::now();
        let mut cemented = Vec::new();
        let mut already_cemented = Vec::new();
        let mut remaining: VecDeque<BlockHash> = batch.iter().cloned().collect();

        {
            let _write_guard = self.ledger.write_queue.wait(Writer::ConfirmationHeight);
            let mut txn = self.ledger.rw_txn_for(&[Table::ConfirmationHeight]);

            while let Some(hash) = remaining.pop_front() {
                // Cementing deep dependency chains might take a long time, allow for graceful shutdown
                if self.stopped.load(Ordering::Relaxed) {
                    debug!(
                        blocks = batch.len(),
                        "cementing batch aborted on shutdown"
                    );
                    self.mutex.lock().unwrap().push_front_all(batch);
                    return true;
                }

                // The block might be rolled back before it's fully cemented
                if !self.ledger.block_exists(&txn, &hash) {
                    self.stats
                        .inc(StatType::ConfirmingSet, DetailType::MissingBlock);
                    continue;
                }

                let added = self
                    .ledger
                    .confirm_max(&mut txn, hash, self.config.max_blocks);
                if added.is_empty() {
                    self.stats
                        .inc(StatType::ConfirmingSet, DetailType::AlreadyCemented);
                    already_cemented.push(hash);
                } else {
                    self.stats.add(
                        StatType::ConfirmingSet,
                        DetailType::Cemented,
                        added.len() as u64,
                    );
                    cemented.extend(added);
                }

                // Long chains are cemented over multiple batches
                if !self.ledger.block_confirmed(&txn, &hash) {
                    remaining.push_front(hash);
                    break;
                }

                if start.elapsed() >= self.config.batch_time {
                    break;
                }
            }

            if let Err(e) = txn.commit() {
                self.stats
                    .inc(StatType::ConfirmingSet, DetailType::CementingFailed);
                warn!("Cementing batch of {} blocks failed: {:?}", batch.len(), e);
                self.mutex.lock().unwrap().push_front_all(batch);
                return false;
            }
        }

        // Blocks that didn't fit into the time budget are processed first in the next batch
        if !remaining.is_empty() {
            self.mutex
                .lock()
                .unwrap()
                .push_front_all(remaining.into_iter().collect());
        }

        self.stats.sample(
            Sample::CementingBatchSize,
            cemented.len() as i64,
            (0, self.config.max_blocks as i64),
        );
        debug!(cemented = cemented.len(), "cementing batch committed");
        self.notify(cemented, already_cemented);
        true
    }

    fn notify(&self, cemented: Vec<SavedBlock>, already_cemented: Vec<BlockHash>) {
        if cemented.is_empty() && already_cemented.is_empty() {
            return;
        }

        let mut guard = self.mutex.lock().unwrap();
        // It's possible that ledger cementing happens faster than the notifications can be processed by other components, cooldown here
        while self.notification_workers.queued_count() >= self.config.max_queued_notifications {
            self.stats
                .inc(StatType::ConfirmingSet, DetailType::Cooldown);
            guard = self.wait_cooldown(guard);
            if self.stopped.load(Ordering::Relaxed) {
                return;
            }
        }
        drop(guard);

        let observers = self.observers.clone();
        let stats = self.stats.clone();
        self.notification_workers.push_task(Box::new(move || {
            let mut observers = observers.lock().unwrap();
            stats.add(
                StatType::ConfirmingSet,
                DetailType::NotifyCemented,
                cemented.len() as u64,
            );
            for block in &cemented {
                for observer in &mut observers.cemented {
                    observer(block);
                }
            }
            if !already_cemented.is_empty() {
                stats.add(
                    StatType::ConfirmingSet,
                    DetailType::NotifyAlreadyCemented,
                    already_cemented.len() as u64,
                );
                for observer in &mut observers.already_cemented {
                    observer(&already_cemented);
                }
            }
        }));
    }

    fn wait_cooldown<'a>(
        &self,
        guard: MutexGuard<'a, ConfirmingSetImpl>,
    ) -> MutexGuard<'a, ConfirmingSetImpl> {
        self.condition
            .wait_timeout_while(guard, Duration::from_millis(100), |_| {
                !self.stopped.load(Ordering::SeqCst)
            })
            .unwrap()
            .0
    }
}

struct ConfirmingSetImpl {
    /// Pending hashes in FIFO order
    set: VecDeque<BlockHash>,
    members: HashSet<BlockHash>,
    current: HashSet<BlockHash>,
}

impl ConfirmingSetImpl {
    fn push_back(&mut self, hash: BlockHash) -> bool {
        if self.members.insert(hash) {
            self.set.push_back(hash);
            true
        } else {
            false
        }
    }

    fn push_front_all(&mut self, hashes: Vec<BlockHash>) {
        for hash in hashes.into_iter().rev() {
            if self.members.insert(hash) {
                self.set.push_front(hash);
            }
        }
    }

    fn next_batch(&mut self, max_count: usize) -> Vec<BlockHash> {
        let count = self.set.len().min(max_count);
        let batch: Vec<BlockHash> = self.set.drain(..count).collect();
        for hash in &batch {
            self.members.remove(hash);
        }
        batch
    }
}

pub type BlockCallback = Box<dyn FnMut(&SavedBlock) + Send>;
pub type AlreadyCementedCallback = Box<dyn FnMut(&[BlockHash]) + Send>;

#[derive(Default)]
struct Observers {
    cemented: Vec<BlockCallback>,
    already_cemented: Vec<AlreadyCementedCallback>,
}
