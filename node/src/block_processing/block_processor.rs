use crate::{
    config::NetworkConstants,
    stats::{DetailType, Sample, StatType, Stats},
};
use lattice_core::{utils::ContainerInfo, Block, BlockHash, QualifiedRoot, SavedBlock};
use lattice_ledger::{BlockStatus, Ledger, WriteTransaction, Writer};
use std::{
    collections::VecDeque,
    mem::size_of,
    sync::{
        mpsc::{self, Sender},
        Arc, Condvar, Mutex, RwLock,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tracing::{debug, trace, warn};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum BlockSource {
    /// Received from the network
    Live,
    /// Created or submitted by this node
    Local,
    /// Replaces a conflicting chain in the ledger
    Forced,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockProcessorConfig {
    /// Maximum number of queued blocks per source. Forced blocks are never rejected.
    pub max_queue: usize,
    /// Maximum number of blocks processed in one write transaction
    pub batch_size: usize,
    /// Maximum time a batch holds the write lock
    pub batch_max_time: Duration,
}

impl BlockProcessorConfig {
    pub fn new(network: &NetworkConstants) -> Self {
        Self {
            max_queue: if network.is_dev_network() {
                1024 * 4
            } else {
                1024 * 64
            },
            batch_size: 256,
            batch_max_time: Duration::from_millis(500),
        }
    }
}

/// A block waiting in the block processor queue
pub struct BlockContext {
    pub block: Arc<Block>,
    pub source: BlockSource,
    pub arrival: Instant,
    /// The stored block, set if processing was successful
    pub saved_block: Mutex<Option<SavedBlock>>,
    waiter: Mutex<Option<Sender<BlockStatus>>>,
}

impl BlockContext {
    pub fn new(block: Arc<Block>, source: BlockSource) -> Self {
        Self {
            block,
            source,
            arrival: Instant::now(),
            saved_block: Mutex::new(None),
            waiter: Mutex::new(None),
        }
    }

    fn set_result(&self, status: BlockStatus) {
        if let Some(waiter) = self.waiter.lock().unwrap().take() {
            let _ = waiter.send(status);
        }
    }
}

pub type BatchProcessedCallback = Box<dyn Fn(&[(BlockStatus, Arc<BlockContext>)]) + Send + Sync>;
/// Receives the rolled back blocks and the root of the forced block that replaced them
pub type RolledBackCallback = Box<dyn Fn(&[SavedBlock], QualifiedRoot) + Send + Sync>;

/// Inserts incoming blocks into the ledger. Blocks are processed in batches,
/// each batch in one write transaction owned by `Writer::ProcessBatch`.
pub struct BlockProcessor {
    thread: Mutex<Option<JoinHandle<()>>>,
    mutex: Mutex<BlockProcessorData>,
    condition: Condvar,
    config: BlockProcessorConfig,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    batch_processed: RwLock<Vec<BatchProcessedCallback>>,
    rolled_back: RwLock<Vec<RolledBackCallback>>,
}

impl BlockProcessor {
    pub fn new(config: BlockProcessorConfig, ledger: Arc<Ledger>, stats: Arc<Stats>) -> Self {
        Self {
            thread: Mutex::new(None),
            mutex: Mutex::new(BlockProcessorData {
                blocks: VecDeque::new(),
                forced: VecDeque::new(),
                stopped: false,
            }),
            condition: Condvar::new(),
            config,
            ledger,
            stats,
            batch_processed: RwLock::new(Vec::new()),
            rolled_back: RwLock::new(Vec::new()),
        }
    }

    /// Called after every committed batch
    pub fn add_batch_processed_observer(&self, observer: BatchProcessedCallback) {
        self.batch_processed.write().unwrap().push(observer);
    }

    /// Called with the blocks that were rolled back to make room for a forced block
    pub fn add_rolled_back_observer(&self, observer: RolledBackCallback) {
        self.rolled_back.write().unwrap().push(observer);
    }

    pub fn len(&self) -> usize {
        let guard = self.mutex.lock().unwrap();
        guard.blocks.len() + guard.forced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn full(&self) -> bool {
        self.mutex.lock().unwrap().blocks.len() >= self.config.max_queue
    }

    pub fn half_full(&self) -> bool {
        self.mutex.lock().unwrap().blocks.len() >= self.config.max_queue / 2
    }

    /// Queues the block. Returns false if the queue is full.
    pub fn add(&self, block: Arc<Block>, source: BlockSource) -> bool {
        self.add_context(Arc::new(BlockContext::new(block, source)))
    }

    pub fn process_active(&self, block: Arc<Block>) {
        self.add(block, BlockSource::Live);
    }

    /// Queues the block and waits until it was processed.
    /// Returns None if the block was not accepted or the processor stopped.
    pub fn add_blocking(&self, block: Arc<Block>, source: BlockSource) -> Option<BlockStatus> {
        let context = Arc::new(BlockContext::new(block, source));
        let (tx, rx) = mpsc::channel();
        *context.waiter.lock().unwrap() = Some(tx);
        if !self.add_context(context) {
            return None;
        }
        rx.recv().ok()
    }

    /// Processes the block even if it conflicts with the ledger. The
    /// competing chain is rolled back first.
    pub fn force(&self, block: Arc<Block>) {
        self.stats.inc(StatType::Blockprocessor, DetailType::Forced);
        trace!(hash = %block.hash(), "block forced");
        {
            let mut guard = self.mutex.lock().unwrap();
            guard
                .forced
                .push_back(Arc::new(BlockContext::new(block, BlockSource::Forced)));
        }
        self.condition.notify_all();
    }

    fn add_context(&self, context: Arc<BlockContext>) -> bool {
        self.stats
            .inc(StatType::BlockprocessorSource, context.source.into());
        {
            let mut guard = self.mutex.lock().unwrap();
            if guard.stopped {
                return false;
            }
            if context.source == BlockSource::Forced {
                guard.forced.push_back(context);
            } else {
                if guard.blocks.len() >= self.config.max_queue {
                    drop(guard);
                    self.stats
                        .inc(StatType::BlockprocessorOverfill, context.source.into());
                    return false;
                }
                guard.blocks.push_back(context);
            }
        }
        self.condition.notify_all();
        true
    }

    pub fn stop(&self) {
        {
            let mut guard = self.mutex.lock().unwrap();
            guard.stopped = true;
            // Pending waiters are released by dropping their senders
            guard.blocks.clear();
            guard.forced.clear();
        }
        self.condition.notify_all();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    fn run(&self) {
        let mut guard = self.mutex.lock().unwrap();
        while !guard.stopped {
            if guard.has_blocks() {
                drop(guard);
                self.stats.inc(StatType::Blockprocessor, DetailType::Loop);
                if let Some(processed) = self.process_batch() {
                    self.notify_batch_processed(&processed);
                }
                guard = self.mutex.lock().unwrap();
            } else {
                guard = self
                    .condition
                    .wait_while(guard, |g| !g.stopped && !g.has_blocks())
                    .unwrap();
            }
        }
    }

    /// Returns None if the batch could not be committed
    fn process_batch(&self) -> Option<Vec<(BlockStatus, Arc<BlockContext>)>> {
        let mut write_guard = self.ledger.write_queue.wait(Writer::ProcessBatch);
        let mut txn = self.ledger.rw_txn();
        let start = Instant::now();
        let mut processed = Vec::new();
        let mut rolled_back = Vec::new();

        let mut guard = self.mutex.lock().unwrap();
        while processed.len() < self.config.batch_size
            && start.elapsed() < self.config.batch_max_time
        {
            let Some(context) = guard.next() else {
                break;
            };
            drop(guard);
            let result = self.process_one(&mut txn, &context, &mut rolled_back);
            processed.push((result, context));
            guard = self.mutex.lock().unwrap();
        }
        drop(guard);

        if let Err(e) = txn.commit() {
            self.stats
                .inc(StatType::Blockprocessor, DetailType::CommitFailed);
            warn!("Processing batch of {} blocks failed: {:?}", processed.len(), e);
            let mut guard = self.mutex.lock().unwrap();
            for (_, context) in processed.into_iter().rev() {
                *context.saved_block.lock().unwrap() = None;
                if context.source == BlockSource::Forced {
                    guard.forced.push_front(context);
                } else {
                    guard.blocks.push_front(context);
                }
            }
            return None;
        }
        write_guard.release();

        self.stats.sample(
            Sample::BlockProcessingBatchSize,
            processed.len() as i64,
            (0, self.config.batch_size as i64),
        );
        if processed.len() > 1 {
            debug!(
                "Processed {} blocks in {} ms",
                processed.len(),
                start.elapsed().as_millis()
            );
        }

        if !rolled_back.is_empty() {
            let observers = self.rolled_back.read().unwrap();
            for (blocks, root) in &rolled_back {
                for observer in observers.iter() {
                    observer(blocks, *root);
                }
            }
        }

        for (status, context) in &processed {
            context.set_result(*status);
        }
        Some(processed)
    }

    fn process_one(
        &self,
        txn: &mut WriteTransaction,
        context: &BlockContext,
        rolled_back: &mut Vec<(Vec<SavedBlock>, QualifiedRoot)>,
    ) -> BlockStatus {
        let block = &context.block;
        if context.source == BlockSource::Forced {
            self.rollback_competitor(txn, block, rolled_back);
        }

        let status = match self.ledger.process(txn, block) {
            Ok(saved) => {
                *context.saved_block.lock().unwrap() = Some(saved);
                BlockStatus::Progress
            }
            Err(status) => status,
        };

        self.stats
            .inc(StatType::BlockprocessorResult, status.into());
        self.stats.inc(StatType::Blockprocessor, DetailType::Processed);
        trace!(
            hash = %block.hash(),
            source = ?context.source,
            status = status.as_str(),
            "block processed"
        );
        status
    }

    /// Rolls back the block that occupies the root of `block`
    fn rollback_competitor(
        &self,
        txn: &mut WriteTransaction,
        block: &Block,
        rolled_back: &mut Vec<(Vec<SavedBlock>, QualifiedRoot)>,
    ) {
        let Some(competitor) = self.successor_of_root(txn, block) else {
            return;
        };
        if competitor == block.hash() {
            return;
        }

        debug!(
            %competitor,
            replacement = %block.hash(),
            "rolling back competing block"
        );
        match self.ledger.rollback(txn, &competitor) {
            Ok(blocks) => {
                self.stats.add(
                    StatType::Blockprocessor,
                    DetailType::Rollback,
                    blocks.len() as u64,
                );
                rolled_back.push((blocks, block.qualified_root()));
            }
            Err(e) => {
                self.stats
                    .inc(StatType::Blockprocessor, DetailType::RollbackFailed);
                warn!("Failed to roll back {}: {:?}", competitor, e);
            }
        }
    }

    fn successor_of_root(&self, txn: &WriteTransaction, block: &Block) -> Option<BlockHash> {
        if block.previous.is_zero() {
            self.ledger
                .account_info(txn, &block.account)
                .map(|info| info.open_block)
        } else {
            self.ledger
                .get_block(txn, &block.previous)
                .and_then(|previous| previous.successor())
        }
    }

    fn notify_batch_processed(&self, processed: &[(BlockStatus, Arc<BlockContext>)]) {
        let observers = self.batch_processed.read().unwrap();
        for observer in observers.iter() {
            observer(processed);
        }
    }

    pub fn container_info(&self) -> ContainerInfo {
        let guard = self.mutex.lock().unwrap();
        [
            ("blocks", guard.blocks.len(), size_of::<Arc<BlockContext>>()),
            ("forced", guard.forced.len(), size_of::<Arc<BlockContext>>()),
        ]
        .into()
    }
}

impl Drop for BlockProcessor {
    fn drop(&mut self) {
        // Thread must be stopped before destruction
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub trait BlockProcessorExt {
    fn start(&self);
}

impl BlockProcessorExt for Arc<BlockProcessor> {
    fn start(&self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Blck processing".to_string())
                .spawn(move || self_l.run())
                .unwrap(),
        );
    }
}

struct BlockProcessorData {
    blocks: VecDeque<Arc<BlockContext>>,
    forced: VecDeque<Arc<BlockContext>>,
    stopped: bool,
}

impl BlockProcessorData {
    fn has_blocks(&self) -> bool {
        !self.blocks.is_empty() || !self.forced.is_empty()
    }

    /// Forced blocks are processed first
    fn next(&mut self) -> Option<Arc<BlockContext>> {
        self.forced
            .pop_front()
            .or_else(|| self.blocks.pop_front())
    }
}
