use crate::{
    block_cementer::BlockCementer,
    block_insertion::{BlockInserter, BlockValidatorFactory},
    block_rollback::BlockRollbackPerformer,
    store::{LedgerStore, Table, WriteBatch},
    InMemoryStore, LedgerCache, LedgerConstants, ReadTransaction, RepWeightCache, Transaction,
    WriteQueue, WriteTransaction,
};
use lattice_core::{
    utils::{seconds_since_epoch, ContainerInfo},
    Account, AccountInfo, Amount, Block, BlockHash, BlockSideband, BlockSubType,
    ConfirmationHeightInfo, PublicKey, QualifiedRoot, SavedBlock,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::debug;

#[derive(PartialEq, Eq, Debug, Clone, Copy, FromPrimitive)]
#[repr(u8)]
pub enum BlockStatus {
    Progress, // Hasn't been seen before
    Old,      // Already seen and was valid
    Fork,     // Malicious fork based on previous
    /// Source block doesn't exist or has already been received
    Unreceivable,
    GapPrevious,       // Block marked as previous is unknown
    GapSource,         // Block marked as source is unknown
    OpenedBurnAccount, // Block attempts to open the burn account
    /// Balance and amount delta don't match
    BalanceMismatch,
    BlockPosition, // This block cannot follow the previous block
}

impl BlockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockStatus::Progress => "progress",
            BlockStatus::Old => "old",
            BlockStatus::Fork => "fork",
            BlockStatus::Unreceivable => "unreceivable",
            BlockStatus::GapPrevious => "gap_previous",
            BlockStatus::GapSource => "gap_source",
            BlockStatus::OpenedBurnAccount => "opened_burn_account",
            BlockStatus::BalanceMismatch => "balance_mismatch",
            BlockStatus::BlockPosition => "block_position",
        }
    }
}

pub trait LedgerObserver: Send + Sync {
    fn blocks_cemented(&self, _cemented_count: u64) {}
    fn block_rolled_back(&self, _block: &SavedBlock) {}
    fn block_added(&self, _block: &SavedBlock) {}
}

pub struct NullLedgerObserver {}

impl NullLedgerObserver {
    pub fn new() -> Self {
        Self {}
    }
}

impl LedgerObserver for NullLedgerObserver {}

pub struct Ledger {
    pub store: Arc<dyn LedgerStore>,
    pub rep_weights: Arc<RepWeightCache>,
    pub constants: LedgerConstants,
    pub observer: Arc<dyn LedgerObserver>,
    pub write_queue: Arc<WriteQueue>,
    cache: Arc<LedgerCache>,
    pruning: AtomicBool,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, constants: LedgerConstants) -> anyhow::Result<Self> {
        let ledger = Self {
            store,
            rep_weights: Arc::new(RepWeightCache::new()),
            constants,
            observer: Arc::new(NullLedgerObserver::new()),
            write_queue: Arc::new(WriteQueue::new()),
            cache: Arc::new(LedgerCache::new()),
            pruning: AtomicBool::new(false),
        };

        if ledger.store.is_empty() {
            ledger.add_genesis_block()?;
        }
        ledger.initialize_cache();
        Ok(ledger)
    }

    /// A ledger with the dev genesis block that is only kept in memory
    pub fn new_null() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), LedgerConstants::dev())
            .expect("in memory ledger cannot fail")
    }

    pub fn set_observer(&mut self, observer: Arc<dyn LedgerObserver>) {
        self.observer = observer;
    }

    fn add_genesis_block(&self) -> anyhow::Result<()> {
        let genesis = &self.constants.genesis_block;
        let hash = genesis.hash();
        let sideband = BlockSideband::new(
            1,
            BlockHash::zero(),
            seconds_since_epoch(),
            BlockSubType::Open,
            self.constants.genesis_amount,
        );

        let mut batch = WriteBatch::default();
        batch
            .blocks
            .insert(hash, Some(SavedBlock::new(genesis.clone(), sideband)));
        batch.accounts.insert(
            genesis.account,
            Some(AccountInfo {
                head: hash,
                representative: genesis.representative,
                open_block: hash,
                balance: genesis.balance,
                modified: seconds_since_epoch(),
                block_count: 1,
            }),
        );
        batch.confirmation_height.insert(
            genesis.account,
            Some(ConfirmationHeightInfo::new(1, hash)),
        );
        self.store.commit(batch)
    }

    /// Derives the in memory counters and the representative weights from the stored accounts
    fn initialize_cache(&self) {
        const CHUNK_SIZE: usize = 1024;
        let mut start = Account::zero();
        let mut block_count = 0;
        let mut cemented_count = 0;
        let mut account_count = 0;
        loop {
            let accounts = self.store.accounts_from(&start, CHUNK_SIZE);
            for (account, info) in &accounts {
                block_count += info.block_count;
                account_count += 1;
                cemented_count += self
                    .store
                    .confirmation_height(account)
                    .map(|i| i.height)
                    .unwrap_or_default();
                let weight = self.rep_weights.weight(&info.representative);
                self.rep_weights
                    .set(info.representative, weight + info.balance);
            }

            match accounts.last().and_then(|(account, _)| account.inc()) {
                Some(next) if accounts.len() == CHUNK_SIZE => start = next,
                _ => break,
            }
        }

        self.cache.block_count.store(block_count, Ordering::SeqCst);
        self.cache
            .cemented_count
            .store(cemented_count, Ordering::SeqCst);
        self.cache
            .account_count
            .store(account_count, Ordering::SeqCst);
        self.cache
            .pruned_count
            .store(self.store.pruned_count(), Ordering::SeqCst);
        debug!(block_count, cemented_count, account_count, "ledger cache initialized");
    }

    pub fn read_txn(&self) -> ReadTransaction {
        ReadTransaction::new(self.store.clone())
    }

    /// A write transaction for all tables
    pub fn rw_txn(&self) -> WriteTransaction {
        self.rw_txn_for(&[])
    }

    pub fn rw_txn_for(&self, tables: &[Table]) -> WriteTransaction {
        WriteTransaction::new(
            self.store.clone(),
            self.cache.clone(),
            self.rep_weights.clone(),
            self.observer.clone(),
            tables,
        )
    }

    pub fn pruning_enabled(&self) -> bool {
        self.pruning.load(Ordering::SeqCst)
    }

    pub fn enable_pruning(&self) {
        self.pruning.store(true, Ordering::SeqCst);
    }

    pub fn weight(&self, rep: &PublicKey) -> Amount {
        self.rep_weights.weight(rep)
    }

    pub fn get_block(&self, txn: &dyn Transaction, hash: &BlockHash) -> Option<SavedBlock> {
        txn.block(hash)
    }

    pub fn block_exists(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        txn.block(hash).is_some()
    }

    pub fn block_exists_or_pruned(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        txn.pruned_exists(hash) || txn.block(hash).is_some()
    }

    /// A block is confirmed when it was pruned or when its height is at or below
    /// the confirmation height of its account
    pub fn block_confirmed(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        if txn.pruned_exists(hash) {
            return true;
        }
        match txn.block(hash) {
            Some(block) => {
                let conf_height = self.confirmation_height(txn, &block.account);
                block.height() <= conf_height.height
            }
            None => false,
        }
    }

    pub fn account_info(&self, txn: &dyn Transaction, account: &Account) -> Option<AccountInfo> {
        txn.account(account)
    }

    pub fn confirmation_height(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> ConfirmationHeightInfo {
        txn.confirmation_height(account).unwrap_or_default()
    }

    pub fn account_balance(&self, txn: &dyn Transaction, account: &Account) -> Amount {
        txn.account(account)
            .map(|i| i.balance)
            .unwrap_or_default()
    }

    /// The first block of the account that is not cemented yet
    pub fn first_unconfirmed(&self, txn: &dyn Transaction, account: &Account) -> Option<SavedBlock> {
        let info = txn.account(account)?;
        let conf_height = self.confirmation_height(txn, account);
        if conf_height.height >= info.block_count {
            return None;
        }
        if conf_height.height == 0 {
            txn.block(&info.open_block)
        } else {
            let frontier = txn.block(&conf_height.frontier)?;
            txn.block(&frontier.successor()?)
        }
    }

    /// The previous block and, for receives, the source block. Works for blocks
    /// that are not in the ledger yet, for example competing forks.
    pub fn dependent_blocks(&self, txn: &dyn Transaction, block: &Block) -> [BlockHash; 2] {
        let source = if self.is_receive(txn, block) {
            block.link_as_hash()
        } else {
            BlockHash::zero()
        };
        [block.previous, source]
    }

    fn is_receive(&self, txn: &dyn Transaction, block: &Block) -> bool {
        if block.link.is_zero() {
            return false;
        }
        if block.is_open() {
            return true;
        }
        let previous_balance = txn
            .block(&block.previous)
            .map(|b| b.balance)
            .unwrap_or_default();
        block.balance > previous_balance
    }

    pub fn dependents_confirmed(&self, txn: &dyn Transaction, block: &Block) -> bool {
        self.dependent_blocks(txn, block)
            .iter()
            .all(|hash| hash.is_zero() || self.block_confirmed(txn, hash))
    }

    pub fn process(
        &self,
        txn: &mut WriteTransaction,
        block: &Block,
    ) -> Result<SavedBlock, BlockStatus> {
        let validator = BlockValidatorFactory::new(self, &*txn, block).create_validator();
        let instructions = validator.validate()?;
        Ok(BlockInserter::new(self, txn, block, instructions).insert())
    }

    /// Rollback blocks until `block` doesn't exist or it tries to penetrate the confirmation height
    pub fn rollback(
        &self,
        txn: &mut WriteTransaction,
        block: &BlockHash,
    ) -> anyhow::Result<Vec<SavedBlock>> {
        BlockRollbackPerformer::new(self, txn).roll_back(block)
    }

    pub fn confirm(&self, txn: &mut WriteTransaction, hash: BlockHash) -> Vec<SavedBlock> {
        self.confirm_max(txn, hash, 1024 * 128)
    }

    /// Both stack and result set are bounded to limit maximum memory usage
    /// Callers must ensure that the target block was confirmed, and if not, call this function multiple times
    pub fn confirm_max(
        &self,
        txn: &mut WriteTransaction,
        target_hash: BlockHash,
        max_blocks: usize,
    ) -> Vec<SavedBlock> {
        BlockCementer::new(self).confirm(txn, target_hash, max_blocks)
    }

    /// Removes the block and all its predecessors from the block table.
    /// Only cemented blocks may be pruned.
    pub fn pruning_action(&self, txn: &mut WriteTransaction, hash: &BlockHash) -> u64 {
        let mut pruned_count = 0;
        let mut hash = *hash;
        let genesis_hash = self.constants.genesis_hash();

        while !hash.is_zero() && hash != genesis_hash {
            if let Some(block) = txn.block(&hash) {
                debug_assert!(self.block_confirmed(&*txn, &hash));
                txn.del_block(hash);
                txn.put_pruned(hash);
                hash = block.previous;
                pruned_count += 1;
                txn.cache_delta().pruned_count += 1;
            } else {
                // already pruned or unknown
                break;
            }
        }

        pruned_count
    }

    /// Stores the hash a final vote was generated for. Returns false if a final
    /// vote for a different block of the same root exists already.
    pub fn final_vote_put(
        &self,
        txn: &mut WriteTransaction,
        root: &QualifiedRoot,
        hash: &BlockHash,
    ) -> bool {
        match txn.final_vote(root) {
            Some(existing) => existing == *hash,
            None => {
                txn.put_final_vote(*root, *hash);
                true
            }
        }
    }

    pub fn final_vote(&self, txn: &dyn Transaction, root: &QualifiedRoot) -> Option<BlockHash> {
        txn.final_vote(root)
    }

    pub fn cemented_count(&self) -> u64 {
        self.cache.cemented_count.load(Ordering::SeqCst)
    }

    pub fn block_count(&self) -> u64 {
        self.cache.block_count.load(Ordering::SeqCst)
    }

    pub fn account_count(&self) -> u64 {
        self.cache.account_count.load(Ordering::SeqCst)
    }

    pub fn pruned_count(&self) -> u64 {
        self.cache.pruned_count.load(Ordering::SeqCst)
    }

    pub fn container_info(&self) -> ContainerInfo {
        ContainerInfo::builder()
            .node("rep_weights", self.rep_weights.container_info())
            .leaf("write_queue", self.write_queue.len(), std::mem::size_of::<crate::Writer>())
            .finish()
    }
}
