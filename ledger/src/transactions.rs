use crate::{
    ledger_cache::LedgerCacheDelta,
    rep_weight_cache::RepWeightDelta,
    store::{LedgerStore, Table, WriteBatch},
    LedgerCache, LedgerObserver, RepWeightCache,
};
use lattice_core::{
    Account, AccountInfo, BlockHash, ConfirmationHeightInfo, PendingInfo, PendingKey,
    QualifiedRoot, SavedBlock,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::trace;

/// Read access to the ledger tables
pub trait Transaction {
    fn account(&self, account: &Account) -> Option<AccountInfo>;
    fn accounts_from(&self, start: &Account, count: usize) -> Vec<(Account, AccountInfo)>;
    fn block(&self, hash: &BlockHash) -> Option<SavedBlock>;
    fn confirmation_height(&self, account: &Account) -> Option<ConfirmationHeightInfo>;
    fn pending(&self, key: &PendingKey) -> Option<PendingInfo>;
    fn pending_for_account(&self, account: &Account) -> Vec<(PendingKey, PendingInfo)>;
    fn pruned_exists(&self, hash: &BlockHash) -> bool;
    fn final_vote(&self, root: &QualifiedRoot) -> Option<BlockHash>;
}

pub struct ReadTransaction {
    store: Arc<dyn LedgerStore>,
}

impl ReadTransaction {
    pub(crate) fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }
}

impl Transaction for ReadTransaction {
    fn account(&self, account: &Account) -> Option<AccountInfo> {
        self.store.account(account)
    }

    fn accounts_from(&self, start: &Account, count: usize) -> Vec<(Account, AccountInfo)> {
        self.store.accounts_from(start, count)
    }

    fn block(&self, hash: &BlockHash) -> Option<SavedBlock> {
        self.store.block(hash)
    }

    fn confirmation_height(&self, account: &Account) -> Option<ConfirmationHeightInfo> {
        self.store.confirmation_height(account)
    }

    fn pending(&self, key: &PendingKey) -> Option<PendingInfo> {
        self.store.pending(key)
    }

    fn pending_for_account(&self, account: &Account) -> Vec<(PendingKey, PendingInfo)> {
        self.store.pending_for_account(account)
    }

    fn pruned_exists(&self, hash: &BlockHash) -> bool {
        self.store.pruned_exists(hash)
    }

    fn final_vote(&self, root: &QualifiedRoot) -> Option<BlockHash> {
        self.store.final_vote(root)
    }
}

/// Ledger events that are reported to the observer once the transaction is committed
enum LedgerEvent {
    BlockAdded(SavedBlock),
    BlockRolledBack(SavedBlock),
    BlocksCemented(u64),
}

/// Collects changes on top of the committed ledger state. Reads see the
/// uncommitted changes of this transaction. Nothing reaches the store, the
/// ledger counters, the rep weights or the observer before `commit` succeeds;
/// dropping the transaction discards all changes.
pub struct WriteTransaction {
    store: Arc<dyn LedgerStore>,
    cache: Arc<LedgerCache>,
    rep_weights: Arc<RepWeightCache>,
    observer: Arc<dyn LedgerObserver>,
    events: Vec<LedgerEvent>,
    /// Empty means all tables
    tables: Vec<Table>,
    batch: WriteBatch,
    cache_delta: LedgerCacheDelta,
    weight_delta: RepWeightDelta,
}

impl WriteTransaction {
    pub(crate) fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<LedgerCache>,
        rep_weights: Arc<RepWeightCache>,
        observer: Arc<dyn LedgerObserver>,
        tables: &[Table],
    ) -> Self {
        Self {
            store,
            cache,
            rep_weights,
            observer,
            events: Vec::new(),
            tables: tables.to_vec(),
            batch: WriteBatch::default(),
            cache_delta: LedgerCacheDelta::default(),
            weight_delta: RepWeightDelta::default(),
        }
    }

    /// Returns true if this transaction was opened for writing into `table`
    pub fn contains(&self, table: Table) -> bool {
        self.tables.is_empty() || self.tables.contains(&table)
    }

    pub fn has_changes(&self) -> bool {
        !self.batch.is_empty()
    }

    pub fn commit(mut self) -> anyhow::Result<()> {
        let batch = std::mem::take(&mut self.batch);
        let change_count = batch.len();
        self.store.commit(batch)?;
        self.cache.apply(&self.cache_delta);
        self.rep_weights
            .apply(std::mem::take(&mut self.weight_delta));
        trace!(changes = change_count, "write transaction committed");
        for event in self.events.drain(..) {
            match event {
                LedgerEvent::BlockAdded(block) => self.observer.block_added(&block),
                LedgerEvent::BlockRolledBack(block) => self.observer.block_rolled_back(&block),
                LedgerEvent::BlocksCemented(count) => self.observer.blocks_cemented(count),
            }
        }
        Ok(())
    }

    fn check_table(&self, table: Table) {
        debug_assert!(
            self.contains(table),
            "write transaction not opened for table {:?}",
            table
        );
    }

    pub fn put_account(&mut self, account: Account, info: AccountInfo) {
        self.check_table(Table::Accounts);
        self.batch.accounts.insert(account, Some(info));
    }

    pub fn del_account(&mut self, account: Account) {
        self.check_table(Table::Accounts);
        self.batch.accounts.insert(account, None);
    }

    pub fn put_block(&mut self, block: SavedBlock) {
        self.check_table(Table::Blocks);
        self.batch.blocks.insert(block.hash(), Some(block));
    }

    pub fn del_block(&mut self, hash: BlockHash) {
        self.check_table(Table::Blocks);
        self.batch.blocks.insert(hash, None);
    }

    pub fn put_confirmation_height(&mut self, account: Account, info: ConfirmationHeightInfo) {
        self.check_table(Table::ConfirmationHeight);
        self.batch.confirmation_height.insert(account, Some(info));
    }

    pub fn del_confirmation_height(&mut self, account: Account) {
        self.check_table(Table::ConfirmationHeight);
        self.batch.confirmation_height.insert(account, None);
    }

    pub fn put_pending(&mut self, key: PendingKey, info: PendingInfo) {
        self.check_table(Table::Pending);
        self.batch.pending.insert(key, Some(info));
    }

    pub fn del_pending(&mut self, key: PendingKey) {
        self.check_table(Table::Pending);
        self.batch.pending.insert(key, None);
    }

    pub fn put_pruned(&mut self, hash: BlockHash) {
        self.check_table(Table::Pruned);
        self.batch.pruned.insert(hash, true);
    }

    pub fn put_final_vote(&mut self, root: QualifiedRoot, hash: BlockHash) {
        self.check_table(Table::FinalVotes);
        self.batch.final_votes.insert(root, Some(hash));
    }

    pub(crate) fn cache_delta(&mut self) -> &mut LedgerCacheDelta {
        &mut self.cache_delta
    }

    pub(crate) fn weight_delta(&mut self) -> &mut RepWeightDelta {
        &mut self.weight_delta
    }

    pub(crate) fn block_added(&mut self, block: SavedBlock) {
        self.events.push(LedgerEvent::BlockAdded(block));
    }

    pub(crate) fn block_rolled_back(&mut self, block: SavedBlock) {
        self.events.push(LedgerEvent::BlockRolledBack(block));
    }

    pub(crate) fn blocks_cemented(&mut self, count: u64) {
        if let Some(LedgerEvent::BlocksCemented(pending)) = self.events.last_mut() {
            *pending += count;
        } else {
            self.events.push(LedgerEvent::BlocksCemented(count));
        }
    }
}

impl Transaction for WriteTransaction {
    fn account(&self, account: &Account) -> Option<AccountInfo> {
        match self.batch.accounts.get(account) {
            Some(info) => info.clone(),
            None => self.store.account(account),
        }
    }

    fn accounts_from(&self, start: &Account, count: usize) -> Vec<(Account, AccountInfo)> {
        let mut merged: BTreeMap<Account, AccountInfo> = self
            .store
            .accounts_from(start, count + self.batch.accounts.len())
            .into_iter()
            .collect();

        for (account, info) in self.batch.accounts.range(*start..) {
            match info {
                Some(info) => merged.insert(*account, info.clone()),
                None => merged.remove(account),
            };
        }

        merged.into_iter().take(count).collect()
    }

    fn block(&self, hash: &BlockHash) -> Option<SavedBlock> {
        match self.batch.blocks.get(hash) {
            Some(block) => block.clone(),
            None => self.store.block(hash),
        }
    }

    fn confirmation_height(&self, account: &Account) -> Option<ConfirmationHeightInfo> {
        match self.batch.confirmation_height.get(account) {
            Some(info) => info.clone(),
            None => self.store.confirmation_height(account),
        }
    }

    fn pending(&self, key: &PendingKey) -> Option<PendingInfo> {
        match self.batch.pending.get(key) {
            Some(info) => *info,
            None => self.store.pending(key),
        }
    }

    fn pending_for_account(&self, account: &Account) -> Vec<(PendingKey, PendingInfo)> {
        let mut merged: BTreeMap<PendingKey, PendingInfo> =
            self.store.pending_for_account(account).into_iter().collect();

        let start = PendingKey::new(*account, BlockHash::zero());
        for (key, info) in self
            .batch
            .pending
            .range(start..)
            .take_while(|(key, _)| key.receiving_account == *account)
        {
            match info {
                Some(info) => merged.insert(*key, *info),
                None => merged.remove(key),
            };
        }

        merged.into_iter().collect()
    }

    fn pruned_exists(&self, hash: &BlockHash) -> bool {
        match self.batch.pruned.get(hash) {
            Some(pruned) => *pruned,
            None => self.store.pruned_exists(hash),
        }
    }

    fn final_vote(&self, root: &QualifiedRoot) -> Option<BlockHash> {
        match self.batch.final_votes.get(root) {
            Some(hash) => *hash,
            None => self.store.final_vote(root),
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if !self.batch.is_empty() {
            trace!(
                changes = self.batch.len(),
                "write transaction dropped without commit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryStore, NullLedgerObserver};
    use std::sync::{atomic::Ordering, Mutex};

    fn create_txn(store: &Arc<InMemoryStore>, tables: &[Table]) -> WriteTransaction {
        WriteTransaction::new(
            store.clone(),
            Arc::new(LedgerCache::new()),
            Arc::new(RepWeightCache::new()),
            Arc::new(NullLedgerObserver::new()),
            tables,
        )
    }

    #[derive(Default)]
    struct CementedCounter {
        cemented: Mutex<Vec<u64>>,
    }

    impl LedgerObserver for CementedCounter {
        fn blocks_cemented(&self, cemented_count: u64) {
            self.cemented.lock().unwrap().push(cemented_count);
        }
    }

    #[test]
    fn reads_see_own_writes() {
        let store = Arc::new(InMemoryStore::new());
        let mut txn = create_txn(&store, &[]);
        txn.put_account(Account::from(1), AccountInfo::new_test_instance());
        assert_eq!(
            txn.account(&Account::from(1)),
            Some(AccountInfo::new_test_instance())
        );
        assert_eq!(store.account(&Account::from(1)), None);
    }

    #[test]
    fn drop_discards_changes() {
        let store = Arc::new(InMemoryStore::new());
        let mut txn = create_txn(&store, &[]);
        txn.put_account(Account::from(1), AccountInfo::new_test_instance());
        drop(txn);
        assert_eq!(store.account(&Account::from(1)), None);
    }

    #[test]
    fn commit_applies_counters() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(LedgerCache::new());
        let mut txn = WriteTransaction::new(
            store.clone(),
            cache.clone(),
            Arc::new(RepWeightCache::new()),
            Arc::new(NullLedgerObserver::new()),
            &[],
        );
        txn.cache_delta().block_count += 2;
        txn.commit().unwrap();
        assert_eq!(cache.block_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_commit_keeps_counters() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(LedgerCache::new());
        let mut txn = WriteTransaction::new(
            store.clone(),
            cache.clone(),
            Arc::new(RepWeightCache::new()),
            Arc::new(NullLedgerObserver::new()),
            &[],
        );
        txn.cache_delta().cemented_count += 1;
        txn.put_confirmation_height(Account::from(1), ConfirmationHeightInfo::new_test_instance());
        store.fail_next_commit();
        assert!(txn.commit().is_err());
        assert_eq!(cache.cemented_count.load(Ordering::SeqCst), 0);
        assert_eq!(store.confirmation_height(&Account::from(1)), None);
    }

    #[test]
    fn observer_is_notified_after_commit() {
        let store = Arc::new(InMemoryStore::new());
        let observer = Arc::new(CementedCounter::default());
        let mut txn = WriteTransaction::new(
            store.clone(),
            Arc::new(LedgerCache::new()),
            Arc::new(RepWeightCache::new()),
            observer.clone(),
            &[],
        );
        txn.blocks_cemented(1);
        txn.blocks_cemented(1);
        assert!(observer.cemented.lock().unwrap().is_empty());

        txn.commit().unwrap();
        assert_eq!(*observer.cemented.lock().unwrap(), vec![2]);
    }

    #[test]
    fn failed_commit_does_not_notify_observer() {
        let store = Arc::new(InMemoryStore::new());
        let observer = Arc::new(CementedCounter::default());
        let mut txn = WriteTransaction::new(
            store.clone(),
            Arc::new(LedgerCache::new()),
            Arc::new(RepWeightCache::new()),
            observer.clone(),
            &[],
        );
        txn.put_confirmation_height(Account::from(1), ConfirmationHeightInfo::new_test_instance());
        txn.blocks_cemented(1);
        store.fail_next_commit();

        assert!(txn.commit().is_err());
        assert!(observer.cemented.lock().unwrap().is_empty());
    }

    #[test]
    fn contains_table() {
        let store = Arc::new(InMemoryStore::new());
        let txn = create_txn(&store, &[Table::ConfirmationHeight]);
        assert!(txn.contains(Table::ConfirmationHeight));
        assert!(!txn.contains(Table::Blocks));

        let txn = create_txn(&store, &[]);
        assert!(txn.contains(Table::Blocks));
    }

    #[test]
    fn accounts_from_merges_uncommitted_changes() {
        let store = Arc::new(InMemoryStore::new());
        let mut txn = create_txn(&store, &[]);
        txn.put_account(Account::from(1), AccountInfo::default());
        txn.put_account(Account::from(2), AccountInfo::default());
        txn.commit().unwrap();

        let mut txn = create_txn(&store, &[]);
        txn.del_account(Account::from(1));
        txn.put_account(Account::from(3), AccountInfo::default());
        let accounts: Vec<_> = txn
            .accounts_from(&Account::zero(), 10)
            .into_iter()
            .map(|(a, _)| a)
            .collect();
        assert_eq!(accounts, vec![Account::from(2), Account::from(3)]);
    }
}
