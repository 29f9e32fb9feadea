use super::{LedgerStore, WriteBatch};
use lattice_core::{
    Account, AccountInfo, BlockHash, ConfirmationHeightInfo, PendingInfo, PendingKey,
    QualifiedRoot, SavedBlock,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        RwLock,
    },
};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<Account, AccountInfo>,
    blocks: HashMap<BlockHash, SavedBlock>,
    confirmation_height: HashMap<Account, ConfirmationHeightInfo>,
    pending: BTreeMap<PendingKey, PendingInfo>,
    pruned: HashSet<BlockHash>,
    final_votes: HashMap<QualifiedRoot, BlockHash>,
}

impl Tables {
    fn apply(&mut self, batch: WriteBatch) {
        for (account, info) in batch.accounts {
            match info {
                Some(info) => self.accounts.insert(account, info),
                None => self.accounts.remove(&account),
            };
        }
        for (hash, block) in batch.blocks {
            match block {
                Some(block) => self.blocks.insert(hash, block),
                None => self.blocks.remove(&hash),
            };
        }
        for (account, info) in batch.confirmation_height {
            match info {
                Some(info) => self.confirmation_height.insert(account, info),
                None => self.confirmation_height.remove(&account),
            };
        }
        for (key, info) in batch.pending {
            match info {
                Some(info) => self.pending.insert(key, info),
                None => self.pending.remove(&key),
            };
        }
        for (hash, pruned) in batch.pruned {
            if pruned {
                self.pruned.insert(hash);
            } else {
                self.pruned.remove(&hash);
            }
        }
        for (root, hash) in batch.final_votes {
            match hash {
                Some(hash) => self.final_votes.insert(root, hash),
                None => self.final_votes.remove(&root),
            };
        }
    }
}

/// Ledger storage that lives in memory only
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_next_commit: AtomicBool,
    commit_count: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// The next call to `commit` fails without applying any change
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commit_count.load(Ordering::SeqCst)
    }
}

impl LedgerStore for InMemoryStore {
    fn account(&self, account: &Account) -> Option<AccountInfo> {
        self.tables.read().unwrap().accounts.get(account).cloned()
    }

    fn accounts_from(&self, start: &Account, count: usize) -> Vec<(Account, AccountInfo)> {
        self.tables
            .read()
            .unwrap()
            .accounts
            .range(*start..)
            .take(count)
            .map(|(account, info)| (*account, info.clone()))
            .collect()
    }

    fn block(&self, hash: &BlockHash) -> Option<SavedBlock> {
        self.tables.read().unwrap().blocks.get(hash).cloned()
    }

    fn confirmation_height(&self, account: &Account) -> Option<ConfirmationHeightInfo> {
        self.tables
            .read()
            .unwrap()
            .confirmation_height
            .get(account)
            .cloned()
    }

    fn pending(&self, key: &PendingKey) -> Option<PendingInfo> {
        self.tables.read().unwrap().pending.get(key).cloned()
    }

    fn pending_for_account(&self, account: &Account) -> Vec<(PendingKey, PendingInfo)> {
        let start = PendingKey::new(*account, BlockHash::zero());
        self.tables
            .read()
            .unwrap()
            .pending
            .range(start..)
            .take_while(|(key, _)| key.receiving_account == *account)
            .map(|(key, info)| (*key, *info))
            .collect()
    }

    fn pruned_exists(&self, hash: &BlockHash) -> bool {
        self.tables.read().unwrap().pruned.contains(hash)
    }

    fn final_vote(&self, root: &QualifiedRoot) -> Option<BlockHash> {
        self.tables.read().unwrap().final_votes.get(root).cloned()
    }

    fn pruned_count(&self) -> u64 {
        self.tables.read().unwrap().pruned.len() as u64
    }

    fn is_empty(&self) -> bool {
        self.tables.read().unwrap().blocks.is_empty()
    }

    fn commit(&self, batch: WriteBatch) -> anyhow::Result<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            bail!("commit failed");
        }
        self.tables.write().unwrap().apply(batch);
        self.commit_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
