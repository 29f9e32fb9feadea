mod in_memory_store;
mod write_batch;

pub use in_memory_store::InMemoryStore;
pub use write_batch::WriteBatch;

use lattice_core::{
    Account, AccountInfo, BlockHash, ConfirmationHeightInfo, PendingInfo, PendingKey,
    QualifiedRoot, SavedBlock,
};
use serde::Serialize;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Accounts,
    Blocks,
    ConfirmationHeight,
    Pending,
    Pruned,
    FinalVotes,
}

/// Storage capability the ledger is built on. Reads see committed data only,
/// writes are applied atomically through `commit`.
pub trait LedgerStore: Send + Sync {
    fn account(&self, account: &Account) -> Option<AccountInfo>;

    /// Accounts in ascending order, starting at `start` (inclusive)
    fn accounts_from(&self, start: &Account, count: usize) -> Vec<(Account, AccountInfo)>;

    fn block(&self, hash: &BlockHash) -> Option<SavedBlock>;

    fn confirmation_height(&self, account: &Account) -> Option<ConfirmationHeightInfo>;

    fn pending(&self, key: &PendingKey) -> Option<PendingInfo>;

    /// Receivable entries of an account, in ascending send hash order
    fn pending_for_account(&self, account: &Account) -> Vec<(PendingKey, PendingInfo)>;

    fn pruned_exists(&self, hash: &BlockHash) -> bool;

    fn final_vote(&self, root: &QualifiedRoot) -> Option<BlockHash>;

    fn pruned_count(&self) -> u64;

    fn is_empty(&self) -> bool;

    fn commit(&self, batch: WriteBatch) -> anyhow::Result<()>;
}
