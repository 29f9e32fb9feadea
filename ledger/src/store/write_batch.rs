use lattice_core::{
    Account, AccountInfo, BlockHash, ConfirmationHeightInfo, PendingInfo, PendingKey,
    QualifiedRoot, SavedBlock,
};
use std::collections::{BTreeMap, HashMap};

/// Uncommitted changes of a write transaction. `None` marks a deletion.
#[derive(Default, Clone)]
pub struct WriteBatch {
    pub accounts: BTreeMap<Account, Option<AccountInfo>>,
    pub blocks: HashMap<BlockHash, Option<SavedBlock>>,
    pub confirmation_height: HashMap<Account, Option<ConfirmationHeightInfo>>,
    pub pending: BTreeMap<PendingKey, Option<PendingInfo>>,
    pub pruned: HashMap<BlockHash, bool>,
    pub final_votes: HashMap<QualifiedRoot, Option<BlockHash>>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.blocks.is_empty()
            && self.confirmation_height.is_empty()
            && self.pending.is_empty()
            && self.pruned.is_empty()
            && self.final_votes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
            + self.blocks.len()
            + self.confirmation_height.len()
            + self.pending.len()
            + self.pruned.len()
            + self.final_votes.len()
    }
}
