mod validator;

use crate::{Ledger, Transaction, WriteTransaction};
use lattice_core::{
    utils::seconds_since_epoch, Account, AccountInfo, Block, BlockSideband, PendingInfo,
    PendingKey, SavedBlock,
};
pub(crate) use validator::BlockValidator;

/// Describes how the ledger has to be updated to insert a validated block
pub(crate) struct BlockInsertInstructions {
    pub account: Account,
    pub old_account_info: Option<AccountInfo>,
    pub set_account_info: AccountInfo,
    pub delete_pending: Option<PendingKey>,
    pub insert_pending: Option<(PendingKey, PendingInfo)>,
    pub set_sideband: BlockSideband,
}

/// Looks up everything the validator needs to know about a block
pub(crate) struct BlockValidatorFactory<'a> {
    ledger: &'a Ledger,
    txn: &'a dyn Transaction,
    block: &'a Block,
}

impl<'a> BlockValidatorFactory<'a> {
    pub(crate) fn new(ledger: &'a Ledger, txn: &'a dyn Transaction, block: &'a Block) -> Self {
        Self { ledger, txn, block }
    }

    pub(crate) fn create_validator(&self) -> BlockValidator<'a> {
        let hash = self.block.hash();
        let previous_block = if self.block.is_open() {
            None
        } else {
            self.txn.block(&self.block.previous)
        };
        let pending_key = PendingKey::for_receive_block(self.block);

        BlockValidator {
            block: self.block,
            block_exists: self.ledger.block_exists_or_pruned(self.txn, &hash),
            previous_block,
            old_account_info: self.txn.account(&self.block.account),
            pending_receive_info: if self.block.link.is_zero() {
                None
            } else {
                self.txn.pending(&pending_key)
            },
            source_block_exists: !self.block.link.is_zero()
                && self
                    .ledger
                    .block_exists_or_pruned(self.txn, &self.block.link_as_hash()),
            burn_account: self.ledger.constants.burn_account,
            seconds_since_epoch: seconds_since_epoch(),
        }
    }
}

/// Inserts a validated block into the ledger
pub(crate) struct BlockInserter<'a> {
    ledger: &'a Ledger,
    txn: &'a mut WriteTransaction,
    block: &'a Block,
    instructions: BlockInsertInstructions,
}

impl<'a> BlockInserter<'a> {
    pub(crate) fn new(
        ledger: &'a Ledger,
        txn: &'a mut WriteTransaction,
        block: &'a Block,
        instructions: BlockInsertInstructions,
    ) -> Self {
        Self {
            ledger,
            txn,
            block,
            instructions,
        }
    }

    pub(crate) fn insert(mut self) -> SavedBlock {
        let saved = SavedBlock::new(self.block.clone(), self.instructions.set_sideband.clone());
        self.set_successor_of_previous();
        self.txn.put_block(saved.clone());

        if let Some(key) = self.instructions.delete_pending {
            self.txn.del_pending(key);
        }
        if let Some((key, info)) = self.instructions.insert_pending {
            self.txn.put_pending(key, info);
        }

        let (old_rep, old_balance) = match &self.instructions.old_account_info {
            Some(info) => (info.representative, info.balance),
            None => (self.block.representative, Default::default()),
        };
        self.txn.weight_delta().move_weight(
            old_rep,
            old_balance,
            self.block.representative,
            self.block.balance,
        );

        self.txn.put_account(
            self.instructions.account,
            self.instructions.set_account_info.clone(),
        );
        if self.instructions.old_account_info.is_none() {
            self.txn.cache_delta().account_count += 1;
        }
        self.txn.cache_delta().block_count += 1;
        self.txn.block_added(saved.clone());
        saved
    }

    fn set_successor_of_previous(&mut self) {
        if self.block.is_open() {
            return;
        }
        if let Some(mut previous) = self.txn.block(&self.block.previous) {
            previous.set_successor(self.block.hash());
            self.txn.put_block(previous);
        }
    }
}
