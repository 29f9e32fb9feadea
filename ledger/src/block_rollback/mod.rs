mod instructions_executor;
mod rollback_planner;

use crate::{Ledger, Transaction, WriteTransaction};
use instructions_executor::RollbackInstructionsExecutor;
use lattice_core::{utils::seconds_since_epoch, BlockHash, PendingKey, SavedBlock};
use rollback_planner::{RollbackPlanner, RollbackStep};

/// Rolls back blocks from the head of an account until the target block is removed.
/// Sends that were already received cause the receiving chain to be rolled back first.
pub(crate) struct BlockRollbackPerformer<'a> {
    ledger: &'a Ledger,
    txn: &'a mut WriteTransaction,
    rolled_back: Vec<SavedBlock>,
}

impl<'a> BlockRollbackPerformer<'a> {
    pub(crate) fn new(ledger: &'a Ledger, txn: &'a mut WriteTransaction) -> Self {
        Self {
            ledger,
            txn,
            rolled_back: Vec::new(),
        }
    }

    pub(crate) fn roll_back(mut self, block_hash: &BlockHash) -> anyhow::Result<Vec<SavedBlock>> {
        self.roll_back_recursive(block_hash)?;
        Ok(self.rolled_back)
    }

    fn roll_back_recursive(&mut self, block_hash: &BlockHash) -> anyhow::Result<()> {
        let block = self.load_block(block_hash)?;
        while self.txn.block(block_hash).is_some() {
            let planner = self.create_planner(&block)?;
            match planner.roll_back_head_block()? {
                RollbackStep::RollBackBlock(instructions) => {
                    RollbackInstructionsExecutor::new(self.txn, &instructions)
                        .execute();
                    self.rolled_back.push(instructions.block);
                }
                RollbackStep::RequestDependencyRollback(hash) => {
                    self.roll_back_recursive(&hash)?
                }
            }
        }
        Ok(())
    }

    fn create_planner(&self, block: &SavedBlock) -> anyhow::Result<RollbackPlanner> {
        let account_info = self
            .txn
            .account(&block.account)
            .ok_or_else(|| anyhow!("account not found"))?;
        let head_block = self.load_block(&account_info.head)?;

        let previous = if head_block.previous.is_zero() {
            None
        } else {
            Some(self.load_block(&head_block.previous)?)
        };

        let linked_account = head_block
            .source()
            .and_then(|source| self.txn.block(&source))
            .map(|b| b.account)
            .unwrap_or_default();

        let (pending_receive, latest_block_for_destination) = match head_block.destination() {
            Some(destination) => (
                self.txn
                    .pending(&PendingKey::new(destination, head_block.hash())),
                self.txn.account(&destination).map(|i| i.head),
            ),
            None => (None, None),
        };

        Ok(RollbackPlanner {
            confirmation_height: self
                .txn
                .confirmation_height(&head_block.account)
                .unwrap_or_default(),
            head_block,
            current_account_info: account_info,
            previous,
            linked_account,
            pending_receive,
            latest_block_for_destination,
            seconds_since_epoch: seconds_since_epoch(),
        })
    }

    fn load_block(&self, hash: &BlockHash) -> anyhow::Result<SavedBlock> {
        self.txn
            .block(hash)
            .ok_or_else(|| anyhow!("block not found: {}", hash))
    }
}
