use super::rollback_planner::RollbackInstructions;
use crate::{Transaction, WriteTransaction};

/// Updates the ledger according to the RollbackInstructions
pub(crate) struct RollbackInstructionsExecutor<'a> {
    txn: &'a mut WriteTransaction,
    instructions: &'a RollbackInstructions,
}

impl<'a> RollbackInstructionsExecutor<'a> {
    pub(crate) fn new(txn: &'a mut WriteTransaction, instructions: &'a RollbackInstructions) -> Self {
        Self {
            txn,
            instructions,
        }
    }

    pub(crate) fn execute(&mut self) {
        self.update_pending_table();
        self.update_account_table();
        self.update_block_table();
        self.roll_back_representative_weight();
        self.txn.cache_delta().block_count -= 1;
        self.txn.block_rolled_back(self.instructions.block.clone());
    }

    fn update_block_table(&mut self) {
        self.txn.del_block(self.instructions.block.hash());

        if let Some(hash) = self.instructions.clear_successor {
            if let Some(mut previous) = self.txn.block(&hash) {
                previous.set_successor(Default::default());
                self.txn.put_block(previous);
            }
        }
    }

    fn update_account_table(&mut self) {
        match &self.instructions.set_account_info {
            Some(info) => self.txn.put_account(self.instructions.account, info.clone()),
            None => {
                self.txn.del_account(self.instructions.account);
                self.txn.cache_delta().account_count -= 1;
            }
        }
    }

    fn update_pending_table(&mut self) {
        if let Some(pending_key) = &self.instructions.remove_pending {
            self.txn.del_pending(*pending_key);
        }
        if let Some((key, info)) = &self.instructions.add_pending {
            self.txn.put_pending(*key, *info);
        }
    }

    fn roll_back_representative_weight(&mut self) {
        let old_info = &self.instructions.old_account_info;
        self.txn.weight_delta().move_weight(
            old_info.representative,
            old_info.balance,
            self.instructions.new_representative,
            self.instructions.new_balance,
        );
    }
}
