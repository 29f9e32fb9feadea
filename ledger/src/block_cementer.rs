use crate::{Ledger, Transaction, WriteTransaction};
use lattice_core::{BlockHash, ConfirmationHeightInfo, SavedBlock};
use std::collections::VecDeque;

/// Cements blocks in the ledger. Dependencies (previous block and the source
/// of a receive) are always cemented before the blocks that depend on them.
pub(crate) struct BlockCementer<'a> {
    ledger: &'a Ledger,
}

impl<'a> BlockCementer<'a> {
    pub(crate) fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    pub(crate) fn confirm(
        &self,
        txn: &mut WriteTransaction,
        hash: BlockHash,
        max_blocks: usize,
    ) -> Vec<SavedBlock> {
        let mut result = Vec::new();

        let mut stack = VecDeque::new();
        stack.push_back(hash);
        while let Some(&hash) = stack.back() {
            let Some(block) = txn.block(&hash) else {
                // missing dependency, nothing below it can be cemented
                break;
            };

            for dependent in self.ledger.dependent_blocks(&*txn, &block) {
                if !dependent.is_zero() && !self.ledger.block_confirmed(&*txn, &dependent) {
                    stack.push_back(dependent);

                    // Limit the stack size to avoid excessive memory usage
                    // This will forget the bottom of the dependency tree
                    if stack.len() > max_blocks {
                        stack.pop_front();
                    }
                }
            }

            if stack.back() == Some(&hash) {
                stack.pop_back();
                if !self.ledger.block_confirmed(&*txn, &hash) {
                    // We must only confirm blocks that have their dependencies confirmed
                    let conf_height = ConfirmationHeightInfo::new(block.height(), block.hash());
                    txn.put_confirmation_height(block.account, conf_height);
                    txn.cache_delta().cemented_count += 1;
                    txn.blocks_cemented(1);
                    result.push(block);
                }
            }

            // Early return might leave parts of the dependency tree unconfirmed
            if result.len() >= max_blocks {
                break;
            }
        }
        result
    }
}
