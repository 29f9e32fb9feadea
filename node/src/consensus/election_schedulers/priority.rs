use crate::{
    consensus::{ActiveElections, ActiveElectionsExt, ElectionBehavior, InsertError},
    stats::{DetailType, StatType, Stats},
};
use lattice_core::{Account, AccountInfo, ConfirmationHeightInfo, SavedBlock};
use lattice_ledger::{Ledger, Transaction};
use std::sync::Arc;
use tracing::trace;

/// Starts elections for the first unconfirmed block of an account
pub struct PriorityScheduler {
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    active: Arc<ActiveElections>,
}

impl PriorityScheduler {
    pub fn new(ledger: Arc<Ledger>, stats: Arc<Stats>, active: Arc<ActiveElections>) -> Self {
        Self {
            ledger,
            stats,
            active,
        }
    }

    /// Returns true if a new election was started
    pub fn activate(&self, txn: &dyn Transaction, account: &Account) -> bool {
        debug_assert!(!account.is_zero());
        match self.ledger.first_unconfirmed(txn, account) {
            Some(block) => self.activate_block(txn, account, block),
            None => {
                self.stats
                    .inc(StatType::ElectionScheduler, DetailType::ActivateSkip);
                false
            }
        }
    }

    pub fn activate_with_info(
        &self,
        txn: &dyn Transaction,
        account: &Account,
        account_info: &AccountInfo,
        conf_info: &ConfirmationHeightInfo,
    ) -> bool {
        if conf_info.height >= account_info.block_count {
            self.stats
                .inc(StatType::ElectionScheduler, DetailType::ActivateSkip);
            return false;
        }

        let block = if conf_info.height == 0 {
            self.ledger.get_block(txn, &account_info.open_block)
        } else {
            self.ledger
                .get_block(txn, &conf_info.frontier)
                .and_then(|frontier| frontier.successor())
                .and_then(|successor| self.ledger.get_block(txn, &successor))
        };

        match block {
            Some(block) => self.activate_block(txn, account, block),
            None => {
                self.stats
                    .inc(StatType::ElectionScheduler, DetailType::ActivateFailed);
                false
            }
        }
    }

    fn activate_block(&self, txn: &dyn Transaction, account: &Account, block: SavedBlock) -> bool {
        if self.active.active_root(&block.qualified_root()) {
            self.stats
                .inc(StatType::ElectionScheduler, DetailType::ActivateSkip);
            return false;
        }

        if !self.ledger.dependents_confirmed(txn, &block) {
            self.stats
                .inc(StatType::ElectionScheduler, DetailType::ActivateFailed);
            return false;
        }

        let hash = block.hash();
        match self
            .active
            .insert(&Arc::new(block.into_block()), ElectionBehavior::Priority)
        {
            Ok(insertion) if insertion.inserted => {
                self.stats
                    .inc(StatType::ElectionScheduler, DetailType::Activated);
                trace!(%account, %hash, "block activated");
                true
            }
            Ok(_) => {
                self.stats
                    .inc(StatType::ElectionScheduler, DetailType::ActivateSkip);
                false
            }
            Err(InsertError::CapacityExceeded) => {
                self.stats
                    .inc(StatType::ElectionScheduler, DetailType::ActivateFull);
                false
            }
            Err(_) => {
                self.stats
                    .inc(StatType::ElectionScheduler, DetailType::ActivateFailed);
                false
            }
        }
    }

    /// Continues with the next blocks after a block was cemented
    pub fn activate_successors(&self, txn: &dyn Transaction, block: &SavedBlock) {
        self.activate(txn, &block.account);

        // Start or vote for the next unconfirmed block in the destination account
        if let Some(destination) = block.destination() {
            if block.is_send() && !destination.is_zero() && destination != block.account {
                self.activate(txn, &destination);
            }
        }
    }
}
