use super::{DetailType, Direction, StatType, Stats};
use lattice_core::SavedBlock;
use lattice_ledger::LedgerObserver;
use std::sync::Arc;

/// Counts ledger events
pub struct LedgerStats {
    stats: Arc<Stats>,
}

impl LedgerStats {
    pub fn new(stats: Arc<Stats>) -> Self {
        Self { stats }
    }
}

impl LedgerObserver for LedgerStats {
    fn blocks_cemented(&self, cemented_count: u64) {
        self.stats.add_dir(
            StatType::ConfirmationHeight,
            DetailType::BlocksConfirmed,
            Direction::In,
            cemented_count,
        );
    }

    fn block_rolled_back(&self, block: &SavedBlock) {
        self.stats.inc(StatType::Rollback, block.subtype().into());
    }

    fn block_added(&self, block: &SavedBlock) {
        self.stats.inc(StatType::Ledger, block.subtype().into());
    }
}
