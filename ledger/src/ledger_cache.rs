use std::sync::atomic::{AtomicU64, Ordering};

/// In memory counters derived from the ledger content
#[derive(Default)]
pub struct LedgerCache {
    pub cemented_count: AtomicU64,
    pub block_count: AtomicU64,
    pub pruned_count: AtomicU64,
    pub account_count: AtomicU64,
}

impl LedgerCache {
    pub fn new() -> Self {
        Default::default()
    }

    pub(crate) fn apply(&self, delta: &LedgerCacheDelta) {
        apply_delta(&self.cemented_count, delta.cemented_count);
        apply_delta(&self.block_count, delta.block_count);
        apply_delta(&self.pruned_count, delta.pruned_count);
        apply_delta(&self.account_count, delta.account_count);
    }
}

fn apply_delta(counter: &AtomicU64, delta: i64) {
    if delta >= 0 {
        counter.fetch_add(delta as u64, Ordering::SeqCst);
    } else {
        counter.fetch_sub(delta.unsigned_abs(), Ordering::SeqCst);
    }
}

/// Counter changes of a write transaction that are applied on commit
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct LedgerCacheDelta {
    pub cemented_count: i64,
    pub block_count: i64,
    pub pruned_count: i64,
    pub account_count: i64,
}
