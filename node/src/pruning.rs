use crate::{
    config::{NodeConfig, NodeFlags},
    stats::{DetailType, StatType, Stats},
    utils::ThreadPool,
};
use lattice_core::{utils::seconds_since_epoch, Account, BlockHash};
use lattice_ledger::{Ledger, Transaction, Writer};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, warn};

const DEFAULT_BATCH_SIZE: u64 = 2 * 1024;

/// Removes deeply cemented blocks from the block table. Only their hashes stay
/// known as pruned.
pub struct LedgerPruning {
    config: NodeConfig,
    flags: NodeFlags,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    stopped: AtomicBool,
    workers: Arc<dyn ThreadPool>,
}

impl LedgerPruning {
    pub fn new(
        config: NodeConfig,
        flags: NodeFlags,
        ledger: Arc<Ledger>,
        stats: Arc<Stats>,
        workers: Arc<dyn ThreadPool>,
    ) -> Self {
        Self {
            config,
            flags,
            ledger,
            stats,
            workers,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Prunes up to `batch_size` blocks per write transaction until no
    /// pruning targets are left. Returns the number of pruned blocks.
    pub fn ledger_pruning(&self, batch_size: u64) -> u64 {
        let batch_size = batch_size.max(1);
        let max_depth = if self.config.max_pruning_depth != 0 {
            self.config.max_pruning_depth
        } else {
            u64::MAX
        };
        let cutoff_time =
            seconds_since_epoch().saturating_sub(self.config.max_pruning_age.as_secs());

        let mut pruned_count = 0;
        let mut transaction_write_count = 0;
        // 0 Burn account is never opened. So it can be used to break loop
        let mut last_account = Account::from(1);
        let mut pruning_targets = VecDeque::new();
        let mut target_finished = false;
        while (transaction_write_count != 0 || !target_finished) && !self.stopped() {
            // Search pruning targets
            while pruning_targets.len() < batch_size as usize
                && !target_finished
                && !self.stopped()
            {
                target_finished = self.collect_ledger_pruning_targets(
                    &mut pruning_targets,
                    &mut last_account,
                    batch_size * 2,
                    max_depth,
                    cutoff_time,
                );
            }

            // Pruning write operation
            transaction_write_count = 0;
            if !pruning_targets.is_empty() && !self.stopped() {
                let _write_guard = self.ledger.write_queue.wait(Writer::Pruning);
                let mut txn = self.ledger.rw_txn();
                while transaction_write_count < batch_size && !self.stopped() {
                    let Some(pruning_hash) = pruning_targets.pop_front() else {
                        break;
                    };
                    transaction_write_count += self.ledger.pruning_action(&mut txn, &pruning_hash);
                }
                if let Err(e) = txn.commit() {
                    warn!("Pruning batch failed: {:?}", e);
                    break;
                }
                pruned_count += transaction_write_count;
                self.stats
                    .inc(StatType::Pruning, DetailType::PruningBatch);
                self.stats.add(
                    StatType::Pruning,
                    DetailType::Pruned,
                    transaction_write_count,
                );
                debug!("Pruned blocks: {}", pruned_count);
            }
        }

        debug!("Total recently pruned block count: {}", pruned_count);
        pruned_count
    }

    /// Walks the confirmed chains starting at `last_account` and collects the
    /// first block below `max_depth` or `cutoff_time` of each chain. Returns
    /// true if all accounts were visited.
    pub fn collect_ledger_pruning_targets(
        &self,
        pruning_targets: &mut VecDeque<BlockHash>,
        last_account: &mut Account,
        batch_read_size: u64,
        max_depth: u64,
        cutoff_time: u64,
    ) -> bool {
        let mut read_operations = 0;
        let txn = self.ledger.read_txn();
        let accounts = txn.accounts_from(last_account, batch_read_size as usize);
        let exhausted = (accounts.len() as u64) < batch_read_size;

        for (account, _) in &accounts {
            read_operations += 1;
            let conf_info = self.ledger.confirmation_height(&txn, account);
            let mut hash = conf_info.frontier;
            let mut depth = 0;
            while !hash.is_zero() && depth < max_depth {
                match self.ledger.get_block(&txn, &hash) {
                    Some(block) => {
                        if block.timestamp() > cutoff_time || depth == 0 {
                            hash = block.previous;
                        } else {
                            break;
                        }
                    }
                    None => {
                        // the rest of the chain was pruned already
                        hash = BlockHash::zero();
                    }
                }
                depth += 1;
            }
            if !hash.is_zero() && self.ledger.block_exists(&txn, &hash) {
                pruning_targets.push_back(hash);
            }
            read_operations += depth;
            if read_operations >= batch_read_size {
                match account.inc() {
                    Some(next) => {
                        *last_account = next;
                        return false;
                    }
                    None => return true,
                }
            }
        }

        match accounts.last() {
            Some((account, _)) if !exhausted => match account.inc() {
                Some(next) => {
                    *last_account = next;
                    false
                }
                None => true,
            },
            _ => true,
        }
    }
}

pub trait LedgerPruningExt {
    fn start(&self);
    fn ongoing_ledger_pruning(&self);
}

impl LedgerPruningExt for Arc<LedgerPruning> {
    fn start(&self) {
        if !self.flags.enable_pruning {
            return;
        }
        let self_w = Arc::downgrade(self);
        self.workers.push_task(Box::new(move || {
            if let Some(self_l) = self_w.upgrade() {
                self_l.ongoing_ledger_pruning();
            }
        }));
    }

    fn ongoing_ledger_pruning(&self) {
        if self.stopped() {
            return;
        }
        self.ledger_pruning(DEFAULT_BATCH_SIZE);
        let ledger_pruning_interval = std::cmp::min(
            self.config.max_pruning_age,
            Duration::from_secs(15 * 60),
        );
        let self_w = Arc::downgrade(self);
        self.workers.add_delayed_task(
            ledger_pruning_interval,
            Box::new(move || {
                if let Some(self_l) = self_w.upgrade() {
                    self_l.ongoing_ledger_pruning()
                }
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ThreadPoolImpl;
    use lattice_core::Amount;
    use lattice_ledger::{LedgerContext, DEV_GENESIS_HASH};
    use tracing_test::traced_test;

    fn create(ctx: &LedgerContext, config: NodeConfig) -> LedgerPruning {
        LedgerPruning::new(
            config,
            NodeFlags {
                enable_pruning: true,
                ..Default::default()
            },
            ctx.ledger.clone(),
            Arc::new(Stats::default()),
            Arc::new(ThreadPoolImpl::new(1, "Worker")),
        )
    }

    #[test]
    #[traced_test]
    fn prunes_cemented_blocks_below_frontier() {
        let ctx = LedgerContext::empty();
        ctx.ledger.enable_pruning();
        let genesis = ctx.genesis_block_factory();
        let send1 = genesis.send(&ctx.ledger.read_txn(), 1000, Amount::raw(1));
        ctx.process(&send1).unwrap();
        let send2 = genesis.send(&ctx.ledger.read_txn(), 1000, Amount::raw(1));
        ctx.process(&send2).unwrap();
        ctx.confirm(send2.hash());

        let mut config = NodeConfig::new_test_instance();
        config.max_pruning_age = Duration::ZERO;
        let pruning = create(&ctx, config);

        let pruned = pruning.ledger_pruning(10);

        assert_eq!(pruned, 1);
        assert_eq!(ctx.ledger.pruned_count(), 1);
        let txn = ctx.ledger.read_txn();
        assert!(!ctx.ledger.block_exists(&txn, &send1.hash()));
        assert!(ctx.ledger.block_exists_or_pruned(&txn, &send1.hash()));
        assert!(ctx.ledger.block_exists(&txn, &send2.hash()));
        // genesis is never pruned
        assert!(ctx.ledger.block_exists(&txn, &DEV_GENESIS_HASH));
        assert!(logs_contain("Pruned blocks: 1"));
    }

    #[test]
    fn unconfirmed_blocks_are_kept() {
        let ctx = LedgerContext::empty();
        ctx.ledger.enable_pruning();
        let genesis = ctx.genesis_block_factory();
        let send1 = genesis.send(&ctx.ledger.read_txn(), 1000, Amount::raw(1));
        ctx.process(&send1).unwrap();
        let send2 = genesis.send(&ctx.ledger.read_txn(), 1000, Amount::raw(1));
        ctx.process(&send2).unwrap();

        let mut config = NodeConfig::new_test_instance();
        config.max_pruning_age = Duration::ZERO;
        let pruning = create(&ctx, config);

        assert_eq!(pruning.ledger_pruning(10), 0);
        assert!(ctx
            .ledger
            .block_exists(&ctx.ledger.read_txn(), &send1.hash()));
    }

    #[test]
    fn young_blocks_are_kept() {
        let ctx = LedgerContext::empty();
        ctx.ledger.enable_pruning();
        let genesis = ctx.genesis_block_factory();
        let send1 = genesis.send(&ctx.ledger.read_txn(), 1000, Amount::raw(1));
        ctx.process(&send1).unwrap();
        let send2 = genesis.send(&ctx.ledger.read_txn(), 1000, Amount::raw(1));
        ctx.process(&send2).unwrap();
        ctx.confirm(send2.hash());

        let mut config = NodeConfig::new_test_instance();
        config.max_pruning_age = Duration::from_secs(60 * 60);
        let pruning = create(&ctx, config);

        assert_eq!(pruning.ledger_pruning(10), 0);
    }
}
