mod hinted;
mod manual;
mod optimistic;
mod priority;

pub use hinted::*;
pub use manual::*;
pub use optimistic::*;
pub use priority::*;

use super::{ActiveElections, VoteCache};
use crate::{
    config::{NetworkParams, NodeConfig},
    representatives::OnlineReps,
    stats::Stats,
};
use lattice_core::{
    utils::ContainerInfo, Account, AccountInfo, Block, ConfirmationHeightInfo, SavedBlock,
};
use lattice_ledger::{Ledger, Transaction};
use lattice_output_tracker::{OutputListenerMt, OutputTrackerMt};
use std::sync::{Arc, Mutex};

/// Owns all election schedulers. The schedulers compete for the free slots
/// of the active elections container on a first come first served basis.
pub struct ElectionSchedulers {
    pub priority: Arc<PriorityScheduler>,
    pub optimistic: Arc<OptimisticScheduler>,
    pub hinted: Arc<HintedScheduler>,
    pub manual: Arc<ManualScheduler>,
    notify_listener: OutputListenerMt<()>,
}

impl ElectionSchedulers {
    pub fn new(
        config: &NodeConfig,
        network: &NetworkParams,
        active_elections: Arc<ActiveElections>,
        ledger: Arc<Ledger>,
        stats: Arc<Stats>,
        vote_cache: Arc<Mutex<VoteCache>>,
        online_reps: Arc<Mutex<OnlineReps>>,
    ) -> Self {
        let hinted = Arc::new(HintedScheduler::new(
            config.hinted_scheduler.clone(),
            active_elections.clone(),
            ledger.clone(),
            stats.clone(),
            vote_cache,
            online_reps,
        ));

        let manual = Arc::new(ManualScheduler::new(
            stats.clone(),
            active_elections.clone(),
        ));

        let optimistic = Arc::new(OptimisticScheduler::new(
            config.optimistic_scheduler.clone(),
            network.node.optimistic_activation_delay,
            stats.clone(),
            active_elections.clone(),
            ledger.clone(),
        ));

        let priority = Arc::new(PriorityScheduler::new(ledger, stats, active_elections));

        Self {
            priority,
            optimistic,
            hinted,
            manual,
            notify_listener: OutputListenerMt::new(),
        }
    }

    pub fn activate_successors(&self, txn: &dyn Transaction, block: &SavedBlock) {
        self.priority.activate_successors(txn, block);
    }

    /// Called by backlog population for accounts with unconfirmed blocks
    pub fn activate_backlog(
        &self,
        txn: &dyn Transaction,
        account: &Account,
        account_info: &AccountInfo,
        conf_info: &ConfirmationHeightInfo,
    ) {
        self.optimistic.activate(account, account_info, conf_info);
        self.priority
            .activate_with_info(txn, account, account_info, conf_info);
    }

    pub fn activate(&self, txn: &dyn Transaction, account: &Account) -> bool {
        self.priority.activate(txn, account)
    }

    /// Called when election slots became free
    pub fn notify(&self) {
        self.notify_listener.emit(());
        self.hinted.notify();
        self.optimistic.notify();
    }

    pub fn track_notify(&self) -> Arc<OutputTrackerMt<()>> {
        self.notify_listener.track()
    }

    pub fn add_manual(&self, block: Arc<Block>) {
        self.manual.push(block);
    }

    pub fn start(&self) {
        self.hinted.start();
        self.manual.start();
        self.optimistic.start();
    }

    pub fn stop(&self) {
        self.hinted.stop();
        self.manual.stop();
        self.optimistic.stop();
    }

    pub fn container_info(&self) -> ContainerInfo {
        ContainerInfo::builder()
            .node("hinted", self.hinted.container_info())
            .node("manual", self.manual.container_info())
            .node("optimistic", self.optimistic.container_info())
            .finish()
    }
}
