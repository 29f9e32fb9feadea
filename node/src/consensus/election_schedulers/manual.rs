use crate::{
    consensus::{ActiveElections, ActiveElectionsExt, ElectionBehavior},
    stats::{DetailType, StatType, Stats},
};
use lattice_core::{utils::ContainerInfo, Block};
use std::{
    collections::VecDeque,
    mem::size_of,
    sync::{Arc, Condvar, Mutex},
    thread::JoinHandle,
};
use tracing::debug;

/// Starts elections on explicit request. Manual elections skip the passive phase.
pub struct ManualScheduler {
    thread: Mutex<Option<JoinHandle<()>>>,
    condition: Condvar,
    mutex: Mutex<ManualSchedulerData>,
    stats: Arc<Stats>,
    active: Arc<ActiveElections>,
}

impl ManualScheduler {
    pub fn new(stats: Arc<Stats>, active: Arc<ActiveElections>) -> Self {
        Self {
            thread: Mutex::new(None),
            condition: Condvar::new(),
            stats,
            active,
            mutex: Mutex::new(ManualSchedulerData {
                queue: VecDeque::new(),
                stopped: false,
            }),
        }
    }

    pub fn stop(&self) {
        self.mutex.lock().unwrap().stopped = true;
        self.notify();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    pub fn notify(&self) {
        self.condition.notify_all();
    }

    pub fn push(&self, block: Arc<Block>) {
        self.mutex.lock().unwrap().queue.push_back(block);
        self.notify();
    }

    pub fn len(&self) -> usize {
        self.mutex.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn run(&self) {
        let mut guard = self.mutex.lock().unwrap();
        while !guard.stopped {
            guard = self
                .condition
                .wait_while(guard, |g| !g.stopped && g.queue.is_empty())
                .unwrap();

            if guard.stopped {
                break;
            }
            self.stats
                .inc(StatType::ManualScheduler, DetailType::Loop);

            if let Some(block) = guard.queue.pop_front() {
                drop(guard);
                match self.active.insert(&block, ElectionBehavior::Manual) {
                    Ok(insertion) => {
                        self.stats.inc(StatType::ManualScheduler, DetailType::Insert);
                        insertion.election.transition_active();
                    }
                    Err(error) => {
                        self.stats
                            .inc(StatType::ManualScheduler, DetailType::InsertFailed);
                        debug!(hash = %block.hash(), ?error, "manual election not started");
                    }
                }
                guard = self.mutex.lock().unwrap();
            }
        }
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("queue", self.len(), size_of::<Arc<Block>>())].into()
    }
}

impl Drop for ManualScheduler {
    fn drop(&mut self) {
        // Thread must be stopped before destruction
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub trait ManualSchedulerExt {
    fn start(&self);
}

impl ManualSchedulerExt for Arc<ManualScheduler> {
    fn start(&self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Sched Manual".to_string())
                .spawn(move || self_l.run())
                .unwrap(),
        )
    }
}

struct ManualSchedulerData {
    queue: VecDeque<Arc<Block>>,
    stopped: bool,
}
