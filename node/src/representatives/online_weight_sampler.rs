use super::OnlineReps;
use crate::stats::{DetailType, StatType, Stats};
use std::{
    sync::{Arc, Condvar, Mutex},
    thread::JoinHandle,
    time::Duration,
};
use tracing::debug;

/// Periodically closes the sampling period of the online representatives
pub struct OnlineWeightSampler {
    online_reps: Arc<Mutex<OnlineReps>>,
    stats: Arc<Stats>,
    period: Duration,
    stopped: Mutex<bool>,
    condition: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl OnlineWeightSampler {
    pub fn new(online_reps: Arc<Mutex<OnlineReps>>, stats: Arc<Stats>, period: Duration) -> Self {
        Self {
            online_reps,
            stats,
            period,
            stopped: Mutex::new(false),
            condition: Condvar::new(),
            thread: Mutex::new(None),
        }
    }

    pub fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.condition.notify_all();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    fn run(&self) {
        let mut stopped = self.stopped.lock().unwrap();
        while !*stopped {
            stopped = self
                .condition
                .wait_timeout_while(stopped, self.period, |s| !*s)
                .unwrap()
                .0;
            if !*stopped {
                drop(stopped);
                self.sample();
                stopped = self.stopped.lock().unwrap();
            }
        }
    }

    fn sample(&self) {
        let trended = self.online_reps.lock().unwrap().sample();
        self.stats.inc(StatType::OnlineReps, DetailType::Sample);
        debug!(trended = %trended, "Online weight sampled");
    }
}

impl Drop for OnlineWeightSampler {
    fn drop(&mut self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub trait OnlineWeightSamplerExt {
    fn start(&self);
}

impl OnlineWeightSamplerExt for Arc<OnlineWeightSampler> {
    fn start(&self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Online reps".to_string())
                .spawn(move || self_l.run())
                .unwrap(),
        );
    }
}
