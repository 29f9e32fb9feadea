use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use timer::Timer;

/// Runs short tasks off the calling thread
pub trait ThreadPool: Send + Sync {
    fn push_task(&self, callback: Box<dyn FnOnce() + Send>);
    fn add_delayed_task(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>);
}

pub struct ThreadPoolImpl {
    data: Arc<Mutex<Option<ThreadPoolData>>>,
}

struct ThreadPoolData {
    pool: threadpool::ThreadPool,
    timer: Timer,
}

impl ThreadPoolImpl {
    pub fn new(num_threads: usize, thread_name: impl Into<String>) -> Self {
        Self {
            data: Arc::new(Mutex::new(Some(ThreadPoolData {
                pool: threadpool::Builder::new()
                    .num_threads(num_threads)
                    .thread_name(thread_name.into())
                    .build(),
                timer: Timer::new(),
            }))),
        }
    }

    /// Waits for all queued tasks. Tasks pushed after stop are dropped.
    pub fn stop(&self) {
        let data = self.data.lock().unwrap().take();
        if let Some(data) = data {
            data.pool.join();
        }
    }

    pub fn queued_count(&self) -> usize {
        self.data
            .lock()
            .unwrap()
            .as_ref()
            .map(|d| d.pool.queued_count())
            .unwrap_or_default()
    }
}

impl ThreadPool for ThreadPoolImpl {
    fn push_task(&self, callback: Box<dyn FnOnce() + Send>) {
        if let Some(data) = self.data.lock().unwrap().as_ref() {
            data.pool.execute(callback);
        }
    }

    fn add_delayed_task(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) {
        let guard = self.data.lock().unwrap();
        let Some(data) = guard.as_ref() else {
            return;
        };
        let Ok(delay) = chrono::Duration::from_std(delay) else {
            return;
        };
        let pool_data = Arc::clone(&self.data);
        let mut callback = Some(callback);
        data.timer
            .schedule_with_delay(delay, move || {
                if let Some(cb) = callback.take() {
                    if let Some(data) = pool_data.lock().unwrap().as_ref() {
                        data.pool.execute(cb);
                    }
                }
            })
            .ignore();
    }
}

impl Drop for ThreadPoolImpl {
    fn drop(&mut self) {
        self.stop()
    }
}
