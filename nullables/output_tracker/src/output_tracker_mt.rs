use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, Weak,
};

/// Records everything a component emits while the tracker is alive.
/// Used by tests to observe side effects like published messages or generated votes.
pub struct OutputTrackerMt<T: Clone + 'static> {
    output: Mutex<Vec<T>>,
}

impl<T: Clone + 'static> OutputTrackerMt<T> {
    pub fn new() -> Self {
        Self {
            output: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, t: T) {
        self.output.lock().unwrap().push(t);
    }

    pub fn output(&self) -> Vec<T> {
        self.output.lock().unwrap().clone()
    }

    /// Returns the recorded output and starts over with an empty list
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.output.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.output.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.output.lock().unwrap().clear();
    }
}

impl<T> Default for OutputTrackerMt<T>
where
    T: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Fans emitted values out to all live trackers. Emitting is a cheap no-op
/// while nobody is tracking.
pub struct OutputListenerMt<T: Clone + 'static> {
    trackers: Mutex<Vec<Weak<OutputTrackerMt<T>>>>,
    live_trackers: AtomicUsize,
}

impl<T: Clone + 'static> OutputListenerMt<T> {
    pub fn new() -> Self {
        Self {
            trackers: Mutex::new(Vec::new()),
            live_trackers: AtomicUsize::new(0),
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.live_trackers.load(Ordering::SeqCst) > 0
    }

    pub fn track(&self) -> Arc<OutputTrackerMt<T>> {
        let tracker = Arc::new(OutputTrackerMt::new());
        let mut trackers = self.trackers.lock().unwrap();
        trackers.push(Arc::downgrade(&tracker));
        self.live_trackers.store(trackers.len(), Ordering::SeqCst);
        tracker
    }

    pub fn emit(&self, t: T) {
        if !self.is_tracked() {
            return;
        }

        let mut trackers = self.trackers.lock().unwrap();
        let mut dropped_any = false;
        for tracker in trackers.iter() {
            match tracker.upgrade() {
                Some(tracker) => tracker.add(t.clone()),
                None => dropped_any = true,
            }
        }

        if dropped_any {
            trackers.retain(|t| t.strong_count() > 0);
            self.live_trackers.store(trackers.len(), Ordering::SeqCst);
        }
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.lock().unwrap().len()
    }
}

impl<T> Default for OutputListenerMt<T>
where
    T: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
