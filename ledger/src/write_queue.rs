use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex},
};

/// Distinct areas that take the ledger write lock, order is irrelevant
#[derive(FromPrimitive, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Writer {
    ConfirmationHeight,
    ProcessBatch,
    Pruning,
    VotingFinal,
    Testing, // Used in tests to emulate a write lock
}

impl Writer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Writer::ConfirmationHeight => "confirmation_height",
            Writer::ProcessBatch => "process_batch",
            Writer::Pruning => "pruning",
            Writer::VotingFinal => "voting_final",
            Writer::Testing => "testing",
        }
    }
}

/// Ownership of the ledger write lock. The lock passes to the next waiting
/// writer when the guard is released or dropped.
pub struct WriteGuard {
    writer: Writer,
    queue: Option<Arc<QueueData>>,
}

impl WriteGuard {
    fn new(writer: Writer, queue: Arc<QueueData>) -> Self {
        Self {
            writer,
            queue: Some(queue),
        }
    }

    pub fn writer(&self) -> Writer {
        self.writer
    }

    pub fn release(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.pop_front(self.writer);
        }
    }

    pub fn is_owned(&self) -> bool {
        self.queue.is_some()
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.release();
    }
}

struct QueueData {
    queue: Mutex<VecDeque<Writer>>,
    condition: Condvar,
}

impl QueueData {
    fn pop_front(&self, writer: Writer) {
        {
            let mut queue = self.queue.lock().unwrap();
            debug_assert_eq!(queue.front(), Some(&writer));
            queue.pop_front();
        }
        self.condition.notify_all();
    }
}

/// Serializes ledger write transactions: writers own the lock one at a time
/// in the order they asked for it
pub struct WriteQueue {
    data: Arc<QueueData>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            data: Arc::new(QueueData {
                queue: Mutex::new(VecDeque::new()),
                condition: Condvar::new(),
            }),
        }
    }

    /// Blocks until we are at the head of the queue and blocks other waiters until write_guard goes out of scope
    pub fn wait(&self, writer: Writer) -> WriteGuard {
        let mut queue = self.data.queue.lock().unwrap();
        debug_assert!(queue.iter().all(|i| *i != writer));

        // Add writer to the end of the queue if it's not already waiting
        if !queue.contains(&writer) {
            queue.push_back(writer);
        }

        let _queue = self
            .data
            .condition
            .wait_while(queue, |queue| queue.front() != Some(&writer))
            .unwrap();

        self.create_write_guard(writer)
    }

    /// Takes the lock only if nobody else holds or waits for it. A failed
    /// attempt leaves the queue unchanged.
    pub fn try_lock(&self, writer: Writer) -> Option<WriteGuard> {
        let mut queue = self.data.queue.lock().unwrap();
        match queue.front() {
            None => queue.push_back(writer),
            Some(front) if *front == writer => {}
            Some(_) => return None,
        }
        drop(queue);
        Some(self.create_write_guard(writer))
    }

    /// Returns true if this writer is now at the front of the queue.
    /// Otherwise the writer keeps its place and the caller has to come back,
    /// because writers behind it wait until it took and released the lock.
    pub fn process(&self, writer: Writer) -> bool {
        let mut queue = self.data.queue.lock().unwrap();
        // Add writer to the end of the queue if it's not already waiting
        if !queue.contains(&writer) {
            queue.push_back(writer);
        }

        queue.front() == Some(&writer)
    }

    /// Returns true if this writer is anywhere in the queue
    pub fn contains(&self, writer: Writer) -> bool {
        self.data.queue.lock().unwrap().contains(&writer)
    }

    pub fn len(&self) -> usize {
        self.data.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Doesn't actually pop anything until the returned write_guard is out of scope
    pub fn pop(&self, writer: Writer) -> WriteGuard {
        self.create_write_guard(writer)
    }

    fn create_write_guard(&self, writer: Writer) -> WriteGuard {
        WriteGuard::new(writer, Arc::clone(&self.data))
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    #[test]
    fn lock_and_release() {
        let queue = WriteQueue::new();
        let mut guard = queue.wait(Writer::Testing);
        assert!(guard.is_owned());
        assert_eq!(guard.writer(), Writer::Testing);
        assert!(queue.contains(Writer::Testing));
        guard.release();
        assert!(!guard.is_owned());
        assert!(queue.is_empty());
    }

    #[test]
    fn drop_releases_lock() {
        let queue = WriteQueue::new();
        {
            let _guard = queue.wait(Writer::ProcessBatch);
            assert!(queue.contains(Writer::ProcessBatch));
        }
        assert!(!queue.contains(Writer::ProcessBatch));
        let _guard = queue.wait(Writer::ConfirmationHeight);
    }

    #[test]
    fn process_is_fifo() {
        let queue = WriteQueue::new();
        assert!(queue.process(Writer::Pruning));
        assert!(!queue.process(Writer::ConfirmationHeight));
        assert!(!queue.process(Writer::ConfirmationHeight));
        assert_eq!(queue.len(), 2);

        drop(queue.pop(Writer::Pruning));
        assert!(queue.process(Writer::ConfirmationHeight));
    }

    #[test]
    fn try_lock() {
        let queue = WriteQueue::new();
        let guard = queue.try_lock(Writer::Testing);
        assert!(guard.is_some());
        assert!(queue.try_lock(Writer::ProcessBatch).is_none());
        assert!(!queue.contains(Writer::ProcessBatch));
        drop(guard);
        assert!(queue.try_lock(Writer::ProcessBatch).is_some());
    }

    #[test]
    fn try_lock_does_not_wait_behind_queued_writer() {
        let queue = WriteQueue::new();
        let _guard = queue.wait(Writer::Testing);
        assert!(!queue.process(Writer::Pruning));
        assert!(queue.try_lock(Writer::Pruning).is_none());
        assert!(queue.try_lock(Writer::ConfirmationHeight).is_none());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn failed_try_lock_does_not_block_other_writers() {
        let queue = Arc::new(WriteQueue::new());
        let guard = queue.try_lock(Writer::Testing).unwrap();
        assert!(queue.try_lock(Writer::ProcessBatch).is_none());
        drop(guard);

        let acquired = Arc::new(AtomicBool::new(false));
        let handle = {
            let queue = queue.clone();
            let acquired = acquired.clone();
            thread::spawn(move || {
                let _guard = queue.wait(Writer::ConfirmationHeight);
                acquired.store(true, Ordering::SeqCst);
            })
        };
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert!(queue.is_empty());
    }

    #[test]
    fn waiter_blocks_until_release() {
        let queue = Arc::new(WriteQueue::new());
        let guard = queue.wait(Writer::Testing);
        let acquired = Arc::new(AtomicBool::new(false));

        let handle = {
            let queue = queue.clone();
            let acquired = acquired.clone();
            thread::spawn(move || {
                let _guard = queue.wait(Writer::ConfirmationHeight);
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(guard);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn mutual_exclusion() {
        let queue = Arc::new(WriteQueue::new());
        let holders = Arc::new(AtomicUsize::new(0));
        let max_holders = Arc::new(AtomicUsize::new(0));
        let writers = [
            Writer::ConfirmationHeight,
            Writer::ProcessBatch,
            Writer::Pruning,
            Writer::VotingFinal,
        ];

        let handles: Vec<_> = writers
            .into_iter()
            .map(|writer| {
                let queue = queue.clone();
                let holders = holders.clone();
                let max_holders = max_holders.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = queue.wait(writer);
                        let current = holders.fetch_add(1, Ordering::SeqCst) + 1;
                        max_holders.fetch_max(current, Ordering::SeqCst);
                        thread::yield_now();
                        holders.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_holders.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
    }
}
