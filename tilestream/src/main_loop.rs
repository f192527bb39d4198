//! Callbacks marshalled onto the main thread.
//!
//! Any thread may queue a closure; the host's update pass runs them on the
//! main thread before touching tile state. The queue has its own lock, so
//! posting never contends with the tile-state mutex.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// FIFO of closures to run on the main loop.
#[derive(Default)]
pub struct MainThreadQueue {
    tasks: Mutex<VecDeque<Callback>>,
}

impl MainThreadQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a closure for the next [`run_all`](Self::run_all).
    pub fn push(&self, task: impl FnOnce() + Send + 'static) {
        self.tasks.lock().push_back(Box::new(task));
    }

    /// Runs every queued closure in order and returns how many ran.
    ///
    /// Closures queued while running are left for the next call. The lock is
    /// not held while closures execute, so they may queue more work.
    pub fn run_all(&self) -> usize {
        let batch = std::mem::take(&mut *self.tasks.lock());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl fmt::Debug for MainThreadQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadQueue")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_runs_in_order() {
        let queue = MainThreadQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.push(move || log.lock().push(i));
        }

        assert_eq!(queue.run_all(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reentrant_push_deferred() {
        let queue = Arc::new(MainThreadQueue::new());
        let inner = Arc::clone(&queue);
        queue.push(move || inner.push(|| {}));

        assert_eq!(queue.run_all(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.run_all(), 1);
    }

    #[test]
    fn test_push_from_other_thread() {
        let queue = Arc::new(MainThreadQueue::new());
        let remote = Arc::clone(&queue);
        std::thread::spawn(move || remote.push(|| {}))
            .join()
            .unwrap();
        assert_eq!(queue.run_all(), 1);
    }
}
