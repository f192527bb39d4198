//! Priority queue for tile tasks.
//!
//! Tasks are ordered by priority (lower values first), then by enqueue order
//! (FIFO within the same priority). Tiles at the view's zoom therefore come
//! out before proxies, and tiles requested in the same frame are built in the
//! order the manager asked for them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data::TileSource;
use crate::task::{Priority, TileTask};

// =============================================================================
// Queued Task
// =============================================================================

/// A task waiting for a worker, paired with the source that serves it.
pub struct QueuedTask {
    /// The task to execute.
    pub task: TileTask,

    /// Source providing data for the task.
    pub source: Arc<dyn TileSource>,

    /// Sequence number for FIFO ordering within a priority.
    sequence: u64,

    enqueued_at: Instant,
}

impl QueuedTask {
    /// Task priority.
    pub fn priority(&self) -> Priority {
        self.task.priority()
    }

    /// How long this task has been waiting.
    pub fn wait_time(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

impl fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTask")
            .field("task", &self.task)
            .field("source", &self.source.name())
            .field("sequence", &self.sequence)
            .finish()
    }
}

// BinaryHeap is a max-heap: the "greatest" entry has the lowest priority
// value and, among equals, the lowest sequence.
impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority() == other.priority() && self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority()
            .cmp(&self.priority())
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

// =============================================================================
// Priority Queue
// =============================================================================

/// Priority queue of tile tasks.
///
/// Not thread-safe on its own; the worker pool wraps it in a mutex.
#[derive(Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<QueuedTask>,
    next_sequence: u64,
}

impl PriorityQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task.
    pub fn push(&mut self, task: TileTask, source: Arc<dyn TileSource>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedTask {
            task,
            source,
            sequence,
            enqueued_at: Instant::now(),
        });
    }

    /// Removes and returns the most urgent task.
    pub fn pop(&mut self) -> Option<QueuedTask> {
        self.heap.pop()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no task is queued.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Removes every queued task and returns them.
    pub fn drain(&mut self) -> Vec<QueuedTask> {
        self.heap.drain().collect()
    }

    /// Drops tasks whose cancellation flag is set. Returns how many were removed.
    pub fn remove_canceled(&mut self) -> usize {
        let before = self.heap.len();
        self.heap.retain(|queued| !queued.task.is_canceled());
        before - self.heap.len()
    }
}

impl fmt::Debug for PriorityQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("len", &self.heap.len())
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
