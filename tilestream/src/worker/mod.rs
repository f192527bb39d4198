//! Fixed-size worker thread pool that builds tiles off the main thread.
//!
//! The manager enqueues [`TileTask`]s; each worker thread blocks until work is
//! available, pops the most urgent task and runs it through the stages:
//!
//! 1. obtain the raw payload from the source (unless the task carries one)
//! 2. parse it into [`TileData`](crate::data::TileData)
//! 3. check the cancellation flag
//! 4. build geometry with a [`TileBuilder`]
//! 5. check the cancellation flag again
//! 6. post the [`TaskOutcome`] on the completion channel
//!
//! Cancellation is cooperative: a build already running is allowed to finish
//! and its result is reported as canceled. Panics inside a stage are caught
//! at the task boundary and reported as failures, so a bad tile never takes a
//! worker thread down.
//!
//! Worker threads never touch the manager or the cache. They only read the
//! scene snapshot captured when the task was dequeued and write to the
//! completion channel, which the main thread drains with
//! [`TileWorker::try_recv`].

mod queue;

pub use queue::{PriorityQueue, QueuedTask};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use crate::builder::TileBuilder;
use crate::data::TileSource;
use crate::error::{PipelineError, TileError};
use crate::style::Scene;
use crate::task::{TaskOutcome, TaskResult, TileTask};

/// Callback invoked on a worker thread after each posted outcome.
pub type CompletionNotifier = Arc<dyn Fn() + Send + Sync>;

// =============================================================================
// Statistics
// =============================================================================

/// Worker pool counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Tasks accepted by [`TileWorker::enqueue`].
    pub enqueued: u64,
    /// Tasks that produced a tile.
    pub completed: u64,
    /// Tasks that failed (including caught panics).
    pub failed: u64,
    /// Tasks discarded because they were canceled.
    pub canceled: u64,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Tasks currently being processed.
    pub in_flight: usize,
    /// Tasks taken off the queue by a worker thread.
    pub started: u64,
    /// Total time started tasks spent waiting in the queue.
    pub queue_wait: Duration,
}

impl WorkerStats {
    /// Mean time a started task waited in the queue.
    pub fn mean_queue_wait(&self) -> Duration {
        if self.started == 0 {
            return Duration::ZERO;
        }
        self.queue_wait.div_f64(self.started as f64)
    }
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    canceled: AtomicU64,
    in_flight: AtomicUsize,
    started: AtomicU64,
    queue_wait_us: AtomicU64,
}

impl Counters {
    fn record(&self, result: &TaskResult) {
        let counter = match result {
            TaskResult::Ready(_) => &self.completed,
            TaskResult::Failed(_) => &self.failed,
            TaskResult::Canceled => &self.canceled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_start(&self, waited: Duration) {
        let micros = u64::try_from(waited.as_micros()).unwrap_or(u64::MAX);
        self.started.fetch_add(1, Ordering::Relaxed);
        self.queue_wait_us.fetch_add(micros, Ordering::Relaxed);
    }
}

// =============================================================================
// Shared State
// =============================================================================

struct Shared {
    queue: Mutex<PriorityQueue>,
    available: Condvar,
    stop: AtomicBool,
    /// Written under the queue lock so a dequeued task always sees the scene
    /// that was current at dequeue time.
    scene: RwLock<Option<Arc<Scene>>>,
    tile_bounds: AtomicBool,
    completed: UnboundedSender<TaskOutcome>,
    notifier: RwLock<Option<CompletionNotifier>>,
    counters: Counters,
}

/// A task together with the context captured when it was dequeued.
struct Job {
    queued: QueuedTask,
    scene: Option<Arc<Scene>>,
    tile_bounds: bool,
}

// =============================================================================
// Tile Worker
// =============================================================================

/// Thread pool running tile tasks.
///
/// Dropping the worker stops and joins its threads; tasks still queued are
/// discarded without an outcome.
pub struct TileWorker {
    shared: Arc<Shared>,
    completions: UnboundedReceiver<TaskOutcome>,
    threads: Vec<JoinHandle<()>>,
}

impl TileWorker {
    /// Starts `worker_count` threads.
    pub fn new(worker_count: usize) -> Result<Self, PipelineError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            queue: Mutex::new(PriorityQueue::new()),
            available: Condvar::new(),
            stop: AtomicBool::new(false),
            scene: RwLock::new(None),
            tile_bounds: AtomicBool::new(false),
            completed: tx,
            notifier: RwLock::new(None),
            counters: Counters::default(),
        });

        let mut worker = Self {
            shared,
            completions: rx,
            threads: Vec::with_capacity(worker_count),
        };

        // On failure the partially built pool is dropped, which joins the
        // threads already started.
        for index in 0..worker_count {
            let shared = Arc::clone(&worker.shared);
            let handle = thread::Builder::new()
                .name(format!("tile-worker-{index}"))
                .spawn(move || run_worker(index, shared))
                .map_err(PipelineError::SpawnWorker)?;
            worker.threads.push(handle);
        }

        info!(workers = worker_count, "Tile worker pool started");
        Ok(worker)
    }

    /// Queues a task for the given source.
    pub fn enqueue(&self, task: TileTask, source: Arc<dyn TileSource>) {
        trace!(tile = %task.id(), priority = %task.priority(), "Enqueue tile task");
        self.shared.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        self.shared.queue.lock().push(task, source);
        self.shared.available.notify_one();
    }

    /// Swaps the scene used for tasks dequeued from now on.
    ///
    /// Tasks already running finish with the scene they captured.
    pub fn set_scene(&self, scene: Arc<Scene>) {
        let _queue = self.shared.queue.lock();
        debug!(generation = scene.generation(), "Worker scene swapped");
        *self.shared.scene.write() = Some(scene);
    }

    /// Scene that the next dequeued task will use.
    pub fn scene(&self) -> Option<Arc<Scene>> {
        self.shared.scene.read().clone()
    }

    /// Makes builders emit a tile outline mesh.
    pub fn set_debug_tile_bounds(&self, enabled: bool) {
        self.shared.tile_bounds.store(enabled, Ordering::Relaxed);
    }

    /// Installs a callback run after each outcome is posted.
    pub fn set_completion_notifier(&self, notifier: CompletionNotifier) {
        *self.shared.notifier.write() = Some(notifier);
    }

    /// Takes the next finished outcome, if any. Never blocks.
    pub fn try_recv(&mut self) -> Option<TaskOutcome> {
        self.completions.try_recv().ok()
    }

    /// Drops queued tasks that have been canceled.
    pub fn purge_canceled(&self) -> usize {
        let removed = self.shared.queue.lock().remove_canceled();
        if removed > 0 {
            self.shared
                .counters
                .canceled
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Number of tasks waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Tasks queued or being processed.
    pub fn pending(&self) -> usize {
        self.queue_len() + self.shared.counters.in_flight.load(Ordering::Acquire)
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.threads.len()
    }

    /// Snapshot of counters.
    pub fn stats(&self) -> WorkerStats {
        let c = &self.shared.counters;
        WorkerStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            canceled: c.canceled.load(Ordering::Relaxed),
            queued: self.queue_len(),
            in_flight: c.in_flight.load(Ordering::Relaxed),
            started: c.started.load(Ordering::Relaxed),
            queue_wait: Duration::from_micros(c.queue_wait_us.load(Ordering::Relaxed)),
        }
    }
}

impl Drop for TileWorker {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            self.shared.stop.store(true, Ordering::Release);
            let discarded = queue.drain().len();
            if discarded > 0 {
                debug!(discarded, "Discarding queued tile tasks");
            }
        }
        self.shared.available.notify_all();

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("Tile worker thread panicked outside a task");
            }
        }
        info!("Tile worker pool stopped");
    }
}

// =============================================================================
// Worker Loop
// =============================================================================

fn run_worker(index: usize, shared: Arc<Shared>) {
    debug!(worker = index, "Tile worker thread started");

    while let Some(job) = next_job(&shared) {
        let outcome = process(job);
        shared.counters.record(&outcome.result);
        let sent = shared.completed.send(outcome).is_ok();
        shared.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
        if !sent {
            break;
        }

        let notifier = shared.notifier.read().clone();
        if let Some(notify) = notifier {
            notify();
        }
    }

    debug!(worker = index, "Tile worker thread exiting");
}

/// Blocks until a task is available or the pool stops.
fn next_job(shared: &Shared) -> Option<Job> {
    let mut queue = shared.queue.lock();
    loop {
        if shared.stop.load(Ordering::Acquire) {
            return None;
        }
        if let Some(queued) = queue.pop() {
            shared.counters.in_flight.fetch_add(1, Ordering::AcqRel);
            shared.counters.record_start(queued.wait_time());
            return Some(Job {
                queued,
                scene: shared.scene.read().clone(),
                tile_bounds: shared.tile_bounds.load(Ordering::Relaxed),
            });
        }
        shared.available.wait(&mut queue);
    }
}

fn process(job: Job) -> TaskOutcome {
    let Job {
        queued,
        scene,
        tile_bounds,
    } = job;
    let QueuedTask { mut task, source, .. } = queued;

    if task.is_canceled() {
        trace!(tile = %task.id(), "Skipping canceled task");
        return task.outcome(TaskResult::Canceled);
    }

    let id = task.id();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        execute(&mut task, source.as_ref(), scene, tile_bounds)
    }))
    .unwrap_or_else(|payload| {
        TaskResult::Failed(TileError::Panicked {
            tile: id,
            message: panic_message(payload.as_ref()),
        })
    });

    match &result {
        TaskResult::Failed(e) => warn!(tile = %id, error = %e, "Tile task failed"),
        TaskResult::Canceled => debug!(tile = %id, "Tile task canceled in flight"),
        TaskResult::Ready(_) => {}
    }

    task.discard_payload();
    task.outcome(result)
}

fn execute(
    task: &mut TileTask,
    source: &dyn TileSource,
    scene: Option<Arc<Scene>>,
    tile_bounds: bool,
) -> TaskResult {
    let id = task.id();
    let Some(scene) = scene else {
        return TaskResult::Failed(TileError::NoScene { tile: id });
    };

    if task.raw_data().is_none() {
        if let Err(e) = source.load(task) {
            return TaskResult::Failed(e);
        }
        if task.is_canceled() {
            return TaskResult::Canceled;
        }
    }

    let data = match source.parse(task) {
        Ok(data) => data,
        Err(e) => return TaskResult::Failed(e),
    };
    if task.is_canceled() {
        return TaskResult::Canceled;
    }

    let builder = TileBuilder::new(scene).with_tile_bounds(tile_bounds);
    let tile = match builder.build(id, &data, source) {
        Ok(tile) => tile,
        Err(e) => return TaskResult::Failed(e),
    };
    if task.is_canceled() {
        return TaskResult::Canceled;
    }

    TaskResult::Ready(tile)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemorySource, SyntheticSource, TileData};
    use crate::style::{DrawRule, PolygonStyle};
    use crate::task::{Priority, TaskHandle, TaskId};
    use crate::tile::{SourceId, TileId};
    use std::time::{Duration, Instant};

    fn scene() -> Arc<Scene> {
        Arc::new(Scene::new().with_style(
            PolygonStyle::new("buildings").with_rule(DrawRule::new("buildings", [9, 9, 9, 255])),
        ))
    }

    fn prepared(id: TileId, task_id: u64) -> (TileTask, TaskHandle) {
        let mut task = TileTask::new(id);
        let handle = task.prepare(TaskId(task_id), Priority::HIGHEST, false);
        (task, handle)
    }

    fn recv(worker: &mut TileWorker) -> TaskOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = worker.try_recv() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "timed out waiting for outcome");
            thread::sleep(Duration::from_millis(1));
        }
    }

    struct PanickingSource;

    impl TileSource for PanickingSource {
        fn id(&self) -> SourceId {
            SourceId(7)
        }
        fn name(&self) -> &str {
            "panics"
        }
        fn load(&self, _task: &mut TileTask) -> Result<(), TileError> {
            panic!("boom");
        }
    }

    #[test]
    fn test_builds_tile() {
        let mut worker = TileWorker::new(2).unwrap();
        worker.set_scene(scene());

        let source: Arc<dyn TileSource> = Arc::new(SyntheticSource::new(SourceId(0), "s"));
        let id = TileId::new(1, 1, 2, SourceId(0));
        let (task, _handle) = prepared(id, 1);
        worker.enqueue(task, source);

        let outcome = recv(&mut worker);
        assert_eq!(outcome.id, id);
        assert_eq!(outcome.task_id, TaskId(1));
        match outcome.result {
            TaskResult::Ready(tile) => assert!(tile.mesh("buildings").is_some()),
            other => panic!("expected ready, got {other:?}"),
        }
        assert_eq!(worker.stats().completed, 1);
    }

    #[test]
    fn test_no_scene_fails() {
        let mut worker = TileWorker::new(1).unwrap();
        let source: Arc<dyn TileSource> = Arc::new(MemorySource::new(SourceId(0), "m"));
        let (task, _handle) = prepared(TileId::new(0, 0, 0, SourceId(0)), 1);
        worker.enqueue(task, source);

        let outcome = recv(&mut worker);
        assert!(matches!(
            outcome.result,
            TaskResult::Failed(TileError::NoScene { .. })
        ));
    }

    #[test]
    fn test_canceled_before_dequeue() {
        let mut worker = TileWorker::new(1).unwrap();
        worker.set_scene(scene());
        let source: Arc<dyn TileSource> = Arc::new(MemorySource::new(SourceId(0), "m"));
        let (task, handle) = prepared(TileId::new(0, 0, 0, SourceId(0)), 1);
        handle.cancel();
        worker.enqueue(task, source);

        let outcome = recv(&mut worker);
        assert!(outcome.result.is_canceled());
        assert_eq!(worker.stats().canceled, 1);
    }

    #[test]
    fn test_panic_becomes_failure() {
        let mut worker = TileWorker::new(1).unwrap();
        worker.set_scene(scene());
        let (task, _handle) = prepared(TileId::new(0, 0, 0, SourceId(7)), 1);
        worker.enqueue(task, Arc::new(PanickingSource));

        let outcome = recv(&mut worker);
        match outcome.result {
            TaskResult::Failed(TileError::Panicked { message, .. }) => assert_eq!(message, "boom"),
            other => panic!("expected panic failure, got {other:?}"),
        }

        // The thread survived and keeps working
        let source: Arc<dyn TileSource> = Arc::new(MemorySource::new(SourceId(0), "m"));
        let (task, _handle) = prepared(TileId::new(0, 0, 0, SourceId(0)), 2);
        worker.enqueue(task, source);
        assert!(recv(&mut worker).result.is_ready());
    }

    #[test]
    fn test_notifier_called() {
        let mut worker = TileWorker::new(1).unwrap();
        worker.set_scene(scene());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        worker.set_completion_notifier(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let source: Arc<dyn TileSource> = Arc::new(MemorySource::new(SourceId(0), "m"));
        let (task, _handle) = prepared(TileId::new(0, 0, 0, SourceId(0)), 1);
        worker.enqueue(task, source);
        recv(&mut worker);

        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Sleeps before every load so later tasks wait in the queue.
    struct SlowSource(Duration);

    impl TileSource for SlowSource {
        fn id(&self) -> SourceId {
            SourceId(0)
        }
        fn name(&self) -> &str {
            "slow"
        }
        fn load(&self, _task: &mut TileTask) -> Result<(), TileError> {
            thread::sleep(self.0);
            Ok(())
        }
        fn parse(&self, _task: &TileTask) -> Result<TileData, TileError> {
            Ok(TileData::default())
        }
    }

    #[test]
    fn test_queue_wait_recorded() {
        let mut worker = TileWorker::new(1).unwrap();
        worker.set_scene(scene());
        let source: Arc<dyn TileSource> = Arc::new(SlowSource(Duration::from_millis(20)));
        for task_id in 1..=2 {
            let (task, _handle) = prepared(TileId::new(task_id as u32, 0, 2, SourceId(0)), task_id);
            worker.enqueue(task, Arc::clone(&source));
        }
        recv(&mut worker);
        recv(&mut worker);

        // The second task sat behind the first load
        let stats = worker.stats();
        assert_eq!(stats.started, 2);
        assert!(stats.queue_wait >= Duration::from_millis(19), "{stats:?}");
        assert!(stats.mean_queue_wait() <= stats.queue_wait);
        assert_eq!(WorkerStats::default().mean_queue_wait(), Duration::ZERO);
    }

    #[test]
    fn test_drop_joins_threads() {
        let worker = TileWorker::new(3).unwrap();
        assert_eq!(worker.worker_count(), 3);
        drop(worker);
    }
}
