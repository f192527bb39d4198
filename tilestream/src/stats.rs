//! Pipeline statistics.
//!
//! ```text
//! TileManager / TileCache / TileWorker ─────► PipelineStats ─────► debug overlay, CLI
//!          (counters)                        (point-in-time copy)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::cache::CacheStats;
use crate::worker::WorkerStats;

/// Number of updates averaged by [`UpdateTimer`].
pub const UPDATE_TIMER_WINDOW: usize = 60;

/// Point-in-time snapshot of the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PipelineStats {
    /// Built tiles in the active sets.
    pub visible_tiles: usize,
    /// Active slots still waiting on a task.
    pub loading_tiles: usize,
    /// Geometry bytes of the visible tiles.
    pub buffer_bytes: usize,
    /// Cache counters and size.
    pub cache: CacheStats,
    /// Worker counters and queue depth.
    pub worker: WorkerStats,
    /// Average update duration over the last [`UPDATE_TIMER_WINDOW`] updates.
    pub avg_update_ms: f64,
    /// Accumulated frame time in seconds.
    pub frame_time: f64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tiles:   {} visible, {} loading, {:.2} MiB buffers",
            self.visible_tiles,
            self.loading_tiles,
            mib(self.buffer_bytes)
        )?;
        writeln!(
            f,
            "cache:   {} entries, {:.2} MiB ({} hits, {} misses, {} evictions)",
            self.cache.entries,
            mib(self.cache.size_bytes),
            self.cache.hits,
            self.cache.misses,
            self.cache.evictions
        )?;
        writeln!(
            f,
            "tasks:   {} queued, {} running, {} enqueued, {} built, {} failed, {} canceled, {:.2} ms avg wait",
            self.worker.queued,
            self.worker.in_flight,
            self.worker.enqueued,
            self.worker.completed,
            self.worker.failed,
            self.worker.canceled,
            self.worker.mean_queue_wait().as_secs_f64() * 1000.0
        )?;
        write!(
            f,
            "update:  {:.3} ms avg, {:.1} s frame time",
            self.avg_update_ms, self.frame_time
        )
    }
}

fn mib(bytes: usize) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Rolling average of update durations.
#[derive(Clone, Debug, Default)]
pub struct UpdateTimer {
    samples: VecDeque<f64>,
}

impl UpdateTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one update, dropping the oldest sample past the window.
    pub fn record(&mut self, elapsed: Duration) {
        if self.samples.len() == UPDATE_TIMER_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    /// Average in milliseconds; zero before the first sample.
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
