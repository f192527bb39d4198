//! Tile tasks and their outcomes.
//!
//! A [`TileTask`] is one unit of work: "produce a built tile for this id".
//! Once enqueued the worker owns the task; the manager keeps only a
//! [`TaskHandle`] to identify the result and to cancel it.
//!
//! Cancellation is cooperative. The flag is a `CancellationToken` shared
//! between the task and its handle; workers check it between stages and a
//! build already in progress is allowed to finish.

use std::fmt;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::TileError;
use crate::tile::{Tile, TileId, TileState};

// =============================================================================
// Priority
// =============================================================================

/// Scale applied to zoom distance so fractional view zooms still order tiles.
pub const ZOOM_DISTANCE_SCALE: f32 = 100.0;

/// Added to proxy requests so they always queue behind required tiles.
pub const PROXY_PRIORITY_PENALTY: u32 = 10_000;

/// Task scheduling priority. Lower values are dequeued first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Priority(u32);

impl Priority {
    /// Most urgent priority.
    pub const HIGHEST: Priority = Priority(0);

    /// Creates a priority from a raw value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Derives a priority from the tile's zoom distance to the view.
    ///
    /// Tiles at the current zoom come first; proxies are pushed behind every
    /// required tile.
    pub fn for_tile(id: &TileId, view_zoom: f32, proxy: bool) -> Self {
        let distance = (id.zoom_distance(view_zoom) * ZOOM_DISTANCE_SCALE).round() as u32;
        if proxy {
            Self(distance.saturating_add(PROXY_PRIORITY_PENALTY))
        } else {
            Self(distance)
        }
    }

    /// Raw value.
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// =============================================================================
// Task identity and handle
// =============================================================================

/// Identity of one task instance.
///
/// Two tasks for the same tile (e.g. one canceled, one re-requested) have
/// different task ids, so a late result can be matched to the right entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Manager-side reference to an in-flight task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    task_id: TaskId,
    priority: Priority,
    token: CancellationToken,
}

impl TaskHandle {
    /// Task identity.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Priority the task was enqueued with.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Sets the cancellation flag. The worker discards the work at its next
    /// stage boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once canceled.
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }
}

// =============================================================================
// Tile Task
// =============================================================================

/// A unit of work producing one tile.
pub struct TileTask {
    id: TileId,
    task_id: TaskId,
    priority: Priority,
    proxy: bool,
    token: CancellationToken,
    raw: Option<Bytes>,
}

impl TileTask {
    /// Creates a task for a tile.
    pub fn new(id: TileId) -> Self {
        Self {
            id,
            task_id: TaskId::default(),
            priority: Priority::HIGHEST,
            proxy: false,
            token: CancellationToken::new(),
            raw: None,
        }
    }

    /// Creates a task with its raw payload already available.
    pub fn with_raw_data(id: TileId, raw: Bytes) -> Self {
        let mut task = Self::new(id);
        task.raw = Some(raw);
        task
    }

    /// Stamps identity and priority before enqueueing and returns the
    /// manager's handle.
    pub(crate) fn prepare(&mut self, task_id: TaskId, priority: Priority, proxy: bool) -> TaskHandle {
        self.task_id = task_id;
        self.priority = priority;
        self.proxy = proxy;
        TaskHandle {
            task_id,
            priority,
            token: self.token.clone(),
        }
    }

    /// Tile this task builds.
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Task identity.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Scheduling priority.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// True if requested as a proxy for another tile.
    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    /// Returns true once the owning manager has canceled this task.
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Raw payload, if fetched.
    pub fn raw_data(&self) -> Option<&Bytes> {
        self.raw.as_ref()
    }

    /// Stores the raw payload.
    pub fn set_raw_data(&mut self, raw: Bytes) {
        self.raw = Some(raw);
    }

    /// Drops the raw payload once it is no longer needed.
    pub(crate) fn discard_payload(&mut self) {
        self.raw = None;
    }

    /// Builds the outcome for this task.
    pub(crate) fn outcome(&self, result: TaskResult) -> TaskOutcome {
        TaskOutcome {
            task_id: self.task_id,
            id: self.id,
            proxy: self.proxy,
            result,
        }
    }
}

impl fmt::Debug for TileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileTask")
            .field("id", &self.id)
            .field("task_id", &self.task_id)
            .field("priority", &self.priority)
            .field("proxy", &self.proxy)
            .field("canceled", &self.is_canceled())
            .field("raw_bytes", &self.raw.as_ref().map(Bytes::len))
            .finish()
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of processing a task.
#[derive(Debug)]
pub enum TaskResult {
    /// The tile was built.
    Ready(Tile),
    /// Fetch, parse or build failed.
    Failed(TileError),
    /// The task was canceled before a tile was produced.
    Canceled,
}

impl TaskResult {
    /// Returns true if a tile was built.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns true if the task failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if the task was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Terminal lifecycle state this result represents.
    pub fn state(&self) -> TileState {
        match self {
            Self::Ready(_) => TileState::Ready,
            Self::Failed(_) => TileState::Failed,
            Self::Canceled => TileState::Canceled,
        }
    }
}

/// A finished task as posted on the completion channel.
#[derive(Debug)]
pub struct TaskOutcome {
    /// Identity of the task that produced this outcome.
    pub task_id: TaskId,
    /// Tile the task was building.
    pub id: TileId,
    /// Whether the task was a proxy request.
    pub proxy: bool,
    /// What happened.
    pub result: TaskResult,
}
