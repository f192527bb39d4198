//! The data source abstraction consumed by the pipeline.

use crate::error::TileError;
use crate::task::TileTask;
use crate::tile::{SourceId, TileId, MAX_ZOOM};

use super::tile_data::TileData;

/// A provider of raw tile data for one data layer.
///
/// The manager calls [`create_task`](TileSource::create_task) on the main
/// thread, so it must be cheap. Worker threads call
/// [`load`](TileSource::load) and [`parse`](TileSource::parse); these may
/// block on I/O or decode work.
///
/// # Thread Safety
///
/// Sources are shared between the manager and every worker thread through
/// `Arc<dyn TileSource>`, so implementations must be `Send + Sync`.
pub trait TileSource: Send + Sync + 'static {
    /// Index of this source in the scene. Part of every [`TileId`].
    fn id(&self) -> SourceId;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Deepest zoom level this source has data for.
    ///
    /// Deeper view zooms request the covering ancestor at this level.
    fn max_zoom(&self) -> u8 {
        MAX_ZOOM
    }

    /// Whether tiles from this source produce geometry. Sources returning
    /// false still yield (empty) Ready tiles.
    fn generate_geometry(&self) -> bool {
        true
    }

    /// Creates the task for a tile. May attach an already available payload.
    fn create_task(&self, id: TileId) -> TileTask {
        TileTask::new(id)
    }

    /// Obtains the raw payload for a task (worker thread).
    ///
    /// Called only when the task has no payload yet.
    fn load(&self, task: &mut TileTask) -> Result<(), TileError>;

    /// Decodes the task's raw payload (worker thread).
    fn parse(&self, task: &TileTask) -> Result<TileData, TileError> {
        match task.raw_data() {
            Some(raw) => TileData::from_json(task.id(), raw),
            None => Err(TileError::parse(task.id(), "no payload")),
        }
    }

    /// Drops any data the source holds itself (e.g. client-provided features).
    fn clear_data(&self) {}
}
