//! Active tiles of one source.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::Arc;

use crate::data::TileSource;
use crate::task::{TaskHandle, TaskId};
use crate::tile::{SourceId, Tile, TileId};

/// What occupies an active slot.
#[derive(Debug)]
pub enum TileEntry {
    /// A built tile.
    Ready(Tile),
    /// A task is in flight; the handle identifies and cancels it.
    Loading { handle: TaskHandle, proxy: bool },
}

impl TileEntry {
    /// Returns true if the slot holds a built tile.
    pub fn is_ready(&self) -> bool {
        matches!(self, TileEntry::Ready(_))
    }

    /// The built tile, if any.
    pub fn tile(&self) -> Option<&Tile> {
        match self {
            TileEntry::Ready(tile) => Some(tile),
            TileEntry::Loading { .. } => None,
        }
    }
}

/// Mapping from tile id to the active tile or task for one source.
///
/// Results of tasks numbered at or below the set's cutoff were started
/// before the set was created or last cleared and must never be reused.
pub struct TileSet {
    source: Arc<dyn TileSource>,
    entries: BTreeMap<TileId, TileEntry>,
    cutoff: TaskId,
}

impl TileSet {
    /// Creates an empty set for a source.
    pub fn new(source: Arc<dyn TileSource>) -> Self {
        Self {
            source,
            entries: BTreeMap::new(),
            cutoff: TaskId::default(),
        }
    }

    /// Rejects results of every task up to and including `last_issued`.
    pub(crate) fn set_cutoff(&mut self, last_issued: TaskId) {
        self.cutoff = self.cutoff.max(last_issued);
    }

    /// Returns true if a result of this task may still be reused.
    pub fn accepts(&self, task_id: TaskId) -> bool {
        task_id > self.cutoff
    }

    /// Source the tiles are built from.
    pub fn source(&self) -> &Arc<dyn TileSource> {
        &self.source
    }

    /// Id of the source.
    pub fn source_id(&self) -> SourceId {
        self.source.id()
    }

    /// Entry for a tile.
    pub fn get(&self, id: &TileId) -> Option<&TileEntry> {
        self.entries.get(id)
    }

    /// Mutable entry for a tile.
    pub fn get_mut(&mut self, id: &TileId) -> Option<&mut TileEntry> {
        self.entries.get_mut(id)
    }

    /// Returns true if the tile is active or loading.
    pub fn contains(&self, id: &TileId) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns true if the slot holds a built tile.
    pub fn is_ready(&self, id: &TileId) -> bool {
        self.entries.get(id).is_some_and(TileEntry::is_ready)
    }

    /// Fills a slot, returning the previous entry.
    pub fn insert(&mut self, id: TileId, entry: TileEntry) -> Option<TileEntry> {
        self.entries.insert(id, entry)
    }

    /// Empties a slot.
    pub fn remove(&mut self, id: &TileId) -> Option<TileEntry> {
        self.entries.remove(id)
    }

    /// Ids of all slots in order.
    pub fn ids(&self) -> impl Iterator<Item = TileId> + '_ {
        self.entries.keys().copied()
    }

    /// All slots in id order.
    pub fn iter(&self) -> btree_map::Iter<'_, TileId, TileEntry> {
        self.entries.iter()
    }

    /// Built tiles in id order.
    pub fn ready_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.entries.values().filter_map(TileEntry::tile)
    }

    /// Built tiles, mutably, for per-frame animation.
    pub fn ready_tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.entries.values_mut().filter_map(|entry| match entry {
            TileEntry::Ready(tile) => Some(tile),
            TileEntry::Loading { .. } => None,
        })
    }

    /// Number of tasks in flight.
    pub fn loading_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_ready()).count()
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no slot is filled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cancels every in-flight task and removes all entries.
    ///
    /// Returns the number of tasks canceled.
    pub fn cancel_all(&mut self) -> usize {
        let mut canceled = 0;
        for (_, entry) in std::mem::take(&mut self.entries) {
            if let TileEntry::Loading { handle, .. } = entry {
                handle.cancel();
                canceled += 1;
            }
        }
        canceled
    }
}

impl fmt::Debug for TileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileSet")
            .field("source", &self.source.name())
            .field("entries", &self.entries.len())
            .field("loading", &self.loading_count())
            .field("cutoff", &self.cutoff)
            .finish()
    }
}
