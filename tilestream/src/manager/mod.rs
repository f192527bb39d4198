//! Tile set reconciliation.
//!
//! [`TileManager`] owns the worker pool, the tile cache and one [`TileSet`] per
//! data source. Once per frame the host calls
//! [`update_tile_sets`](TileManager::update_tile_sets) with the tiles the view
//! needs; the manager then
//!
//! 1. computes the wanted ids per source: the required tiles plus proxies
//!    (ancestors, and descendants already at hand) standing in for required
//!    tiles that are not built yet
//! 2. reinstates newly wanted tiles from the cache, or enqueues a task
//! 3. moves built tiles that are no longer wanted into the cache and cancels
//!    tasks that are no longer wanted
//! 4. drains the completion channel, installing results whose task is still
//!    the one occupying the slot and caching or dropping stale ones
//!
//! For every tile id at most one of {active tile, in-flight task, cache entry}
//! exists at any time. All of this runs on the main thread.

mod tile_set;

pub use tile_set::{TileEntry, TileSet};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::cache::TileCache;
use crate::config::{PipelineConfig, ProxyConfig};
use crate::data::TileSource;
use crate::error::PipelineError;
use crate::style::Scene;
use crate::task::{Priority, TaskId, TaskOutcome, TaskResult};
use crate::tile::{SourceId, Tile, TileCoord, TileId};
use crate::view::ViewState;
use crate::worker::TileWorker;

// =============================================================================
// Diagnostics
// =============================================================================

/// Where a tile currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileLocation {
    /// Built and in the active set.
    Active,
    /// In the active set with a task in flight.
    Loading,
    /// In the cache.
    Cached,
    /// Nowhere.
    Absent,
}

impl fmt::Display for TileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileLocation::Active => "active",
            TileLocation::Loading => "loading",
            TileLocation::Cached => "cached",
            TileLocation::Absent => "absent",
        };
        f.write_str(name)
    }
}

/// Manager counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Tasks created and enqueued.
    pub requested: u64,
    /// Tiles moved from the cache back into an active set.
    pub reinstated: u64,
    /// Results installed into an active set.
    pub installed: u64,
    /// Failed results.
    pub failed: u64,
    /// Tasks canceled because their tile stopped being wanted.
    pub canceled: u64,
    /// Stale built results that were cached.
    pub stale_cached: u64,
    /// Stale results that were dropped.
    pub stale_dropped: u64,
}

// =============================================================================
// Tile Manager
// =============================================================================

/// Keeps the active tile sets in step with the view.
pub struct TileManager {
    worker: TileWorker,
    cache: TileCache,
    tile_sets: BTreeMap<SourceId, TileSet>,
    proxy: ProxyConfig,
    scene_generation: Option<u64>,
    next_task_id: u64,
    frame: u64,
    tile_set_changed: bool,
    stats: ManagerStats,
}

impl TileManager {
    /// Creates a manager and starts its worker pool.
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            worker: TileWorker::new(config.worker_count)?,
            cache: TileCache::new(config.cache_capacity_bytes),
            tile_sets: BTreeMap::new(),
            proxy: config.proxy,
            scene_generation: None,
            next_task_id: 0,
            frame: 0,
            tile_set_changed: false,
            stats: ManagerStats::default(),
        })
    }

    // -------------------------------------------------------------------------
    // Scene and sources
    // -------------------------------------------------------------------------

    /// Installs a new scene: swaps the worker's styles and the data sources.
    ///
    /// A scene with a different generation invalidates every built tile, so
    /// all tile sets and the cache are cleared first. Tasks in flight finish
    /// under the scene they captured and their results are dropped.
    pub fn set_scene(&mut self, scene: Arc<Scene>) {
        let generation = scene.generation();
        if self.scene_generation != Some(generation) {
            self.clear_tile_sets();
            self.scene_generation = Some(generation);
        }
        self.worker.set_scene(Arc::clone(&scene));
        self.set_data_sources(scene.sources());
        info!(
            generation,
            sources = self.tile_sets.len(),
            styles = scene.styles().len(),
            "Scene loaded"
        );
    }

    /// Replaces the set of sources.
    ///
    /// Tile sets of sources that are kept (same id, same instance) survive.
    /// Removed or replaced sources lose their active and cached tiles.
    pub fn set_data_sources(&mut self, sources: &[Arc<dyn TileSource>]) {
        let ids: BTreeSet<SourceId> = sources.iter().map(|s| s.id()).collect();
        let removed: Vec<SourceId> = self
            .tile_sets
            .keys()
            .filter(|id| !ids.contains(id))
            .copied()
            .collect();
        for id in removed {
            self.remove_data_source(id);
        }
        for source in sources {
            self.add_data_source(Arc::clone(source));
        }
    }

    /// Adds a source, replacing any source with the same id.
    pub fn add_data_source(&mut self, source: Arc<dyn TileSource>) {
        let id = source.id();
        match self.tile_sets.get(&id) {
            Some(set) if Arc::ptr_eq(set.source(), &source) => return,
            Some(_) => self.clear_tile_set(id),
            None => {}
        }
        debug!(source = %id, name = source.name(), "Data source added");
        let mut set = TileSet::new(source);
        set.set_cutoff(TaskId(self.next_task_id));
        self.tile_sets.insert(id, set);
        self.tile_set_changed = true;
    }

    /// Removes a source with all its tiles. Returns false if it was unknown.
    pub fn remove_data_source(&mut self, id: SourceId) -> bool {
        if !self.tile_sets.contains_key(&id) {
            return false;
        }
        self.clear_tile_set(id);
        self.tile_sets.remove(&id);
        debug!(source = %id, "Data source removed");
        true
    }

    /// Source registered under an id.
    pub fn source(&self, id: SourceId) -> Option<&Arc<dyn TileSource>> {
        self.tile_sets.get(&id).map(TileSet::source)
    }

    /// Cancels a source's tasks and discards its active and cached tiles.
    pub fn clear_tile_set(&mut self, id: SourceId) {
        let Some(set) = self.tile_sets.get_mut(&id) else {
            return;
        };
        let canceled = set.cancel_all();
        set.set_cutoff(TaskId(self.next_task_id));
        self.cache.clear(id);
        self.stats.canceled += canceled as u64;
        if canceled > 0 {
            self.worker.purge_canceled();
        }
        self.tile_set_changed = true;
        debug!(source = %id, canceled, "Tile set cleared");
    }

    /// Clears every tile set.
    pub fn clear_tile_sets(&mut self) {
        let ids: Vec<SourceId> = self.tile_sets.keys().copied().collect();
        for id in ids {
            self.clear_tile_set(id);
        }
        self.cache.clear_all();
    }

    // -------------------------------------------------------------------------
    // Per-frame update
    // -------------------------------------------------------------------------

    /// Reconciles the active sets with the tiles the view needs, then
    /// integrates finished tasks. Never blocks on tile work.
    pub fn update_tile_sets(&mut self, view: &ViewState, visible: &BTreeSet<TileCoord>) {
        self.frame += 1;
        self.tile_set_changed = false;

        let mut canceled = 0;
        for set in self.tile_sets.values_mut() {
            let wanted = wanted_tiles(set, &self.cache, visible, &self.proxy);
            let mut pass = Reconcile {
                cache: &mut self.cache,
                worker: &self.worker,
                next_task_id: &mut self.next_task_id,
                stats: &mut self.stats,
                view_zoom: view.zoom(),
                frame: self.frame,
                changed: false,
                canceled: 0,
            };
            pass.run(set, &wanted);
            self.tile_set_changed |= pass.changed;
            canceled += pass.canceled;
        }
        if canceled > 0 {
            self.worker.purge_canceled();
        }

        while let Some(outcome) = self.worker.try_recv() {
            self.integrate(outcome);
        }

        trace!(
            frame = self.frame,
            visible = visible.len(),
            cache_bytes = self.cache.memory_usage(),
            queued = self.worker.queue_len(),
            "Tile sets updated"
        );
    }

    fn integrate(&mut self, outcome: TaskOutcome) {
        let TaskOutcome {
            task_id, id, result, ..
        } = outcome;

        let current = match self.tile_sets.get(&id.source).and_then(|set| set.get(&id)) {
            Some(TileEntry::Loading { handle, proxy }) if handle.task_id() == task_id => Some(*proxy),
            _ => None,
        };
        let Some(proxy) = current else {
            self.discard_stale(task_id, id, result);
            return;
        };
        let Some(set) = self.tile_sets.get_mut(&id.source) else {
            return;
        };

        match result {
            TaskResult::Ready(mut tile) => {
                tile.set_proxy(proxy);
                tile.touch(self.frame);
                set.insert(id, TileEntry::Ready(tile));
                self.stats.installed += 1;
            }
            TaskResult::Failed(e) => {
                // Removing the slot lets the next update request it again
                set.remove(&id);
                self.stats.failed += 1;
                debug!(tile = %id, error = %e, "Dropped failed tile");
            }
            TaskResult::Canceled => {
                set.remove(&id);
            }
        }
        self.tile_set_changed = true;
    }

    /// Handles a result whose slot was canceled, replaced or cleared. Tasks
    /// issued before the set was created or last cleared are always dropped.
    fn discard_stale(&mut self, task_id: TaskId, id: TileId, result: TaskResult) {
        let TaskResult::Ready(mut tile) = result else {
            return;
        };
        let current_scene = match self.scene_generation {
            Some(generation) => tile.scene_generation() == generation,
            None => true,
        };
        let reusable = current_scene
            && self
                .tile_sets
                .get(&id.source)
                .is_some_and(|set| set.accepts(task_id) && !set.contains(&id));

        if reusable {
            tile.set_proxy(false);
            if self.cache.put(tile) {
                self.stats.stale_cached += 1;
                trace!(tile = %id, "Cached stale tile");
                return;
            }
        }
        self.stats.stale_dropped += 1;
        trace!(tile = %id, "Dropped stale tile");
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Built tiles across all sources, ordered by source then id.
    pub fn visible_tiles(&self) -> Vec<&Tile> {
        self.tile_sets
            .values()
            .flat_map(TileSet::ready_tiles)
            .collect()
    }

    pub(crate) fn visible_tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tile_sets.values_mut().flat_map(TileSet::ready_tiles_mut)
    }

    /// Where a tile currently lives.
    pub fn tile_location(&self, id: &TileId) -> TileLocation {
        match self.tile_sets.get(&id.source).and_then(|set| set.get(id)) {
            Some(TileEntry::Ready(_)) => TileLocation::Active,
            Some(TileEntry::Loading { .. }) => TileLocation::Loading,
            None if self.cache.contains(id) => TileLocation::Cached,
            None => TileLocation::Absent,
        }
    }

    /// True if the last update added, removed or installed any tile.
    pub fn has_tile_set_changed(&self) -> bool {
        self.tile_set_changed
    }

    /// Cache of tiles that left the active set.
    pub fn tile_cache(&self) -> &TileCache {
        &self.cache
    }

    /// Tile set of a source.
    pub fn tile_set(&self, id: SourceId) -> Option<&TileSet> {
        self.tile_sets.get(&id)
    }

    /// All tile sets, ordered by source id.
    pub fn tile_sets(&self) -> impl Iterator<Item = &TileSet> {
        self.tile_sets.values()
    }

    /// Worker pool building this manager's tiles.
    pub fn worker(&self) -> &TileWorker {
        &self.worker
    }

    /// Number of active slots with a task in flight.
    pub fn loading_count(&self) -> usize {
        self.tile_sets.values().map(TileSet::loading_count).sum()
    }

    /// Number of completed updates.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Counters accumulated since the manager was created.
    pub fn stats(&self) -> ManagerStats {
        self.stats
    }
}

impl fmt::Debug for TileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileManager")
            .field("tile_sets", &self.tile_sets)
            .field("cache_bytes", &self.cache.memory_usage())
            .field("frame", &self.frame)
            .finish()
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Wanted ids for one source, mapped to whether each is a proxy.
fn wanted_tiles(
    set: &TileSet,
    cache: &TileCache,
    visible: &BTreeSet<TileCoord>,
    proxy: &ProxyConfig,
) -> BTreeMap<TileId, bool> {
    let source = set.source_id();
    let max_zoom = set.source().max_zoom();

    let required: BTreeSet<TileId> = visible
        .iter()
        .filter(|coord| coord.is_valid())
        .map(|coord| coord.clamp_zoom(max_zoom).with_source(source))
        .collect();
    let mut wanted: BTreeMap<TileId, bool> = required.iter().map(|id| (*id, false)).collect();

    if !proxy.is_enabled() {
        return wanted;
    }

    let available = |id: &TileId| set.is_ready(id) || cache.contains(id);
    let descendants = proxy.use_descendants || proxy.request_descendants;

    for id in required.iter().filter(|id| !available(id)) {
        // Walk up until a built ancestor is found, requesting the ones between
        for level in 1..=proxy.ancestor_levels {
            let Some(ancestor) = id.ancestor(level) else {
                break;
            };
            wanted.entry(ancestor).or_insert(true);
            if available(&ancestor) {
                break;
            }
        }

        if descendants && id.z < max_zoom {
            for child in id.children() {
                if proxy.request_descendants || available(&child) {
                    wanted.entry(child).or_insert(true);
                }
            }
        }
    }

    wanted
}

/// One source's reconciliation pass.
struct Reconcile<'a> {
    cache: &'a mut TileCache,
    worker: &'a TileWorker,
    next_task_id: &'a mut u64,
    stats: &'a mut ManagerStats,
    view_zoom: f32,
    frame: u64,
    changed: bool,
    canceled: usize,
}

impl Reconcile<'_> {
    fn run(&mut self, set: &mut TileSet, wanted: &BTreeMap<TileId, bool>) {
        // Newly wanted first, so cache hits are taken before this pass's
        // evictions can push them out.
        for (&id, &proxy) in wanted {
            match set.get_mut(&id) {
                Some(TileEntry::Ready(tile)) => {
                    tile.set_proxy(proxy);
                    tile.touch(self.frame);
                }
                Some(TileEntry::Loading { proxy: slot, .. }) => *slot = proxy,
                None => self.request(set, id, proxy),
            }
        }

        let unwanted: Vec<TileId> = set.ids().filter(|id| !wanted.contains_key(id)).collect();
        for id in unwanted {
            match set.remove(&id) {
                Some(TileEntry::Ready(mut tile)) => {
                    tile.set_proxy(false);
                    self.cache.put(tile);
                }
                Some(TileEntry::Loading { handle, .. }) => {
                    handle.cancel();
                    self.canceled += 1;
                    self.stats.canceled += 1;
                    trace!(tile = %id, task = %handle.task_id(), "Canceled tile task");
                }
                None => continue,
            }
            self.changed = true;
        }
    }

    fn request(&mut self, set: &mut TileSet, id: TileId, proxy: bool) {
        if let Some(mut tile) = self.cache.take(&id) {
            tile.set_proxy(proxy);
            tile.touch(self.frame);
            set.insert(id, TileEntry::Ready(tile));
            self.stats.reinstated += 1;
            self.changed = true;
            trace!(tile = %id, "Reinstated tile from cache");
            return;
        }

        *self.next_task_id += 1;
        let mut task = set.source().create_task(id);
        let priority = Priority::for_tile(&id, self.view_zoom, proxy);
        let handle = task.prepare(TaskId(*self.next_task_id), priority, proxy);
        self.worker.enqueue(task, Arc::clone(set.source()));
        set.insert(id, TileEntry::Loading { handle, proxy });
        self.stats.requested += 1;
        self.changed = true;
    }
}

// =============================================================================
// Tests
// =============================================================================
