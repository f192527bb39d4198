//! The host-facing pipeline object.
//!
//! A [`Map`] bundles the tile manager (with its worker pool and cache), the
//! main-loop callback queue, debug flags and frame bookkeeping. Hosts create
//! one per map view and drive it once per frame:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tilestream::{Map, PipelineConfig, Scene, SourceId, SyntheticSource, ViewState};
//! use tilestream::style::{DrawRule, PolygonStyle};
//!
//! let map = Map::new(PipelineConfig::default())?;
//! map.load_scene(Arc::new(
//!     Scene::new()
//!         .with_style(PolygonStyle::new("buildings").with_rule(DrawRule::new("buildings", [200, 190, 180, 255])))
//!         .with_source(SyntheticSource::new(SourceId(0), "synthetic")),
//! ));
//!
//! let mut view = ViewState::from_lon_lat(13.4, 52.5, 12.0, [1024.0, 768.0]);
//! map.update_view(1.0 / 60.0, &mut view);
//! map.with_visible_tiles(|tiles| println!("{} tiles ready", tiles.len()));
//! # Ok::<(), tilestream::PipelineError>(())
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::data::TileSource;
use crate::error::PipelineError;
use crate::main_loop::MainThreadQueue;
use crate::manager::TileManager;
use crate::stats::{PipelineStats, UpdateTimer};
use crate::style::Scene;
use crate::tile::{SourceId, Tile, TileCoord};
use crate::view::ViewState;

/// Host callback asking for another frame.
pub type RenderCallback = Arc<dyn Fn() + Send + Sync>;

/// Debug switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DebugFlag {
    /// Time each update and log the rolling average.
    Infos,
    /// Draw an outline around every tile. Toggling rebuilds all tiles.
    TileBounds,
}

impl DebugFlag {
    fn bit(self) -> u8 {
        match self {
            DebugFlag::Infos => 1,
            DebugFlag::TileBounds => 1 << 1,
        }
    }
}

#[derive(Default)]
struct FrameState {
    frame_time: f64,
    timer: UpdateTimer,
}

/// The tile pipeline for one map view.
pub struct Map {
    config: PipelineConfig,
    tiles: Mutex<TileManager>,
    main_loop: Arc<MainThreadQueue>,
    render_requested: Arc<AtomicBool>,
    render_callback: Arc<RwLock<Option<RenderCallback>>>,
    debug_flags: AtomicU8,
    frame: Mutex<FrameState>,
}

impl Map {
    /// Creates the pipeline and starts its worker threads.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let manager = TileManager::new(&config)?;

        let render_requested = Arc::new(AtomicBool::new(false));
        let render_callback: Arc<RwLock<Option<RenderCallback>>> = Arc::new(RwLock::new(None));
        {
            let requested = Arc::clone(&render_requested);
            let callback = Arc::clone(&render_callback);
            manager.worker().set_completion_notifier(Arc::new(move || {
                requested.store(true, Ordering::Release);
                let callback = callback.read().clone();
                if let Some(callback) = callback {
                    callback();
                }
            }));
        }

        info!(
            workers = config.worker_count,
            cache_bytes = config.cache_capacity_bytes,
            "Map created"
        );
        Ok(Self {
            config,
            tiles: Mutex::new(manager),
            main_loop: Arc::new(MainThreadQueue::new()),
            render_requested,
            render_callback,
            debug_flags: AtomicU8::new(0),
            frame: Mutex::new(FrameState::default()),
        })
    }

    /// Installs a callback invoked (from worker threads) whenever a tile
    /// finishes, so non-continuous hosts can schedule a frame.
    pub fn with_render_callback(self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        *self.render_callback.write() = Some(Arc::new(callback));
        self
    }

    /// Configuration the map was created with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Scene and sources
    // -------------------------------------------------------------------------

    /// Swaps in a new scene. Tasks in flight finish under the old one and
    /// their results are discarded.
    pub fn load_scene(&self, scene: Arc<Scene>) {
        self.tiles.lock().set_scene(scene);
        self.request_render();
    }

    /// Scene used for new tasks.
    pub fn scene(&self) -> Option<Arc<Scene>> {
        self.tiles.lock().worker().scene()
    }

    /// Adds or replaces a data source.
    pub fn add_data_source(&self, source: Arc<dyn TileSource>) {
        self.tiles.lock().add_data_source(source);
        self.request_render();
    }

    /// Clears a source's own data and/or its tiles.
    ///
    /// Returns false if no source has this id.
    pub fn clear_data_source(&self, id: SourceId, data: bool, tiles: bool) -> bool {
        let mut manager = self.tiles.lock();
        let Some(source) = manager.source(id).cloned() else {
            return false;
        };
        if data {
            source.clear_data();
        }
        if tiles {
            manager.clear_tile_set(id);
        }
        drop(manager);

        debug!(source = %id, data, tiles, "Data source cleared");
        self.request_render();
        true
    }

    // -------------------------------------------------------------------------
    // Frame
    // -------------------------------------------------------------------------

    /// Queues a closure to run at the start of the next update.
    pub fn run_on_main_loop(&self, task: impl FnOnce() + Send + 'static) {
        self.main_loop.push(task);
        self.request_render();
    }

    /// Shared handle to the main-loop queue, for posting from other threads.
    pub fn main_loop(&self) -> Arc<MainThreadQueue> {
        Arc::clone(&self.main_loop)
    }

    /// Runs one frame of tile bookkeeping.
    ///
    /// Queued main-loop callbacks run first. Then, under the tile lock, the
    /// active sets are reconciled with `visible`, finished tasks are
    /// installed and per-tile animation advances. Returns true if the tile
    /// sets changed.
    pub fn update(&self, dt: f32, view: &ViewState, visible: &BTreeSet<TileCoord>) -> bool {
        let start = Instant::now();
        self.main_loop.run_all();

        let fade = self.config.fade_duration;
        let mut manager = self.tiles.lock();
        manager.update_tile_sets(view, visible);
        let changed = manager.has_tile_set_changed();

        let mut animating = false;
        for tile in manager.visible_tiles_mut() {
            tile.update(dt, fade);
            animating |= tile.fade() < 1.0;
        }
        drop(manager);

        if animating {
            self.request_render();
        }

        let mut frame = self.frame.lock();
        frame.frame_time += dt as f64;
        if self.debug_flag(DebugFlag::Infos) {
            frame.timer.record(start.elapsed());
            debug!(
                avg_ms = frame.timer.average_ms(),
                visible = visible.len(),
                "Map update"
            );
        }
        changed
    }

    /// Runs [`update`](Self::update) with the view's own visible tiles and
    /// clears its changed flag.
    pub fn update_view(&self, dt: f32, view: &mut ViewState) -> bool {
        let visible = view.visible_tiles();
        let changed = self.update(dt, view, &visible);
        view.clear_changed();
        changed
    }

    /// Borrows the built tiles under the tile lock.
    pub fn with_visible_tiles<R>(&self, f: impl FnOnce(&[&Tile]) -> R) -> R {
        let manager = self.tiles.lock();
        let tiles = manager.visible_tiles();
        f(&tiles)
    }

    /// Borrows the manager under the tile lock, for diagnostics.
    pub fn with_tile_manager<R>(&self, f: impl FnOnce(&TileManager) -> R) -> R {
        f(&self.tiles.lock())
    }

    /// Accumulated `dt` across updates, in seconds.
    pub fn frame_time(&self) -> f64 {
        self.frame.lock().frame_time
    }

    // -------------------------------------------------------------------------
    // Rendering requests
    // -------------------------------------------------------------------------

    /// Asks the host to draw another frame.
    pub fn request_render(&self) {
        self.render_requested.store(true, Ordering::Release);
    }

    /// Returns and resets the render request flag.
    pub fn take_render_request(&self) -> bool {
        self.render_requested.swap(false, Ordering::AcqRel)
    }

    // -------------------------------------------------------------------------
    // Debug
    // -------------------------------------------------------------------------

    /// Whether a debug flag is set.
    pub fn debug_flag(&self, flag: DebugFlag) -> bool {
        self.debug_flags.load(Ordering::Relaxed) & flag.bit() != 0
    }

    /// Sets a debug flag. Changing [`DebugFlag::TileBounds`] rebuilds every tile.
    pub fn set_debug_flag(&self, flag: DebugFlag, on: bool) {
        let previous = if on {
            self.debug_flags.fetch_or(flag.bit(), Ordering::Relaxed)
        } else {
            self.debug_flags.fetch_and(!flag.bit(), Ordering::Relaxed)
        };
        if (previous & flag.bit() != 0) == on {
            return;
        }

        if flag == DebugFlag::TileBounds {
            let mut manager = self.tiles.lock();
            manager.worker().set_debug_tile_bounds(on);
            manager.clear_tile_sets();
        }
        self.request_render();
    }

    /// Flips a debug flag.
    pub fn toggle_debug_flag(&self, flag: DebugFlag) {
        self.set_debug_flag(flag, !self.debug_flag(flag));
    }

    /// Snapshot of pipeline counters.
    pub fn stats(&self) -> PipelineStats {
        let manager = self.tiles.lock();
        let visible = manager.visible_tiles();
        let buffer_bytes = visible.iter().map(|t| t.memory_usage()).sum::<usize>();
        let frame = self.frame.lock();
        PipelineStats {
            visible_tiles: visible.len(),
            loading_tiles: manager.loading_count(),
            buffer_bytes,
            cache: manager.tile_cache().stats(),
            worker: manager.worker().stats(),
            avg_update_ms: frame.timer.average_ms(),
            frame_time: frame.frame_time,
        }
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("config", &self.config)
            .field("debug_flags", &self.debug_flags.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemorySource;
    use crate::style::{DrawRule, PolygonStyle};
    use crate::tile::TileId;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn map() -> Map {
        Map::new(PipelineConfig::default().with_worker_count(1)).unwrap()
    }

    fn wait_until(
        map: &Map,
        view: &ViewState,
        visible: &BTreeSet<TileCoord>,
        done: impl Fn(&Map) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            map.update(0.016, view, visible);
            if done(map) {
                return;
            }
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn scene() -> Arc<Scene> {
        Arc::new(
            Scene::new()
                .with_style(PolygonStyle::new("fill").with_rule(DrawRule::new("land", [0, 255, 0, 255])))
                .with_source(MemorySource::new(SourceId(0), "client")),
        )
    }

    #[test]
    fn test_update_builds_visible_tiles() {
        let map = map();
        map.load_scene(scene());

        let view = ViewState::new([0.0, 0.0], 1.0, [512.0, 512.0]);
        let visible = view.visible_tiles();
        wait_until(&map, &view, &visible, |m| m.stats().visible_tiles >= visible.len());

        map.with_visible_tiles(|tiles| assert!(tiles.iter().all(|t| t.is_ready())));
        assert!(map.frame_time() > 0.0);
    }

    #[test]
    fn test_main_loop_runs_before_update() {
        let map = map();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        map.run_on_main_loop(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let view = ViewState::new([0.0, 0.0], 0.0, [256.0, 256.0]);
        map.update(0.0, &view, &BTreeSet::new());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_flags() {
        let map = map();
        assert!(!map.debug_flag(DebugFlag::Infos));
        map.toggle_debug_flag(DebugFlag::Infos);
        assert!(map.debug_flag(DebugFlag::Infos));
        map.set_debug_flag(DebugFlag::TileBounds, true);
        assert!(map.debug_flag(DebugFlag::TileBounds));
        assert!(map.debug_flag(DebugFlag::Infos));
        map.toggle_debug_flag(DebugFlag::Infos);
        assert!(!map.debug_flag(DebugFlag::Infos));
    }

    #[test]
    fn test_tile_bounds_rebuilds_tiles() {
        let map = map();
        map.load_scene(scene());
        let view = ViewState::new([0.0, 0.0], 0.0, [256.0, 256.0]);
        let visible = view.visible_tiles();
        wait_until(&map, &view, &visible, |m| m.stats().visible_tiles == 1);

        map.set_debug_flag(DebugFlag::TileBounds, true);
        assert_eq!(map.stats().visible_tiles, 0);

        wait_until(&map, &view, &visible, |m| m.stats().visible_tiles == 1);
        map.with_visible_tiles(|tiles| {
            assert!(tiles[0].mesh(crate::builder::TILE_BOUNDS_STYLE).is_some());
        });
    }

    /// Holds every load until released.
    struct HeldSource {
        released: Mutex<bool>,
        changed: parking_lot::Condvar,
        started: AtomicUsize,
    }

    impl HeldSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                released: Mutex::new(false),
                changed: parking_lot::Condvar::new(),
                started: AtomicUsize::new(0),
            })
        }

        fn release(&self) {
            *self.released.lock() = true;
            self.changed.notify_all();
        }
    }

    impl TileSource for HeldSource {
        fn id(&self) -> SourceId {
            SourceId(0)
        }
        fn name(&self) -> &str {
            "held"
        }
        fn load(&self, _task: &mut crate::task::TileTask) -> Result<(), crate::error::TileError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let mut released = self.released.lock();
            while !*released {
                self.changed.wait(&mut released);
            }
            Ok(())
        }
        fn parse(
            &self,
            _task: &crate::task::TileTask,
        ) -> Result<crate::data::TileData, crate::error::TileError> {
            Ok(crate::data::TileData::default())
        }
    }

    #[test]
    fn test_tile_bounds_toggle_discards_unbounded_build() {
        let map = map();
        let source = HeldSource::new();
        map.load_scene(Arc::new(
            Scene::new()
                .with_style(PolygonStyle::new("fill").with_rule(DrawRule::new("land", [0, 255, 0, 255])))
                .with_shared_source(source.clone()),
        ));
        let view = ViewState::new([0.0, 0.0], 0.0, [256.0, 256.0]);
        let visible = view.visible_tiles();
        let id = TileId::new(0, 0, 0, SourceId(0));

        map.update(0.016, &view, &visible);
        let deadline = Instant::now() + Duration::from_secs(5);
        while source.started.load(Ordering::SeqCst) == 0 {
            if Instant::now() >= deadline {
                source.release();
                panic!("load never started");
            }
            thread::sleep(Duration::from_millis(1));
        }

        // Let the outline-free build finish without delivering it
        source.release();
        while map.tiles.lock().worker().pending() > 0 {
            assert!(Instant::now() < deadline, "build never finished");
            thread::sleep(Duration::from_millis(1));
        }
        map.set_debug_flag(DebugFlag::TileBounds, true);

        // Pan away and back: the old build must neither be cached nor reused
        map.update(0.016, &view, &BTreeSet::new());
        assert!(!map.tiles.lock().tile_cache().contains(&id));

        wait_until(&map, &view, &visible, |m| m.stats().visible_tiles == 1);
        map.with_visible_tiles(|tiles| {
            assert!(tiles
                .iter()
                .all(|t| t.mesh(crate::builder::TILE_BOUNDS_STYLE).is_some()));
        });
    }

    #[test]
    fn test_clear_data_source() {
        let map = map();
        let source = Arc::new(MemorySource::new(SourceId(3), "client"));
        source.insert_raw(TileCoord::new(0, 0, 0), "{}");
        map.add_data_source(source.clone());

        assert!(map.clear_data_source(SourceId(3), true, true));
        assert!(source.is_empty());
        assert!(!map.clear_data_source(SourceId(9), true, true));
    }

    #[test]
    fn test_render_requested_on_completion() {
        let map = map();
        map.load_scene(scene());
        map.take_render_request();

        let view = ViewState::new([0.0, 0.0], 0.0, [256.0, 256.0]);
        map.update(0.0, &view, &view.visible_tiles());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !map.take_render_request() {
            assert!(Instant::now() < deadline, "no render request");
            thread::sleep(Duration::from_millis(1));
        }
    }
}
