//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use tilestream::style::{DrawRule, PolygonStyle};
use tilestream::{
    Feature, Geometry, Layer, PipelineConfig, ProxyConfig, Scene, SourceId, TileCoord, TileData,
    TileError, TileManager, TileSource, TileTask, ViewState,
};

pub const TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Gate
// =============================================================================

/// Blocks worker loads until opened.
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn new(open: bool) -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(open),
            changed: Condvar::new(),
        })
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.changed.notify_all();
    }

    pub fn close(&self) {
        *self.open.lock() = false;
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.changed.wait(&mut open);
        }
    }
}

// =============================================================================
// Sources
// =============================================================================

/// One filled square covering the tile.
pub fn land() -> TileData {
    TileData::new().with_layer(Layer::new("land").with_feature(Feature::new(Geometry::Polygon(
        vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]],
    ))))
}

/// A source whose loads wait on a gate and are recorded in start order.
pub struct GatedSource {
    id: SourceId,
    gate: Arc<Gate>,
    loads: Mutex<Vec<TileCoord>>,
}

impl GatedSource {
    pub fn new(id: SourceId, gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self {
            id,
            gate,
            loads: Mutex::new(Vec::new()),
        })
    }

    /// Coordinates in the order their loads started.
    pub fn load_order(&self) -> Vec<TileCoord> {
        self.loads.lock().clone()
    }

    pub fn load_count(&self, coord: TileCoord) -> usize {
        self.loads.lock().iter().filter(|c| **c == coord).count()
    }

    pub fn started(&self) -> usize {
        self.loads.lock().len()
    }
}

impl TileSource for GatedSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        "gated"
    }

    fn load(&self, task: &mut TileTask) -> Result<(), TileError> {
        self.loads.lock().push(task.id().coord());
        self.gate.wait();
        task.set_raw_data(land().to_json().into());
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A manager plus the gate its sources wait on.
///
/// Dropping the harness opens the gate first so worker threads can be joined.
pub struct Harness {
    pub manager: TileManager,
    pub gate: Arc<Gate>,
    pub scene: Arc<Scene>,
}

impl Harness {
    pub fn new(config: PipelineConfig, gate: Arc<Gate>, sources: Vec<Arc<dyn TileSource>>) -> Self {
        let mut manager = TileManager::new(&config).unwrap();
        let scene = scene(sources);
        manager.set_scene(Arc::clone(&scene));
        Self {
            manager,
            gate,
            scene,
        }
    }

    pub fn update(&mut self, view: &ViewState, visible: &BTreeSet<TileCoord>) {
        self.manager.update_tile_sets(view, visible);
    }

    /// Updates until no task is loading or queued.
    pub fn settle(&mut self, view: &ViewState, visible: &BTreeSet<TileCoord>) {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            self.manager.update_tile_sets(view, visible);
            if self.manager.loading_count() == 0 && self.manager.worker().pending() == 0 {
                return;
            }
            assert!(Instant::now() < deadline, "pipeline did not settle");
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Updates until `done` holds.
    pub fn update_until(
        &mut self,
        view: &ViewState,
        visible: &BTreeSet<TileCoord>,
        done: impl Fn(&TileManager) -> bool,
    ) {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            self.manager.update_tile_sets(view, visible);
            if done(&self.manager) {
                return;
            }
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.gate.open();
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub fn scene(sources: Vec<Arc<dyn TileSource>>) -> Arc<Scene> {
    let mut scene = Scene::new()
        .with_style(PolygonStyle::new("fill").with_rule(DrawRule::new("land", [80, 160, 80, 255])));
    for source in sources {
        scene = scene.with_shared_source(source);
    }
    Arc::new(scene)
}

/// Single worker, no proxies, generous cache.
pub fn config() -> PipelineConfig {
    PipelineConfig::default()
        .with_worker_count(1)
        .with_proxy(ProxyConfig::disabled())
}

pub fn view(zoom: f32) -> ViewState {
    ViewState::new([0.0, 0.0], zoom, [256.0, 256.0])
}

pub fn coords(list: &[(u32, u32, u8)]) -> BTreeSet<TileCoord> {
    list.iter().map(|&(x, y, z)| TileCoord::new(x, y, z)).collect()
}

/// Blocks until `cond` holds.
pub fn wait_for(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(1));
    }
}
