//! Built tiles and their lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::time::Duration;

use super::id::TileId;
use super::mesh::Mesh;

/// Lifecycle state of a tile.
///
/// A tile moves `Loading → Ready` or `Loading → Failed` exactly once.
/// `Canceled` only happens before `Ready` and never yields a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Work for this tile is queued or running.
    Loading,
    /// Geometry is built and immutable.
    Ready,
    /// The tile stopped being needed before it was built.
    Canceled,
    /// Fetching, parsing or building failed.
    Failed,
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileState::Loading => "loading",
            TileState::Ready => "ready",
            TileState::Canceled => "canceled",
            TileState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A tile with one mesh per style.
///
/// Geometry can only be added while the tile is `Loading`; after
/// [`Tile::mark_ready`] only per-frame state (fade, usage tracking, proxy
/// marker) changes.
#[derive(Debug)]
pub struct Tile {
    id: TileId,
    state: TileState,
    meshes: BTreeMap<String, Mesh>,
    memory_usage: usize,
    scene_generation: u64,

    // Per-frame state
    proxy: bool,
    fade: f32,
    last_used_frame: u64,
}

impl Tile {
    /// Creates an empty tile in the `Loading` state.
    pub fn new(id: TileId, scene_generation: u64) -> Self {
        Self {
            id,
            state: TileState::Loading,
            meshes: BTreeMap::new(),
            memory_usage: mem::size_of::<Self>(),
            scene_generation,
            proxy: false,
            fade: 0.0,
            last_used_frame: 0,
        }
    }

    /// Attaches the mesh for a style. Empty meshes are skipped.
    ///
    /// Returns false if the tile is no longer `Loading`.
    pub(crate) fn add_mesh(&mut self, style: impl Into<String>, mesh: Mesh) -> bool {
        if self.state != TileState::Loading {
            return false;
        }
        if mesh.is_empty() {
            return true;
        }
        self.memory_usage += mesh.memory_usage();
        if let Some(old) = self.meshes.insert(style.into(), mesh) {
            self.memory_usage -= old.memory_usage();
        }
        true
    }

    /// Freezes the geometry. Only valid once, from `Loading`.
    pub(crate) fn mark_ready(&mut self) -> bool {
        if self.state != TileState::Loading {
            return false;
        }
        self.state = TileState::Ready;
        true
    }

    /// Tile id.
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Lifecycle state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Returns true once the geometry is built.
    pub fn is_ready(&self) -> bool {
        self.state == TileState::Ready
    }

    /// Mesh built for a style, if that style produced geometry.
    pub fn mesh(&self, style: &str) -> Option<&Mesh> {
        self.meshes.get(style)
    }

    /// All meshes keyed by style name.
    pub fn meshes(&self) -> impl Iterator<Item = (&str, &Mesh)> {
        self.meshes.iter().map(|(name, mesh)| (name.as_str(), mesh))
    }

    /// Approximate resident size in bytes.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    /// Generation of the scene whose styles built this tile.
    pub fn scene_generation(&self) -> u64 {
        self.scene_generation
    }

    /// True while this tile stands in for a required tile still loading.
    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    pub(crate) fn set_proxy(&mut self, proxy: bool) {
        self.proxy = proxy;
    }

    /// Fade-in progress in `[0, 1]`.
    pub fn fade(&self) -> f32 {
        self.fade
    }

    /// Last frame in which this tile was part of the active set.
    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }

    pub(crate) fn touch(&mut self, frame: u64) {
        self.last_used_frame = frame;
    }

    /// Advances per-frame animation state.
    ///
    /// A zero `fade_duration` makes tiles fully opaque immediately.
    pub fn update(&mut self, dt: f32, fade_duration: Duration) {
        let duration = fade_duration.as_secs_f32();
        if duration <= 0.0 {
            self.fade = 1.0;
            return;
        }
        self.fade = (self.fade + dt.max(0.0) / duration).min(1.0);
    }
}
