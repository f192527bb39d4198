//! Geometry building.
//!
//! [`TileBuilder`] is a pure function of its inputs: the parsed tile data, the
//! source, and the scene snapshot it was created with. Worker threads each
//! own one builder per task, so there is no shared mutable state on the
//! build path.

use std::sync::Arc;

use tracing::trace;

use crate::data::{TileData, TileSource};
use crate::error::TileError;
use crate::style::Scene;
use crate::tile::{Mesh, Tile, TileId};

/// Mesh key for the debug tile outline.
pub const TILE_BOUNDS_STYLE: &str = "__tile_bounds";

const TILE_BOUNDS_COLOR: [u8; 4] = [255, 0, 255, 255];
const TILE_BOUNDS_WIDTH: f32 = 0.01;

/// Builds renderable tiles from parsed data.
#[derive(Clone, Debug)]
pub struct TileBuilder {
    scene: Arc<Scene>,
    tile_bounds: bool,
}

impl TileBuilder {
    /// Creates a builder over a scene snapshot.
    pub fn new(scene: Arc<Scene>) -> Self {
        Self {
            scene,
            tile_bounds: false,
        }
    }

    /// Also emits an outline of the tile square.
    pub fn with_tile_bounds(mut self, enabled: bool) -> Self {
        self.tile_bounds = enabled;
        self
    }

    /// Scene this builder draws with.
    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    /// Builds a `Ready` tile with one mesh per style.
    ///
    /// Sources that do not generate geometry yield an empty `Ready` tile.
    pub fn build(
        &self,
        id: TileId,
        data: &TileData,
        source: &dyn TileSource,
    ) -> Result<Tile, TileError> {
        let mut tile = Tile::new(id, self.scene.generation());

        if source.generate_geometry() {
            for style in self.scene.styles() {
                let mut mesh = Mesh::new();
                style.draw(data, &mut mesh).map_err(|e| TileError::Build {
                    tile: id,
                    style: style.name().to_string(),
                    source: e,
                })?;
                tile.add_mesh(style.name(), mesh);
            }
        }

        if self.tile_bounds {
            tile.add_mesh(TILE_BOUNDS_STYLE, tile_outline());
        }

        tile.mark_ready();
        trace!(
            tile = %id,
            features = data.feature_count(),
            bytes = tile.memory_usage(),
            "Built tile"
        );
        Ok(tile)
    }
}

/// Four thin quads along the edges of the unit square.
fn tile_outline() -> Mesh {
    let w = TILE_BOUNDS_WIDTH;
    let mut mesh = Mesh::new();
    mesh.push_quad([[0.0, 0.0], [1.0, 0.0], [1.0, w], [0.0, w]], TILE_BOUNDS_COLOR);
    mesh.push_quad([[0.0, 1.0 - w], [1.0, 1.0 - w], [1.0, 1.0], [0.0, 1.0]], TILE_BOUNDS_COLOR);
    mesh.push_quad([[0.0, 0.0], [w, 0.0], [w, 1.0], [0.0, 1.0]], TILE_BOUNDS_COLOR);
    mesh.push_quad([[1.0 - w, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0 - w, 1.0]], TILE_BOUNDS_COLOR);
    mesh
}
