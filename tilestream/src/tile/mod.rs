//! Tile identifiers, geometry and lifecycle.

mod id;
mod mesh;
#[allow(clippy::module_inception)]
mod tile;

pub use id::{SourceId, TileCoord, TileId, MAX_ZOOM};
pub use mesh::{Mesh, Vertex};
pub use tile::{Tile, TileState};
