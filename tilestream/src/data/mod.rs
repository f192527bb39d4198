//! Tile data sources and parsed payloads.

mod memory;
mod source;
mod synthetic;
mod tile_data;

pub use memory::MemorySource;
pub use source::TileSource;
pub use synthetic::{SyntheticSource, DEFAULT_GRID_SIZE};
pub use tile_data::{Feature, Geometry, Layer, TileData};
