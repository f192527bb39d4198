//! Procedurally generated tiles for demos and benchmarks.

use std::thread;
use std::time::Duration;

use crate::error::TileError;
use crate::task::TileTask;
use crate::tile::{SourceId, TileId, MAX_ZOOM};

use super::source::TileSource;
use super::tile_data::{Feature, Geometry, Layer, TileData};

/// Default number of blocks per tile edge.
pub const DEFAULT_GRID_SIZE: u32 = 8;

/// A source that fabricates a deterministic street grid for every tile.
///
/// Each tile holds a `landuse` background polygon, a `buildings` layer with
/// one polygon per grid block, a `roads` layer with the grid lines and a
/// `pois` layer with a handful of points. The payload is serialized and then
/// decoded like any other source so the parse stage does real work.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    id: SourceId,
    name: String,
    grid_size: u32,
    latency: Duration,
    max_zoom: u8,
}

impl SyntheticSource {
    /// Creates a synthetic source with the default grid density.
    pub fn new(id: SourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            grid_size: DEFAULT_GRID_SIZE,
            latency: Duration::ZERO,
            max_zoom: MAX_ZOOM,
        }
    }

    /// Sets how many blocks run along each tile edge.
    pub fn with_grid_size(mut self, grid_size: u32) -> Self {
        self.grid_size = grid_size.max(1);
        self
    }

    /// Adds an artificial delay to every load, simulating network fetches.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Limits the deepest zoom this source serves.
    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    /// Generates the payload for a tile.
    pub fn generate(&self, id: TileId) -> TileData {
        let n = self.grid_size;
        let cell = 1.0 / n as f32;
        let inset = cell * 0.15;
        let seed = tile_seed(id);

        let landuse = Layer::new("landuse").with_feature(
            Feature::new(Geometry::Polygon(vec![vec![
                [0.0, 0.0],
                [1.0, 0.0],
                [1.0, 1.0],
                [0.0, 1.0],
            ]]))
            .with_property("kind", if seed % 3 == 0 { "park" } else { "residential" }),
        );

        let mut buildings = Layer::new("buildings");
        let mut roads = Layer::new("roads");
        for i in 0..n {
            for j in 0..n {
                let x0 = i as f32 * cell + inset;
                let y0 = j as f32 * cell + inset;
                let x1 = (i + 1) as f32 * cell - inset;
                let y1 = (j + 1) as f32 * cell - inset;
                let height = ((seed >> ((i + j) % 16)) % 40 + 5) as i64;
                buildings.features.push(
                    Feature::new(Geometry::Polygon(vec![vec![
                        [x0, y0],
                        [x1, y0],
                        [x1, y1],
                        [x0, y1],
                    ]]))
                    .with_property("height", height),
                );
            }

            let t = i as f32 * cell;
            let kind = if i % 4 == 0 { "major" } else { "minor" };
            roads.features.push(
                Feature::new(Geometry::LineString(vec![[t, 0.0], [t, 1.0]]))
                    .with_property("kind", kind),
            );
            roads.features.push(
                Feature::new(Geometry::LineString(vec![[0.0, t], [1.0, t]]))
                    .with_property("kind", kind),
            );
        }

        let mut pois = Layer::new("pois");
        for k in 0..(seed % 5 + 1) {
            let u = ((seed >> (k * 3)) % 97) as f32 / 97.0;
            let v = ((seed >> (k * 5 + 1)) % 89) as f32 / 89.0;
            pois.features
                .push(Feature::new(Geometry::Point([u, v])).with_property("rank", k as i64));
        }

        TileData::new()
            .with_layer(landuse)
            .with_layer(buildings)
            .with_layer(roads)
            .with_layer(pois)
    }
}

impl TileSource for SyntheticSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn load(&self, task: &mut TileTask) -> Result<(), TileError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        task.set_raw_data(self.generate(task.id()).to_json().into());
        Ok(())
    }
}

/// Cheap deterministic hash of a tile id.
fn tile_seed(id: TileId) -> u64 {
    let mut h = 0xcbf2_9ce4_8422_2325_u64;
    for part in [id.x as u64, id.y as u64, id.z as u64, id.source.0 as u64] {
        h ^= part;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic() {
        let source = SyntheticSource::new(SourceId(0), "synthetic");
        let id = TileId::new(3, 5, 4, SourceId(0));
        assert_eq!(source.generate(id), source.generate(id));
    }

    #[test]
    fn test_grid_density() {
        let source = SyntheticSource::new(SourceId(0), "synthetic").with_grid_size(4);
        let data = source.generate(TileId::new(0, 0, 0, SourceId(0)));

        assert_eq!(data.layer("buildings").unwrap().features.len(), 16);
        assert_eq!(data.layer("roads").unwrap().features.len(), 8);
        assert_eq!(data.layer("landuse").unwrap().features.len(), 1);
        assert!(!data.layer("pois").unwrap().features.is_empty());
    }

    #[test]
    fn test_load_then_parse() {
        let source = SyntheticSource::new(SourceId(0), "synthetic").with_grid_size(2);
        let id = TileId::new(1, 1, 1, SourceId(0));
        let mut task = source.create_task(id);

        source.load(&mut task).unwrap();
        let parsed = source.parse(&task).unwrap();
        assert_eq!(parsed, source.generate(id));
    }
}
