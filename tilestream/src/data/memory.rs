//! Client-provided tile payloads held in memory.

use bytes::Bytes;
use dashmap::DashMap;

use crate::error::TileError;
use crate::task::TileTask;
use crate::tile::{SourceId, TileCoord, TileId, MAX_ZOOM};

use super::source::TileSource;
use super::tile_data::TileData;

/// A source whose payloads are pushed by the host application.
///
/// Tiles with no payload build as empty tiles rather than failing, since an
/// absent entry just means the client has no features there.
pub struct MemorySource {
    id: SourceId,
    name: String,
    max_zoom: u8,
    tiles: DashMap<TileCoord, Bytes>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new(id: SourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            max_zoom: MAX_ZOOM,
            tiles: DashMap::new(),
        }
    }

    /// Limits the deepest zoom this source serves.
    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    /// Stores a raw payload for a tile, replacing any previous one.
    pub fn insert_raw(&self, coord: TileCoord, raw: impl Into<Bytes>) {
        self.tiles.insert(coord, raw.into());
    }

    /// Stores a structured payload for a tile.
    pub fn insert(&self, coord: TileCoord, data: &TileData) {
        self.insert_raw(coord, data.to_json());
    }

    /// Removes a tile's payload.
    pub fn remove(&self, coord: &TileCoord) -> bool {
        self.tiles.remove(coord).is_some()
    }

    /// Number of tiles with a payload.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns true if no payloads are stored.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl TileSource for MemorySource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn create_task(&self, id: TileId) -> TileTask {
        match self.tiles.get(&id.coord()) {
            Some(raw) => TileTask::with_raw_data(id, raw.clone()),
            None => TileTask::new(id),
        }
    }

    fn load(&self, task: &mut TileTask) -> Result<(), TileError> {
        if let Some(raw) = self.tiles.get(&task.id().coord()) {
            task.set_raw_data(raw.clone());
        }
        Ok(())
    }

    fn parse(&self, task: &TileTask) -> Result<TileData, TileError> {
        match task.raw_data() {
            Some(raw) => TileData::from_json(task.id(), raw),
            None => Ok(TileData::default()),
        }
    }

    fn clear_data(&self) {
        self.tiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Feature, Geometry, Layer};

    fn sample() -> TileData {
        TileData::new().with_layer(
            Layer::new("pois").with_feature(Feature::new(Geometry::Point([0.5, 0.5]))),
        )
    }

    #[test]
    fn test_create_task_attaches_payload() {
        let source = MemorySource::new(SourceId(1), "client");
        let coord = TileCoord::new(1, 1, 3);
        source.insert(coord, &sample());

        let task = source.create_task(coord.with_source(SourceId(1)));
        assert!(task.raw_data().is_some());
        assert_eq!(source.parse(&task).unwrap(), sample());
    }

    #[test]
    fn test_missing_tile_is_empty() {
        let source = MemorySource::new(SourceId(1), "client");
        let mut task = source.create_task(TileId::new(0, 0, 0, SourceId(1)));
        source.load(&mut task).unwrap();

        assert!(task.raw_data().is_none());
        assert_eq!(source.parse(&task).unwrap(), TileData::default());
    }

    #[test]
    fn test_malformed_payload_fails_parse() {
        let source = MemorySource::new(SourceId(2), "client");
        let coord = TileCoord::new(1, 1, 3);
        source.insert_raw(coord, Bytes::from_static(b"not json"));

        let task = source.create_task(coord.with_source(SourceId(2)));
        assert!(source.parse(&task).unwrap_err().is_parse_failure());
    }

    #[test]
    fn test_clear_data() {
        let source = MemorySource::new(SourceId(0), "client");
        source.insert(TileCoord::new(0, 0, 0), &sample());
        source.insert(TileCoord::new(0, 0, 1), &sample());
        assert_eq!(source.len(), 2);

        source.clear_data();
        assert!(source.is_empty());
    }
}
