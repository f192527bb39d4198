//! Tile identifiers.
//!
//! A [`TileCoord`] addresses a quadtree cell `(x, y, z)` in Web Mercator tile
//! space. A [`TileId`] binds a coordinate to the data source it is built from,
//! so the same cell rendered from two sources yields two distinct tiles.

use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Maximum zoom level supported by the tile hierarchy.
pub const MAX_ZOOM: u8 = 24;

// =============================================================================
// Source Identifier
// =============================================================================

/// Index of a data source within the active scene.
///
/// This is a non-owning key: tiles and tasks refer to their source by id and
/// look the source up in the manager's tile sets when they need it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceId(pub u32);

impl SourceId {
    /// Creates a source id from its index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src{}", self.0)
    }
}

// =============================================================================
// Tile Coordinate
// =============================================================================

/// A cell in the tile quadtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Zoom level.
    pub z: u8,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub const fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one axis at this coordinate's zoom.
    pub fn tiles_per_axis(&self) -> u32 {
        1u32 << self.z.min(31)
    }

    /// Returns true if `x` and `y` lie within the grid for `z`.
    pub fn is_valid(&self) -> bool {
        self.z <= MAX_ZOOM && self.x < self.tiles_per_axis() && self.y < self.tiles_per_axis()
    }

    /// Returns the parent cell, or `None` at zoom 0.
    pub fn parent(&self) -> Option<Self> {
        if self.z == 0 {
            return None;
        }
        Some(Self {
            x: self.x >> 1,
            y: self.y >> 1,
            z: self.z - 1,
        })
    }

    /// Returns the ancestor `levels` zoom levels above this cell.
    ///
    /// Returns `None` if that would go above zoom 0.
    pub fn ancestor(&self, levels: u8) -> Option<Self> {
        if levels > self.z {
            return None;
        }
        Some(Self {
            x: self.x >> levels,
            y: self.y >> levels,
            z: self.z - levels,
        })
    }

    /// Returns the four children one zoom level below.
    pub fn children(&self) -> [Self; 4] {
        let x = self.x << 1;
        let y = self.y << 1;
        let z = self.z + 1;
        [
            Self { x, y, z },
            Self { x: x + 1, y, z },
            Self { x, y: y + 1, z },
            Self {
                x: x + 1,
                y: y + 1,
                z,
            },
        ]
    }

    /// Clamps this coordinate to `max_zoom`, returning the covering ancestor
    /// when the coordinate is deeper than the limit.
    pub fn clamp_zoom(&self, max_zoom: u8) -> Self {
        if self.z <= max_zoom {
            *self
        } else {
            // levels <= z here, so the ancestor always exists
            Self {
                x: self.x >> (self.z - max_zoom),
                y: self.y >> (self.z - max_zoom),
                z: max_zoom,
            }
        }
    }

    /// Returns true if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &TileCoord) -> bool {
        other.z > self.z && other.ancestor(other.z - self.z).as_ref() == Some(self)
    }

    /// Binds this coordinate to a source.
    pub fn with_source(self, source: SourceId) -> TileId {
        TileId {
            x: self.x,
            y: self.y,
            z: self.z,
            source,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

// =============================================================================
// Tile Identifier
// =============================================================================

/// Unique key of a tile: `(x, y, z, source)`.
///
/// Equality and hashing cover all four fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Zoom level.
    pub z: u8,
    /// Source this tile is built from.
    pub source: SourceId,
}

impl TileId {
    /// Creates a tile id.
    pub const fn new(x: u32, y: u32, z: u8, source: SourceId) -> Self {
        Self { x, y, z, source }
    }

    /// Returns the coordinate part of this id.
    pub const fn coord(&self) -> TileCoord {
        TileCoord {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }

    /// Returns the parent tile from the same source.
    pub fn parent(&self) -> Option<Self> {
        self.coord().parent().map(|c| c.with_source(self.source))
    }

    /// Returns the ancestor `levels` above, from the same source.
    pub fn ancestor(&self, levels: u8) -> Option<Self> {
        self.coord().ancestor(levels).map(|c| c.with_source(self.source))
    }

    /// Returns the four children from the same source.
    pub fn children(&self) -> [Self; 4] {
        self.coord().children().map(|c| c.with_source(self.source))
    }

    /// Absolute distance between this tile's zoom and a (fractional) view zoom.
    pub fn zoom_distance(&self, view_zoom: f32) -> f32 {
        (self.z as f32 - view_zoom).abs()
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}@{}", self.z, self.x, self.y, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_parent_of_root_is_none() {
        assert_eq!(TileCoord::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn test_parent_and_children() {
        let tile = TileCoord::new(5, 9, 4);
        let parent = tile.parent().unwrap();
        assert_eq!(parent, TileCoord::new(2, 4, 3));
        assert!(parent.children().contains(&tile));
    }

    #[test]
    fn test_ancestor_levels() {
        let tile = TileCoord::new(13, 6, 5);
        assert_eq!(tile.ancestor(0), Some(tile));
        assert_eq!(tile.ancestor(2), Some(TileCoord::new(3, 1, 3)));
        assert_eq!(tile.ancestor(5), Some(TileCoord::new(0, 0, 0)));
        assert_eq!(tile.ancestor(6), None);
    }

    #[test]
    fn test_clamp_zoom() {
        let tile = TileCoord::new(40, 12, 8);
        assert_eq!(tile.clamp_zoom(10), tile);
        assert_eq!(tile.clamp_zoom(6), TileCoord::new(10, 3, 6));
    }

    #[test]
    fn test_is_valid() {
        assert!(TileCoord::new(3, 3, 2).is_valid());
        assert!(!TileCoord::new(4, 0, 2).is_valid());
        assert!(!TileCoord::new(0, 0, MAX_ZOOM + 1).is_valid());
    }

    #[test]
    fn test_tile_id_equality_covers_source() {
        let a = TileId::new(0, 0, 2, SourceId(0));
        let b = TileId::new(0, 0, 2, SourceId(1));
        assert_ne!(a, b);

        let set: HashSet<_> = [a, b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_tile_id_hierarchy_keeps_source() {
        let id = TileId::new(6, 2, 3, SourceId(7));
        assert_eq!(id.parent().unwrap().source, SourceId(7));
        assert!(id.children().iter().all(|c| c.source == SourceId(7)));
    }

    #[test]
    fn test_zoom_distance() {
        let id = TileId::new(0, 0, 10, SourceId(0));
        assert_eq!(id.zoom_distance(10.0), 0.0);
        assert_eq!(id.zoom_distance(12.5), 2.5);
        assert_eq!(id.zoom_distance(8.0), 2.0);
    }

    #[test]
    fn test_display() {
        let id = TileId::new(1, 2, 3, SourceId(4));
        assert_eq!(id.to_string(), "3/1/2@src4");
    }

    proptest! {
        #[test]
        fn prop_children_have_self_as_parent(x in 0u32..1024, y in 0u32..1024, z in 10u8..20) {
            let tile = TileCoord::new(x, y, z);
            for child in tile.children() {
                prop_assert_eq!(child.parent(), Some(tile));
                prop_assert!(tile.is_ancestor_of(&child));
            }
        }

        #[test]
        fn prop_ancestor_contains_descendant(x in 0u32..4096, y in 0u32..4096, z in 12u8..20, levels in 1u8..12) {
            let tile = TileCoord::new(x, y, z);
            let ancestor = tile.ancestor(levels).unwrap();
            prop_assert!(ancestor.is_ancestor_of(&tile));
            prop_assert_eq!(tile.clamp_zoom(z - levels), ancestor);
        }
    }
}
