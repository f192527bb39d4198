//! View state and visible tile computation.
//!
//! Positions are Web Mercator meters with `y` pointing north. Tile rows grow
//! southward, matching the usual XYZ scheme.

use std::collections::BTreeSet;
use std::f64::consts::PI;

use crate::tile::{TileCoord, MAX_ZOOM};

/// Half the Mercator world width in meters.
pub const HALF_CIRCUMFERENCE: f64 = 20_037_508.342_789_244;

/// Tile edge in screen pixels at integer zoom.
pub const TILE_SIZE_PIXELS: f64 = 256.0;

const EARTH_RADIUS: f64 = 6_378_137.0;

/// Slack in tile units so extents landing exactly on a tile edge do not pull
/// in the neighbor.
const EDGE_EPSILON: f64 = 1e-9;

// =============================================================================
// Projection
// =============================================================================

/// Spherical Web Mercator projection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MercatorProjection;

impl MercatorProjection {
    /// Converts degrees to projected meters.
    pub fn lon_lat_to_meters(&self, lon: f64, lat: f64) -> [f64; 2] {
        let x = lon.to_radians() * EARTH_RADIUS;
        let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
        [x, y]
    }

    /// Converts projected meters to degrees.
    pub fn meters_to_lon_lat(&self, meters: [f64; 2]) -> [f64; 2] {
        let lon = (meters[0] / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (meters[1] / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        [lon, lat]
    }

    /// Edge length of a tile in meters at a (possibly fractional) zoom.
    pub fn tile_size_meters(&self, zoom: f64) -> f64 {
        2.0 * HALF_CIRCUMFERENCE / 2f64.powf(zoom)
    }

    /// Projected extent of a tile.
    pub fn tile_bounds(&self, coord: TileCoord) -> Bounds {
        let size = self.tile_size_meters(coord.z as f64);
        let min_x = coord.x as f64 * size - HALF_CIRCUMFERENCE;
        let max_y = HALF_CIRCUMFERENCE - coord.y as f64 * size;
        Bounds {
            min: [min_x, max_y - size],
            max: [min_x + size, max_y],
        }
    }

    /// Tile containing a point, clamped to the world.
    pub fn meters_to_tile(&self, meters: [f64; 2], z: u8) -> TileCoord {
        let size = self.tile_size_meters(z as f64);
        let last = (1u64 << z) as f64 - 1.0;
        let x = ((meters[0] + HALF_CIRCUMFERENCE) / size).floor().clamp(0.0, last);
        let y = ((HALF_CIRCUMFERENCE - meters[1]) / size).floor().clamp(0.0, last);
        TileCoord::new(x as u32, y as u32, z)
    }
}

/// Axis-aligned rectangle in projected meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    /// Returns true if the rectangles overlap with non-zero area.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min[0] < other.max[0]
            && other.min[0] < self.max[0]
            && self.min[1] < other.max[1]
            && other.min[1] < self.max[1]
    }
}

// =============================================================================
// View State
// =============================================================================

/// Camera parameters that determine the required tiles.
///
/// Setters raise the `changed` flag; the host clears it once per frame with
/// [`ViewState::clear_changed`] after the update pass.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    projection: MercatorProjection,
    center: [f64; 2],
    zoom: f32,
    viewport: [f32; 2],
    bounds: Bounds,
    changed: bool,
}

impl ViewState {
    /// Creates a view centered on `center` (meters) with a viewport in pixels.
    pub fn new(center: [f64; 2], zoom: f32, viewport: [f32; 2]) -> Self {
        let mut view = Self {
            projection: MercatorProjection,
            center,
            zoom: clamp_view_zoom(zoom),
            viewport,
            bounds: Bounds::default(),
            changed: true,
        };
        view.update_bounds();
        view
    }

    /// Creates a view centered on a longitude/latitude in degrees.
    pub fn from_lon_lat(lon: f64, lat: f64, zoom: f32, viewport: [f32; 2]) -> Self {
        Self::new(MercatorProjection.lon_lat_to_meters(lon, lat), zoom, viewport)
    }

    pub fn projection(&self) -> &MercatorProjection {
        &self.projection
    }

    /// Center in projected meters.
    pub fn center(&self) -> [f64; 2] {
        self.center
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Viewport size in pixels.
    pub fn viewport(&self) -> [f32; 2] {
        self.viewport
    }

    /// Visible extent in meters.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// True if any parameter changed since the last [`clear_changed`](Self::clear_changed).
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    pub fn set_center(&mut self, center: [f64; 2]) {
        if self.center != center {
            self.center = center;
            self.update_bounds();
        }
    }

    /// Moves the center by a delta in meters.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.set_center([self.center[0] + dx, self.center[1] + dy]);
    }

    /// Sets the zoom, clamped to the supported range.
    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = clamp_view_zoom(zoom);
        if self.zoom != zoom {
            self.zoom = zoom;
            self.update_bounds();
        }
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if self.viewport != [width, height] {
            self.viewport = [width, height];
            self.update_bounds();
        }
    }

    /// Integer zoom at which tiles are requested.
    pub fn tile_zoom(&self) -> u8 {
        (self.zoom.floor() as u8).min(MAX_ZOOM)
    }

    /// Tiles at [`tile_zoom`](Self::tile_zoom) covering the visible extent.
    pub fn visible_tiles(&self) -> BTreeSet<TileCoord> {
        let z = self.tile_zoom();
        let size = self.projection.tile_size_meters(z as f64);
        let last = (1i64 << z) - 1;

        let column = |m: f64| (m + HALF_CIRCUMFERENCE) / size;
        let row = |m: f64| (HALF_CIRCUMFERENCE - m) / size;

        let first = |v: f64| ((v + EDGE_EPSILON).floor() as i64).clamp(0, last);
        let past = |v: f64| ((v - EDGE_EPSILON).ceil() as i64 - 1).clamp(0, last);

        let (c0, c1) = (column(self.bounds.min[0]), column(self.bounds.max[0]));
        let (r0, r1) = (row(self.bounds.max[1]), row(self.bounds.min[1]));
        let world = (last + 1) as f64;
        if c1 <= 0.0 || r1 <= 0.0 || c0 >= world || r0 >= world {
            return BTreeSet::new();
        }

        let (x0, x1) = (first(c0), past(c1));
        let (y0, y1) = (first(r0), past(r1));

        let mut tiles = BTreeSet::new();
        for x in x0..=x1 {
            for y in y0..=y1 {
                tiles.insert(TileCoord::new(x as u32, y as u32, z));
            }
        }
        tiles
    }

    fn update_bounds(&mut self) {
        let meters_per_pixel =
            self.projection.tile_size_meters(self.zoom as f64) / TILE_SIZE_PIXELS;
        let half_w = self.viewport[0] as f64 * meters_per_pixel / 2.0;
        let half_h = self.viewport[1] as f64 * meters_per_pixel / 2.0;
        self.bounds = Bounds {
            min: [self.center[0] - half_w, self.center[1] - half_h],
            max: [self.center[0] + half_w, self.center[1] + half_h],
        };
        self.changed = true;
    }
}

fn clamp_view_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(0.0, MAX_ZOOM as f32)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_round_trip() {
        let p = MercatorProjection;
        let m = p.lon_lat_to_meters(-74.006, 40.7128);
        let ll = p.meters_to_lon_lat(m);
        assert!((ll[0] + 74.006).abs() < 1e-9);
        assert!((ll[1] - 40.7128).abs() < 1e-9);
    }

    #[test]
    fn test_meters_to_tile_matches_xyz() {
        // New York City at zoom 16 is tile 19295/24640
        let p = MercatorProjection;
        let tile = p.meters_to_tile(p.lon_lat_to_meters(-74.006, 40.7128), 16);
        assert_eq!(tile, TileCoord::new(19295, 24640, 16));
    }

    #[test]
    fn test_tile_bounds_contains_tile_point() {
        let p = MercatorProjection;
        let coord = TileCoord::new(3, 5, 4);
        let b = p.tile_bounds(coord);
        let center = [(b.min[0] + b.max[0]) / 2.0, (b.min[1] + b.max[1]) / 2.0];
        assert_eq!(p.meters_to_tile(center, 4), coord);
    }

    #[test]
    fn test_whole_world_at_zoom_zero() {
        let view = ViewState::new([0.0, 0.0], 0.0, [256.0, 256.0]);
        let tiles = view.visible_tiles();
        assert_eq!(tiles.len(), 1);
        assert!(tiles.contains(&TileCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_centered_view_zoom_two() {
        // 512px at zoom 2 spans two tiles around the origin in each axis
        let view = ViewState::new([0.0, 0.0], 2.0, [512.0, 512.0]);
        let tiles = view.visible_tiles();
        let expected: BTreeSet<_> = [(1, 1), (2, 1), (1, 2), (2, 2)]
            .into_iter()
            .map(|(x, y)| TileCoord::new(x, y, 2))
            .collect();
        assert_eq!(tiles, expected);
    }

    #[test]
    fn test_fractional_zoom_uses_floor() {
        let view = ViewState::new([0.0, 0.0], 3.7, [100.0, 100.0]);
        assert_eq!(view.tile_zoom(), 3);
        assert!(view.visible_tiles().iter().all(|t| t.z == 3));
    }

    #[test]
    fn test_view_off_the_world_sees_nothing() {
        let view = ViewState::new([3.0 * HALF_CIRCUMFERENCE, 0.0], 4.0, [256.0, 256.0]);
        assert!(view.visible_tiles().is_empty());
    }

    #[test]
    fn test_changed_flag() {
        let mut view = ViewState::new([0.0, 0.0], 2.0, [256.0, 256.0]);
        assert!(view.is_changed());
        view.clear_changed();

        view.set_zoom(2.0);
        assert!(!view.is_changed());

        view.translate(10.0, 0.0);
        assert!(view.is_changed());
    }
}
