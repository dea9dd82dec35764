//! Slippy-map tile addressing (web mercator, XYZ scheme).

use std::f64::consts::PI;

use crate::{Bounds, GeoPoint};

/// Web-mercator latitude limit.
const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// An XYZ tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// The tile containing a point at a zoom level.
    ///
    /// # Example
    /// ```
    /// use route_surface::{GeoPoint, TileId};
    ///
    /// let tile = TileId::containing(&GeoPoint::new(51.5074, -0.1278), 13);
    /// assert_eq!(tile, TileId::new(13, 4093, 2724));
    /// ```
    pub fn containing(point: &GeoPoint, zoom: u8) -> Self {
        let n = 2f64.powi(zoom as i32);
        let max_index = (n as u32).saturating_sub(1);

        let lat = point.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = ((point.longitude + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();

        Self {
            z: zoom,
            x: (x.max(0.0) as u32).min(max_index),
            y: (y.max(0.0) as u32).min(max_index),
        }
    }

    /// Geographic extent of the tile.
    pub fn bounds(&self) -> Bounds {
        let n = 2f64.powi(self.z as i32);
        let lng = |x: f64| x / n * 360.0 - 180.0;
        let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();

        Bounds {
            min_lat: lat(self.y as f64 + 1.0),
            max_lat: lat(self.y as f64),
            min_lng: lng(self.x as f64),
            max_lng: lng(self.x as f64 + 1.0),
        }
    }

    /// The ancestor of this tile at a lower (or equal) zoom.
    pub fn ancestor(&self, zoom: u8) -> Option<TileId> {
        if zoom > self.z {
            return None;
        }
        let shift = self.z - zoom;
        Some(TileId::new(zoom, self.x >> shift, self.y >> shift))
    }

    /// Whether this tile's area fully contains `other`'s.
    pub fn covers(&self, other: &TileId) -> bool {
        other.ancestor(self.z).is_some_and(|a| a == *self)
    }

    /// This tile and its neighbors within `radius` tiles, clipped to the grid.
    pub fn neighborhood(&self, radius: u32) -> Vec<TileId> {
        let max_index = (1u64 << self.z) - 1;
        let lo = |v: u32| v.saturating_sub(radius);
        let hi = |v: u32| (v as u64 + radius as u64).min(max_index) as u32;

        let mut tiles = Vec::new();
        for y in lo(self.y)..=hi(self.y) {
            for x in lo(self.x)..=hi(self.x) {
                tiles.push(TileId::new(self.z, x, y));
            }
        }
        tiles
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
