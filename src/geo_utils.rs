//! # Geographic Utilities
//!
//! Distance and unit conversions used by the classifier and the query window.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`polyline_length`] | Total length of a point sequence in meters |
//! | [`line_distance`] | Distance from a point to a line or multi-line geometry |
//! | [`meters_to_degrees`] | Convert meters to approximate longitude degrees at a latitude |
//! | [`meters_per_pixel`] | Ground resolution of a web-mercator map at a zoom |
//!
//! ## Example
//!
//! ```rust
//! use geo::{Geometry, LineString};
//! use route_surface::{GeoPoint, geo_utils};
//!
//! let road: Geometry<f64> = LineString::from(vec![(-0.130, 51.500), (-0.120, 51.500)]).into();
//! let point = GeoPoint::new(51.501, -0.125);
//!
//! // About 111m north of the road
//! let dist = geo_utils::line_distance(&point, &road).unwrap();
//! assert!((dist - 111.0).abs() < 2.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Nearest-line distance
//!
//! The closest point on the geometry is found in planar lon/lat space and the
//! distance to it is then measured with the haversine formula. Over the few
//! hundred meters a query window spans the planar error is negligible.

use geo::{Closest, ClosestPoint, Distance, Geometry, Haversine, Point};

use crate::GeoPoint;

/// Web-mercator ground resolution at zoom 0 for 256px tiles, meters per pixel.
const EQUATOR_METERS_PER_PIXEL: f64 = 156_543.033_92;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points using the Haversine formula.
///
/// # Example
///
/// ```rust
/// use route_surface::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    Haversine::distance(p1.to_geo(), p2.to_geo())
}

/// Calculate the total length of a point sequence in meters.
///
/// Empty or single-point sequences return 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Distance in meters from a point to the nearest point of a line geometry.
///
/// Returns `None` for geometries that are not `LineString` or
/// `MultiLineString`, for empty lines, and when the distance is not finite
/// (e.g. a vertex with a NaN coordinate).
pub fn line_distance(point: &GeoPoint, geometry: &Geometry<f64>) -> Option<f64> {
    let p = point.to_geo();
    let closest = match geometry {
        Geometry::LineString(line) => line.closest_point(&p),
        Geometry::MultiLineString(lines) => lines.closest_point(&p),
        _ => return None,
    };

    match closest {
        Closest::SinglePoint(c) | Closest::Intersection(c) => {
            Some(Haversine::distance(p, c)).filter(|d| d.is_finite())
        }
        Closest::Indeterminate => None,
    }
}

/// Whether a geometry is a simple or multi-part line.
pub fn is_line(geometry: &Geometry<f64>) -> bool {
    matches!(geometry, Geometry::LineString(_) | Geometry::MultiLineString(_))
}

// =============================================================================
// Unit Conversions
// =============================================================================

/// Convert meters to approximate degrees of longitude at a given latitude.
///
/// At the equator, 1 degree ≈ 111,320 meters; this shrinks with
/// cos(latitude). The cosine is floored at 0.1 so polar latitudes still give
/// a finite window.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = METERS_PER_DEGREE * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

/// Ground resolution in meters per screen pixel at a latitude and zoom.
///
/// # Example
///
/// ```rust
/// use route_surface::geo_utils;
///
/// // ~19.1 m/px at the equator at zoom 13
/// let res = geo_utils::meters_per_pixel(0.0, 13.0);
/// assert!((res - 19.11).abs() < 0.01);
/// ```
#[inline]
pub fn meters_per_pixel(latitude: f64, zoom: f64) -> f64 {
    EQUATOR_METERS_PER_PIXEL * latitude.to_radians().cos() / 2f64.powf(zoom)
}

// =============================================================================
// Unit Tests
// =============================================================================
