//! # Route Surface
//!
//! Road-surface classification for GPS routes.
//!
//! This library provides:
//! - GPX parsing into an ordered point sequence
//! - Per-point paved/unpaved classification by nearest road line
//! - Viewport coordination against a lazily loaded road-tile source
//! - Splitting the classified route into same-surface segments
//! - GeoJSON import/export of the segmented route data
//!
//! ## Quick Start
//!
//! ```rust
//! use route_surface::{build_segments, classify_point, ClassifierConfig, GeoPoint, SurfaceTag};
//!
//! let config = ClassifierConfig::default();
//! let points = vec![
//!     GeoPoint::new(51.5074, -0.1278),
//!     GeoPoint::new(51.5080, -0.1290),
//! ];
//!
//! // With no road features loaded every point falls back to unpaved.
//! let classified: Vec<_> = points
//!     .iter()
//!     .map(|p| classify_point(p, &[], &config).point)
//!     .collect();
//!
//! let segments = build_segments(classified);
//! assert_eq!(segments.len(), 1);
//! assert_eq!(segments[0].surface, SurfaceTag::Unpaved);
//! ```
//!
//! Classifying against a live map goes through [`RouteClassifier`], which
//! drives a [`MapQueryPort`] one point at a time.

use serde::{Deserialize, Serialize};

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod geo_utils;
pub mod gpx;
pub mod memory_map;
pub mod pipeline;
pub mod port;
pub mod road_index;
pub mod segments;
pub mod tiles;
pub mod wire;

pub use classifier::{classify_point, nearest_feature, Classification};
pub use config::{ClassifierConfig, SurfaceVocabulary};
pub use coordinator::{ViewportCoordinator, ViewportOutcome, ViewportState, ViewportStats};
pub use error::{MapError, Result, SurfaceError};
pub use gpx::parse_gpx;
pub use memory_map::InMemoryMap;
pub use pipeline::{Progress, ProgressCallback, RouteClassifier};
pub use port::{MapQueryPort, RoadFeature, SourceDataEvent};
pub use segments::{build_segments, flatten_segments, summarize, RouteSegment, SurfaceSummary};
pub use tiles::TileId;
pub use wire::{
    route_data_from_json, route_data_to_json, segments_from_feature_collection,
    segments_to_feature_collection,
};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic point read from a GPX document.
///
/// # Example
/// ```
/// use route_surface::GeoPoint;
/// let point = GeoPoint::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl GeoPoint {
    /// Create a point without elevation or timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            timestamp: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// The point as a `geo` point (x = longitude, y = latitude).
    pub fn to_geo(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

/// Binary road-surface classification.
///
/// Anything not recognized as paved is unpaved; there is no "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceTag {
    Paved,
    #[default]
    Unpaved,
}

impl SurfaceTag {
    /// Wire name used in persisted route data.
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceTag::Paved => "paved",
            SurfaceTag::Unpaved => "unpaved",
        }
    }
}

impl std::fmt::Display for SurfaceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A point tagged with its surface. Created once per input point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPoint {
    #[serde(flatten)]
    pub point: GeoPoint,
    pub surface: SurfaceTag,
}

impl ClassifiedPoint {
    pub fn new(point: GeoPoint, surface: SurfaceTag) -> Self {
        Self { point, surface }
    }
}

/// Bounding box for a route or a map window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Square-ish window of `half_lat` / `half_lng` degrees around a point.
    pub fn around(point: &GeoPoint, half_lat: f64, half_lng: f64) -> Self {
        Self {
            min_lat: point.latitude - half_lat,
            max_lat: point.latitude + half_lat,
            min_lng: point.longitude - half_lng,
            max_lng: point.longitude + half_lng,
        }
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        !(self.max_lat < other.min_lat
            || other.max_lat < self.min_lat
            || self.max_lng < other.min_lng
            || other.max_lng < self.min_lng)
    }

    /// Overlapping part of two bounds, if any.
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        if !self.intersects(other) {
            return None;
        }
        Some(Bounds {
            min_lat: self.min_lat.max(other.min_lat),
            max_lat: self.max_lat.min(other.max_lat),
            min_lng: self.min_lng.max(other.min_lng),
            max_lng: self.max_lng.min(other.max_lng),
        })
    }

    /// GeoJSON bbox order: `[west, south, east, north]`.
    pub fn to_bbox(&self) -> Vec<f64> {
        vec![self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }
}
