//! GeoJSON form of a segmented route.
//!
//! Saved maps embed their classified route as a `FeatureCollection` with one
//! `LineString` feature per segment:
//!
//! ```json
//! {"type": "Feature",
//!  "properties": {"surface": "paved", "segmentIndex": 0},
//!  "geometry": {"type": "LineString", "coordinates": [[lon, lat], ...]}}
//! ```
//!
//! Coordinates are `[longitude, latitude]`. Elevation and timestamps are not
//! part of the stored layout.
//!
//! A one-point segment (a single-point route, or an isolated surface flip)
//! is still written as a `LineString` with a single position, to keep one
//! feature per segment. RFC 7946 requires two or more positions, so strict
//! GeoJSON consumers may reject such a feature and renderers usually draw
//! nothing for it. Reading it back here is supported.

use geojson::{Feature, FeatureCollection, Geometry, Value};
use log::{debug, warn};
use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, SurfaceError};
use crate::segments::{flatten_segments, RouteSegment};
use crate::{Bounds, ClassifiedPoint, GeoPoint, SurfaceTag};

const SURFACE_KEY: &str = "surface";
const INDEX_KEY: &str = "segmentIndex";

/// Convert segments to the stored `routeData` collection.
pub fn segments_to_feature_collection(segments: &[RouteSegment]) -> FeatureCollection {
    let features = segments.iter().map(segment_to_feature).collect();

    let points: Vec<GeoPoint> = flatten_segments(segments)
        .into_iter()
        .map(|c| c.point)
        .collect();

    FeatureCollection {
        bbox: Bounds::from_points(&points).map(|b| b.to_bbox()),
        features,
        foreign_members: None,
    }
}

fn segment_to_feature(segment: &RouteSegment) -> Feature {
    let coords: Vec<Vec<f64>> = segment
        .points
        .iter()
        .map(|c| vec![c.point.longitude, c.point.latitude])
        .collect();

    let mut props = Map::new();
    props.insert(
        SURFACE_KEY.to_string(),
        JsonValue::String(segment.surface.as_str().to_string()),
    );
    props.insert(INDEX_KEY.to_string(), JsonValue::Number(segment.index.into()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coords))),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// Read stored route data back into segments.
///
/// Every feature must carry a `surface` of `"paved"` or `"unpaved"`, an
/// integer `segmentIndex`, and a non-empty `LineString` of valid positions.
/// Segments are returned in feature order.
pub fn segments_from_feature_collection(
    collection: &FeatureCollection,
) -> Result<Vec<RouteSegment>> {
    let segments = collection
        .features
        .iter()
        .enumerate()
        .map(|(n, feature)| feature_to_segment(n, feature))
        .collect::<Result<Vec<_>>>()?;

    if segments.windows(2).any(|w| w[0].index >= w[1].index) {
        warn!("[RouteData] Segment indices are not increasing");
    }

    debug!("[RouteData] Loaded {} segments", segments.len());
    Ok(segments)
}

fn feature_to_segment(n: usize, feature: &Feature) -> Result<RouteSegment> {
    let invalid = |msg: String| SurfaceError::InvalidRouteData(format!("feature {}: {}", n, msg));

    let surface = match feature.property(SURFACE_KEY).and_then(JsonValue::as_str) {
        Some("paved") => SurfaceTag::Paved,
        Some("unpaved") => SurfaceTag::Unpaved,
        Some(other) => return Err(invalid(format!("unknown surface '{}'", other))),
        None => return Err(invalid("missing surface".to_string())),
    };

    let index = feature
        .property(INDEX_KEY)
        .and_then(JsonValue::as_u64)
        .ok_or_else(|| invalid("missing or non-integer segmentIndex".to_string()))?;

    let coords = match feature.geometry.as_ref().map(|g| &g.value) {
        Some(Value::LineString(coords)) => coords,
        Some(_) => return Err(invalid("geometry is not a LineString".to_string())),
        None => return Err(invalid("missing geometry".to_string())),
    };
    if coords.is_empty() {
        return Err(invalid("empty LineString".to_string()));
    }

    let points = coords
        .iter()
        .map(|pos| match pos.as_slice() {
            [lon, lat, ..] => {
                let point = GeoPoint::new(*lat, *lon);
                if point.is_valid() {
                    Ok(ClassifiedPoint::new(point, surface))
                } else {
                    Err(invalid(format!("position [{}, {}] out of range", lon, lat)))
                }
            }
            _ => Err(invalid("position with fewer than two coordinates".to_string())),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RouteSegment {
        points,
        surface,
        index: index as usize,
    })
}

/// Serialize segments as `routeData` JSON.
pub fn route_data_to_json(segments: &[RouteSegment]) -> Result<String> {
    serde_json::to_string(&segments_to_feature_collection(segments))
        .map_err(|e| SurfaceError::InvalidRouteData(e.to_string()))
}

/// Parse `routeData` JSON into segments.
pub fn route_data_from_json(json: &str) -> Result<Vec<RouteSegment>> {
    let collection: FeatureCollection =
        serde_json::from_str(json).map_err(|e| SurfaceError::InvalidRouteData(e.to_string()))?;
    segments_from_feature_collection(&collection)
}
