//! Splitting a classified route into same-surface segments.

use serde::{Deserialize, Serialize};

use crate::geo_utils::haversine_distance;
use crate::{ClassifiedPoint, SurfaceTag};

/// A maximal run of consecutive points sharing one surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub points: Vec<ClassifiedPoint>,
    pub surface: SurfaceTag,
    pub index: usize,
}

/// Paved/unpaved totals for a segmented route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSummary {
    pub paved_points: usize,
    pub unpaved_points: usize,
    /// Meters, attributed to the surface of each leg's starting point.
    pub paved_distance_m: f64,
    pub unpaved_distance_m: f64,
}

impl SurfaceSummary {
    pub fn total_distance_m(&self) -> f64 {
        self.paved_distance_m + self.unpaved_distance_m
    }

    /// Share of the distance on paved roads (0.0-1.0); 0.0 for zero-length routes.
    pub fn paved_ratio(&self) -> f64 {
        let total = self.total_distance_m();
        if total > 0.0 {
            self.paved_distance_m / total
        } else {
            0.0
        }
    }
}

/// Group contiguous same-surface points into segments.
///
/// Segment boundaries fall exactly where consecutive surfaces differ; no
/// point is dropped, duplicated or reordered.
///
/// # Example
/// ```
/// use route_surface::{build_segments, ClassifiedPoint, GeoPoint, SurfaceTag};
///
/// let points = vec![
///     ClassifiedPoint::new(GeoPoint::new(0.0, 0.0), SurfaceTag::Unpaved),
///     ClassifiedPoint::new(GeoPoint::new(0.0, 0.1), SurfaceTag::Paved),
///     ClassifiedPoint::new(GeoPoint::new(0.0, 0.2), SurfaceTag::Paved),
/// ];
/// let segments = build_segments(points);
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[1].points.len(), 2);
/// ```
pub fn build_segments(points: Vec<ClassifiedPoint>) -> Vec<RouteSegment> {
    let mut segments = Vec::new();
    let mut iter = points.into_iter();

    let Some(first) = iter.next() else {
        return segments;
    };

    let mut current = RouteSegment {
        surface: first.surface,
        points: vec![first],
        index: 0,
    };

    for point in iter {
        if point.surface == current.surface {
            current.points.push(point);
            continue;
        }
        let next = RouteSegment {
            surface: point.surface,
            points: vec![point],
            index: current.index + 1,
        };
        segments.push(std::mem::replace(&mut current, next));
    }

    segments.push(current);
    segments
}

/// Concatenate segment points back into the route order.
pub fn flatten_segments(segments: &[RouteSegment]) -> Vec<ClassifiedPoint> {
    segments
        .iter()
        .flat_map(|s| s.points.iter().cloned())
        .collect()
}

/// Point counts and distances per surface.
pub fn summarize(segments: &[RouteSegment]) -> SurfaceSummary {
    let points = flatten_segments(segments);
    let mut summary = SurfaceSummary::default();

    for p in &points {
        match p.surface {
            SurfaceTag::Paved => summary.paved_points += 1,
            SurfaceTag::Unpaved => summary.unpaved_points += 1,
        }
    }

    for w in points.windows(2) {
        let leg = haversine_distance(&w[0].point, &w[1].point);
        match w[0].surface {
            SurfaceTag::Paved => summary.paved_distance_m += leg,
            SurfaceTag::Unpaved => summary.unpaved_distance_m += leg,
        }
    }

    summary
}
