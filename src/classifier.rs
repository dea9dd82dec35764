//! Nearest-line surface classification of a single point.
//!
//! A point takes the surface of the closest road line among the features
//! loaded around it. When nothing usable is found it falls back to
//! [`SurfaceTag::Unpaved`]; this function never fails.
//!
//! Ties: the first feature in query order reaching the minimum distance wins.

use log::debug;

use crate::config::ClassifierConfig;
use crate::geo_utils::line_distance;
use crate::port::RoadFeature;
use crate::{ClassifiedPoint, GeoPoint, SurfaceTag};

/// Outcome of classifying one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub point: ClassifiedPoint,
    /// Road-line candidates that were measured.
    pub candidates: usize,
    /// Distance to the winning road line, in meters.
    pub nearest_distance_m: Option<f64>,
    /// Label of the winning road line, as found in the tile data.
    pub matched_label: Option<String>,
    /// True when no road line was available and the safe default was used.
    pub degraded: bool,
}

/// Index of and distance to the nearest line feature.
///
/// Non-line features and lines without a finite distance are skipped. With
/// equal distances the earlier feature is kept.
pub fn nearest_feature(point: &GeoPoint, features: &[RoadFeature]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for (idx, feature) in features.iter().enumerate() {
        let Some(dist) = line_distance(point, &feature.geometry) else {
            continue;
        };
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((idx, dist)),
        }
    }

    best
}

/// Classify a point against the road features currently available for it.
///
/// # Example
/// ```
/// use geo::LineString;
/// use route_surface::{classify_point, ClassifierConfig, GeoPoint, RoadFeature, SurfaceTag};
///
/// let road = RoadFeature::new(
///     LineString::from(vec![(0.0, 0.0), (0.01, 0.0)]),
///     Some("asphalt"),
/// );
/// let config = ClassifierConfig::default();
/// let result = classify_point(&GeoPoint::new(0.0001, 0.005), &[road], &config);
/// assert_eq!(result.point.surface, SurfaceTag::Paved);
/// assert!(!result.degraded);
/// ```
pub fn classify_point(
    point: &GeoPoint,
    features: &[RoadFeature],
    config: &ClassifierConfig,
) -> Classification {
    let candidates = features
        .iter()
        .filter(|f| line_distance(point, &f.geometry).is_some())
        .count();

    let nearest = nearest_feature(point, features)
        .filter(|(_, dist)| config.max_match_distance_m.map_or(true, |max| *dist <= max));

    let Some((idx, dist)) = nearest else {
        debug!(
            "[Classifier] ({:.5}, {:.5}): no road line among {} features, defaulting to unpaved",
            point.latitude,
            point.longitude,
            features.len()
        );
        return Classification {
            point: ClassifiedPoint::new(point.clone(), SurfaceTag::Unpaved),
            candidates,
            nearest_distance_m: None,
            matched_label: None,
            degraded: true,
        };
    };

    let label = features[idx].surface_label.as_deref();
    let surface = config.surfaces.classify(label);

    if let Some(l) = label.filter(|l| !config.surfaces.is_known(l)) {
        debug!("[Classifier] Unrecognized surface label '{}', treating as unpaved", l);
    }

    debug!(
        "[Classifier] ({:.5}, {:.5}) -> {} (label {:?}, {:.1}m, {} candidates)",
        point.latitude, point.longitude, surface, label, dist, candidates
    );

    Classification {
        point: ClassifiedPoint::new(point.clone(), surface),
        candidates,
        nearest_distance_m: Some(dist),
        matched_label: label.map(str::to_string),
        degraded: false,
    }
}
