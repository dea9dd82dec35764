//! Per-point access to the road features the map currently has loaded.
//!
//! Every query is scoped to a small window around one point, never to the
//! whole viewport, so results are never reused for a point that was not in
//! view when they were fetched.

use log::debug;

use crate::config::ClassifierConfig;
use crate::geo_utils::{is_line, meters_per_pixel, meters_to_degrees, METERS_PER_DEGREE};
use crate::port::{MapQueryPort, RoadFeature};
use crate::{Bounds, GeoPoint};

/// Query window of `radius_px` screen pixels around a point at `zoom`.
pub fn query_window(point: &GeoPoint, radius_px: f64, zoom: f64) -> Bounds {
    let radius_m = radius_px * meters_per_pixel(point.latitude, zoom);
    Bounds::around(
        point,
        radius_m / METERS_PER_DEGREE,
        meters_to_degrees(radius_m, point.latitude),
    )
}

/// Road features around a point, tried with the configured radius first and
/// the expanded radius when the first window has no road lines.
pub fn features_near<P: MapQueryPort>(
    port: &P,
    point: &GeoPoint,
    config: &ClassifierConfig,
) -> Vec<RoadFeature> {
    let zoom = config.classification_zoom;
    let window = query_window(point, config.query_radius_px, zoom);
    let features = port.query_rendered_features(&config.road_layer_ids, &window);

    if features.iter().any(|f| is_line(&f.geometry)) {
        return features;
    }

    match config.expanded_query_radius_px {
        Some(radius) if radius > config.query_radius_px => {
            debug!(
                "[RoadIndex] No road lines within {}px of ({:.5}, {:.5}), widening to {}px",
                config.query_radius_px, point.latitude, point.longitude, radius
            );
            let window = query_window(point, radius, zoom);
            port.query_rendered_features(&config.road_layer_ids, &window)
        }
        _ => features,
    }
}
