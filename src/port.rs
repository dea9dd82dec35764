//! The seam between the classification pipeline and a map-rendering engine.
//!
//! The engine's camera and tile cache are shared mutable state. The pipeline
//! takes the port by `&mut` for the whole classification run, so nothing else
//! can move the camera while points are being classified.

use futures::future::BoxFuture;
use geo::Geometry;
use tokio::sync::broadcast;

use crate::error::MapError;
use crate::tiles::TileId;
use crate::{Bounds, GeoPoint};

/// A rendered road feature returned by a query. Lives for one query only.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadFeature {
    /// Road geometry; only line and multi-line geometries are considered.
    pub geometry: Geometry<f64>,
    /// Raw surface label from the tile properties, if any.
    pub surface_label: Option<String>,
}

impl RoadFeature {
    pub fn new(geometry: impl Into<Geometry<f64>>, surface_label: Option<&str>) -> Self {
        Self {
            geometry: geometry.into(),
            surface_label: surface_label.map(str::to_string),
        }
    }
}

/// "Source data loaded" notification emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDataEvent {
    pub source_id: String,
    pub tile: TileId,
}

impl SourceDataEvent {
    /// Whether this event satisfies a wait for `target` on `source_id`.
    pub fn satisfies(&self, source_id: &str, target: &TileId) -> bool {
        self.source_id == source_id && self.tile.covers(target)
    }
}

/// Capabilities the pipeline consumes from a map engine.
pub trait MapQueryPort {
    /// Base style loaded and the road layer present.
    fn is_ready(&self) -> bool;

    /// Center the camera on `center` at `zoom`; resolves once the move has
    /// completed.
    fn set_camera(&mut self, center: &GeoPoint, zoom: f64) -> BoxFuture<'_, Result<(), MapError>>;

    /// Subscribe to source-data-loaded events. Events sent before the call
    /// are not replayed.
    fn subscribe_source_data(&self) -> broadcast::Receiver<SourceDataEvent>;

    /// Whether renderable data for `tile` of `source_id` is already loaded.
    fn is_tile_loaded(&self, source_id: &str, tile: &TileId) -> bool;

    /// Rendered features of `layer_ids` intersecting `window`, in the
    /// engine's query order.
    fn query_rendered_features(&self, layer_ids: &[String], window: &Bounds) -> Vec<RoadFeature>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_satisfies_target_and_descendants() {
        let event = SourceDataEvent {
            source_id: "composite".to_string(),
            tile: TileId::new(12, 2046, 1362),
        };
        assert!(event.satisfies("composite", &TileId::new(13, 4093, 2724)));
        assert!(event.satisfies("composite", &TileId::new(12, 2046, 1362)));
        assert!(!event.satisfies("satellite", &TileId::new(13, 4093, 2724)));
        assert!(!event.satisfies("composite", &TileId::new(13, 4100, 2724)));
    }
}
