//! An in-process map engine for tests, demos and headless classification.
//!
//! Road features are held in an R-tree. The engine behaves like a tiled
//! renderer: moving the camera puts the 3×3 tiles around the center in view
//! and each newly seen tile "loads" after a fixed latency, announced on the
//! source-data channel. Queries only see features of loaded tiles that are
//! currently in view.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use geo::{BoundingRect, Geometry};
use log::debug;
use rstar::{RTree, RTreeObject, AABB};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::MapError;
use crate::port::{MapQueryPort, RoadFeature, SourceDataEvent};
use crate::tiles::TileId;
use crate::{Bounds, GeoPoint};

const EVENT_CAPACITY: usize = 256;
const DEFAULT_TILE_LATENCY: Duration = Duration::from_millis(50);

/// Envelope of a stored feature (used for spatial indexing).
#[derive(Debug, Clone)]
struct FeatureEnvelope {
    idx: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for FeatureEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

#[derive(Debug, Clone)]
struct StoredFeature {
    layer_id: String,
    feature: RoadFeature,
}

fn to_aabb(b: &Bounds) -> AABB<[f64; 2]> {
    AABB::from_corners([b.min_lng, b.min_lat], [b.max_lng, b.max_lat])
}

/// R-tree backed [`MapQueryPort`].
pub struct InMemoryMap {
    source_id: String,
    road_layer_id: String,
    features: Vec<StoredFeature>,
    index: RTree<FeatureEnvelope>,
    style_loaded: bool,
    camera: Option<(GeoPoint, f64)>,
    visible: Vec<TileId>,
    /// Tile -> instant its data becomes available.
    loaded_at: HashMap<TileId, Instant>,
    unloadable: HashSet<TileId>,
    tile_latency: Duration,
    camera_latency: Duration,
    camera_moves: usize,
    events: broadcast::Sender<SourceDataEvent>,
}

impl InMemoryMap {
    /// Empty map whose road data belongs to `source_id` / `road_layer_id`.
    pub fn new(source_id: &str, road_layer_id: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            source_id: source_id.to_string(),
            road_layer_id: road_layer_id.to_string(),
            features: Vec::new(),
            index: RTree::new(),
            style_loaded: true,
            camera: None,
            visible: Vec::new(),
            loaded_at: HashMap::new(),
            unloadable: HashSet::new(),
            tile_latency: DEFAULT_TILE_LATENCY,
            camera_latency: Duration::ZERO,
            camera_moves: 0,
            events,
        }
    }

    pub fn with_tile_latency(mut self, latency: Duration) -> Self {
        self.tile_latency = latency;
        self
    }

    pub fn with_camera_latency(mut self, latency: Duration) -> Self {
        self.camera_latency = latency;
        self
    }

    /// A tile that never finishes loading.
    pub fn with_unloadable_tile(mut self, tile: TileId) -> Self {
        self.unloadable.insert(tile);
        self
    }

    pub fn set_style_loaded(&mut self, loaded: bool) {
        self.style_loaded = loaded;
    }

    /// Add a feature to the road layer.
    pub fn add_road(&mut self, geometry: impl Into<Geometry<f64>>, surface: Option<&str>) {
        let layer = self.road_layer_id.clone();
        self.add_feature(&layer, RoadFeature::new(geometry, surface));
    }

    /// Add a feature to any layer. Query order is insertion order.
    pub fn add_feature(&mut self, layer_id: &str, feature: RoadFeature) {
        let idx = self.features.len();
        if let Some(rect) = feature.geometry.bounding_rect() {
            self.index.insert(FeatureEnvelope {
                idx,
                min: [rect.min().x, rect.min().y],
                max: [rect.max().x, rect.max().y],
            });
        }
        self.features.push(StoredFeature {
            layer_id: layer_id.to_string(),
            feature,
        });
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Current camera center and zoom.
    pub fn camera(&self) -> Option<(&GeoPoint, f64)> {
        self.camera.as_ref().map(|(c, z)| (c, *z))
    }

    pub fn camera_moves(&self) -> usize {
        self.camera_moves
    }

    /// Put the view around `center` and mark its tiles loaded right away.
    pub fn load_all_tiles_at(&mut self, center: &GeoPoint, zoom: u8) {
        let now = Instant::now();
        for tile in self.move_view(center, zoom as f64) {
            if !self.unloadable.contains(&tile) {
                self.loaded_at.insert(tile, now);
            }
        }
    }

    /// Update camera and visible tiles; returns tiles in view.
    fn move_view(&mut self, center: &GeoPoint, zoom: f64) -> Vec<TileId> {
        let tile_zoom = zoom.floor().clamp(0.0, 24.0) as u8;
        self.camera = Some((center.clone(), zoom));
        self.camera_moves += 1;
        self.visible = TileId::containing(center, tile_zoom).neighborhood(1);
        self.visible.clone()
    }

    fn tile_ready(&self, tile: &TileId, now: Instant) -> bool {
        !self.unloadable.contains(tile) && self.loaded_at.get(tile).is_some_and(|at| *at <= now)
    }
}

impl MapQueryPort for InMemoryMap {
    fn is_ready(&self) -> bool {
        self.style_loaded
    }

    fn set_camera(&mut self, center: &GeoPoint, zoom: f64) -> BoxFuture<'_, Result<(), MapError>> {
        let visible = self.move_view(center, zoom);
        let ready_at = Instant::now() + self.camera_latency + self.tile_latency;

        // Tiles seen for the first time start loading now.
        let mut pending = Vec::new();
        for tile in visible {
            if self.unloadable.contains(&tile) || self.loaded_at.contains_key(&tile) {
                continue;
            }
            self.loaded_at.insert(tile, ready_at);
            pending.push(tile);
        }

        debug!(
            "[InMemoryMap] Camera -> ({:.5}, {:.5}) z{}, {} tiles loading",
            center.latitude,
            center.longitude,
            zoom,
            pending.len()
        );

        let camera_latency = self.camera_latency;
        let events = self.events.clone();
        let source_id = self.source_id.clone();

        async move {
            for tile in pending {
                let events = events.clone();
                let source_id = source_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep_until(ready_at).await;
                    // No subscribers is fine: nobody is waiting.
                    let _ = events.send(SourceDataEvent { source_id, tile });
                });
            }
            if !camera_latency.is_zero() {
                tokio::time::sleep(camera_latency).await;
            }
            Ok(())
        }
        .boxed()
    }

    fn subscribe_source_data(&self) -> broadcast::Receiver<SourceDataEvent> {
        self.events.subscribe()
    }

    fn is_tile_loaded(&self, source_id: &str, tile: &TileId) -> bool {
        if source_id != self.source_id {
            return false;
        }
        let now = Instant::now();
        self.loaded_at
            .keys()
            .any(|loaded| loaded.covers(tile) && self.tile_ready(loaded, now))
    }

    fn query_rendered_features(&self, layer_ids: &[String], window: &Bounds) -> Vec<RoadFeature> {
        let now = Instant::now();

        let mut hits: Vec<usize> = self
            .visible
            .iter()
            .filter(|tile| self.tile_ready(tile, now))
            .filter_map(|tile| tile.bounds().intersection(window))
            .flat_map(|area| {
                self.index
                    .locate_in_envelope_intersecting(&to_aabb(&area))
                    .map(|f| f.idx)
                    .collect::<Vec<_>>()
            })
            .collect();
        hits.sort_unstable();
        hits.dedup();

        hits.into_iter()
            .map(|idx| &self.features[idx])
            .filter(|stored| layer_ids.iter().any(|l| *l == stored.layer_id))
            .map(|stored| stored.feature.clone())
            .collect()
    }
}
