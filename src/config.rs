use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::SurfaceTag;

/// Configuration for the classification pipeline.
///
/// Deserializes from camelCase JSON; every missing key takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierConfig {
    /// Zoom level the camera is moved to before each query.
    /// Surface metadata only appears in the road tiles from this zoom on.
    /// Default: 13.0
    pub classification_zoom: f64,

    /// Bounded wait for the tile-load signal, in milliseconds.
    /// Default: 3000
    pub tile_load_timeout_ms: u64,

    /// Bounded wait for the camera-move acknowledgement, in milliseconds.
    /// Default: 3000
    pub camera_move_timeout_ms: u64,

    /// Source whose data-loaded events the coordinator waits for.
    /// Default: "composite"
    pub road_source_id: String,

    /// Layers queried for road features.
    /// Default: ["road"]
    pub road_layer_ids: Vec<String>,

    /// Half-width of the per-point query window in screen pixels.
    /// Default: 10.0
    pub query_radius_px: f64,

    /// Wider window tried when the first query finds no road lines.
    /// Default: Some(50.0)
    pub expanded_query_radius_px: Option<f64>,

    /// Ignore road lines farther than this from the point, in meters.
    /// Default: None (nearest line in the window always wins)
    pub max_match_distance_m: Option<f64>,

    /// Surface label vocabulary.
    pub surfaces: SurfaceVocabulary,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            classification_zoom: 13.0,
            tile_load_timeout_ms: 3000,
            camera_move_timeout_ms: 3000,
            road_source_id: "composite".to_string(),
            road_layer_ids: vec!["road".to_string()],
            query_radius_px: 10.0,
            expanded_query_radius_px: Some(50.0),
            max_match_distance_m: None,
            surfaces: SurfaceVocabulary::default(),
        }
    }
}

impl ClassifierConfig {
    /// Parse a JSON configuration object.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn tile_load_timeout(&self) -> Duration {
        Duration::from_millis(self.tile_load_timeout_ms)
    }

    pub fn camera_move_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_move_timeout_ms)
    }

    /// Integer zoom used for tile addressing.
    pub fn tile_zoom(&self) -> u8 {
        self.classification_zoom.floor().clamp(0.0, 24.0) as u8
    }
}

/// Known surface labels, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceVocabulary {
    pub paved: Vec<String>,
    pub unpaved: Vec<String>,
}

impl Default for SurfaceVocabulary {
    fn default() -> Self {
        let paved = [
            "paved",
            "asphalt",
            "concrete",
            "concrete:plates",
            "concrete:lanes",
            "paving_stones",
            "sett",
            "compacted",
            "sealed",
            "bitumen",
            "tar",
            "chipseal",
            "metal",
            "wood",
        ];
        let unpaved = [
            "unpaved",
            "gravel",
            "fine_gravel",
            "dirt",
            "earth",
            "ground",
            "grass",
            "sand",
            "mud",
            "pebblestone",
            "rock",
            "woodchips",
        ];
        Self {
            paved: paved.iter().map(|s| s.to_string()).collect(),
            unpaved: unpaved.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SurfaceVocabulary {
    /// Map a source surface label to a tag. Missing and unrecognized labels
    /// are unpaved.
    pub fn classify(&self, label: Option<&str>) -> SurfaceTag {
        let Some(label) = label else {
            return SurfaceTag::Unpaved;
        };
        let label = label.trim();
        if self.paved.iter().any(|p| p.eq_ignore_ascii_case(label)) {
            SurfaceTag::Paved
        } else {
            // Explicitly unpaved and unknown labels land in the same place.
            SurfaceTag::Unpaved
        }
    }

    /// Whether the label is in either vocabulary.
    pub fn is_known(&self, label: &str) -> bool {
        let label = label.trim();
        self.paved
            .iter()
            .chain(self.unpaved.iter())
            .any(|s| s.eq_ignore_ascii_case(label))
    }
}
