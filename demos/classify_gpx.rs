//! Classify a short GPX track against an in-memory road map.
//!
//! Run with: cargo run --example classify_gpx

use geo::LineString;
use route_surface::{
    route_data_to_json, summarize, ClassifierConfig, InMemoryMap, Progress, RouteClassifier,
};
use std::sync::Arc;

const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="demo">
  <trk>
    <name>Lakeside loop</name>
    <trkseg>
      <trkpt lat="47.0001" lon="8.0020"><ele>412.0</ele></trkpt>
      <trkpt lat="47.0001" lon="8.0060"><ele>413.5</ele></trkpt>
      <trkpt lat="47.0001" lon="8.0130"><ele>415.0</ele></trkpt>
      <trkpt lat="47.0001" lon="8.0170"><ele>418.2</ele></trkpt>
      <trkpt lat="47.0030" lon="8.0300"><ele>421.0</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Two roads meeting at 8.01: asphalt to the west, gravel to the east.
    // The last track point is off-road.
    let mut map = InMemoryMap::new("composite", "road");
    map.add_road(LineString::from(vec![(8.0, 47.0), (8.01, 47.0)]), Some("asphalt"));
    map.add_road(LineString::from(vec![(8.01, 47.0), (8.02, 47.0)]), Some("gravel"));

    let config = ClassifierConfig::default();
    println!("Surface Classification Example\n");
    println!(
        "Config: zoom={}, tile timeout={}ms, query radius={}px\n",
        config.classification_zoom, config.tile_load_timeout_ms, config.query_radius_px
    );

    let classifier = RouteClassifier::new(config).with_progress(Arc::new(|p: Progress| {
        println!("  classified {}/{} ({} degraded)", p.processed, p.total, p.degraded);
    }));

    let segments = match classifier.classify_gpx(&mut map, TRACK).await {
        Ok(segments) => segments,
        Err(e) => {
            eprintln!("Classification failed: {}", e);
            return;
        }
    };

    println!("\nSegments:");
    for segment in &segments {
        println!(
            "  #{} {:<8} {} points",
            segment.index,
            segment.surface,
            segment.points.len()
        );
    }

    let summary = summarize(&segments);
    println!(
        "\nPaved: {:.0}m, unpaved: {:.0}m ({:.0}% paved)",
        summary.paved_distance_m,
        summary.unpaved_distance_m,
        summary.paved_ratio() * 100.0
    );

    match route_data_to_json(&segments) {
        Ok(json) => println!("\nrouteData: {}", json),
        Err(e) => eprintln!("Could not export route data: {}", e),
    }
}
