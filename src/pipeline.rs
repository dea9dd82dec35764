//! Route classification pipeline.
//!
//! Points are processed strictly in input order, one camera move per point:
//! the camera and tile cache are shared, so a query is only valid for the
//! point the viewport was prepared for. There is no fan-out across points.
//!
//! The run is all-or-nothing: a cancelled or failed run returns an error and
//! no segments. Individual points never fail; they degrade to unpaved.

use std::sync::Arc;
use std::time::Instant;

use log::info;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::classifier::{classify_point, Classification};
use crate::config::ClassifierConfig;
use crate::coordinator::{ViewportCoordinator, ViewportOutcome};
use crate::error::{Result, SurfaceError};
use crate::geo_utils::polyline_length;
use crate::gpx::parse_gpx;
use crate::port::MapQueryPort;
use crate::road_index::features_near;
use crate::segments::{build_segments, RouteSegment};
use crate::GeoPoint;

/// Progress snapshot, delivered after every classified point.
///
/// `processed` grows by exactly one per callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    /// Points classified by the safe default for lack of road lines.
    pub degraded: usize,
    /// Points whose tile did not load in time.
    pub timed_out: usize,
}

/// Progress callback type
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Classifies routes against a map engine.
pub struct RouteClassifier {
    config: ClassifierConfig,
    on_progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl RouteClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            on_progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Abort the run when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Parse GPX text and classify its points. A document that fails to
    /// parse never reaches the map.
    pub async fn classify_gpx<P: MapQueryPort>(
        &self,
        port: &mut P,
        gpx: &str,
    ) -> Result<Vec<RouteSegment>> {
        let points = parse_gpx(gpx)?;
        self.classify_route(port, &points).await
    }

    /// Classify every point and split the result into surface segments.
    pub async fn classify_route<P: MapQueryPort>(
        &self,
        port: &mut P,
        points: &[GeoPoint],
    ) -> Result<Vec<RouteSegment>> {
        let classified = self.classify_points(port, points).await?;
        let segments = build_segments(classified.into_iter().map(|c| c.point).collect());
        info!("[Pipeline] Built {} segments", segments.len());
        Ok(segments)
    }

    /// Classify every point, one viewport preparation per point.
    ///
    /// # Errors
    /// - [`SurfaceError::MapNotReady`] if the map has not finished loading
    /// - [`SurfaceError::Cancelled`] if the token fires mid-run
    pub async fn classify_points<P: MapQueryPort>(
        &self,
        port: &mut P,
        points: &[GeoPoint],
    ) -> Result<Vec<Classification>> {
        if !port.is_ready() {
            return Err(SurfaceError::MapNotReady);
        }

        let total = points.len();
        let start = Instant::now();
        info!(
            "[Pipeline] Classifying {} points ({:.1} km) at zoom {} (tile timeout {:?})",
            total,
            polyline_length(points) / 1000.0,
            self.config.classification_zoom,
            self.config.tile_load_timeout()
        );

        let mut coordinator = ViewportCoordinator::new(port, &self.config);
        let mut progress = Progress {
            total,
            ..Default::default()
        };
        let mut results = Vec::with_capacity(total);

        for point in points {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&progress));
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                outcome = coordinator.prepare(point) => Some(outcome),
            };
            let Some(outcome) = outcome else {
                coordinator.reset();
                return Err(self.cancelled(&progress));
            };

            if outcome == ViewportOutcome::TimedOut {
                progress.timed_out += 1;
            }

            let features = features_near(coordinator.port(), point, &self.config);
            let classification = classify_point(point, &features, &self.config);
            if classification.degraded {
                progress.degraded += 1;
            }
            results.push(classification);

            progress.processed += 1;
            if let Some(ref cb) = self.on_progress {
                cb(progress);
            }
        }

        let stats = coordinator.stats();
        info!(
            "[Pipeline] DONE: {} points in {:.2}s ({} tiles ready, {} timed out, {} degraded)",
            total,
            start.elapsed().as_secs_f64(),
            stats.ready,
            stats.timed_out,
            progress.degraded
        );

        Ok(results)
    }

    fn cancelled(&self, progress: &Progress) -> SurfaceError {
        info!(
            "[Pipeline] Cancelled after {}/{} points",
            progress.processed, progress.total
        );
        SurfaceError::Cancelled
    }
}
