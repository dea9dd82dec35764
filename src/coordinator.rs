//! Camera and tile-load sequencing ahead of each classification query.
//!
//! The map engine only loads data for what is in view, and a query issued
//! before the data arrives silently returns nothing. Before every point the
//! coordinator moves the camera there at the classification zoom and waits,
//! bounded, for the road source to report the point's tile as loaded.
//!
//! ```text
//! Idle -> Moving -> WaitingForTiles -> Ready
//!                                   \-> TimedOut
//! ```
//!
//! Both terminal states hand control back to the caller and reset to `Idle`.
//! A timeout is not an error: the caller classifies with whatever is loaded.

use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::timeout;

use crate::config::ClassifierConfig;
use crate::port::{MapQueryPort, SourceDataEvent};
use crate::tiles::TileId;
use crate::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportState {
    Idle,
    Moving,
    WaitingForTiles,
    Ready,
    TimedOut,
}

/// How a `prepare` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportOutcome {
    Ready,
    TimedOut,
}

/// Running totals across `prepare` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportStats {
    pub ready: usize,
    pub timed_out: usize,
}

/// Exclusive driver of the map camera for the duration of a classification.
pub struct ViewportCoordinator<'m, P: MapQueryPort> {
    port: &'m mut P,
    config: &'m ClassifierConfig,
    state: ViewportState,
    stats: ViewportStats,
}

impl<'m, P: MapQueryPort> ViewportCoordinator<'m, P> {
    pub fn new(port: &'m mut P, config: &'m ClassifierConfig) -> Self {
        Self {
            port,
            config,
            state: ViewportState::Idle,
            stats: ViewportStats::default(),
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn stats(&self) -> ViewportStats {
        self.stats
    }

    /// Read access to the port, for queries once the viewport is prepared.
    pub fn port(&self) -> &P {
        self.port
    }

    /// Return to `Idle` after an abandoned `prepare` (e.g. on cancellation).
    pub fn reset(&mut self) {
        self.state = ViewportState::Idle;
    }

    /// Bring the tile containing `point` into view and wait for it to load.
    pub async fn prepare(&mut self, point: &GeoPoint) -> ViewportOutcome {
        let config = self.config;
        let target = TileId::containing(point, config.tile_zoom());
        let source_id = config.road_source_id.as_str();

        // Subscribe before moving so a fast load cannot slip past us.
        let mut events = self.port.subscribe_source_data();

        self.transition(ViewportState::Moving);
        let moved = timeout(
            config.camera_move_timeout(),
            self.port.set_camera(point, config.classification_zoom),
        )
        .await;

        match moved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("[Viewport] Camera move to tile {} failed: {}", target, e);
                return self.finish(ViewportOutcome::TimedOut);
            }
            Err(_) => {
                warn!(
                    "[Viewport] Camera move to tile {} not acknowledged within {:?}",
                    target,
                    config.camera_move_timeout()
                );
                return self.finish(ViewportOutcome::TimedOut);
            }
        }

        self.transition(ViewportState::WaitingForTiles);
        if self.port.is_tile_loaded(source_id, &target) {
            debug!("[Viewport] Tile {} already loaded", target);
            return self.finish(ViewportOutcome::Ready);
        }

        let waited = timeout(
            config.tile_load_timeout(),
            wait_for_tile(&*self.port, &mut events, source_id, &target),
        )
        .await;

        match waited {
            Ok(true) => self.finish(ViewportOutcome::Ready),
            Ok(false) => {
                warn!(
                    "[Viewport] Source '{}' event stream closed while waiting for tile {}",
                    source_id, target
                );
                self.finish(ViewportOutcome::TimedOut)
            }
            Err(_) => {
                warn!(
                    "[Viewport] Tile {} of '{}' not loaded within {:?}, using loaded data",
                    target,
                    source_id,
                    config.tile_load_timeout()
                );
                self.finish(ViewportOutcome::TimedOut)
            }
        }
    }

    fn transition(&mut self, next: ViewportState) {
        debug!("[Viewport] {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn finish(&mut self, outcome: ViewportOutcome) -> ViewportOutcome {
        match outcome {
            ViewportOutcome::Ready => {
                self.stats.ready += 1;
                self.transition(ViewportState::Ready);
            }
            ViewportOutcome::TimedOut => {
                self.stats.timed_out += 1;
                self.transition(ViewportState::TimedOut);
            }
        }
        self.transition(ViewportState::Idle);
        outcome
    }
}

/// Wait for a load event covering `target`. Returns false if the event
/// stream closes first.
async fn wait_for_tile<P: MapQueryPort>(
    port: &P,
    events: &mut broadcast::Receiver<SourceDataEvent>,
    source_id: &str,
    target: &TileId,
) -> bool {
    loop {
        match events.recv().await {
            Ok(event) if event.satisfies(source_id, target) => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                // The event we want may have been among those dropped.
                debug!("[Viewport] Missed {} source events, re-checking tile {}", skipped, target);
                if port.is_tile_loaded(source_id, target) {
                    return true;
                }
            }
            Err(RecvError::Closed) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapError;
    use crate::memory_map::InMemoryMap;
    use crate::port::RoadFeature;
    use crate::Bounds;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// A port whose camera never settles, or that rejects moves outright.
    struct StuckPort {
        reject: bool,
        events: broadcast::Sender<SourceDataEvent>,
    }

    impl StuckPort {
        fn new(reject: bool) -> Self {
            let (events, _) = broadcast::channel(4);
            Self { reject, events }
        }
    }

    impl MapQueryPort for StuckPort {
        fn is_ready(&self) -> bool {
            true
        }

        fn set_camera(
            &mut self,
            _center: &GeoPoint,
            _zoom: f64,
        ) -> BoxFuture<'_, Result<(), MapError>> {
            if self.reject {
                let err = MapError::CameraRejected("map is being dragged".to_string());
                async move { Err::<(), _>(err) }.boxed()
            } else {
                futures::future::pending::<Result<(), MapError>>().boxed()
            }
        }

        fn subscribe_source_data(&self) -> broadcast::Receiver<SourceDataEvent> {
            self.events.subscribe()
        }

        fn is_tile_loaded(&self, _source_id: &str, _tile: &TileId) -> bool {
            false
        }

        fn query_rendered_features(
            &self,
            _layer_ids: &[String],
            _window: &Bounds,
        ) -> Vec<RoadFeature> {
            Vec::new()
        }
    }

    /// A port with a one-slot event channel. A camera move floods it with
    /// events for another source, or drops the sender altogether.
    struct NarrowStream {
        events: Option<broadcast::Sender<SourceDataEvent>>,
        flood: usize,
        close_on_move: bool,
        /// `is_tile_loaded` answers true from this call on (0-based).
        loaded_from_check: usize,
        checks: AtomicUsize,
    }

    impl NarrowStream {
        fn new(flood: usize, close_on_move: bool, loaded_from_check: usize) -> Self {
            let (events, _) = broadcast::channel(1);
            Self {
                events: Some(events),
                flood,
                close_on_move,
                loaded_from_check,
                checks: AtomicUsize::new(0),
            }
        }

        fn checks(&self) -> usize {
            self.checks.load(Ordering::SeqCst)
        }
    }

    impl MapQueryPort for NarrowStream {
        fn is_ready(&self) -> bool {
            true
        }

        fn set_camera(
            &mut self,
            _center: &GeoPoint,
            _zoom: f64,
        ) -> BoxFuture<'_, Result<(), MapError>> {
            if let Some(events) = &self.events {
                for _ in 0..self.flood {
                    let _ = events.send(SourceDataEvent {
                        source_id: "satellite".to_string(),
                        tile: TileId::new(0, 0, 0),
                    });
                }
            }
            if self.close_on_move {
                self.events = None;
            }
            async { Ok::<(), MapError>(()) }.boxed()
        }

        fn subscribe_source_data(&self) -> broadcast::Receiver<SourceDataEvent> {
            match &self.events {
                Some(events) => events.subscribe(),
                None => broadcast::channel(1).1,
            }
        }

        fn is_tile_loaded(&self, _source_id: &str, _tile: &TileId) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) >= self.loaded_from_check
        }

        fn query_rendered_features(
            &self,
            _layer_ids: &[String],
            _window: &Bounds,
        ) -> Vec<RoadFeature> {
            Vec::new()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagged_stream_rechecks_tile() {
        // Fast-path check says not loaded; the re-check after lagging says loaded
        let mut port = NarrowStream::new(4, false, 1);
        let config = ClassifierConfig::default();
        let mut coordinator = ViewportCoordinator::new(&mut port, &config);

        let start = tokio::time::Instant::now();
        assert_eq!(coordinator.prepare(&GeoPoint::new(47.0, 8.0)).await, ViewportOutcome::Ready);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(coordinator.port().checks(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagged_stream_keeps_waiting_when_tile_missing() {
        let mut port = NarrowStream::new(4, false, usize::MAX);
        let config = ClassifierConfig::default();
        let mut coordinator = ViewportCoordinator::new(&mut port, &config);

        let start = tokio::time::Instant::now();
        let outcome = coordinator.prepare(&GeoPoint::new(47.0, 8.0)).await;
        assert_eq!(outcome, ViewportOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert_eq!(coordinator.port().checks(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_times_out_early() {
        let mut port = NarrowStream::new(0, true, usize::MAX);
        let config = ClassifierConfig::default();
        let mut coordinator = ViewportCoordinator::new(&mut port, &config);

        let start = tokio::time::Instant::now();
        let outcome = coordinator.prepare(&GeoPoint::new(47.0, 8.0)).await;
        assert_eq!(outcome, ViewportOutcome::TimedOut);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(coordinator.state(), ViewportState::Idle);
        assert_eq!(coordinator.stats().timed_out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_tile_loads() {
        let mut map =
            InMemoryMap::new("composite", "road").with_tile_latency(Duration::from_millis(400));
        let config = ClassifierConfig::default();
        let mut coordinator = ViewportCoordinator::new(&mut map, &config);

        let outcome = coordinator.prepare(&GeoPoint::new(47.0, 8.0)).await;
        assert_eq!(outcome, ViewportOutcome::Ready);
        assert_eq!(coordinator.state(), ViewportState::Idle);
        assert_eq!(coordinator.stats(), ViewportStats { ready: 1, timed_out: 0 });

        let tile = TileId::containing(&GeoPoint::new(47.0, 8.0), 13);
        assert!(coordinator.port().is_tile_loaded("composite", &tile));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_tile_is_ready_immediately() {
        let mut map =
            InMemoryMap::new("composite", "road").with_tile_latency(Duration::from_millis(400));
        let config = ClassifierConfig::default();
        let point = GeoPoint::new(47.0, 8.0);
        let mut coordinator = ViewportCoordinator::new(&mut map, &config);

        coordinator.prepare(&point).await;
        let start = tokio::time::Instant::now();
        assert_eq!(coordinator.prepare(&point).await, ViewportOutcome::Ready);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unloadable_tile_times_out() {
        let point = GeoPoint::new(47.0, 8.0);
        let mut map = InMemoryMap::new("composite", "road")
            .with_unloadable_tile(TileId::containing(&point, 13));
        let config = ClassifierConfig::default();
        let mut coordinator = ViewportCoordinator::new(&mut map, &config);

        let start = tokio::time::Instant::now();
        let outcome = coordinator.prepare(&point).await;
        assert_eq!(outcome, ViewportOutcome::TimedOut);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000) && elapsed < Duration::from_millis(3100));
        assert_eq!(coordinator.state(), ViewportState::Idle);
        assert_eq!(coordinator.stats().timed_out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_camera_times_out() {
        let mut port = StuckPort::new(false);
        let config = ClassifierConfig {
            camera_move_timeout_ms: 250,
            ..Default::default()
        };
        let mut coordinator = ViewportCoordinator::new(&mut port, &config);

        let start = tokio::time::Instant::now();
        assert_eq!(coordinator.prepare(&GeoPoint::new(0.0, 0.0)).await, ViewportOutcome::TimedOut);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250) && elapsed < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_rejected_camera_move_degrades() {
        let mut port = StuckPort::new(true);
        let config = ClassifierConfig::default();
        let mut coordinator = ViewportCoordinator::new(&mut port, &config);

        assert_eq!(coordinator.prepare(&GeoPoint::new(0.0, 0.0)).await, ViewportOutcome::TimedOut);
        assert_eq!(coordinator.state(), ViewportState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_zoom_is_used() {
        let mut map = InMemoryMap::new("composite", "road");
        let config = ClassifierConfig {
            classification_zoom: 15.0,
            ..Default::default()
        };
        let point = GeoPoint::new(47.0, 8.0);
        let mut coordinator = ViewportCoordinator::new(&mut map, &config);
        coordinator.prepare(&point).await;

        assert_eq!(map.camera().map(|(_, zoom)| zoom), Some(15.0));
        assert!(map.is_tile_loaded("composite", &TileId::containing(&point, 15)));
    }
}
