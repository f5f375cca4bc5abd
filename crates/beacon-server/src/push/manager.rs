//! Connection manager: accepts push streams and drains them at shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use beacon_core::{EventLookup, Sensor, SensorId, SensorLookup};
use futures::StreamExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::connection::{CloseOutcome, CloseReason, Connection};
use super::registry::ConnectionRegistry;
use super::socket::{FrameSink, FrameSource};
use super::{pusher, reader};
use crate::errors::PushError;

/// Default delay before the first push.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Default bound on closing every connection at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// Push timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushConfig {
    /// Delay between registration and the push.
    pub grace_period: Duration,
    /// Upper bound for [`PushManager::shutdown`].
    pub shutdown_timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// How [`PushManager::serve`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServeOutcome {
    /// The connection finished its close sequence.
    Closed,
    /// The request scope was cancelled first.
    Cancelled,
}

/// Counts from a completed [`PushManager::shutdown`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Close frames sent.
    pub closed: usize,
    /// Closes that failed to write.
    pub failed: usize,
    /// Connections already closing on their own.
    pub already_closed: usize,
}

impl ShutdownReport {
    /// Connections handled.
    pub fn total(&self) -> usize {
        self.closed + self.failed + self.already_closed
    }
}

/// Owns every live push stream.
pub struct PushManager {
    sensors: Arc<dyn SensorLookup>,
    events: Arc<dyn EventLookup>,
    registry: Arc<ConnectionRegistry>,
    config: PushConfig,
}

impl PushManager {
    /// Create a manager over the two lookups it needs.
    pub fn new(
        sensors: Arc<dyn SensorLookup>,
        events: Arc<dyn EventLookup>,
        config: PushConfig,
    ) -> Self {
        Self {
            sensors,
            events,
            registry: Arc::new(ConnectionRegistry::new()),
            config,
        }
    }

    /// Timing in effect.
    pub fn config(&self) -> PushConfig {
        self.config
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Check that a sensor exists before upgrading.
    pub async fn resolve_sensor(&self, id: SensorId) -> Result<Sensor, PushError> {
        match self.sensors.sensor_by_id(id).await {
            Ok(sensor) => Ok(sensor),
            Err(e) if e.is_not_found() => Err(PushError::SensorNotFound(id)),
            Err(e) => Err(PushError::Lookup(e)),
        }
    }

    /// Serve an upgraded socket until it closes or `request` is cancelled.
    pub async fn serve_socket(
        &self,
        sensor_id: SensorId,
        request: &CancellationToken,
        socket: WebSocket,
    ) -> ServeOutcome {
        let (sink, source) = socket.split();
        self.serve(sensor_id, request, Box::new(sink), Box::new(source))
            .await
    }

    /// Register a connection, start its reader and pusher, and wait for
    /// teardown or request cancellation.
    pub async fn serve(
        &self,
        sensor_id: SensorId,
        request: &CancellationToken,
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
    ) -> ServeOutcome {
        let conn = Arc::new(Connection::new(sensor_id, sink, request.child_token()));
        self.registry.add(conn.clone());
        info!(conn_id = %conn.id(), sensor_id = %sensor_id, "push stream opened");

        let span = info_span!("push_stream", conn_id = %conn.id(), sensor_id = %sensor_id);
        let _reader = tokio::spawn(
            reader::run(conn.clone(), source, self.registry.clone()).instrument(span.clone()),
        );
        let _pusher = tokio::spawn(
            pusher::run(conn.clone(), self.events.clone(), self.config.grace_period)
                .instrument(span),
        );

        let outcome = tokio::select! {
            biased;
            () = request.cancelled() => ServeOutcome::Cancelled,
            () = conn.closed() => ServeOutcome::Closed,
        };
        conn.cancel();
        let open_ms = u64::try_from(conn.opened_at().elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(conn_id = %conn.id(), ?outcome, open_ms, "push stream ended");
        outcome
    }

    /// Close every registered connection, bounded by the shutdown timeout.
    ///
    /// Connections registered after the registry is drained are not touched;
    /// callers stop accepting upgrades first. On timeout the outstanding
    /// close tasks are aborted.
    pub async fn shutdown(&self) -> Result<ShutdownReport, PushError> {
        let drained = self.registry.drain();
        let mut report = ShutdownReport::default();
        if drained.is_empty() {
            debug!("no push streams to close");
            return Ok(report);
        }
        info!(count = drained.len(), "closing push streams");

        let mut closes = JoinSet::new();
        for conn in drained {
            let _ = closes.spawn(async move { conn.close(CloseReason::ServerShutdown).await });
        }

        let wait_all = async {
            while let Some(res) = closes.join_next().await {
                match res {
                    Ok(CloseOutcome::Sent) => report.closed += 1,
                    Ok(CloseOutcome::Failed) => report.failed += 1,
                    Ok(CloseOutcome::AlreadyClosed) => report.already_closed += 1,
                    Err(e) => {
                        warn!(error = %e, "close task failed");
                        report.failed += 1;
                    }
                }
            }
        };

        if tokio::time::timeout(self.config.shutdown_timeout, wait_all)
            .await
            .is_err()
        {
            let outstanding = closes.len();
            closes.abort_all();
            let timeout_ms =
                u64::try_from(self.config.shutdown_timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(outstanding, timeout_ms, "push shutdown timed out");
            return Err(PushError::ShutdownTimeout {
                timeout: self.config.shutdown_timeout,
                outstanding,
            });
        }

        info!(
            closed = report.closed,
            failed = report.failed,
            already_closed = report.already_closed,
            "push streams closed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use beacon_core::{Event, NewSensor, SensorType};
    use beacon_store::TelemetryService;
    use chrono::Utc;
    use tokio::time::Instant;

    use super::*;
    use crate::push::socket::InboundFrame;
    use crate::push::testing::{FailingLookup, MockSink, Peer, SinkProbe, mock_socket};

    fn service_with_sensors(count: usize) -> Arc<TelemetryService> {
        let svc = Arc::new(TelemetryService::in_memory());
        for i in 0..count {
            let _ = svc
                .register_sensor(NewSensor {
                    serial_number: format!("{i:010}"),
                    sensor_type: SensorType::Adc,
                    description: format!("sensor {i}"),
                    is_active: true,
                })
                .unwrap();
        }
        svc
    }

    fn manager(svc: &Arc<TelemetryService>) -> Arc<PushManager> {
        Arc::new(PushManager::new(
            svc.clone(),
            svc.clone(),
            PushConfig::default(),
        ))
    }

    struct Stream {
        probe: SinkProbe,
        peer: Peer,
        task: tokio::task::JoinHandle<ServeOutcome>,
    }

    fn open(mgr: &Arc<PushManager>, sensor: i64, request: &CancellationToken) -> Stream {
        open_with(mgr, sensor, request, |s| s)
    }

    fn open_with(
        mgr: &Arc<PushManager>,
        sensor: i64,
        request: &CancellationToken,
        configure: impl FnOnce(MockSink) -> MockSink,
    ) -> Stream {
        let (sink, source, probe, peer) = mock_socket();
        let sink = configure(sink);
        let mgr = mgr.clone();
        let request = request.clone();
        let task = tokio::spawn(async move {
            mgr.serve(SensorId::new(sensor), &request, Box::new(sink), Box::new(source))
                .await
        });
        Stream { probe, peer, task }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn resolve_sensor_maps_errors() {
        let svc = service_with_sensors(1);
        let mgr = manager(&svc);
        assert_eq!(mgr.resolve_sensor(SensorId::new(1)).await.unwrap().id, SensorId::new(1));
        assert_matches!(
            mgr.resolve_sensor(SensorId::new(9)).await,
            Err(PushError::SensorNotFound(id)) if id == SensorId::new(9)
        );

        let failing = PushManager::new(
            Arc::new(FailingLookup),
            Arc::new(FailingLookup),
            PushConfig::default(),
        );
        assert_matches!(
            failing.resolve_sensor(SensorId::new(1)).await,
            Err(PushError::Lookup(_))
        );
        assert_eq!(failing.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn single_push_inside_window() {
        let svc = service_with_sensors(1);
        let _ = svc.receive_event("0000000000", 42, Utc::now()).unwrap();
        let mgr = manager(&svc);
        let request = CancellationToken::new();

        let start = Instant::now();
        let stream = open(&mgr, 1, &request);
        tokio::time::sleep(Duration::from_millis(250)).await;

        let frames = stream.probe.frames();
        assert_eq!(frames.len(), 1);
        let elapsed = frames[0].0 - start;
        assert!(elapsed >= Duration::from_millis(190), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(250), "{elapsed:?}");
        let event: Event = serde_json::from_str(&frames[0].1).unwrap();
        assert_eq!(event.payload, 42);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(stream.probe.frames().len(), 1);
        assert_eq!(mgr.connection_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_sensor_stays_open() {
        let svc = service_with_sensors(1);
        let mgr = manager(&svc);
        let request = CancellationToken::new();

        let stream = open(&mgr, 1, &request);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(stream.probe.frames().is_empty());
        assert_eq!(stream.probe.close_count(), 0);
        assert_eq!(mgr.connection_count(), 1);
        assert!(!stream.task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_keeps_connection_open() {
        let svc = service_with_sensors(1);
        let mgr = Arc::new(PushManager::new(
            svc.clone(),
            Arc::new(FailingLookup),
            PushConfig::default(),
        ));
        let request = CancellationToken::new();

        let stream = open(&mgr, 1, &request);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(stream.probe.frames().is_empty());
        assert_eq!(mgr.connection_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_before_grace_means_no_push() {
        for offset_ms in [0, 100, 199] {
            let svc = service_with_sensors(1);
            let _ = svc.receive_event("0000000000", 5, Utc::now()).unwrap();
            let mgr = manager(&svc);
            let request = CancellationToken::new();

            let stream = open(&mgr, 1, &request);
            tokio::time::sleep(Duration::from_millis(offset_ms)).await;
            drop(stream.peer);

            assert_eq!(stream.task.await.unwrap(), ServeOutcome::Closed);
            tokio::time::sleep(Duration::from_millis(500)).await;
            assert!(stream.probe.frames().is_empty(), "offset {offset_ms}ms");
            assert_eq!(stream.probe.close_count(), 1);
            assert_eq!(mgr.connection_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_frame_ends_serve() {
        let svc = service_with_sensors(1);
        let mgr = manager(&svc);
        let request = CancellationToken::new();

        let stream = open(&mgr, 1, &request);
        settle().await;
        stream.peer.send(InboundFrame::Data);
        stream.peer.send(InboundFrame::Close);

        assert_eq!(stream.task.await.unwrap(), ServeOutcome::Closed);
        assert_eq!(
            stream.probe.closes(),
            vec![(1000, "connection closed".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn request_cancellation_tears_down() {
        let svc = service_with_sensors(1);
        let mgr = manager(&svc);
        let request = CancellationToken::new();

        let stream = open(&mgr, 1, &request);
        settle().await;
        assert_eq!(mgr.connection_count(), 1);

        request.cancel();
        assert_eq!(stream.task.await.unwrap(), ServeOutcome::Cancelled);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stream.probe.close_count(), 1);
        assert_eq!(mgr.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn racing_triggers_send_one_close() {
        let svc = service_with_sensors(1);
        let mgr = manager(&svc);
        let request = CancellationToken::new();

        let stream = open(&mgr, 1, &request);
        settle().await;

        let shutdown = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.shutdown().await })
        };
        drop(stream.peer);
        request.cancel();

        let report = shutdown.await.unwrap().unwrap();
        assert!(report.total() <= 1);
        let _ = stream.task.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stream.probe.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_and_empties_registry() {
        let svc = service_with_sensors(3);
        let mgr = manager(&svc);
        let request = CancellationToken::new();

        let streams: Vec<Stream> = (1..=3).map(|id| open(&mgr, id, &request)).collect();
        settle().await;
        assert_eq!(mgr.connection_count(), 3);

        let report = mgr.shutdown().await.unwrap();
        assert_eq!(report.closed, 3);
        assert_eq!(mgr.connection_count(), 0);
        assert_eq!(mgr.shutdown().await.unwrap(), ShutdownReport::default());

        for stream in streams {
            assert_eq!(stream.task.await.unwrap(), ServeOutcome::Closed);
            assert_eq!(
                stream.probe.closes(),
                vec![(1000, "server shutting down".to_string())]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_close_hits_timeout() {
        let svc = service_with_sensors(2);
        let mgr = manager(&svc);
        let request = CancellationToken::new();

        let _healthy = open(&mgr, 1, &request);
        let _stalled = open_with(&mgr, 2, &request, MockSink::stall_close);
        settle().await;

        let start = Instant::now();
        let err = mgr.shutdown().await.unwrap_err();
        let elapsed = start.elapsed();
        assert!(elapsed >= DEFAULT_SHUTDOWN_TIMEOUT, "{elapsed:?}");
        assert!(elapsed < DEFAULT_SHUTDOWN_TIMEOUT + Duration::from_secs(1), "{elapsed:?}");
        assert_matches!(err, PushError::ShutdownTimeout { outstanding: 1, timeout } => {
            assert_eq!(timeout, DEFAULT_SHUTDOWN_TIMEOUT);
        });
        assert_eq!(mgr.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fifty_connections_drain_within_bound() {
        let svc = service_with_sensors(50);
        let mgr = manager(&svc);
        let request = CancellationToken::new();

        let streams: Vec<Stream> = (1..=50)
            .map(|id| open_with(&mgr, id, &request, |s| s.close_delay(Duration::from_millis(1))))
            .collect();
        settle().await;
        assert_eq!(mgr.connection_count(), 50);

        let report = mgr.shutdown().await.unwrap();
        assert_eq!(report.closed, 50);
        assert!(streams.iter().all(|s| s.probe.close_count() == 1));
    }
}
