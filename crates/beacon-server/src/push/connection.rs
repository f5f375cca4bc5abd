//! A single live push stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use beacon_core::{ConnectionId, SensorId};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::socket::{FrameSink, NORMAL_CLOSURE, SocketError};

/// Why a connection is being closed. Sent as the close frame reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer went away or the stream failed.
    ConnectionClosed,
    /// The server is shutting down.
    ServerShutdown,
}

impl CloseReason {
    /// Close frame reason text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionClosed => "connection closed",
            Self::ServerShutdown => "server shutting down",
        }
    }
}

/// Result of [`Connection::send_text`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The frame was written.
    Written,
    /// Teardown had already begun; nothing was written.
    Skipped,
}

/// Result of [`Connection::close`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// This call sent the close frame.
    Sent,
    /// This call owned the close but the frame could not be written.
    Failed,
    /// Another caller already owns the close.
    AlreadyClosed,
}

/// Live push stream for one sensor.
///
/// Teardown can be triggered from three places (peer read error, request
/// cancellation, server shutdown). They all funnel into [`Connection::close`],
/// which claims the close with an atomic swap so the close frame goes out at
/// most once.
pub struct Connection {
    id: ConnectionId,
    sensor_id: SensorId,
    sink: Mutex<Box<dyn FrameSink>>,
    cancel: CancellationToken,
    closed: CancellationToken,
    close_claimed: AtomicBool,
    opened_at: Instant,
}

impl Connection {
    /// Wrap an outbound half. `cancel` is the per-connection token, normally a
    /// child of the request token.
    pub fn new(sensor_id: SensorId, sink: Box<dyn FrameSink>, cancel: CancellationToken) -> Self {
        Self {
            id: ConnectionId::new(),
            sensor_id,
            sink: Mutex::new(sink),
            cancel,
            closed: CancellationToken::new(),
            close_claimed: AtomicBool::new(false),
            opened_at: Instant::now(),
        }
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Sensor this stream was opened for.
    pub fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    /// When the connection was registered.
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Whether teardown has started.
    pub fn is_closing(&self) -> bool {
        self.cancel.is_cancelled() || self.closed.is_cancelled()
    }

    /// Signal teardown. Never blocks.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once teardown has been signalled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Resolves once the close sequence has finished.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Write a text frame unless teardown has begun.
    ///
    /// The teardown check runs while holding the sink, and the write itself is
    /// abandoned if the connection is cancelled mid-flight.
    pub async fn send_text(&self, text: String) -> Result<WriteOutcome, SocketError> {
        let mut sink = self.sink.lock().await;
        if self.is_closing() {
            return Ok(WriteOutcome::Skipped);
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Ok(WriteOutcome::Skipped),
            res = sink.send_text(text) => res.map(|()| WriteOutcome::Written),
        }
    }

    /// Run the close sequence once: cancel, send a normal-closure frame,
    /// publish the closed signal.
    ///
    /// Later callers return [`CloseOutcome::AlreadyClosed`] immediately. The
    /// closed signal is published even if this future is dropped mid-close.
    pub async fn close(&self, reason: CloseReason) -> CloseOutcome {
        if self.close_claimed.swap(true, Ordering::AcqRel) {
            return CloseOutcome::AlreadyClosed;
        }
        let _publish_closed = self.closed.clone().drop_guard();
        self.cancel.cancel();

        let mut sink = self.sink.lock().await;
        match sink.close(NORMAL_CLOSURE, reason.as_str()).await {
            Ok(()) => CloseOutcome::Sent,
            Err(e) => {
                debug!(conn_id = %self.id, error = %e, "close frame not delivered");
                CloseOutcome::Failed
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("sensor_id", &self.sensor_id)
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}
