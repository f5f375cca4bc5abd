//! In-memory socket halves and collaborators for push tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::{Event, EventLookup, Sensor, SensorId, SensorLookup, StoreError};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::socket::{FrameSink, FrameSource, InboundFrame, SocketError};

#[derive(Default)]
struct SinkLog {
    frames: Mutex<Vec<(Instant, String)>>,
    closes: Mutex<Vec<(u16, String)>>,
}

/// Outbound half that records every frame.
pub(crate) struct MockSink {
    log: Arc<SinkLog>,
    close_delay: Duration,
    stall_close: bool,
    fail: bool,
}

impl MockSink {
    /// Sleep this long inside every close.
    pub(crate) fn close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Never finish a close.
    pub(crate) fn stall_close(mut self) -> Self {
        self.stall_close = true;
        self
    }

    /// Fail every write and close.
    pub(crate) fn fail_all(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), SocketError> {
        if self.fail {
            return Err(SocketError::Closed);
        }
        self.log.frames.lock().push((Instant::now(), text));
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), SocketError> {
        self.log.closes.lock().push((code, reason.to_owned()));
        if self.stall_close {
            std::future::pending::<()>().await;
        }
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        if self.fail {
            return Err(SocketError::Closed);
        }
        Ok(())
    }
}

/// Read side of what a [`MockSink`] received.
#[derive(Clone)]
pub(crate) struct SinkProbe {
    log: Arc<SinkLog>,
}

impl SinkProbe {
    pub(crate) fn frames(&self) -> Vec<(Instant, String)> {
        self.log.frames.lock().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.frames().into_iter().map(|(_, t)| t).collect()
    }

    pub(crate) fn closes(&self) -> Vec<(u16, String)> {
        self.log.closes.lock().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.log.closes.lock().len()
    }
}

/// Inbound half fed by a [`Peer`]. Dropping the peer ends the stream.
pub(crate) struct MockSource {
    rx: mpsc::UnboundedReceiver<Result<InboundFrame, SocketError>>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, SocketError>> {
        self.rx.recv().await
    }
}

/// The remote end of a mock socket.
pub(crate) struct Peer {
    tx: mpsc::UnboundedSender<Result<InboundFrame, SocketError>>,
}

impl Peer {
    pub(crate) fn send(&self, frame: InboundFrame) {
        let _ = self.tx.send(Ok(frame));
    }

    pub(crate) fn fail(&self, err: SocketError) {
        let _ = self.tx.send(Err(err));
    }
}

pub(crate) fn mock_socket() -> (MockSink, MockSource, SinkProbe, Peer) {
    let log = Arc::new(SinkLog::default());
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MockSink {
            log: log.clone(),
            close_delay: Duration::ZERO,
            stall_close: false,
            fail: false,
        },
        MockSource { rx },
        SinkProbe { log },
        Peer { tx },
    )
}

/// Lookup whose every call fails with a backend error.
pub(crate) struct FailingLookup;

#[async_trait]
impl SensorLookup for FailingLookup {
    async fn sensor_by_id(&self, _id: SensorId) -> Result<Sensor, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

#[async_trait]
impl EventLookup for FailingLookup {
    async fn last_event(&self, _sensor_id: SensorId) -> Result<Event, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}
