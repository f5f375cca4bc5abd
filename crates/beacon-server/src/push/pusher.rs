//! Pusher task: sends the latest event once, after the grace period.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::EventLookup;
use tracing::{debug, warn};

use super::connection::{Connection, WriteOutcome};

/// How the push attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushEnd {
    /// The event frame was written.
    Pushed,
    /// The sensor has no event yet.
    NoEvent,
    /// Fetching or encoding the event failed.
    FetchFailed,
    /// The frame could not be written; the connection was cancelled.
    WriteFailed,
    /// Teardown began before the write.
    Closed,
}

/// Wait out `grace`, then write the latest event for the connection's sensor.
///
/// Teardown is checked before the wait, after it, and again under the sink
/// lock right before the write.
pub async fn run(conn: Arc<Connection>, events: Arc<dyn EventLookup>, grace: Duration) -> PushEnd {
    if conn.is_closing() {
        return PushEnd::Closed;
    }

    tokio::select! {
        biased;
        () = conn.closed() => return PushEnd::Closed,
        () = conn.cancelled() => return PushEnd::Closed,
        () = tokio::time::sleep(grace) => {}
    }

    if conn.is_closing() {
        return PushEnd::Closed;
    }

    let fetched = tokio::select! {
        biased;
        () = conn.cancelled() => return PushEnd::Closed,
        res = events.last_event(conn.sensor_id()) => res,
    };
    let event = match fetched {
        Ok(event) => event,
        Err(e) if e.is_not_found() => {
            debug!(conn_id = %conn.id(), sensor_id = %conn.sensor_id(), "no event to push");
            return PushEnd::NoEvent;
        }
        Err(e) => {
            warn!(
                conn_id = %conn.id(),
                sensor_id = %conn.sensor_id(),
                error = %e,
                "failed to fetch latest event"
            );
            return PushEnd::FetchFailed;
        }
    };

    let frame = match serde_json::to_string(&event) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(conn_id = %conn.id(), error = %e, "failed to encode event");
            return PushEnd::FetchFailed;
        }
    };

    match conn.send_text(frame).await {
        Ok(WriteOutcome::Written) => {
            debug!(conn_id = %conn.id(), sensor_id = %conn.sensor_id(), "pushed latest event");
            PushEnd::Pushed
        }
        Ok(WriteOutcome::Skipped) => PushEnd::Closed,
        Err(e) => {
            warn!(conn_id = %conn.id(), error = %e, "failed to write event");
            conn.cancel();
            PushEnd::WriteFailed
        }
    }
}
