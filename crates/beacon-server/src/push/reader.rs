//! Reader task: detects the peer going away and owns per-connection teardown.

use std::sync::Arc;

use tracing::{debug, warn};

use super::connection::{CloseOutcome, CloseReason, Connection};
use super::registry::ConnectionRegistry;
use super::socket::{FrameSource, InboundFrame};

/// Why the read loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadEnd {
    /// Peer sent a close frame or the stream ended.
    PeerClosed,
    /// Read failed.
    Error,
    /// The connection token was cancelled.
    Cancelled,
}

/// Read until the peer leaves, the stream fails, or the connection is
/// cancelled, then tear the connection down.
pub async fn run(
    conn: Arc<Connection>,
    mut source: Box<dyn FrameSource>,
    registry: Arc<ConnectionRegistry>,
) -> ReadEnd {
    let end = loop {
        tokio::select! {
            biased;
            () = conn.cancelled() => break ReadEnd::Cancelled,
            frame = source.next_frame() => match frame {
                Some(Ok(InboundFrame::Data)) => {}
                Some(Ok(InboundFrame::Close)) | None => break ReadEnd::PeerClosed,
                Some(Err(e)) => {
                    warn!(conn_id = %conn.id(), error = %e, "read failed");
                    break ReadEnd::Error;
                }
            },
        }
    };
    // Dropping the source releases the inbound half before the close frame.
    drop(source);
    teardown(&conn, &registry, end).await;
    debug!(conn_id = %conn.id(), ?end, "reader finished");
    end
}

async fn teardown(conn: &Connection, registry: &ConnectionRegistry, end: ReadEnd) {
    let _ = registry.remove(conn.id());
    conn.cancel();
    match conn.close(CloseReason::ConnectionClosed).await {
        CloseOutcome::Sent => debug!(conn_id = %conn.id(), "connection closed"),
        // The websocket layer answers a peer's close itself, so ours has nowhere to go.
        CloseOutcome::Failed if end == ReadEnd::PeerClosed => {
            debug!(conn_id = %conn.id(), "peer already closed");
        }
        CloseOutcome::Failed => warn!(conn_id = %conn.id(), "close frame failed"),
        CloseOutcome::AlreadyClosed => {}
    }
}
