//! The two halves of an upgraded socket, as seen by the push tasks.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;

/// Normal closure status code.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Transport failure on a socket half.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Error reported by the WebSocket transport.
    #[error("websocket transport error: {0}")]
    Transport(#[from] axum::Error),
    /// The socket is already closed.
    #[error("socket closed")]
    Closed,
}

/// What the reader saw on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// Any data or ping/pong frame. Ignored beyond proving liveness.
    Data,
    /// The peer sent a close frame.
    Close,
}

/// Inbound half.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, SocketError>>;
}

/// Outbound half.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), SocketError>;

    /// Write a close control frame.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), SocketError>;
}

#[async_trait]
impl FrameSource for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, SocketError>> {
        let msg = self.next().await?;
        Some(match msg {
            Ok(Message::Close(_)) => Ok(InboundFrame::Close),
            Ok(_) => Ok(InboundFrame::Data),
            Err(e) => Err(SocketError::Transport(e)),
        })
    }
}

#[async_trait]
impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, text: String) -> Result<(), SocketError> {
        self.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), SocketError> {
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        self.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}
