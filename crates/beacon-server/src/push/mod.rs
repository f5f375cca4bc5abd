//! Live sensor push streams.
//!
//! A client opens `GET /sensors/{id}/events`. Once the socket is upgraded the
//! [`PushManager`] registers a [`Connection`] and runs two tasks for it:
//!
//! - [`reader`] reads only to notice the peer leaving, and owns teardown
//! - [`pusher`] waits out the grace period and writes the latest event once
//!
//! Teardown from any source (peer, request scope, server shutdown) goes
//! through [`Connection::close`], so each connection sends at most one close
//! frame.

pub mod connection;
pub mod manager;
pub mod pusher;
pub mod reader;
pub mod registry;
pub mod socket;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{CloseOutcome, CloseReason, Connection, WriteOutcome};
pub use manager::{PushConfig, PushManager, ServeOutcome, ShutdownReport};
pub use registry::ConnectionRegistry;
pub use socket::{FrameSink, FrameSource, InboundFrame, NORMAL_CLOSURE, SocketError};
