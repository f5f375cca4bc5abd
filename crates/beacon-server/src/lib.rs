//! # beacon-server
//!
//! Axum HTTP + WebSocket server for the Beacon telemetry service.
//!
//! - [`server`]: [`BeaconServer`], router construction, and ordered teardown
//! - [`routes`]: sensor, event, history, and push stream handlers
//! - [`push`]: live per-sensor push streams and their shutdown
//! - [`shutdown`]: cancellation-token based shutdown coordination
//! - [`health`]: health endpoint payload
//! - [`config`]: server configuration derived from settings
//! - [`errors`]: push and HTTP error types

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod push;
pub mod routes;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::{ApiError, PushError};
pub use push::{PushConfig, PushManager, ServeOutcome, ShutdownReport};
pub use server::{AppState, BeaconServer};
pub use shutdown::ShutdownCoordinator;
