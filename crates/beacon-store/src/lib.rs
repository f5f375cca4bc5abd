//! # beacon-store
//!
//! In-memory persistence and the telemetry use cases built on top of it.
//!
//! - [`memory`]: lock-guarded sensor, event, user, and ownership repositories
//! - [`service`]: [`TelemetryService`], which validates input, keeps
//!   sensor state in sync with incoming events, tracks which users own
//!   which sensors, and implements the lookup traits consumed by the push
//!   subsystem

#![deny(unsafe_code)]

pub mod memory;
pub mod service;

pub use memory::{MemoryEventStore, MemorySensorOwnerStore, MemorySensorStore, MemoryUserStore};
pub use service::TelemetryService;
