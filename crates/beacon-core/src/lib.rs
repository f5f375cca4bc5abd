//! # beacon-core
//!
//! Foundation types for the Beacon telemetry service.
//!
//! - [`ids`]: sensor, user, and connection identifiers
//! - [`domain`]: sensors, events, time ranges, users, and sensor ownership
//! - [`errors`]: store and validation error taxonomy
//! - [`traits`]: the narrow collaborator interfaces consumed by the push
//!   subsystem and the HTTP layer
//! - [`validation`]: field-level checks applied before anything is stored

#![deny(unsafe_code)]

pub mod domain;
pub mod errors;
pub mod ids;
pub mod traits;
pub mod validation;

pub use domain::{Event, NewSensor, NewUser, Sensor, SensorOwner, SensorType, TimeRange, User};
pub use errors::{StoreError, ValidationError};
pub use ids::{ConnectionId, SensorId, UserId};
pub use traits::{EventHistory, EventLookup, HistoryCapability, SensorLookup};
