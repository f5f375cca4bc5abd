//! Error types shared by stores and use cases.

use thiserror::Error;

/// Failure reported by a sensor or event store.
///
/// Callers branch on [`StoreError::is_not_found`] to tell a missing record
/// from an infrastructure failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested sensor does not exist.
    #[error("sensor not found")]
    SensorNotFound,
    /// The requested user does not exist.
    #[error("user not found")]
    UserNotFound,
    /// The sensor exists but has no recorded event.
    #[error("event not found")]
    EventNotFound,
    /// A sensor with the same serial number is already registered.
    #[error("sensor with serial number {0} already exists")]
    DuplicateSerial(String),
    /// Input failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// Backend failure (I/O, connection loss, ...).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the error means "no such record".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SensorNotFound | Self::UserNotFound | Self::EventNotFound
        )
    }
}

/// Input rejected before it reaches a store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Serial number is not exactly ten ASCII digits.
    #[error("invalid sensor serial number")]
    SerialNumber,
    /// Description is empty.
    #[error("description is required")]
    EmptyDescription,
    /// User name is empty.
    #[error("user name cannot be empty")]
    EmptyUserName,
    /// Event has no timestamp.
    #[error("invalid event timestamp")]
    EventTimestamp,
}
