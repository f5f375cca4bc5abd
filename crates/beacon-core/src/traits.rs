//! Collaborator interfaces.
//!
//! The push subsystem needs exactly two capabilities from the rest of the
//! service: resolving a sensor by id ([`SensorLookup`]) and fetching the most
//! recent event for a sensor ([`EventLookup`]). History queries are a
//! separate capability ([`EventHistory`]) that a backend either provides or
//! does not; that choice is made once, at construction time, through
//! [`HistoryCapability`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Event, Sensor, TimeRange};
use crate::errors::StoreError;
use crate::ids::SensorId;

/// Resolve a sensor by id.
#[async_trait]
pub trait SensorLookup: Send + Sync {
    /// Fetch the sensor, or [`StoreError::SensorNotFound`].
    async fn sensor_by_id(&self, id: SensorId) -> Result<Sensor, StoreError>;
}

/// Fetch the latest event for a sensor.
#[async_trait]
pub trait EventLookup: Send + Sync {
    /// The event with the greatest timestamp, or [`StoreError::EventNotFound`]
    /// when the sensor has never reported.
    async fn last_event(&self, sensor_id: SensorId) -> Result<Event, StoreError>;
}

/// Range queries over a sensor's events.
#[async_trait]
pub trait EventHistory: Send + Sync {
    /// Events whose timestamp lies in `range`, oldest first.
    async fn history(&self, sensor_id: SensorId, range: TimeRange)
    -> Result<Vec<Event>, StoreError>;
}

/// Whether the configured event backend answers history queries.
#[derive(Clone)]
pub enum HistoryCapability {
    /// The backend supports range queries.
    Supported(Arc<dyn EventHistory>),
    /// The backend keeps only what [`EventLookup`] needs.
    Unsupported,
}

impl HistoryCapability {
    /// Run a history query. An unsupported backend yields no events.
    pub async fn query(
        &self,
        sensor_id: SensorId,
        range: TimeRange,
    ) -> Result<Vec<Event>, StoreError> {
        match self {
            Self::Supported(history) => history.history(sensor_id, range).await,
            Self::Unsupported => Ok(Vec::new()),
        }
    }

    /// Whether range queries are available.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported(_))
    }
}

impl std::fmt::Debug for HistoryCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supported(_) => f.write_str("HistoryCapability::Supported"),
            Self::Unsupported => f.write_str("HistoryCapability::Unsupported"),
        }
    }
}
