//! Telemetry use cases.

use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::validation::{validate_new_sensor, validate_new_user, validate_serial_number};
use beacon_core::{
    Event, EventLookup, HistoryCapability, NewSensor, NewUser, Sensor, SensorId, SensorLookup,
    SensorOwner, StoreError, TimeRange, User, UserId, ValidationError,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::memory::{MemoryEventStore, MemorySensorOwnerStore, MemorySensorStore, MemoryUserStore};

/// Sensor registration, event ingestion, sensor ownership, and read queries.
///
/// Also serves as the [`SensorLookup`] / [`EventLookup`] collaborator for
/// the push subsystem.
pub struct TelemetryService {
    sensors: Arc<MemorySensorStore>,
    events: Arc<MemoryEventStore>,
    users: MemoryUserStore,
    owners: MemorySensorOwnerStore,
    history: HistoryCapability,
}

impl TelemetryService {
    /// Build the service with an explicit history capability. User and
    /// ownership records start empty.
    pub fn new(
        sensors: Arc<MemorySensorStore>,
        events: Arc<MemoryEventStore>,
        history: HistoryCapability,
    ) -> Self {
        Self {
            sensors,
            events,
            users: MemoryUserStore::new(),
            owners: MemorySensorOwnerStore::new(),
            history,
        }
    }

    /// Build a service over fresh in-memory stores, with history served by
    /// the event store.
    pub fn in_memory() -> Self {
        let events = Arc::new(MemoryEventStore::new());
        let history = HistoryCapability::Supported(events.clone());
        Self::new(Arc::new(MemorySensorStore::new()), events, history)
    }

    /// Register a sensor. Registering an already-known serial number returns
    /// the existing sensor unchanged.
    pub fn register_sensor(&self, new: NewSensor) -> Result<Sensor, StoreError> {
        validate_new_sensor(&new)?;
        if let Ok(existing) = self.sensors.get_by_serial(&new.serial_number) {
            debug!(sensor_id = %existing.id, "sensor already registered");
            return Ok(existing);
        }
        let sensor = self.sensors.insert(new, Utc::now())?;
        info!(sensor_id = %sensor.id, serial = %sensor.serial_number, "sensor registered");
        Ok(sensor)
    }

    /// Record a reading for the sensor with the given serial number.
    ///
    /// Updates the sensor's `current_state` and `last_activity`.
    pub fn receive_event(
        &self,
        serial_number: &str,
        payload: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        if timestamp == DateTime::<Utc>::UNIX_EPOCH {
            return Err(ValidationError::EventTimestamp.into());
        }
        validate_serial_number(serial_number)?;
        let mut sensor = self.sensors.get_by_serial(serial_number)?;
        let event = Event {
            timestamp,
            sensor_serial_number: serial_number.to_owned(),
            sensor_id: sensor.id,
            payload,
        };
        self.events.append(event.clone());
        sensor.current_state = payload;
        sensor.last_activity = Utc::now();
        self.sensors.update(sensor)?;
        debug!(sensor_id = %event.sensor_id, payload, "event received");
        Ok(event)
    }

    /// Look a sensor up by id.
    pub fn sensor(&self, id: SensorId) -> Result<Sensor, StoreError> {
        self.sensors.get(id)
    }

    /// All registered sensors.
    pub fn sensors(&self) -> Vec<Sensor> {
        self.sensors.list()
    }

    /// Number of registered sensors.
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Events for an existing sensor inside the given bounds.
    ///
    /// Missing bounds default per [`TimeRange::resolve`].
    pub async fn sensor_history(
        &self,
        id: SensorId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, StoreError> {
        let _ = self.sensors.get(id)?;
        let range = TimeRange::resolve(start, end, Utc::now());
        self.history.query(id, range).await
    }

    /// Register a user.
    pub fn register_user(&self, new: NewUser) -> Result<User, StoreError> {
        validate_new_user(&new)?;
        let user = self.users.insert(new);
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Make `user_id` an owner of `sensor_id`. Attaching twice is a no-op.
    ///
    /// The user is checked before the sensor, so a request naming neither
    /// reports [`StoreError::UserNotFound`].
    pub fn attach_sensor_to_user(
        &self,
        user_id: UserId,
        sensor_id: SensorId,
    ) -> Result<(), StoreError> {
        let _ = self.users.get(user_id)?;
        let _ = self.sensors.get(sensor_id)?;
        if self.owners.attach(SensorOwner { user_id, sensor_id }) {
            info!(user_id = %user_id, sensor_id = %sensor_id, "sensor attached to user");
        } else {
            debug!(user_id = %user_id, sensor_id = %sensor_id, "sensor already attached");
        }
        Ok(())
    }

    /// Sensors owned by an existing user, ordered by id.
    pub fn user_sensors(&self, user_id: UserId) -> Result<Vec<Sensor>, StoreError> {
        let _ = self.users.get(user_id)?;
        self.owners
            .sensors_of(user_id)
            .into_iter()
            .map(|id| self.sensors.get(id))
            .collect()
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// The history capability this service was built with.
    pub fn history_capability(&self) -> &HistoryCapability {
        &self.history
    }
}

#[async_trait]
impl SensorLookup for TelemetryService {
    async fn sensor_by_id(&self, id: SensorId) -> Result<Sensor, StoreError> {
        self.sensors.get(id)
    }
}

#[async_trait]
impl EventLookup for TelemetryService {
    async fn last_event(&self, sensor_id: SensorId) -> Result<Event, StoreError> {
        self.events.last_event(sensor_id).await
    }
}
