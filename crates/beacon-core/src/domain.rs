//! Domain records: sensors, their events, history windows, and the users
//! that own sensors.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SensorId, UserId};

/// Kind of physical sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    /// Contact closure (binary open/closed).
    #[serde(rename = "cc")]
    ContactClosure,
    /// Analog-to-digital converter (numeric reading).
    #[serde(rename = "adc")]
    Adc,
}

impl SensorType {
    /// Wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContactClosure => "cc",
            Self::Adc => "adc",
        }
    }
}

/// A registered sensor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    /// Store-allocated id.
    pub id: SensorId,
    /// Ten-digit serial number, unique across sensors.
    pub serial_number: String,
    /// Sensor kind.
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    /// Payload of the most recently received event.
    pub current_state: i64,
    /// Free-form description.
    pub description: String,
    /// Whether the sensor is in service.
    pub is_active: bool,
    /// When the sensor was registered.
    pub registered_at: DateTime<Utc>,
    /// When the sensor last reported.
    pub last_activity: DateTime<Utc>,
}

/// Registration request for a sensor that has no id yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSensor {
    /// Ten-digit serial number.
    pub serial_number: String,
    /// Sensor kind.
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    /// Free-form description (must not be empty).
    pub description: String,
    /// Whether the sensor is in service.
    pub is_active: bool,
}

/// One reading reported by a sensor.
///
/// This is also the body of the frame pushed to streaming clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// When the reading was received.
    pub timestamp: DateTime<Utc>,
    /// Serial number of the reporting sensor.
    pub sensor_serial_number: String,
    /// Id of the reporting sensor.
    pub sensor_id: SensorId,
    /// Reading value.
    pub payload: i64,
}

/// A registered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Store-allocated id.
    pub id: UserId,
    /// Display name.
    pub name: String,
}

/// Registration request for a user that has no id yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name (must not be empty).
    pub name: String,
}

/// Link between a user and a sensor they own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorOwner {
    /// Owning user.
    pub user_id: UserId,
    /// Owned sensor.
    pub sensor_id: SensorId,
}

/// Closed time window `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, filling in missing bounds.
    ///
    /// `end` defaults to `now`; `start` defaults to one calendar month
    /// before `end`.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let end = end.unwrap_or(now);
        let start = start.unwrap_or_else(|| {
            end.checked_sub_months(Months::new(1))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        Self { start, end }
    }

    /// Whether `ts` falls inside the window (both ends inclusive).
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}
