//! Lock-guarded in-memory repositories.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use beacon_core::{
    Event, EventHistory, EventLookup, NewSensor, NewUser, Sensor, SensorId, SensorLookup,
    SensorOwner, StoreError, TimeRange, User, UserId,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

#[derive(Default)]
struct SensorTable {
    by_id: HashMap<SensorId, Sensor>,
    by_serial: HashMap<String, SensorId>,
    last_id: i64,
}

/// Sensors indexed by id and by serial number.
#[derive(Default)]
pub struct MemorySensorStore {
    inner: RwLock<SensorTable>,
}

impl MemorySensorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new sensor and allocate its id.
    ///
    /// Fails with [`StoreError::DuplicateSerial`] when the serial number is
    /// already taken.
    pub fn insert(&self, new: NewSensor, now: DateTime<Utc>) -> Result<Sensor, StoreError> {
        let mut table = self.inner.write();
        if table.by_serial.contains_key(&new.serial_number) {
            return Err(StoreError::DuplicateSerial(new.serial_number));
        }
        table.last_id += 1;
        let sensor = Sensor {
            id: SensorId::new(table.last_id),
            serial_number: new.serial_number,
            sensor_type: new.sensor_type,
            current_state: 0,
            description: new.description,
            is_active: new.is_active,
            registered_at: now,
            last_activity: now,
        };
        let _ = table
            .by_serial
            .insert(sensor.serial_number.clone(), sensor.id);
        let _ = table.by_id.insert(sensor.id, sensor.clone());
        Ok(sensor)
    }

    /// Replace a stored sensor with an updated copy.
    pub fn update(&self, sensor: Sensor) -> Result<(), StoreError> {
        let mut table = self.inner.write();
        match table.by_id.get_mut(&sensor.id) {
            Some(slot) if slot.serial_number == sensor.serial_number => {
                *slot = sensor;
                Ok(())
            }
            Some(_) => Err(StoreError::DuplicateSerial(sensor.serial_number)),
            None => Err(StoreError::SensorNotFound),
        }
    }

    /// Look a sensor up by id.
    pub fn get(&self, id: SensorId) -> Result<Sensor, StoreError> {
        self.inner
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(StoreError::SensorNotFound)
    }

    /// Look a sensor up by serial number.
    pub fn get_by_serial(&self, serial: &str) -> Result<Sensor, StoreError> {
        let table = self.inner.read();
        table
            .by_serial
            .get(serial)
            .and_then(|id| table.by_id.get(id))
            .cloned()
            .ok_or(StoreError::SensorNotFound)
    }

    /// All sensors, ordered by id.
    pub fn list(&self) -> Vec<Sensor> {
        let mut sensors: Vec<Sensor> = self.inner.read().by_id.values().cloned().collect();
        sensors.sort_by_key(|s| s.id);
        sensors
    }

    /// Number of registered sensors.
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Whether no sensor is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SensorLookup for MemorySensorStore {
    async fn sensor_by_id(&self, id: SensorId) -> Result<Sensor, StoreError> {
        self.get(id)
    }
}

/// Events grouped per sensor, in arrival order.
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<SensorId, Vec<Event>>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn append(&self, event: Event) {
        self.events
            .write()
            .entry(event.sensor_id)
            .or_default()
            .push(event);
    }

    /// Number of events stored for a sensor.
    pub fn count(&self, sensor_id: SensorId) -> usize {
        self.events.read().get(&sensor_id).map_or(0, Vec::len)
    }

    /// Event with the greatest timestamp. Ties go to the earliest arrival.
    pub fn latest(&self, sensor_id: SensorId) -> Option<Event> {
        let events = self.events.read();
        let list = events.get(&sensor_id)?;
        let mut latest: Option<&Event> = None;
        for event in list {
            if latest.is_none_or(|l| event.timestamp > l.timestamp) {
                latest = Some(event);
            }
        }
        latest.cloned()
    }

    /// Events inside `range`, oldest first.
    pub fn range(&self, sensor_id: SensorId, range: TimeRange) -> Vec<Event> {
        let events = self.events.read();
        let mut hits: Vec<Event> = events
            .get(&sensor_id)
            .map(|list| {
                list.iter()
                    .filter(|e| range.contains(e.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by_key(|e| e.timestamp);
        hits
    }
}

#[async_trait]
impl EventLookup for MemoryEventStore {
    async fn last_event(&self, sensor_id: SensorId) -> Result<Event, StoreError> {
        self.latest(sensor_id).ok_or(StoreError::EventNotFound)
    }
}

#[async_trait]
impl EventHistory for MemoryEventStore {
    async fn history(
        &self,
        sensor_id: SensorId,
        range: TimeRange,
    ) -> Result<Vec<Event>, StoreError> {
        Ok(self.range(sensor_id, range))
    }
}

#[derive(Default)]
struct UserTable {
    by_id: HashMap<UserId, User>,
    last_id: i64,
}

/// Users indexed by id.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<UserTable>,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new user and allocate its id.
    pub fn insert(&self, new: NewUser) -> User {
        let mut table = self.inner.write();
        table.last_id += 1;
        let user = User {
            id: UserId::new(table.last_id),
            name: new.name,
        };
        let _ = table.by_id.insert(user.id, user.clone());
        user
    }

    /// Look a user up by id.
    pub fn get(&self, id: UserId) -> Result<User, StoreError> {
        self.inner
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(StoreError::UserNotFound)
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Whether no user is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which sensors each user owns.
///
/// Knows nothing about whether the ids exist; callers check that first.
#[derive(Default)]
pub struct MemorySensorOwnerStore {
    owned: RwLock<HashMap<UserId, BTreeSet<SensorId>>>,
}

impl MemorySensorOwnerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ownership link. Returns `false` if it was already there.
    pub fn attach(&self, owner: SensorOwner) -> bool {
        self.owned
            .write()
            .entry(owner.user_id)
            .or_default()
            .insert(owner.sensor_id)
    }

    /// Sensors owned by `user_id`, ordered by id. Empty for unknown users.
    pub fn sensors_of(&self, user_id: UserId) -> Vec<SensorId> {
        self.owned
            .read()
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
