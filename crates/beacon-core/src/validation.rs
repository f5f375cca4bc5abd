//! Field checks applied before records are stored.

use crate::domain::{NewSensor, NewUser};
use crate::errors::ValidationError;

/// Length of every sensor serial number.
pub const SERIAL_NUMBER_LEN: usize = 10;

/// A serial number is exactly ten ASCII digits.
pub fn validate_serial_number(serial: &str) -> Result<(), ValidationError> {
    if serial.len() == SERIAL_NUMBER_LEN && serial.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::SerialNumber)
    }
}

/// Check a registration request.
pub fn validate_new_sensor(sensor: &NewSensor) -> Result<(), ValidationError> {
    validate_serial_number(&sensor.serial_number)?;
    if sensor.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    Ok(())
}

/// Check a user registration request.
pub fn validate_new_user(user: &NewUser) -> Result<(), ValidationError> {
    if user.name.trim().is_empty() {
        return Err(ValidationError::EmptyUserName);
    }
    Ok(())
}
