//! # beacon-settings
//!
//! Layered configuration for the Beacon service.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BeaconSettings::default()`]
//! 2. **Settings file**: `~/.beacon/settings.json`, or an explicit path,
//!    deep-merged over the defaults
//! 3. **Environment variables**: `BEACON_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, load_settings, load_settings_from_path, merge_json,
    parse_bounded, settings_path, validate,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_is_under_dot_beacon() {
        let path = settings_path();
        assert!(path.ends_with(".beacon/settings.json"));
    }

    #[test]
    fn default_settings_match_documented_values() {
        let settings = BeaconSettings::default();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.shutdown_timeout_ms, 10_000);
        assert_eq!(settings.push.grace_period_ms, 200);
        assert_eq!(settings.push.shutdown_timeout_ms, 15_000);
        assert_eq!(settings.logging.level, LogLevel::Info);
    }
}
