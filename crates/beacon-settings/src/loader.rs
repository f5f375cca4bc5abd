//! Layered settings loading.
//!
//! Layers, lowest priority first:
//! 1. compiled [`BeaconSettings::default()`]
//! 2. the JSON settings file, merged over the defaults with [`merge_json`]
//! 3. `BEACON_*` environment variables
//!
//! The result is checked with [`validate`] before it is returned.

use std::io::ErrorKind;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use beacon_logging::LogFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{BeaconSettings, LogLevel};

const PORT_RANGE: RangeInclusive<u16> = 0..=u16::MAX;
const GRACE_RANGE_MS: RangeInclusive<u64> = 0..=60_000;
const TIMEOUT_RANGE_MS: RangeInclusive<u64> = 1..=600_000;

/// Default settings file location (`~/.beacon/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beacon").join("settings.json")
}

/// Load settings from [`settings_path`].
pub fn load_settings() -> Result<BeaconSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, then apply environment overrides.
///
/// A missing file yields defaults. Unreadable or malformed files are errors.
pub fn load_settings_from_path(path: &Path) -> Result<BeaconSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<BeaconSettings> {
    let mut layered = serde_json::to_value(BeaconSettings::default())?;
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "merging settings file");
            merge_json(&mut layered, serde_json::from_str(&content)?);
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(serde_json::from_value(layered)?)
}

/// Merge `overlay` into `base` in place.
///
/// Objects merge key by key. Any other overlay value replaces the base value,
/// except `null`, which leaves the base untouched.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None if !value.is_null() => {
                        let _ = base.insert(key, value);
                    }
                    None => {}
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Reject values the server cannot run with.
pub fn validate(settings: &BeaconSettings) -> Result<()> {
    let invalid = |msg: &str| -> Result<()> { Err(SettingsError::InvalidValue(msg.to_owned())) };
    if settings.server.host.trim().is_empty() {
        return invalid("server.host is empty");
    }
    if settings.server.shutdown_timeout_ms == 0 {
        return invalid("server.shutdownTimeoutMs must be greater than zero");
    }
    if settings.push.shutdown_timeout_ms == 0 {
        return invalid("push.shutdownTimeoutMs must be greater than zero");
    }
    Ok(())
}

/// Apply `BEACON_*` overrides from the process environment.
///
/// Malformed or out-of-range values are logged and skipped.
pub fn apply_env_overrides(settings: &mut BeaconSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply `BEACON_*` overrides from `lookup`.
pub fn apply_overrides<F>(settings: &mut BeaconSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(host) = env.non_empty("BEACON_HOST") {
        settings.server.host = host;
    }
    env.bounded("BEACON_PORT", PORT_RANGE, &mut settings.server.port);
    env.bounded(
        "BEACON_HTTP_SHUTDOWN_TIMEOUT_MS",
        TIMEOUT_RANGE_MS,
        &mut settings.server.shutdown_timeout_ms,
    );
    env.bounded("BEACON_PUSH_GRACE_MS", GRACE_RANGE_MS, &mut settings.push.grace_period_ms);
    env.bounded(
        "BEACON_PUSH_SHUTDOWN_TIMEOUT_MS",
        TIMEOUT_RANGE_MS,
        &mut settings.push.shutdown_timeout_ms,
    );
    if let Some(level) = env.with("BEACON_LOG_LEVEL", LogLevel::parse) {
        settings.logging.level = level;
    }
    if let Some(format) = env.with("BEACON_LOG_FORMAT", LogFormat::parse) {
        settings.logging.format = format;
    }
}

/// Parse `raw` as a `T` inside `range`.
pub fn parse_bounded<T>(raw: &str, range: &RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    raw.trim().parse().ok().filter(|n| range.contains(n))
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn non_empty(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bounded<T>(&self, name: &str, range: RangeInclusive<T>, slot: &mut T)
    where
        T: FromStr + PartialOrd,
    {
        if let Some(v) = self.with(name, |raw| parse_bounded(raw, &range)) {
            *slot = v;
        }
    }

    fn with<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = (self.lookup)(name)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            warn!(key = name, value = %raw, "invalid env var, ignoring");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── merge_json ──────────────────────────────────────────────────

    fn merged(mut base: Value, overlay: Value) -> Value {
        merge_json(&mut base, overlay);
        base
    }

    #[test]
    fn merge_overrides_nested_keys() {
        let out = merged(
            serde_json::json!({"server": {"port": 8080, "host": "127.0.0.1"}}),
            serde_json::json!({"server": {"port": 9090}}),
        );
        assert_eq!(out["server"]["port"], 9090);
        assert_eq!(out["server"]["host"], "127.0.0.1");
    }

    #[test]
    fn merge_skips_nulls() {
        let out = merged(
            serde_json::json!({"push": {"gracePeriodMs": 200}}),
            serde_json::json!({"push": {"gracePeriodMs": null}, "extra": null}),
        );
        assert_eq!(out["push"]["gracePeriodMs"], 200);
        assert!(out.get("extra").is_none());
    }

    #[test]
    fn merge_replaces_non_objects() {
        let out = merged(
            serde_json::json!({"tags": [1, 2], "push": {"gracePeriodMs": 200}}),
            serde_json::json!({"tags": [3], "push": 5}),
        );
        assert_eq!(out["tags"], serde_json::json!([3]));
        assert_eq!(out["push"], 5);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = read_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, BeaconSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "push": {"gracePeriodMs": 500}}"#,
        )
        .unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.push.grace_period_ms, 500);
        assert_eq!(settings.push.shutdown_timeout_ms, 15_000);
    }

    #[test]
    fn load_null_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"logging": {"level": null, "format": "json"}}"#).unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_zero_push_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"push": {"shutdownTimeoutMs": 0}}"#).unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert!(matches!(
            validate(&settings),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&BeaconSettings::default()).is_ok());
    }

    #[test]
    fn validate_rejects_blank_host() {
        let mut settings = BeaconSettings::default();
        settings.server.host = "  ".into();
        assert!(validate(&settings).is_err());
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply_every_key() {
        let mut settings = BeaconSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("BEACON_HOST", "0.0.0.0"),
                ("BEACON_PORT", "9000"),
                ("BEACON_HTTP_SHUTDOWN_TIMEOUT_MS", "2500"),
                ("BEACON_PUSH_GRACE_MS", "50"),
                ("BEACON_PUSH_SHUTDOWN_TIMEOUT_MS", "3000"),
                ("BEACON_LOG_LEVEL", "debug"),
                ("BEACON_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.server.bind_addr(), "0.0.0.0:9000");
        assert_eq!(settings.server.shutdown_timeout_ms, 2500);
        assert_eq!(settings.push.grace_period_ms, 50);
        assert_eq!(settings.push.shutdown_timeout_ms, 3000);
        assert_eq!(settings.logging.level, LogLevel::Debug);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = BeaconSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("BEACON_HOST", ""),
                ("BEACON_PORT", "99999"),
                ("BEACON_PUSH_SHUTDOWN_TIMEOUT_MS", "0"),
                ("BEACON_LOG_LEVEL", "chatty"),
                ("BEACON_LOG_FORMAT", "xml"),
            ]),
        );
        assert_eq!(settings, BeaconSettings::default());
    }

    #[test]
    fn zero_grace_period_is_allowed() {
        let mut settings = BeaconSettings::default();
        apply_overrides(&mut settings, vars(&[("BEACON_PUSH_GRACE_MS", "0")]));
        assert_eq!(settings.push.grace_period_ms, 0);
    }

    // ── parse_bounded ───────────────────────────────────────────────

    #[test]
    fn parse_bounded_checks_both_ends() {
        assert_eq!(parse_bounded("1", &TIMEOUT_RANGE_MS), Some(1));
        assert_eq!(parse_bounded("600000", &TIMEOUT_RANGE_MS), Some(600_000));
        assert_eq!(parse_bounded("0", &TIMEOUT_RANGE_MS), None);
        assert_eq!(parse_bounded("600001", &TIMEOUT_RANGE_MS), None);
        assert_eq!(parse_bounded(" 8080 ", &PORT_RANGE), Some(8080));
        assert_eq!(parse_bounded("-1", &PORT_RANGE), None);
        assert_eq!(parse_bounded("port", &PORT_RANGE), None);
    }
}
