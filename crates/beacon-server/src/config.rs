//! Server configuration.

use std::time::Duration;

use beacon_settings::BeaconSettings;

use crate::push::PushConfig;

/// Configuration for [`BeaconServer`](crate::server::BeaconServer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Push stream timing.
    pub push: PushConfig,
    /// How long to wait for the HTTP server to drain at shutdown.
    pub http_shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            push: PushConfig::default(),
            http_shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &BeaconSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            push: PushConfig {
                grace_period: settings.push.grace_period(),
                shutdown_timeout: settings.push.shutdown_timeout(),
            },
            http_shutdown_timeout: settings.server.shutdown_timeout(),
        }
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_push_timing() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.push.grace_period, Duration::from_millis(200));
        assert_eq!(cfg.push.shutdown_timeout, Duration::from_secs(15));
    }

    #[test]
    fn from_settings_copies_every_field() {
        let mut settings = BeaconSettings::default();
        settings.server.host = "0.0.0.0".into();
        settings.server.port = 9100;
        settings.server.shutdown_timeout_ms = 2_000;
        settings.push.grace_period_ms = 50;
        settings.push.shutdown_timeout_ms = 3_000;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9100");
        assert_eq!(cfg.http_shutdown_timeout, Duration::from_secs(2));
        assert_eq!(cfg.push.grace_period, Duration::from_millis(50));
        assert_eq!(cfg.push.shutdown_timeout, Duration::from_secs(3));
    }
}
