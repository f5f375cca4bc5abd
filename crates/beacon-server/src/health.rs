//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Coarse server state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving and accepting push streams.
    Ok,
    /// Shutdown has begun; new push streams are refused.
    Draining,
}

/// Health check response body.
#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    /// Server state.
    pub status: HealthStatus,
    /// Whole seconds since the server started.
    pub uptime_secs: u64,
    /// Open push streams.
    pub connections: usize,
    /// Registered sensors.
    pub sensors: usize,
}

impl HealthResponse {
    /// Snapshot the server's counters.
    pub fn snapshot(started: Instant, accepting: bool, connections: usize, sensors: usize) -> Self {
        Self {
            status: if accepting {
                HealthStatus::Ok
            } else {
                HealthStatus::Draining
            },
            uptime_secs: started.elapsed().as_secs(),
            connections,
            sensors,
        }
    }
}
