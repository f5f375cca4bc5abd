//! Settings type definitions.
//!
//! Field names are camelCase on the wire. Every section is
//! `#[serde(default)]`, so partial JSON fills the gaps from [`Default`].

mod sections;

pub use sections::*;

use serde::{Deserialize, Serialize};

/// Root settings for the Beacon service.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "push": { "gracePeriodMs": 250 },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconSettings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Live push streams.
    pub push: PushSettings,
    /// Log output.
    pub logging: LoggingSettings,
}
