//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Every struct is `#[serde(default)]`
//! so a partial JSON file only overrides what it names.

mod session;

pub use session::*;

use serde::{Deserialize, Serialize};

/// Address of the module's access point.
pub const DEFAULT_DEVICE_URL: &str = "ws://192.168.4.1/ws";

/// Root settings type.
///
/// ```json
/// {
///   "device": { "url": "ws://10.0.0.42/ws" },
///   "session": { "requestTimeoutMs": 8000 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartlinkSettings {
    /// Device endpoint.
    pub device: DeviceSettings,
    /// Session timing and failure policy.
    pub session: SessionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Device endpoint settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSettings {
    /// WebSocket URL of the module.
    pub url: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DEVICE_URL.to_string(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: smartlink_core::logging::DEFAULT_LEVEL.to_string(),
        }
    }
}
