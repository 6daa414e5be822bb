//! Typed bodies of inbound device messages.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::SessionError;

use super::{TYPE_CONFIG_DATA, TYPE_FIELD, TYPE_OTA_PROGRESS, TYPE_UPGRADE_PROGRESS};

/// Unsolicited event tags the session dispatches to handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Full configuration snapshot.
    ConfigData,
    /// Upgrade status update.
    UpgradeProgress,
    /// Firmware flashing progress.
    OtaProgress,
}

impl EventKind {
    /// Map a `type` value to an event kind.
    pub fn from_type(message_type: &str) -> Option<Self> {
        match message_type {
            TYPE_CONFIG_DATA => Some(Self::ConfigData),
            TYPE_UPGRADE_PROGRESS => Some(Self::UpgradeProgress),
            TYPE_OTA_PROGRESS => Some(Self::OtaProgress),
            _ => None,
        }
    }

    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigData => TYPE_CONFIG_DATA,
            Self::UpgradeProgress => TYPE_UPGRADE_PROGRESS,
            Self::OtaProgress => TYPE_OTA_PROGRESS,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deserialize an inbound JSON value into a typed body.
///
/// Failures are reported as [`SessionError::MalformedPayload`].
pub fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, SessionError> {
    T::deserialize(value).map_err(|e| SessionError::malformed(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// configData
// ─────────────────────────────────────────────────────────────────────────────

const DEFAULT_MODULE_NAME: &str = "Smart Module";
const DEFAULT_WEB_NAME: &str = "Web UI";
const UNKNOWN_FIRMWARE: &str = "Unknown";

/// Device configuration snapshot pushed as `configData`.
///
/// Missing, null, or empty text fields fall back to display defaults.
/// Module-specific fields (voltmeters, shunts, ...) are kept in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawConfigSnapshot")]
pub struct ConfigSnapshot {
    /// Module display name.
    pub mod_name: String,
    /// Website label / mDNS name.
    pub webname: String,
    /// SmartBoat integration enabled.
    pub smartboat: bool,
    /// Custom MQTT broker enabled.
    pub custom_mqtt: bool,
    /// Running firmware version.
    pub firmware_version: String,
    /// Whether the device reports a newer firmware.
    pub is_upgrade_available: bool,
    /// Every other field the device sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfigSnapshot {
    mod_name: Option<String>,
    webname: Option<String>,
    smartboat: Option<bool>,
    custom_mqtt: Option<bool>,
    firmware_version: Option<String>,
    is_upgrade_available: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_owned())
}

impl From<RawConfigSnapshot> for ConfigSnapshot {
    fn from(raw: RawConfigSnapshot) -> Self {
        let mut extra = raw.extra;
        let _ = extra.remove(TYPE_FIELD);
        Self {
            mod_name: non_empty_or(raw.mod_name, DEFAULT_MODULE_NAME),
            webname: non_empty_or(raw.webname, DEFAULT_WEB_NAME),
            smartboat: raw.smartboat.unwrap_or(false),
            custom_mqtt: raw.custom_mqtt.unwrap_or(false),
            firmware_version: non_empty_or(raw.firmware_version, UNKNOWN_FIRMWARE),
            is_upgrade_available: raw.is_upgrade_available.unwrap_or(false),
            extra,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// upgradeProgress / otaProgress
// ─────────────────────────────────────────────────────────────────────────────

/// Body of an `upgradeProgress` event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpgradeProgress {
    /// Free-form status text, if the firmware sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Percentage, if the firmware sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of an `otaProgress` event.
///
/// `progress` is 0–100, or `-1` when flashing failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaProgress {
    /// Percentage or failure sentinel.
    pub progress: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// checkForUpgrades reply
// ─────────────────────────────────────────────────────────────────────────────

/// Reply to a `checkForUpgrades` request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeStatus {
    /// Running firmware version.
    #[serde(default)]
    pub current_version: String,
    /// Whether a newer version exists.
    #[serde(default)]
    pub available: bool,
    /// Newest version, when one is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn event_kind_roundtrip_names() {
        for kind in [
            EventKind::ConfigData,
            EventKind::UpgradeProgress,
            EventKind::OtaProgress,
        ] {
            assert_eq!(EventKind::from_type(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_type("ack"), None);
        assert_eq!(EventKind::from_type("configdata"), None);
    }

    #[test]
    fn config_snapshot_full() {
        let value = json!({
            "type": "configData",
            "modName": "Galley Shunts",
            "webname": "galley",
            "smartboat": true,
            "customMqtt": false,
            "firmwareVersion": "1.2.3",
            "isUpgradeAvailable": true,
            "voltmeters": [{"id": 1}]
        });
        let snapshot: ConfigSnapshot = decode(&value).unwrap();
        assert_eq!(snapshot.mod_name, "Galley Shunts");
        assert_eq!(snapshot.webname, "galley");
        assert!(snapshot.smartboat);
        assert!(!snapshot.custom_mqtt);
        assert_eq!(snapshot.firmware_version, "1.2.3");
        assert!(snapshot.is_upgrade_available);
        assert_eq!(snapshot.extra["voltmeters"][0]["id"], 1);
        assert!(!snapshot.extra.contains_key("type"));
    }

    #[test]
    fn config_snapshot_defaults() {
        let value = json!({"type": "configData", "modName": "", "firmwareVersion": null});
        let snapshot: ConfigSnapshot = decode(&value).unwrap();
        assert_eq!(snapshot.mod_name, "Smart Module");
        assert_eq!(snapshot.webname, "Web UI");
        assert_eq!(snapshot.firmware_version, "Unknown");
        assert!(!snapshot.smartboat);
        assert!(!snapshot.is_upgrade_available);
    }

    #[test]
    fn config_snapshot_wrong_field_type_is_malformed() {
        let value = json!({"type": "configData", "smartboat": "yes"});
        assert_matches!(
            decode::<ConfigSnapshot>(&value),
            Err(SessionError::MalformedPayload { .. })
        );
    }

    #[test]
    fn ota_progress_requires_integer() {
        let ok: OtaProgress = decode(&json!({"type": "otaProgress", "progress": -1})).unwrap();
        assert_eq!(ok.progress, -1);
        assert_matches!(
            decode::<OtaProgress>(&json!({"type": "otaProgress"})),
            Err(SessionError::MalformedPayload { .. })
        );
        assert_matches!(
            decode::<OtaProgress>(&json!({"type": "otaProgress", "progress": "50"})),
            Err(SessionError::MalformedPayload { .. })
        );
    }

    #[test]
    fn upgrade_progress_is_permissive() {
        let body: UpgradeProgress =
            decode(&json!({"type": "upgradeProgress", "stage": "download"})).unwrap();
        assert!(body.status.is_none());
        assert_eq!(body.extra["stage"], "download");
    }

    #[test]
    fn upgrade_status_reply() {
        let status: UpgradeStatus = decode(&json!({
            "requestId": "req-4-1",
            "currentVersion": "1.0.1",
            "available": true,
            "latestVersion": "1.1.0"
        }))
        .unwrap();
        assert!(status.available);
        assert_eq!(status.current_version, "1.0.1");
        assert_eq!(status.latest_version.as_deref(), Some("1.1.0"));
    }
}
