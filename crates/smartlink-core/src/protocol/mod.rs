//! Wire protocol spoken with the device.
//!
//! Every frame is a JSON object. Inbound frames are discriminated by their
//! `type` field; outbound commands use whichever key the firmware expects
//! (`type`, `command`, `action`, or `data`). A `requestId` field is present on
//! an outbound frame iff the sender expects a correlated reply, and the device
//! echoes it back on that reply.

pub mod device;
pub mod inbound;
pub mod outbound;

pub use device::{
    ConfigMode, ShuntAlerts, ShuntConfig, SystemVoltage, VoltmeterAlerts, VoltmeterConfig,
};
pub use inbound::{ConfigSnapshot, EventKind, OtaProgress, UpgradeProgress, UpgradeStatus};
pub use outbound::{DeviceCommand, SettingsUpdate};

/// JSON object payload.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Correlation field name.
pub const REQUEST_ID_FIELD: &str = "requestId";
/// Discriminator field name.
pub const TYPE_FIELD: &str = "type";

/// Liveness check type.
pub const TYPE_PING: &str = "ping";
/// Liveness reply type.
pub const TYPE_PONG: &str = "pong";
/// Generic acknowledgment type.
pub const TYPE_ACK: &str = "ack";
/// Command result type (`{"type":"response","success":..,"message":..}`).
pub const TYPE_RESPONSE: &str = "response";
/// Full configuration snapshot event.
pub const TYPE_CONFIG_DATA: &str = "configData";
/// Upgrade started / upgrade status event.
pub const TYPE_UPGRADE_PROGRESS: &str = "upgradeProgress";
/// In-place firmware flashing progress event.
pub const TYPE_OTA_PROGRESS: &str = "otaProgress";

/// The `type` discriminator of an inbound object, if any.
pub fn message_type(payload: &Payload) -> Option<&str> {
    payload.get(TYPE_FIELD).and_then(serde_json::Value::as_str)
}

/// The `requestId` of an inbound object, if any.
///
/// Empty strings are treated as absent.
pub fn request_id(payload: &Payload) -> Option<&str> {
    payload
        .get(REQUEST_ID_FIELD)
        .and_then(serde_json::Value::as_str)
        .filter(|id| !id.is_empty())
}

/// The liveness ping frame.
pub fn ping() -> Payload {
    let mut payload = Payload::new();
    let _ = payload.insert(TYPE_FIELD.into(), TYPE_PING.into());
    payload
}
