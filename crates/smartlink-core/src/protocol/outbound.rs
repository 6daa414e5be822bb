//! Outbound device commands.
//!
//! [`DeviceCommand`] builds the exact JSON objects the firmware accepts.
//! Correlation ids are not part of a command: the session attaches
//! `requestId` when the caller awaits a reply.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::{SessionError, ValidationError};
use crate::validate::{validate_ipv4, validate_name};

use super::Payload;
use super::device::{ConfigMode, ShuntConfig, VoltmeterConfig};

/// Module-wide settings sent with `updateSettings`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    /// Module display name.
    pub module_name: String,
    /// Website label / mDNS name.
    pub webname: String,
    /// Publish to SmartBoat.
    pub smartboat: bool,
    /// Publish to a custom MQTT broker.
    pub custom_mqtt: bool,
    /// Broker IPv4 address, required with `custom_mqtt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_mqtt_server: Option<String>,
    /// Broker port, required with `custom_mqtt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_mqtt_port: Option<u16>,
}

impl SettingsUpdate {
    /// Check names, the MQTT mode exclusion, and broker address.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("module name", &self.module_name)?;
        validate_name("website name", &self.webname)?;

        if self.smartboat && self.custom_mqtt {
            return Err(ValidationError::ConflictingMqttModes);
        }
        if self.custom_mqtt {
            validate_ipv4(self.custom_mqtt_server.as_deref().unwrap_or_default())?;
            if self.custom_mqtt_port.is_none_or(|port| port == 0) {
                return Err(ValidationError::InvalidPort(
                    self.custom_mqtt_port
                        .map(|p| p.to_string())
                        .unwrap_or_default(),
                ));
            }
        }
        Ok(())
    }
}

/// A command the panel can send to the device.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    /// Ask for a fresh `configData` push.
    GetData,
    /// Ask for the module settings.
    RequestSettings,
    /// Ask whether newer firmware exists.
    CheckForUpgrades,
    /// Start the firmware upgrade.
    StartUpgrade,
    /// Change module-wide settings.
    UpdateSettings(SettingsUpdate),
    /// Restart the module.
    Reset,
    /// Reset a shunt's state of charge to 100 %.
    ResetSoc {
        /// 1-based shunt id.
        shunt_id: u32,
    },
    /// Switch the channel layout.
    UpdateConfigMode(ConfigMode),
    /// Store one shunt channel.
    UpdateShuntConfiguration {
        /// Channel settings.
        shunt: ShuntConfig,
        /// Layout the channel belongs to.
        config_mode: ConfigMode,
    },
    /// Store one voltmeter channel.
    UpdateVoltmeterConfiguration {
        /// Channel settings.
        voltmeter: VoltmeterConfig,
        /// Layout the channel belongs to.
        config_mode: ConfigMode,
    },
}

impl DeviceCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetData => "getData",
            Self::RequestSettings => "requestSettings",
            Self::CheckForUpgrades => "checkForUpgrades",
            Self::StartUpgrade => "startUpgrade",
            Self::UpdateSettings(_) => "updateSettings",
            Self::Reset => "reset",
            Self::ResetSoc { .. } => "resetSOC",
            Self::UpdateConfigMode(_) => "updateConfigMode",
            Self::UpdateShuntConfiguration { .. } => "updateShuntConfiguration",
            Self::UpdateVoltmeterConfiguration { .. } => "updateVoltmeterConfiguration",
        }
    }

    /// Whether the firmware answers this command with a correlated reply.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Self::RequestSettings
                | Self::CheckForUpgrades
                | Self::ResetSoc { .. }
                | Self::UpdateConfigMode(_)
                | Self::UpdateShuntConfiguration { .. }
                | Self::UpdateVoltmeterConfiguration { .. }
        )
    }

    /// Validate the command's input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::UpdateSettings(settings) => settings.validate(),
            Self::UpdateShuntConfiguration { shunt, .. } => shunt.validate(),
            Self::UpdateVoltmeterConfiguration { voltmeter, .. } => voltmeter.validate(),
            _ => Ok(()),
        }
    }

    /// Build the wire object.
    pub fn to_payload(&self) -> Result<Payload, SessionError> {
        let value = match self {
            Self::GetData => json!({"data": "getData"}),
            Self::RequestSettings
            | Self::CheckForUpgrades
            | Self::StartUpgrade => json!({"type": self.name()}),
            Self::UpdateSettings(settings) => {
                let mut value = to_value(settings)?;
                if let Value::Object(map) = &mut value {
                    let _ = map.insert("type".into(), self.name().into());
                }
                value
            }
            Self::Reset => json!({"action": "reset"}),
            Self::ResetSoc { shunt_id } => json!({"command": self.name(), "shuntId": shunt_id}),
            Self::UpdateConfigMode(mode) => {
                json!({"command": self.name(), "configMode": mode.as_str()})
            }
            Self::UpdateShuntConfiguration { shunt, config_mode } => json!({
                "command": self.name(),
                "shuntData": to_value(shunt)?,
                "configMode": config_mode.as_str(),
            }),
            Self::UpdateVoltmeterConfiguration {
                voltmeter,
                config_mode,
            } => json!({
                "command": self.name(),
                "voltmeterData": to_value(voltmeter)?,
                "configMode": config_mode.as_str(),
            }),
        };

        match value {
            Value::Object(map) => Ok(map),
            other => Err(SessionError::InvalidPayload(other.to_string())),
        }
    }
}

fn to_value<T: Serialize>(body: &T) -> Result<Value, SessionError> {
    serde_json::to_value(body).map_err(|e| SessionError::InvalidPayload(e.to_string()))
}
