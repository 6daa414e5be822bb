//! Voltmeter and shunt channel configuration.
//!
//! A module carries four measurement channels split between voltmeters and
//! current shunts according to its [`ConfigMode`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;
use crate::validate::validate_name;

// ─────────────────────────────────────────────────────────────────────────────
// ConfigMode
// ─────────────────────────────────────────────────────────────────────────────

/// Channel layout of the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigMode {
    /// Four voltmeters.
    #[serde(rename = "4V")]
    FourVoltmeters,
    /// Two voltmeters followed by one shunt.
    #[serde(rename = "2V1S")]
    TwoVoltmetersOneShunt,
    /// One shunt followed by two voltmeters.
    #[serde(rename = "1S2V")]
    OneShuntTwoVoltmeters,
    /// Two shunts.
    #[serde(rename = "2S")]
    TwoShunts,
}

impl ConfigMode {
    /// Every mode in display order.
    pub const ALL: [Self; 4] = [
        Self::FourVoltmeters,
        Self::TwoVoltmetersOneShunt,
        Self::OneShuntTwoVoltmeters,
        Self::TwoShunts,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FourVoltmeters => "4V",
            Self::TwoVoltmetersOneShunt => "2V1S",
            Self::OneShuntTwoVoltmeters => "1S2V",
            Self::TwoShunts => "2S",
        }
    }

    /// Number of voltmeter channels in this layout.
    pub fn voltmeter_count(self) -> usize {
        match self {
            Self::FourVoltmeters => 4,
            Self::TwoVoltmetersOneShunt | Self::OneShuntTwoVoltmeters => 2,
            Self::TwoShunts => 0,
        }
    }

    /// Number of shunt channels in this layout.
    pub fn shunt_count(self) -> usize {
        match self {
            Self::FourVoltmeters => 0,
            Self::TwoVoltmetersOneShunt | Self::OneShuntTwoVoltmeters => 1,
            Self::TwoShunts => 2,
        }
    }
}

impl fmt::Display for ConfigMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownConfigMode(s.to_owned()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SystemVoltage
// ─────────────────────────────────────────────────────────────────────────────

/// Nominal battery system voltage. Serialized as the bare number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SystemVoltage {
    /// 12 V system.
    #[default]
    V12,
    /// 24 V system.
    V24,
}

impl SystemVoltage {
    /// Nominal volts.
    pub fn volts(self) -> u8 {
        match self {
            Self::V12 => 12,
            Self::V24 => 24,
        }
    }

    /// Highest voltmeter threshold accepted for this system.
    pub fn max_threshold(self) -> f64 {
        match self {
            Self::V12 => 15.0,
            Self::V24 => 32.0,
        }
    }
}

impl TryFrom<u8> for SystemVoltage {
    type Error = ValidationError;

    fn try_from(volts: u8) -> Result<Self, Self::Error> {
        match volts {
            12 => Ok(Self::V12),
            24 => Ok(Self::V24),
            other => Err(ValidationError::UnsupportedSystemVoltage(other)),
        }
    }
}

impl From<SystemVoltage> for u8 {
    fn from(voltage: SystemVoltage) -> Self {
        voltage.volts()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Voltmeter
// ─────────────────────────────────────────────────────────────────────────────

/// Alert toggles for a voltmeter channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoltmeterAlerts {
    /// Alert when the reading drops below `minVoltage`.
    #[serde(default)]
    pub min_voltage: bool,
    /// Alert when the reading rises above `maxVoltage`.
    #[serde(default)]
    pub max_voltage: bool,
}

/// One voltmeter channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoltmeterConfig {
    /// 1-based channel id.
    pub id: u32,
    /// Display name.
    pub voltmeter_name: String,
    /// Nominal system voltage.
    #[serde(default)]
    pub system_voltage: SystemVoltage,
    /// Low threshold in volts.
    pub min_voltage: f64,
    /// High threshold in volts.
    pub max_voltage: f64,
    /// Last reading pushed by the device. Never sent back.
    #[serde(default, skip_serializing)]
    pub value: Option<f64>,
    /// Alert toggles.
    #[serde(default)]
    pub alerts: VoltmeterAlerts,
}

impl VoltmeterConfig {
    /// Factory defaults for channel `index` (0-based).
    pub fn default_for(index: usize) -> Self {
        let id = u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1));
        Self {
            id,
            voltmeter_name: format!("Voltmeter {id}"),
            system_voltage: SystemVoltage::V12,
            min_voltage: 10.5,
            max_voltage: 15.0,
            value: None,
            alerts: VoltmeterAlerts::default(),
        }
    }

    /// Check name length and threshold bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("voltmeter name", &self.voltmeter_name)?;

        let ceiling = self.system_voltage.max_threshold();
        check_range("min voltage", self.min_voltage, 0.0, ceiling)?;
        check_range("max voltage", self.max_voltage, 0.0, ceiling)?;
        if self.min_voltage >= self.max_voltage {
            return Err(ValidationError::InvertedRange {
                min: self.min_voltage,
                max: self.max_voltage,
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shunt
// ─────────────────────────────────────────────────────────────────────────────

/// Alert toggles for a shunt channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuntAlerts {
    /// Alert when state of charge drops below `minSOC`.
    #[serde(default, rename = "minSOC")]
    pub min_soc: bool,
}

/// One current shunt channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuntConfig {
    /// 1-based channel id.
    pub id: u32,
    /// Display name.
    pub shunt_name: String,
    /// Whether a SmartShunt (default 50 mV rating) is fitted.
    #[serde(default)]
    pub smart_shunt: bool,
    /// Shunt rating in millivolts.
    #[serde(rename = "shuntMV")]
    pub shunt_mv: f64,
    /// Nominal system voltage.
    #[serde(default)]
    pub system_voltage: SystemVoltage,
    /// Let the device estimate state of charge.
    #[serde(default, rename = "autoSOC")]
    pub auto_soc: bool,
    /// Minimum state of charge threshold in percent.
    #[serde(rename = "minSOC")]
    pub min_soc: u8,
    /// Alert toggles.
    #[serde(default)]
    pub alerts: ShuntAlerts,
    /// Battery profile forwarded verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<Value>,
}

impl ShuntConfig {
    /// Factory defaults for channel `index` (0-based).
    pub fn default_for(index: usize) -> Self {
        let id = u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1));
        Self {
            id,
            shunt_name: format!("Shunt {id}"),
            smart_shunt: true,
            shunt_mv: 50.0,
            system_voltage: SystemVoltage::V12,
            auto_soc: true,
            min_soc: 20,
            alerts: ShuntAlerts::default(),
            battery: None,
        }
    }

    /// Check name length, rating, and SOC threshold.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("shunt name", &self.shunt_name)?;

        if !(self.shunt_mv > 0.0 && self.shunt_mv.is_finite()) {
            return Err(ValidationError::OutOfRange {
                field: "shunt rating",
                min: 0.0,
                max: f64::MAX,
                value: self.shunt_mv,
            });
        }
        check_range("min SOC", f64::from(self.min_soc), 0.0, 100.0)
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}
