//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use smartlink_core::errors::ValidationError;
use smartlink_core::protocol::{ConfigMode, SettingsUpdate};
use smartlink_core::validate::parse_mqtt_port;

/// Control panel client for a smart-module device.
#[derive(Debug, Parser)]
#[command(name = "smartlink", version, about = "Control panel client for a smart-module device")]
pub struct Cli {
    /// Device WebSocket URL (overrides settings).
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Settings file (default: `~/.smartlink/settings.json`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// How long to wait for the device to become reachable, in ms.
    #[arg(long, global = true, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Log level filter (`RUST_LOG` wins when set).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Write logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The open timeout as a duration.
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stay connected and print events and notices until Ctrl-C.
    Watch,
    /// Print the device's configuration snapshot.
    Config,
    /// Ask the device whether newer firmware is available.
    CheckUpgrade,
    /// Start a firmware upgrade and follow it to completion.
    Upgrade,
    /// Reset a shunt's state of charge.
    ResetSoc {
        /// Shunt channel id.
        #[arg(long)]
        shunt_id: u32,
    },
    /// Reboot the module.
    Reset,
    /// Switch the channel layout (`4V`, `2V1S`, `1S2V`, `2S`).
    ConfigMode {
        /// Target layout.
        mode: ConfigMode,
    },
    /// Update module identity and MQTT settings.
    Settings(SettingsArgs),
}

/// Arguments for `settings`.
#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Module name (at most 16 characters).
    #[arg(long)]
    pub module_name: String,

    /// Web UI name (at most 16 characters).
    #[arg(long)]
    pub web_name: String,

    /// Report to the smartboat service.
    #[arg(long, conflicts_with = "custom_mqtt")]
    pub smartboat: bool,

    /// Publish to a custom MQTT broker.
    #[arg(long, requires_all = ["mqtt_server", "mqtt_port"])]
    pub custom_mqtt: bool,

    /// Broker IPv4 address.
    #[arg(long)]
    pub mqtt_server: Option<String>,

    /// Broker port.
    #[arg(long)]
    pub mqtt_port: Option<String>,
}

impl SettingsArgs {
    /// Build the validated update.
    pub fn to_update(&self) -> Result<SettingsUpdate, ValidationError> {
        let custom_mqtt_port = self
            .mqtt_port
            .as_deref()
            .map(parse_mqtt_port)
            .transpose()?;
        let update = SettingsUpdate {
            module_name: self.module_name.clone(),
            webname: self.web_name.clone(),
            smartboat: self.smartboat,
            custom_mqtt: self.custom_mqtt,
            custom_mqtt_server: self.mqtt_server.clone(),
            custom_mqtt_port,
        };
        update.validate()?;
        Ok(update)
    }
}
