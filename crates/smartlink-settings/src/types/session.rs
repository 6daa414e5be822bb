//! Session timing settings.

use serde::{Deserialize, Serialize};
use smartlink_core::backoff::{BackoffConfig, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS};

/// Session timing and failure policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// First reconnect delay in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Cap on any reconnect delay in milliseconds.
    pub reconnect_max_delay_ms: u64,
    /// Liveness ping period in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Default deadline for requests awaiting a reply, in milliseconds.
    pub request_timeout_ms: u64,
    /// Fail outstanding requests as soon as the link drops instead of
    /// letting them run into their deadline.
    pub fail_pending_on_disconnect: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_base_delay_ms: DEFAULT_BASE_DELAY_MS,
            reconnect_max_delay_ms: DEFAULT_MAX_DELAY_MS,
            heartbeat_interval_ms: 30_000,
            request_timeout_ms: 5_000,
            fail_pending_on_disconnect: false,
        }
    }
}

impl SessionSettings {
    /// Backoff parameters for the reconnect scheduler.
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            base_delay_ms: self.reconnect_base_delay_ms,
            max_delay_ms: self.reconnect_max_delay_ms,
        }
    }
}
