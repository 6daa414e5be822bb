//! Per-session configuration.

use std::time::Duration;

use smartlink_core::backoff::BackoffConfig;
use smartlink_settings::{DEFAULT_DEVICE_URL, SmartlinkSettings};

/// Shortest ping period a session will run with.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Everything a [`crate::Session`] needs besides its connector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Device URL.
    pub url: String,
    /// Reconnect backoff.
    pub backoff: BackoffConfig,
    /// Liveness ping period. See [`SessionConfig::heartbeat_period`].
    pub heartbeat_interval: Duration,
    /// Deadline for requests that don't name their own.
    pub request_timeout: Duration,
    /// Fail pending requests with `ConnectionLost` when the link drops.
    pub fail_pending_on_disconnect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&SmartlinkSettings::default())
    }
}

impl SessionConfig {
    /// Defaults pointed at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &SmartlinkSettings) -> Self {
        let session = &settings.session;
        let url = if settings.device.url.is_empty() {
            DEFAULT_DEVICE_URL.to_owned()
        } else {
            settings.device.url.clone()
        };
        Self {
            url,
            backoff: session.backoff(),
            heartbeat_interval: Duration::from_millis(session.heartbeat_interval_ms),
            request_timeout: Duration::from_millis(session.request_timeout_ms),
            fail_pending_on_disconnect: session.fail_pending_on_disconnect,
        }
    }

    /// Override the default request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The ping period actually used, never below
    /// [`MIN_HEARTBEAT_INTERVAL`].
    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL)
    }

    /// Override the ping period.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Override the reconnect backoff.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enable or disable eager failure of pending requests on disconnect.
    #[must_use]
    pub fn with_fail_pending_on_disconnect(mut self, enabled: bool) -> Self {
        self.fail_pending_on_disconnect = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.url, "ws://192.168.4.1/ws");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.backoff, BackoffConfig::default());
        assert!(!config.fail_pending_on_disconnect);
    }

    #[test]
    fn from_settings_carries_overrides() {
        let mut settings = SmartlinkSettings::default();
        settings.device.url = "ws://10.0.0.7/ws".into();
        settings.session.request_timeout_ms = 1500;
        settings.session.reconnect_max_delay_ms = 8000;
        settings.session.fail_pending_on_disconnect = true;

        let config = SessionConfig::from_settings(&settings);
        assert_eq!(config.url, "ws://10.0.0.7/ws");
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.backoff.max_delay_ms, 8000);
        assert!(config.fail_pending_on_disconnect);
    }

    #[test]
    fn builder_overrides() {
        let config = SessionConfig::new("mock://device")
            .with_request_timeout(Duration::from_millis(250))
            .with_heartbeat_interval(Duration::from_secs(5));
        assert_eq!(config.url, "mock://device");
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.heartbeat_period(), Duration::from_secs(5));
    }

    #[test]
    fn zero_heartbeat_is_clamped() {
        let mut settings = SmartlinkSettings::default();
        settings.session.heartbeat_interval_ms = 0;
        let config = SessionConfig::from_settings(&settings);
        assert_eq!(config.heartbeat_interval, Duration::ZERO);
        assert_eq!(config.heartbeat_period(), MIN_HEARTBEAT_INTERVAL);

        let config = config.with_heartbeat_interval(Duration::from_millis(1));
        assert_eq!(config.heartbeat_period(), MIN_HEARTBEAT_INTERVAL);
    }
}
