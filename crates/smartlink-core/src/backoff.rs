//! Reconnect backoff configuration and delay calculation.
//!
//! - [`BackoffConfig`]: base and cap for the reconnect delay
//! - [`calculate_backoff_delay`]: `min(max_delay, base_delay * 2^attempt)`
//!
//! No jitter is applied: the device sits on a local network and there is a
//! single client per panel, so the delay sequence stays exact.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Reconnect backoff parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Delay before the first reconnect in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay in ms (default: 5000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl BackoffConfig {
    /// Delay to wait before reconnect number `attempt + 1`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
        ))
    }
}

/// Calculate the capped exponential backoff delay.
///
/// `attempt` is the number of reconnects already scheduled since the last
/// successful open (0 for the first).
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = BackoffConfig::default();
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 5000);
    }

    #[test]
    fn config_serde_defaults() {
        let config: BackoffConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BackoffConfig::default());
    }

    #[test]
    fn config_serde_camel_case() {
        let config: BackoffConfig =
            serde_json::from_str(r#"{"baseDelayMs":250,"maxDelayMs":2000}"#).unwrap();
        assert_eq!(config.base_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 2000);
    }

    #[test]
    fn reference_sequence() {
        let delays: Vec<u64> = (0..6).map(|a| calculate_backoff_delay(a, 1000, 5000)).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000, 5000]);
    }

    #[test]
    fn delay_for_returns_duration() {
        let config = BackoffConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        assert_eq!(calculate_backoff_delay(u32::MAX, 1000, 5000), 5000);
        assert_eq!(calculate_backoff_delay(63, u64::MAX, u64::MAX), u64::MAX);
    }

    #[test]
    fn zero_base_stays_zero() {
        assert_eq!(calculate_backoff_delay(4, 0, 5000), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_exceeds_cap(attempt in 0u32..100, base in 1u64..10_000, cap in 1u64..100_000) {
                prop_assert!(calculate_backoff_delay(attempt, base, cap) <= cap);
            }

            #[test]
            fn non_decreasing(attempt in 0u32..64, base in 1u64..10_000, cap in 1u64..100_000) {
                let now = calculate_backoff_delay(attempt, base, cap);
                let next = calculate_backoff_delay(attempt + 1, base, cap);
                prop_assert!(next >= now);
            }

            #[test]
            fn matches_reference_formula(n in 1u32..20) {
                let expected = 5000u64.min(1000 * 2u64.pow(n - 1));
                prop_assert_eq!(calculate_backoff_delay(n - 1, 1000, 5000), expected);
            }
        }
    }
}
