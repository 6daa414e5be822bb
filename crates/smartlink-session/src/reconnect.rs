//! Reconnect scheduling.
//!
//! The scheduler owns the attempt counter. Each abrupt close asks it for a
//! delay; while one reconnect is pending, further requests are refused so a
//! burst of close events can only ever produce one reconnect.

use std::time::Duration;

use smartlink_core::backoff::BackoffConfig;

/// Tracks consecutive reconnects and the pending-reconnect guard.
#[derive(Debug)]
pub struct ReconnectScheduler {
    config: BackoffConfig,
    attempts: u32,
    scheduled: bool,
}

impl ReconnectScheduler {
    /// Create with zero attempts.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
            scheduled: false,
        }
    }

    /// Reconnects scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a reconnect is pending.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Reserve the next reconnect and return its delay.
    ///
    /// Returns `None` when a reconnect is already pending.
    pub fn schedule(&mut self) -> Option<Duration> {
        if self.scheduled {
            return None;
        }
        let delay = self.config.delay_for(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.scheduled = true;
        Some(delay)
    }

    /// The pending reconnect is being attempted now.
    pub fn fired(&mut self) {
        self.scheduled = false;
    }

    /// A connection opened: start the backoff over.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.scheduled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> ReconnectScheduler {
        ReconnectScheduler::new(BackoffConfig::default())
    }

    #[test]
    fn delays_double_up_to_cap() {
        let mut s = scheduler();
        let mut delays = Vec::new();
        for _ in 0..5 {
            delays.push(s.schedule().unwrap().as_millis());
            s.fired();
        }
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
        assert_eq!(s.attempts(), 5);
    }

    #[test]
    fn second_schedule_while_pending_is_refused() {
        let mut s = scheduler();
        assert!(s.schedule().is_some());
        assert!(s.is_scheduled());
        assert!(s.schedule().is_none());
        assert_eq!(s.attempts(), 1);
        s.fired();
        assert_eq!(s.schedule(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn reset_starts_over() {
        let mut s = scheduler();
        let _ = s.schedule();
        s.fired();
        let _ = s.schedule();
        s.reset();
        assert_eq!(s.attempts(), 0);
        assert!(!s.is_scheduled());
        assert_eq!(s.schedule(), Some(Duration::from_secs(1)));
    }
}
