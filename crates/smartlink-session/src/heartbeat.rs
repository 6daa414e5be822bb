//! Ping/pong liveness tracking.

use std::sync::atomic::{AtomicBool, Ordering};

/// What to do on a heartbeat tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickAction {
    /// The last ping was answered: send another.
    SendPing,
    /// The last ping went unanswered: drop the link.
    ForceClose,
}

/// Liveness flag shared between the router (sets it on pong) and the tick.
#[derive(Debug)]
pub struct Liveness {
    confirmed: AtomicBool,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    /// A tracker that considers the link alive.
    pub fn new() -> Self {
        Self {
            confirmed: AtomicBool::new(true),
        }
    }

    /// A pong arrived.
    pub fn confirm(&self) {
        self.confirmed.store(true, Ordering::Relaxed);
    }

    /// Whether a pong was seen since the last ping.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::Relaxed)
    }

    /// Fresh connection: the first tick sends a ping.
    pub fn reset(&self) {
        self.confirmed.store(true, Ordering::Relaxed);
    }

    /// Check and clear the flag.
    pub fn on_tick(&self) -> TickAction {
        if self.confirmed.swap(false, Ordering::Relaxed) {
            TickAction::SendPing
        } else {
            TickAction::ForceClose
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_pings() {
        let liveness = Liveness::new();
        assert_eq!(liveness.on_tick(), TickAction::SendPing);
        assert!(!liveness.is_confirmed());
    }

    #[test]
    fn two_ticks_without_pong_force_close() {
        let liveness = Liveness::new();
        assert_eq!(liveness.on_tick(), TickAction::SendPing);
        assert_eq!(liveness.on_tick(), TickAction::ForceClose);
    }

    #[test]
    fn pong_between_ticks_keeps_link() {
        let liveness = Liveness::new();
        for _ in 0..5 {
            assert_eq!(liveness.on_tick(), TickAction::SendPing);
            liveness.confirm();
        }
    }

    #[test]
    fn reset_rearms() {
        let liveness = Liveness::new();
        let _ = liveness.on_tick();
        liveness.reset();
        assert_eq!(liveness.on_tick(), TickAction::SendPing);
    }
}
