//! Session connection states.

use std::fmt;

/// Where the session is in its connection lifecycle.
///
/// ```text
/// Disconnected ──open──▶ Connecting ──ok──▶ Open ──close/drop/timeout──▶ Closing
///      ▲                     │                                             │
///      └────────fail─────────┘◀──────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No link and no attempt in flight.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Link established; sends are accepted.
    Open,
    /// The link is being torn down.
    Closing,
}

impl SessionState {
    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }

    /// Whether sends are accepted.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_accepts_sends() {
        assert!(SessionState::Open.is_open());
        assert!(!SessionState::Connecting.is_open());
        assert!(!SessionState::Closing.is_open());
        assert!(!SessionState::default().is_open());
    }

    #[test]
    fn display_names() {
        assert_eq!(SessionState::Closing.to_string(), "closing");
    }
}
