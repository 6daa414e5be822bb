//! Firmware flashing progress tracking.
//!
//! The device repeats `otaProgress` frames freely, so terminal outcomes
//! must be reported once per run. A new run starts with the next in-flight
//! percentage after a terminal state.

use tracing::warn;

/// Sentinel the firmware sends when flashing fails.
pub const OTA_FAILED: i64 = -1;
/// Percentage at which flashing is complete.
pub const OTA_COMPLETE: i64 = 100;

/// Interpreted progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtaEvent {
    /// Flashing is in flight at this percentage.
    Progress(u8),
    /// Flashing finished.
    Completed,
    /// Flashing failed.
    Failed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Turns raw `otaProgress` values into [`OtaEvent`]s.
#[derive(Debug, Default)]
pub struct OtaTracker {
    phase: Phase,
}

impl OtaTracker {
    /// Create an idle tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw progress value.
    ///
    /// Returns `None` for suppressed repeats of a terminal state and for
    /// values outside the protocol.
    pub fn observe(&mut self, progress: i64) -> Option<OtaEvent> {
        match progress {
            OTA_COMPLETE.. => {
                if self.phase == Phase::Completed {
                    return None;
                }
                self.phase = Phase::Completed;
                Some(OtaEvent::Completed)
            }
            OTA_FAILED => {
                if self.phase == Phase::Failed {
                    return None;
                }
                self.phase = Phase::Failed;
                Some(OtaEvent::Failed)
            }
            0..OTA_COMPLETE => {
                self.phase = Phase::Running;
                u8::try_from(progress).ok().map(OtaEvent::Progress)
            }
            _ => {
                warn!(progress, "ignoring out-of-range OTA progress");
                None
            }
        }
    }
}
