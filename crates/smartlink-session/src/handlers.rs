//! Registered callbacks for unsolicited events and user notices.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use smartlink_core::ota::OtaEvent;
use smartlink_core::protocol::{ConfigSnapshot, UpgradeProgress};

/// A registered callback.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Things the user should be told about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// The link went down (or the first connect failed).
    ConnectionLost,
    /// The link came back after a loss.
    ConnectionRestored,
    /// The device sent a `type` nothing handles. Empty when the frame had
    /// no `type` at all.
    UnknownMessageType(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost => f.write_str("connection to device lost, reconnecting"),
            Self::ConnectionRestored => f.write_str("connection to device restored"),
            Self::UnknownMessageType(t) if t.is_empty() => {
                f.write_str("device sent a message without a type")
            }
            Self::UnknownMessageType(t) => write!(f, "device sent unknown message type: {t}"),
        }
    }
}

/// Callbacks for one event kind.
pub struct HandlerList<T> {
    handlers: RwLock<Vec<Handler<T>>>,
}

impl<T> Default for HandlerList<T> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<T> HandlerList<T> {
    /// Register a callback.
    pub fn add(&self, handler: Handler<T>) {
        self.handlers.write().push(handler);
    }

    /// Invoke every callback in registration order.
    ///
    /// The list is snapshotted first, so a callback may register another.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Handler<T>> = self.handlers.read().clone();
        for handler in snapshot {
            handler(value);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

/// Every callback list the router dispatches to.
#[derive(Default)]
pub struct EventHandlers {
    /// `configData` snapshots.
    pub config_data: HandlerList<ConfigSnapshot>,
    /// `upgradeProgress` events.
    pub upgrade_progress: HandlerList<UpgradeProgress>,
    /// Interpreted `otaProgress` events.
    pub ota_progress: HandlerList<OtaEvent>,
    /// Connection and protocol notices.
    pub notice: HandlerList<Notice>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("config_data", &self.config_data.len())
            .field("upgrade_progress", &self.upgrade_progress.len())
            .field("ota_progress", &self.ota_progress.len())
            .field("notice", &self.notice.len())
            .finish()
    }
}
