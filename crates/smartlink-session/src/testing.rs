//! In-memory transport for driving a session from tests.
//!
//! [`MockConnector`] hands out one [`MockDevice`] per accepted connection.
//! Tests play the device: read what the session sent, push replies and
//! events, or hang up. Connect attempts are timestamped with the tokio clock
//! so backoff can be asserted under a paused runtime.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::errors::TransportError;
use crate::transport::{Connection, Connector};

/// What the next connect attempt does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Hand out a live [`MockDevice`].
    Accept,
    /// Fail the attempt.
    Refuse,
}

#[derive(Debug)]
struct MockState {
    plan: VecDeque<ConnectOutcome>,
    fallback: ConnectOutcome,
    attempts: Vec<Instant>,
}

/// Scripted [`Connector`].
#[derive(Clone, Debug)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
    devices: mpsc::UnboundedSender<MockDevice>,
}

/// Receives a [`MockDevice`] for every accepted connection.
pub type DeviceQueue = mpsc::UnboundedReceiver<MockDevice>;

impl MockConnector {
    /// A connector that accepts every attempt.
    pub fn new() -> (Self, DeviceQueue) {
        let (devices, queue) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(MockState {
                plan: VecDeque::new(),
                fallback: ConnectOutcome::Accept,
                attempts: Vec::new(),
            })),
            devices,
        };
        (connector, queue)
    }

    /// Queue explicit outcomes for the next attempts.
    pub fn script(&self, outcomes: impl IntoIterator<Item = ConnectOutcome>) {
        self.state.lock().plan.extend(outcomes);
    }

    /// Refuse the next `n` attempts.
    pub fn refuse_next(&self, n: usize) {
        self.script(std::iter::repeat_n(ConnectOutcome::Refuse, n));
    }

    /// Outcome once the script is exhausted.
    pub fn set_fallback(&self, outcome: ConnectOutcome) {
        self.state.lock().fallback = outcome;
    }

    /// When each attempt happened.
    pub fn attempts(&self) -> Vec<Instant> {
        self.state.lock().attempts.clone()
    }

    /// Number of attempts so far.
    pub fn attempt_count(&self) -> usize {
        self.state.lock().attempts.len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let outcome = {
            let mut state = self.state.lock();
            state.attempts.push(Instant::now());
            let fallback = state.fallback;
            state.plan.pop_front().unwrap_or(fallback)
        };

        if outcome == ConnectOutcome::Refuse {
            return Err(TransportError::Connect {
                url: url.to_owned(),
                reason: "refused by mock".into(),
            });
        }

        let (outbound, sent) = mpsc::unbounded_channel();
        let (push, inbound) = mpsc::unbounded_channel();
        let device = MockDevice {
            sent,
            push: Some(push),
        };
        if self.devices.send(device).is_err() {
            return Err(TransportError::Closed);
        }
        Ok(Connection { outbound, inbound })
    }
}

/// The device end of one mock connection.
#[derive(Debug)]
pub struct MockDevice {
    sent: mpsc::UnboundedReceiver<String>,
    push: Option<mpsc::UnboundedSender<String>>,
}

impl MockDevice {
    /// Next raw frame the session wrote, or `None` once it closed the link.
    pub async fn next_sent_text(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Next frame the session wrote, parsed as JSON.
    pub async fn next_sent(&mut self) -> Option<Value> {
        let text = self.sent.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Skip frames until one matches `predicate`.
    pub async fn next_sent_matching(
        &mut self,
        mut predicate: impl FnMut(&Value) -> bool,
    ) -> Option<Value> {
        loop {
            let value = self.next_sent().await?;
            if predicate(&value) {
                return Some(value);
            }
        }
    }

    /// Send a JSON frame to the session.
    pub fn push(&self, value: &Value) {
        self.push_text(&value.to_string());
    }

    /// Send a raw text frame to the session.
    pub fn push_text(&self, text: &str) {
        if let Some(push) = &self.push {
            let _ = push.send(text.to_owned());
        }
    }

    /// Drop the link from the device side.
    pub fn hang_up(&mut self) {
        self.push = None;
    }

    /// Wait until the session closes its end.
    pub async fn closed(&mut self) {
        while self.sent.recv().await.is_some() {}
    }
}
