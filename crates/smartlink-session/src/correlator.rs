//! Request/reply correlation.
//!
//! Every request that expects a reply gets a fresh [`RequestId`] and a
//! pending entry holding a oneshot sender and a deadline. Exactly one of
//! these ends the entry:
//!
//! - a routed reply with the same id ([`Correlator::resolve`])
//! - the deadline, observed by the waiting [`PendingReply`]
//! - eager failure on disconnect ([`Correlator::fail_all`]), when enabled
//!
//! Every removal happens under the map lock together with the send on the
//! oneshot, so a reply racing the deadline can never produce two outcomes.

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use smartlink_core::{RequestId, RequestIdGenerator, SessionError};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

type ReplyTx = oneshot::Sender<Result<Value, SessionError>>;

struct PendingRequest {
    tx: ReplyTx,
    deadline: Instant,
    timeout: Duration,
}

/// What happened to a routed reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Handed to the waiting caller.
    Delivered,
    /// Matched an entry whose deadline had already passed; the caller got a
    /// timeout instead.
    Expired,
    /// No pending request with that id.
    Unknown,
}

/// The pending-request table.
#[derive(Default)]
pub struct Correlator {
    ids: RequestIdGenerator,
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("issued", &self.ids.issued())
            .field("pending", &self.len())
            .finish()
    }
}

impl Correlator {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id.
    pub fn next_id(&self) -> RequestId {
        self.ids.next_id()
    }

    /// Register a pending request and return the caller's handle.
    pub fn register(self: &Arc<Self>, id: RequestId, timeout: Duration) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + timeout;
        let previous = self.pending.lock().insert(
            id.clone(),
            PendingRequest {
                tx,
                deadline,
                timeout,
            },
        );
        debug_assert!(previous.is_none(), "request id reused while pending");

        PendingReply {
            id,
            rx,
            deadline,
            timeout,
            correlator: Arc::clone(self),
        }
    }

    /// Route a reply to its pending request.
    ///
    /// Never fails: an unknown id is logged and dropped.
    pub fn resolve(&self, id: &str, payload: Value) -> Resolution {
        self.try_resolve(id, payload).unwrap_or_else(|_| {
            debug!(request_id = id, "no pending request for reply, dropping");
            Resolution::Unknown
        })
    }

    /// Route a reply if `id` is pending, in one step under the lock.
    ///
    /// Hands the payload back when nothing is pending under `id`, so the
    /// caller can route it elsewhere.
    pub fn try_resolve(&self, id: &str, payload: Value) -> Result<Resolution, Value> {
        let mut pending = self.pending.lock();
        let Some(entry) = pending.remove(id) else {
            return Err(payload);
        };

        if Instant::now() >= entry.deadline {
            let _ = entry
                .tx
                .send(Err(SessionError::timeout(id, millis(entry.timeout))));
            debug!(request_id = id, "reply arrived after deadline, dropping");
            return Ok(Resolution::Expired);
        }

        if entry.tx.send(Ok(payload)).is_err() {
            debug!(request_id = id, "caller stopped waiting before reply");
        }
        Ok(Resolution::Delivered)
    }

    /// Remove an entry whose deadline passed. Returns whether it was still
    /// pending.
    pub fn expire(&self, id: &str) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    /// Forget an entry without notifying anyone.
    pub fn cancel(&self, id: &str) {
        let _ = self.pending.lock().remove(id);
    }

    /// Fail every entry whose deadline has passed. Returns how many.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut pending = self.pending.lock();
        let expired: Vec<RequestId> = pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(entry) = pending.remove(id) {
                let _ = entry
                    .tx
                    .send(Err(SessionError::timeout(id.as_str(), millis(entry.timeout))));
            }
        }
        expired.len()
    }

    /// Fail every pending request with [`SessionError::ConnectionLost`].
    pub fn fail_all(&self) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        for (id, entry) in pending.drain() {
            let _ = entry.tx.send(Err(SessionError::ConnectionLost {
                request_id: id.into_inner(),
            }));
        }
        count
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// PendingReply
// ─────────────────────────────────────────────────────────────────────────────

/// The caller's side of a pending request.
///
/// Await it (or call [`PendingReply::wait`]) for the reply payload.
/// Dropping it abandons the request and removes the pending entry.
pub struct PendingReply {
    id: RequestId,
    rx: oneshot::Receiver<Result<Value, SessionError>>,
    deadline: Instant,
    timeout: Duration,
    correlator: Arc<Correlator>,
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl PendingReply {
    /// The id sent as `requestId`.
    pub fn request_id(&self) -> &RequestId {
        &self.id
    }

    /// When the request fails if no reply has arrived.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the reply or the deadline.
    pub async fn wait(mut self) -> Result<Value, SessionError> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(self.timeout_error()),
            Err(_) => {
                if self.correlator.expire(self.id.as_str()) {
                    debug!(request_id = %self.id, timeout_ms = millis(self.timeout), "request timed out");
                    Err(self.timeout_error())
                } else {
                    // Resolved under the lock just before we got here.
                    self.rx.try_recv().unwrap_or_else(|_| Err(self.timeout_error()))
                }
            }
        }
    }

    fn timeout_error(&self) -> SessionError {
        SessionError::timeout(self.id.as_str(), millis(self.timeout))
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.correlator.cancel(self.id.as_str());
    }
}

impl IntoFuture for PendingReply {
    type Output = Result<Value, SessionError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
