//! Identifier newtypes.
//!
//! - [`RequestId`] correlates an outbound request with its reply. Ids are
//!   produced by a [`RequestIdGenerator`] as `req-<counter>-<unix_ms>`, so they
//!   never repeat within a generator's lifetime.
//! - [`ConnectionId`] tags one physical connection in logs (UUID v7).

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation id carried in the `requestId` field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Create from an existing string value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Borrow<str> for RequestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Monotonic request id source.
///
/// The counter guarantees uniqueness; the timestamp only makes ids readable
/// in device logs.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a generator starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next id.
    pub fn next_id(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = chrono::Utc::now().timestamp_millis();
        RequestId(format!("req-{n}-{millis}"))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

/// Identifies one physical connection for log correlation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new time-ordered id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn request_id_format() {
        let id = RequestIdGenerator::new().next_id();
        let parts: Vec<&str> = id.as_str().splitn(3, '-').collect();
        assert_eq!(parts[0], "req");
        assert_eq!(parts[1], "1");
        assert!(parts[2].parse::<i64>().is_ok());
    }

    #[test]
    fn counter_is_monotonic() {
        let generator = RequestIdGenerator::new();
        let a = generator.next_id();
        let b = generator.next_id();
        assert!(a.as_str().starts_with("req-1-"));
        assert!(b.as_str().starts_with("req-2-"));
        assert_eq!(generator.issued(), 2);
    }

    #[test]
    fn borrow_lookup_by_str() {
        let mut map: HashMap<RequestId, u32> = HashMap::new();
        let _ = map.insert(RequestId::from("req-7-1"), 7);
        assert_eq!(map.get("req-7-1"), Some(&7));
        assert!(map.get("req-8-1").is_none());
    }

    #[test]
    fn request_id_serializes_as_plain_string() {
        let id = RequestId::from("req-3-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"req-3-42\"");
    }

    #[test]
    fn connection_ids_differ() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ids_never_repeat(count in 1usize..500) {
                let generator = RequestIdGenerator::new();
                let ids: HashSet<RequestId> = (0..count).map(|_| generator.next_id()).collect();
                prop_assert_eq!(ids.len(), count);
            }
        }
    }
}
