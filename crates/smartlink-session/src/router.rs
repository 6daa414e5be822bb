//! Inbound frame classification.
//!
//! One frame at a time, first match wins:
//!
//! 1. `{"type":"pong"}` confirms liveness
//! 2. a `requestId` naming a pending request resolves it
//! 3. `{"type":"ack"}` is logged
//! 4. `configData` / `upgradeProgress` / `otaProgress` go to their handlers
//! 5. any other frame with an unmatched `requestId` is a late reply and is
//!    dropped at debug level
//! 6. `{"type":"response"}` without a `requestId` is logged like an ack
//! 7. anything else becomes an unknown-type notice
//!
//! A frame that is not a JSON object, or a recognized event whose body does
//! not decode, is logged and discarded without touching session state or
//! pending requests.

use std::sync::Arc;

use serde_json::Value;
use smartlink_core::SessionError;
use smartlink_core::ota::OtaTracker;
use smartlink_core::protocol::inbound::decode;
use smartlink_core::protocol::{
    self, ConfigSnapshot, EventKind, OtaProgress, Payload, TYPE_ACK, TYPE_PONG, TYPE_RESPONSE,
    UpgradeProgress,
};
use tracing::{debug, info, warn};

use crate::correlator::{Correlator, Resolution};
use crate::handlers::{EventHandlers, Notice};

/// How a frame was handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Routed {
    /// Liveness reply.
    Pong,
    /// Matched a pending request.
    Reply {
        /// The correlation id.
        request_id: String,
        /// Whether the caller received it.
        resolution: Resolution,
    },
    /// Generic acknowledgment without a pending request.
    Ack,
    /// Dispatched to event handlers.
    Event(EventKind),
    /// Non-event frame whose `requestId` matched nothing.
    StaleReply {
        /// The unmatched id.
        request_id: String,
    },
    /// Unrecognized or missing `type`.
    Unknown(SessionError),
    /// Not parseable, or an event body that failed to decode.
    Malformed(SessionError),
}

/// Routes inbound frames to the correlator and handlers.
#[derive(Debug)]
pub struct MessageRouter {
    correlator: Arc<Correlator>,
    handlers: Arc<EventHandlers>,
    ota: OtaTracker,
}

impl MessageRouter {
    /// Create a router over shared state.
    pub fn new(correlator: Arc<Correlator>, handlers: Arc<EventHandlers>) -> Self {
        Self {
            correlator,
            handlers,
            ota: OtaTracker::new(),
        }
    }

    /// Route one text frame.
    pub fn route(&mut self, text: &str) -> Routed {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return malformed(SessionError::malformed(e.to_string())),
        };
        let Value::Object(payload) = value else {
            return malformed(SessionError::malformed("frame is not a JSON object"));
        };
        self.route_object(payload)
    }

    fn route_object(&mut self, payload: Payload) -> Routed {
        let message_type = protocol::message_type(&payload).map(str::to_owned);

        if message_type.as_deref() == Some(TYPE_PONG) {
            debug!("pong received");
            return Routed::Pong;
        }

        let request_id = protocol::request_id(&payload).map(str::to_owned);
        let mut payload = Value::Object(payload);

        if let Some(id) = request_id.as_deref() {
            match self.correlator.try_resolve(id, payload) {
                Ok(resolution) => {
                    return Routed::Reply {
                        request_id: id.to_owned(),
                        resolution,
                    };
                }
                Err(unclaimed) => payload = unclaimed,
            }
        }

        if message_type.as_deref() == Some(TYPE_ACK) {
            info!(request_id = request_id.as_deref(), "device acknowledged request");
            return Routed::Ack;
        }
        if let Some(kind) = message_type.as_deref().and_then(EventKind::from_type) {
            return self.dispatch(kind, &payload);
        }

        match (request_id, message_type.as_deref()) {
            (Some(request_id), message_type) => {
                debug!(%request_id, message_type, "late or unmatched reply, dropping");
                Routed::StaleReply { request_id }
            }
            (None, Some(TYPE_RESPONSE)) => {
                info!(success = payload.get("success").and_then(serde_json::Value::as_bool), "device responded");
                Routed::Ack
            }
            (None, other) => self.unknown(other.unwrap_or_default()),
        }
    }

    fn dispatch(&mut self, kind: EventKind, payload: &Value) -> Routed {
        let outcome = match kind {
            EventKind::ConfigData => decode::<ConfigSnapshot>(payload).map(|snapshot| {
                debug!(module = %snapshot.mod_name, firmware = %snapshot.firmware_version, "config snapshot");
                self.handlers.config_data.emit(&snapshot);
            }),
            EventKind::UpgradeProgress => decode::<UpgradeProgress>(payload).map(|progress| {
                self.handlers.upgrade_progress.emit(&progress);
            }),
            EventKind::OtaProgress => decode::<OtaProgress>(payload).map(|raw| {
                if let Some(event) = self.ota.observe(raw.progress) {
                    debug!(?event, "ota progress");
                    self.handlers.ota_progress.emit(&event);
                }
            }),
        };

        match outcome {
            Ok(()) => Routed::Event(kind),
            Err(e) => {
                warn!(event = %kind, error = %e, "discarding undecodable event");
                Routed::Malformed(e)
            }
        }
    }

    fn unknown(&self, message_type: &str) -> Routed {
        warn!(message_type, "unknown message type");
        self.handlers
            .notice
            .emit(&Notice::UnknownMessageType(message_type.to_owned()));
        Routed::Unknown(SessionError::UnknownMessageType {
            message_type: message_type.to_owned(),
        })
    }
}

fn malformed(error: SessionError) -> Routed {
    warn!(error = %error, "discarding malformed frame");
    Routed::Malformed(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use serde_json::json;
    use smartlink_core::logging::capture_logs;
    use smartlink_core::ota::OtaEvent;
    use std::time::Duration;

    struct Fixture {
        router: MessageRouter,
        correlator: Arc<Correlator>,
        configs: Arc<Mutex<Vec<ConfigSnapshot>>>,
        ota: Arc<Mutex<Vec<OtaEvent>>>,
        notices: Arc<Mutex<Vec<Notice>>>,
    }

    fn fixture() -> Fixture {
        let correlator = Arc::new(Correlator::new());
        let handlers = Arc::new(EventHandlers::default());
        let configs = Arc::new(Mutex::new(Vec::new()));
        let ota = Arc::new(Mutex::new(Vec::new()));
        let notices = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&configs);
        handlers
            .config_data
            .add(Arc::new(move |c: &ConfigSnapshot| sink.lock().push(c.clone())));
        let sink = Arc::clone(&ota);
        handlers
            .ota_progress
            .add(Arc::new(move |e: &OtaEvent| sink.lock().push(*e)));
        let sink = Arc::clone(&notices);
        handlers
            .notice
            .add(Arc::new(move |n: &Notice| sink.lock().push(n.clone())));

        Fixture {
            router: MessageRouter::new(Arc::clone(&correlator), handlers),
            correlator,
            configs,
            ota,
            notices,
        }
    }

    #[test]
    fn pong_is_consumed_first() {
        let mut f = fixture();
        assert_eq!(f.router.route(r#"{"type":"pong","requestId":"x"}"#), Routed::Pong);
    }

    #[tokio::test]
    async fn reply_routes_to_matching_request() {
        let mut f = fixture();
        let reply = f
            .correlator
            .register(f.correlator.next_id(), Duration::from_secs(5));
        let id = reply.request_id().to_string();

        let frame = json!({"requestId": id, "currentVersion": "1.0.0"}).to_string();
        assert_matches!(
            f.router.route(&frame),
            Routed::Reply { resolution: Resolution::Delivered, .. }
        );
        assert_eq!(reply.await.unwrap()["currentVersion"], "1.0.0");
    }

    #[tokio::test]
    async fn ack_with_pending_id_resolves() {
        let mut f = fixture();
        let reply = f
            .correlator
            .register(f.correlator.next_id(), Duration::from_secs(5));
        let id = reply.request_id().to_string();

        let frame = json!({"type": "ack", "requestId": id}).to_string();
        assert_matches!(f.router.route(&frame), Routed::Reply { .. });
        assert_eq!(reply.await.unwrap()["type"], "ack");
    }

    #[test]
    fn ack_without_pending_is_logged() {
        let (logs, _guard) = capture_logs();
        let mut f = fixture();
        assert_eq!(f.router.route(r#"{"type":"ack","requestId":"req-9-1"}"#), Routed::Ack);
        assert!(logs.has_message("device acknowledged request"));
        assert!(f.notices.lock().is_empty());
    }

    #[test]
    fn config_data_reaches_handler() {
        let mut f = fixture();
        let routed = f
            .router
            .route(r#"{"type":"configData","modName":"Nav Station","isUpgradeAvailable":true}"#);
        assert_eq!(routed, Routed::Event(EventKind::ConfigData));
        let configs = f.configs.lock();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].mod_name, "Nav Station");
        assert!(configs[0].is_upgrade_available);
    }

    #[test]
    fn typed_event_with_unmatched_request_id_is_still_an_event() {
        let mut f = fixture();
        let routed = f
            .router
            .route(r#"{"type":"configData","requestId":"req-99-1"}"#);
        assert_eq!(routed, Routed::Event(EventKind::ConfigData));
    }

    #[test]
    fn ota_completion_fires_once() {
        let mut f = fixture();
        let frame = r#"{"type":"otaProgress","progress":100}"#;
        assert_eq!(f.router.route(frame), Routed::Event(EventKind::OtaProgress));
        assert_eq!(f.router.route(frame), Routed::Event(EventKind::OtaProgress));
        assert_eq!(*f.ota.lock(), vec![OtaEvent::Completed]);
    }

    #[test]
    fn unknown_type_raises_notice() {
        let mut f = fixture();
        let routed = f.router.route(r#"{"type":"bogus"}"#);
        assert_matches!(
            routed,
            Routed::Unknown(SessionError::UnknownMessageType { message_type }) if message_type == "bogus"
        );
        assert_eq!(
            *f.notices.lock(),
            vec![Notice::UnknownMessageType("bogus".into())]
        );
    }

    #[test]
    fn untyped_uncorrelated_frame_is_unknown() {
        let mut f = fixture();
        assert_matches!(f.router.route(r#"{"hello":1}"#), Routed::Unknown(_));
        assert_eq!(
            *f.notices.lock(),
            vec![Notice::UnknownMessageType(String::new())]
        );
    }

    #[test]
    fn stale_reply_is_dropped_quietly() {
        let (logs, _guard) = capture_logs();
        let mut f = fixture();
        assert_eq!(
            f.router.route(r#"{"requestId":"req-3-1","ok":true}"#),
            Routed::StaleReply {
                request_id: "req-3-1".into()
            }
        );
        assert!(f.notices.lock().is_empty());
        assert!(logs.has_message("late or unmatched reply"));
    }

    #[test]
    fn late_command_response_is_dropped_quietly() {
        let (logs, _guard) = capture_logs();
        let mut f = fixture();
        let frame = r#"{"type":"response","success":true,"message":"ok","requestId":"req-3-1"}"#;
        assert_eq!(
            f.router.route(frame),
            Routed::StaleReply {
                request_id: "req-3-1".into()
            }
        );
        assert!(f.notices.lock().is_empty());
        assert!(logs.has_message("late or unmatched reply"));
    }

    #[test]
    fn unknown_type_with_unmatched_request_id_is_stale() {
        let mut f = fixture();
        assert_eq!(
            f.router.route(r#"{"type":"bogus","requestId":"req-4-1"}"#),
            Routed::StaleReply {
                request_id: "req-4-1".into()
            }
        );
        assert!(f.notices.lock().is_empty());
    }

    #[test]
    fn uncorrelated_command_response_is_logged() {
        let (logs, _guard) = capture_logs();
        let mut f = fixture();
        assert_eq!(
            f.router.route(r#"{"type":"response","success":false,"message":"busy"}"#),
            Routed::Ack
        );
        assert!(f.notices.lock().is_empty());
        assert!(logs.has_message("device responded"));
    }

    #[tokio::test]
    async fn command_response_resolves_pending_request() {
        let mut f = fixture();
        let reply = f
            .correlator
            .register(f.correlator.next_id(), Duration::from_secs(5));
        let id = reply.request_id().to_string();

        let frame = json!({"type": "response", "success": true, "message": "ok", "requestId": id});
        assert_matches!(
            f.router.route(&frame.to_string()),
            Routed::Reply { resolution: Resolution::Delivered, .. }
        );
        assert_eq!(reply.await.unwrap()["success"], true);
        assert!(f.correlator.is_empty());
    }

    #[test]
    fn malformed_text_is_discarded() {
        let (logs, _guard) = capture_logs();
        let mut f = fixture();
        let _reply = f
            .correlator
            .register(f.correlator.next_id(), Duration::from_secs(5));

        assert_matches!(f.router.route("{not json"), Routed::Malformed(_));
        assert_matches!(f.router.route("[1,2,3]"), Routed::Malformed(_));
        assert_eq!(f.correlator.len(), 1);
        assert!(f.notices.lock().is_empty());
        assert_eq!(logs.count_messages("discarding malformed frame"), 2);
    }

    #[test]
    fn undecodable_event_is_malformed() {
        let mut f = fixture();
        assert_matches!(
            f.router.route(r#"{"type":"otaProgress","progress":"half"}"#),
            Routed::Malformed(SessionError::MalformedPayload { .. })
        );
        assert!(f.ota.lock().is_empty());
    }
}
