//! # smartlink-session
//!
//! The client-side session layer for a smart-module device.
//!
//! One [`Session`] keeps a WebSocket link to the device alive:
//!
//! - **Transport**: connect, reconnect with capped exponential backoff,
//!   and a ping/pong liveness check that forces a reconnect on silence
//! - **Correlation**: requests tagged with a `requestId` resolve with the
//!   matching reply or fail at their deadline
//! - **Routing**: pongs, replies, acks, and `configData` /
//!   `upgradeProgress` / `otaProgress` events each go to their consumer;
//!   malformed frames are logged and discarded
//!
//! The [`transport::Connector`] seam lets tests drive a session through
//! [`testing::MockConnector`] under a paused tokio clock.

#![deny(unsafe_code)]

pub mod config;
pub mod correlator;
pub mod errors;
pub mod handlers;
pub mod heartbeat;
pub mod reconnect;
pub mod router;
pub mod session;
pub mod state;
pub mod testing;
pub mod transport;

pub use config::SessionConfig;
pub use correlator::{Correlator, PendingReply, Resolution};
pub use errors::{CommandError, TransportError};
pub use handlers::{EventHandlers, Notice};
pub use router::{MessageRouter, Routed};
pub use session::Session;
pub use state::SessionState;
pub use transport::{Connection, Connector, WsConnector};
