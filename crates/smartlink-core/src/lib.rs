//! # smartlink-core
//!
//! Foundation types, errors, and wire protocol for the smartlink device client.
//!
//! This crate provides the shared vocabulary the session layer and the CLI
//! depend on:
//!
//! - **Errors**: `SessionError` taxonomy via `thiserror`, with stable codes
//! - **IDs**: `RequestId` (counter + wall-clock) and `ConnectionId` (UUID v7)
//! - **Backoff**: capped exponential reconnect delay math
//! - **Protocol**: inbound event payloads and outbound `DeviceCommand` builders
//! - **Validation**: input rules applied before a command is sent
//! - **OTA**: `OtaTracker` for idempotent upgrade progress handling
//! - **Logging**: `tracing` subscriber setup and test log capture

#![deny(unsafe_code)]

pub mod backoff;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod ota;
pub mod protocol;
pub mod validate;

pub use errors::SessionError;
pub use ids::{ConnectionId, RequestId, RequestIdGenerator};
