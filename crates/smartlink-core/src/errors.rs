//! Error hierarchy for the session layer.
//!
//! - [`SessionError`]: what a caller of the session can observe
//! - [`ValidationError`]: rejected command input, raised before anything is sent
//!
//! Transport failures (connect/send errors, abrupt closes) are recovered by
//! the reconnect loop and never reach callers directly. A caller only sees
//! [`SessionError::NotConnected`] at send time or [`SessionError::Timeout`]
//! once its deadline passes.

use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// SessionError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors surfaced by the session layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A send was attempted while the session was not open.
    #[error("session is not connected")]
    NotConnected,

    /// No matching reply arrived before the request deadline.
    #[error("request {request_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The correlation id of the failed request.
        request_id: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The connection carrying the request went away before a reply arrived.
    ///
    /// Only produced when eager failure on disconnect is enabled.
    #[error("connection lost before reply to {request_id}")]
    ConnectionLost {
        /// The correlation id of the failed request.
        request_id: String,
    },

    /// An inbound payload could not be deserialized.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// Parser diagnostic.
        reason: String,
    },

    /// An inbound payload carried a `type` nothing handles.
    #[error("unknown message type: {message_type}")]
    UnknownMessageType {
        /// The unrecognized `type` value.
        message_type: String,
    },

    /// An outbound payload was not a JSON object.
    #[error("invalid request payload: {0}")]
    InvalidPayload(String),
}

impl SessionError {
    /// Build a timeout error.
    #[must_use]
    pub fn timeout(request_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            request_id: request_id.into(),
            timeout_ms,
        }
    }

    /// Build a malformed payload error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::ConnectionLost { .. } => "CONNECTION_LOST",
            Self::MalformedPayload { .. } => "MALFORMED_PAYLOAD",
            Self::UnknownMessageType { .. } => "UNKNOWN_MESSAGE_TYPE",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ValidationError
// ─────────────────────────────────────────────────────────────────────────────

/// Rejected command input.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A name field exceeds the device's character limit.
    #[error("{field} cannot exceed {max} characters (got {len})")]
    NameTooLong {
        /// Which field.
        field: &'static str,
        /// The limit.
        max: usize,
        /// Actual length in characters.
        len: usize,
    },

    /// A required text field is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Which field.
        field: &'static str,
    },

    /// Not a dotted-quad IPv4 address.
    #[error("invalid IPv4 address: {0}")]
    InvalidIpAddress(String),

    /// Not a usable TCP port.
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// SmartBoat and custom MQTT were both enabled.
    #[error("smartboat and custom MQTT cannot both be enabled")]
    ConflictingMqttModes,

    /// A numeric value is outside its permitted range.
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        /// Which field.
        field: &'static str,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
        /// Offending value.
        value: f64,
    },

    /// Minimum threshold is not below the maximum.
    #[error("minimum voltage {min}V must be below maximum voltage {max}V")]
    InvertedRange {
        /// Minimum voltage.
        min: f64,
        /// Maximum voltage.
        max: f64,
    },

    /// Unrecognized voltmeter/shunt configuration mode.
    #[error("unknown config mode: {0}")]
    UnknownConfigMode(String),

    /// Unsupported nominal system voltage.
    #[error("unsupported system voltage: {0}V")]
    UnsupportedSystemVoltage(u8),
}

impl ValidationError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NameTooLong { .. } => "NAME_TOO_LONG",
            Self::Empty { .. } => "EMPTY_FIELD",
            Self::InvalidIpAddress(_) => "INVALID_IP",
            Self::InvalidPort(_) => "INVALID_PORT",
            Self::ConflictingMqttModes => "CONFLICTING_MQTT_MODES",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::InvertedRange { .. } => "INVERTED_RANGE",
            Self::UnknownConfigMode(_) => "UNKNOWN_CONFIG_MODE",
            Self::UnsupportedSystemVoltage(_) => "UNSUPPORTED_SYSTEM_VOLTAGE",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
