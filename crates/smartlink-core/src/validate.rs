//! Input checks applied before a command leaves the client.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ValidationError;

/// Character limit the firmware enforces on every name field.
pub const MAX_NAME_LEN: usize = 16;

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    let octet = "(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)";
    Regex::new(&format!(r"^{octet}\.{octet}\.{octet}\.{octet}$")).expect("valid regex")
});

/// Reject empty names and names longer than [`MAX_NAME_LEN`] characters.
pub fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(ValidationError::Empty { field });
    }
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            field,
            max: MAX_NAME_LEN,
            len,
        });
    }
    Ok(())
}

/// Whether `ip` is a dotted-quad IPv4 address.
pub fn is_valid_ipv4(ip: &str) -> bool {
    IPV4.is_match(ip)
}

/// Reject anything that is not a dotted-quad IPv4 address.
pub fn validate_ipv4(ip: &str) -> Result<(), ValidationError> {
    if is_valid_ipv4(ip) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIpAddress(ip.to_owned()))
    }
}

/// Parse a broker port (1–65535).
pub fn parse_mqtt_port(raw: &str) -> Result<u16, ValidationError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ValidationError::InvalidPort(raw.to_owned())),
    }
}
