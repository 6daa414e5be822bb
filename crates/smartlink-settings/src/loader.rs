//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SmartlinkSettings::default()`]
//! 2. If `~/.smartlink/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SMARTLINK_*` environment variable overrides (highest priority)
//! 4. Reject combinations the session cannot run with
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::SmartlinkSettings;

/// Resolve the path to the settings file (`~/.smartlink/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".smartlink").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SmartlinkSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SmartlinkSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Load from `path`, reading overrides through `env` instead of the process
/// environment.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<SmartlinkSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(SmartlinkSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SmartlinkSettings = serde_json::from_value(merged)?;
    apply_env_overrides_from(&mut settings, env);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides read through `env`.
///
/// - Integers must be valid and within the variable's range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are ignored with a warning (fall back to file/default)
pub fn apply_env_overrides_from<F>(settings: &mut SmartlinkSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let reader = EnvReader { env };

    // ── Device ──────────────────────────────────────────────────────
    if let Some(v) = reader.string("SMARTLINK_DEVICE_URL") {
        settings.device.url = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = reader.u64("SMARTLINK_RECONNECT_BASE_MS", 1, 60_000) {
        settings.session.reconnect_base_delay_ms = v;
    }
    if let Some(v) = reader.u64("SMARTLINK_RECONNECT_MAX_MS", 1, 600_000) {
        settings.session.reconnect_max_delay_ms = v;
    }
    if let Some(v) = reader.u64("SMARTLINK_HEARTBEAT_INTERVAL_MS", 1000, 600_000) {
        settings.session.heartbeat_interval_ms = v;
    }
    if let Some(v) = reader.u64("SMARTLINK_REQUEST_TIMEOUT_MS", 100, 600_000) {
        settings.session.request_timeout_ms = v;
    }
    if let Some(v) = reader.bool("SMARTLINK_FAIL_PENDING_ON_DISCONNECT") {
        settings.session.fail_pending_on_disconnect = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = reader.string("SMARTLINK_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject settings the session cannot run with.
pub fn validate(settings: &SmartlinkSettings) -> Result<()> {
    let session = &settings.session;
    if session.reconnect_max_delay_ms < session.reconnect_base_delay_ms {
        return Err(SettingsError::InvalidValue(format!(
            "reconnectMaxDelayMs ({}) is below reconnectBaseDelayMs ({})",
            session.reconnect_max_delay_ms, session.reconnect_base_delay_ms
        )));
    }
    if session.heartbeat_interval_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "heartbeatIntervalMs must be positive".into(),
        ));
    }
    if session.request_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "requestTimeoutMs must be positive".into(),
        ));
    }
    if settings.device.url.trim().is_empty() {
        return Err(SettingsError::InvalidValue("device.url is empty".into()));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    env: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.env)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.env)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use smartlink_core::logging::capture_logs;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"session": {"a": 1, "b": 2}});
        let source = serde_json::json!({"session": {"a": 10}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["session"]["a"], 10);
        assert_eq!(merged["session"]["b"], 2);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load ────────────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/settings.json");
        let settings = load_with_env(path, no_env).unwrap();
        assert_eq!(settings, SmartlinkSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"session": {"requestTimeoutMs": 8000}, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.session.request_timeout_ms, 8000);
        assert_eq!(settings.session.heartbeat_interval_ms, 30_000);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.device.url, "ws://192.168.4.1/ws");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        assert_matches!(load_with_env(&path, no_env), Err(SettingsError::Json(_)));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"session": {"heartbeatIntervalMs": "soon"}}"#).unwrap();

        assert_matches!(load_with_env(&path, no_env), Err(SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_inverted_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"session": {"reconnectBaseDelayMs": 8000, "reconnectMaxDelayMs": 2000}}"#,
        )
        .unwrap();

        assert_matches!(
            load_with_env(&path, no_env),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("reconnectMaxDelayMs")
        );
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"device": {"url": "ws://file/ws"}}"#).unwrap();

        let env = env_of(&[
            ("SMARTLINK_DEVICE_URL", "ws://10.1.1.1/ws"),
            ("SMARTLINK_REQUEST_TIMEOUT_MS", "2500"),
            ("SMARTLINK_FAIL_PENDING_ON_DISCONNECT", "yes"),
            ("SMARTLINK_LOG_LEVEL", "smartlink_session=trace"),
        ]);
        let settings = load_with_env(&path, env).unwrap();
        assert_eq!(settings.device.url, "ws://10.1.1.1/ws");
        assert_eq!(settings.session.request_timeout_ms, 2500);
        assert!(settings.session.fail_pending_on_disconnect);
        assert_eq!(settings.logging.level, "smartlink_session=trace");
    }

    #[test]
    fn invalid_env_values_are_ignored_with_warning() {
        let (logs, _guard) = capture_logs();
        let mut settings = SmartlinkSettings::default();
        apply_env_overrides_from(
            &mut settings,
            env_of(&[
                ("SMARTLINK_HEARTBEAT_INTERVAL_MS", "10"),
                ("SMARTLINK_RECONNECT_BASE_MS", "fast"),
                ("SMARTLINK_FAIL_PENDING_ON_DISCONNECT", "maybe"),
                ("SMARTLINK_DEVICE_URL", ""),
            ]),
        );
        assert_eq!(settings, SmartlinkSettings::default());
        assert_eq!(logs.count_messages("env var, ignoring"), 3);
    }

    #[test]
    fn backoff_env_overrides() {
        let mut settings = SmartlinkSettings::default();
        apply_env_overrides_from(
            &mut settings,
            env_of(&[
                ("SMARTLINK_RECONNECT_BASE_MS", "500"),
                ("SMARTLINK_RECONNECT_MAX_MS", "8000"),
                ("SMARTLINK_HEARTBEAT_INTERVAL_MS", "15000"),
            ]),
        );
        assert_eq!(settings.session.reconnect_base_delay_ms, 500);
        assert_eq!(settings.session.reconnect_max_delay_ms, 8000);
        assert_eq!(settings.session.heartbeat_interval_ms, 15_000);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "NO"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("1000", 1000, 600_000), Some(1000));
        assert_eq!(parse_u64_range("999", 1000, 600_000), None);
        assert_eq!(parse_u64_range("600001", 1000, 600_000), None);
        assert_eq!(parse_u64_range("-5", 0, 10), None);
    }

    #[test]
    fn settings_path_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".smartlink/settings.json"));
    }
}
