//! # smartlink-settings
//!
//! Layered configuration for the smartlink device client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`SmartlinkSettings::default()`]
//! 2. **User file** — `~/.smartlink/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `SMARTLINK_*` overrides (highest priority)
//!
//! There is no global settings instance: the binary loads settings once and
//! hands the relevant parts to each session it builds.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, load_with_env, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = SmartlinkSettings::default();
        let _path = settings_path();
        let merged = deep_merge(serde_json::json!({"x": 1}), serde_json::json!({"y": 2}));
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }
}
