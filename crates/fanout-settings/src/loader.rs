//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`FanoutSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `FANOUT_*` environment variable overrides
//! 4. Validate the result

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{FanoutSettings, LogLevel};

/// Resolve the path to the settings file (`~/.fanout/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".fanout").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<FanoutSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<FanoutSettings> {
    let mut settings = read_layers(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_layers(path: &Path) -> Result<FanoutSettings> {
    let defaults = serde_json::to_value(FanoutSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Reject settings the hub cannot run with.
pub fn validate(settings: &FanoutSettings) -> Result<()> {
    let server = &settings.server;
    if server.mailbox_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "server.mailboxCapacity must be at least 1".into(),
        ));
    }
    if server.command_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "server.commandQueueCapacity must be at least 1".into(),
        ));
    }
    if server.max_message_size == 0 {
        return Err(SettingsError::InvalidValue(
            "server.maxMessageSize must be at least 1".into(),
        ));
    }
    // The keepalive period is derived as 9/10 of this; below 10ms it rounds to nothing.
    if server.pong_wait_ms < 10 {
        return Err(SettingsError::InvalidValue(
            "server.pongWaitMs must be at least 10".into(),
        ));
    }
    if server.write_wait_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "server.writeWaitMs must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut FanoutSettings) {
    if let Some(v) = read_env_string("FANOUT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("FANOUT_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_usize("FANOUT_MAILBOX_CAPACITY", 1, 1_000_000) {
        settings.server.mailbox_capacity = v;
    }
    if let Some(v) = read_env_usize("FANOUT_MAX_MESSAGE_SIZE", 1, 64 * 1024 * 1024) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = read_env_u64("FANOUT_PONG_WAIT_MS", 10, 3_600_000) {
        settings.server.pong_wait_ms = v;
    }
    if let Some(v) = read_env_u64("FANOUT_WRITE_WAIT_MS", 1, 600_000) {
        settings.server.write_wait_ms = v;
    }
    if let Some(v) = read_env_bool("FANOUT_COALESCE") {
        settings.server.coalesce = v;
    }
    if let Some(v) = read_env_string("FANOUT_LOG_LEVEL") {
        match LogLevel::parse(&v) {
            Some(level) => settings.logging.level = level,
            None => tracing::warn!(key = "FANOUT_LOG_LEVEL", value = %v, "invalid log level, ignoring"),
        }
    }
    if let Some(v) = read_env_bool("FANOUT_LOG_JSON") {
        settings.logging.json = v;
    }
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

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let merged = deep_merge(json!({"a": 1, "b": 2}), json!({"b": 3}));
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn merge_nested_objects() {
        let merged = deep_merge(
            json!({"server": {"port": 1, "host": "h"}}),
            json!({"server": {"port": 2}}),
        );
        assert_eq!(merged, json!({"server": {"port": 2, "host": "h"}}));
    }

    #[test]
    fn merge_skips_nulls() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_replaces_arrays() {
        let merged = deep_merge(json!({"a": [1, 2]}), json!({"a": [3]}));
        assert_eq!(merged["a"], json!([3]));
    }

    // ── file loading (no env overrides involved) ────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = read_layers(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"mailboxCapacity":8},"logging":{"json":true}}"#)
            .unwrap();
        let settings = read_layers(&path).unwrap();
        assert_eq!(settings.server.mailbox_capacity, 8);
        assert_eq!(settings.server.max_message_size, 512);
        assert!(settings.logging.json);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_layers(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    // ── validation ──────────────────────────────────────────────────

    #[test]
    fn defaults_validate() {
        assert!(validate(&FanoutSettings::default()).is_ok());
    }

    #[test]
    fn zero_mailbox_rejected() {
        let mut settings = FanoutSettings::default();
        settings.server.mailbox_capacity = 0;
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("mailboxCapacity"));
    }

    #[test]
    fn tiny_pong_wait_rejected() {
        let mut settings = FanoutSettings::default();
        settings.server.pong_wait_ms = 5;
        assert!(matches!(
            validate(&settings),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    // ── parsing helpers ─────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "1", "YES", "on"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("5", 10, 100), None);
        assert_eq!(parse_u64_range("50", 10, 100), Some(50));
        assert_eq!(parse_usize_range("abc", 1, 10), None);
        assert_eq!(parse_usize_range("10", 1, 10), Some(10));
    }
}
