//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BeaconSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `BEACON_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{BeaconSettings, LogFormat};

/// Env var naming an explicit settings file.
pub const SETTINGS_PATH_ENV: &str = "BEACON_SETTINGS";

/// Resolve the settings file path: `$BEACON_SETTINGS`, else `~/.beacon/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os(SETTINGS_PATH_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beacon").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<BeaconSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// [`load_settings_from_path`] with an injectable environment lookup.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<BeaconSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(BeaconSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: BeaconSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, env);
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
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides read through `env`. Invalid values are logged and ignored.
pub fn apply_overrides<F>(settings: &mut BeaconSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| env(name).filter(|v| !v.is_empty());

    if let Some(v) = read("BEACON_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("BEACON_PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "BEACON_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("BEACON_IDLE_TIMEOUT_SECS") {
        match parse_u64_range(&v, 1, 86_400) {
            Some(secs) => settings.server.idle_timeout_secs = Some(secs),
            None => {
                warn!(key = "BEACON_IDLE_TIMEOUT_SECS", value = %v, "invalid timeout env var, ignoring");
            }
        }
    }
    if let Some(v) = read("BEACON_NOTIFY_ENDPOINT") {
        match parse_bool(&v) {
            Some(on) => settings.server.notify_endpoint = on,
            None => {
                warn!(key = "BEACON_NOTIFY_ENDPOINT", value = %v, "invalid boolean env var, ignoring");
            }
        }
    }
    if let Some(v) = read("BEACON_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("BEACON_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => warn!(key = "BEACON_LOG_FORMAT", value = %v, "invalid log format env var, ignoring"),
        }
    }
}

fn validate(settings: &BeaconSettings) -> Result<()> {
    let server = &settings.server;
    if server.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "server.sendQueueCapacity must be greater than zero".into(),
        ));
    }
    if server.max_message_size == 0 {
        return Err(SettingsError::InvalidValue(
            "server.maxMessageSize must be greater than zero".into(),
        ));
    }
    if server.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "server.heartbeatIntervalSecs must be greater than zero".into(),
        ));
    }
    if server.heartbeat_timeout_secs < server.heartbeat_interval_secs {
        return Err(SettingsError::InvalidValue(format!(
            "server.heartbeatTimeoutSecs ({}) is shorter than heartbeatIntervalSecs ({})",
            server.heartbeat_timeout_secs, server.heartbeat_interval_secs
        )));
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

/// Parse `pretty` or `json` (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "pretty" => Some(LogFormat::Pretty),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"host": "a", "port": 1}});
        let source = serde_json::json!({"server": {"port": 2}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["host"], "a");
        assert_eq!(merged["server"]["port"], 2);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let merged = deep_merge(target, serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"a": [1, 2, 3]});
        let merged = deep_merge(target, serde_json::json!({"a": [4]}));
        assert_eq!(merged["a"], serde_json::json!([4]));
    }

    // ── load_with_env ───────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_with_env(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings, BeaconSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 7000, "idleTimeoutSecs": 120}, "logging": {"modules": {"beacon_server": "debug"}}}"#,
        )
        .unwrap();

        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.server.idle_timeout_secs, Some(120));
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.logging.modules["beacon_server"], "debug");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        assert_matches!(load_with_env(&path, no_env), Err(SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_zero_queue_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"sendQueueCapacity": 0}}"#).unwrap();

        assert_matches!(
            load_with_env(&path, no_env),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("sendQueueCapacity")
        );
    }

    #[test]
    fn load_rejects_timeout_below_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"heartbeatIntervalSecs": 60, "heartbeatTimeoutSecs": 10}}"#,
        )
        .unwrap();

        assert_matches!(
            load_with_env(&path, no_env),
            Err(SettingsError::InvalidValue(_))
        );
    }

    #[test]
    fn env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 7000}}"#).unwrap();

        let env = env_of(&[("BEACON_PORT", "7100"), ("BEACON_LOG_FORMAT", "JSON")]);
        let settings = load_with_env(&path, env).unwrap();
        assert_eq!(settings.server.port, 7100);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    // ── apply_overrides ─────────────────────────────────────────────

    #[test]
    fn overrides_apply_every_key() {
        let mut settings = BeaconSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("BEACON_HOST", "0.0.0.0"),
                ("BEACON_PORT", "8088"),
                ("BEACON_IDLE_TIMEOUT_SECS", "300"),
                ("BEACON_NOTIFY_ENDPOINT", "off"),
                ("BEACON_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8088);
        assert_eq!(settings.server.idle_timeout_secs, Some(300));
        assert!(!settings.server.notify_endpoint);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = BeaconSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("BEACON_PORT", "0"),
                ("BEACON_NOTIFY_ENDPOINT", "maybe"),
                ("BEACON_LOG_FORMAT", "xml"),
                ("BEACON_HOST", ""),
            ]),
        );
        assert_eq!(settings, BeaconSettings::default());
    }

    // ── Parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "1", "YES", "On"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("9999", 1, 65535), Some(9999));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u16_range("abc", 1, 65535), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("60", 1, 100), Some(60));
        assert_eq!(parse_u64_range("101", 1, 100), None);
    }
}
