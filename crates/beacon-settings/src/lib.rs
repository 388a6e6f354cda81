//! # beacon-settings
//!
//! Layered configuration for the beacon gateway.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BeaconSettings::default()`]
//! 2. **Settings file**: `$BEACON_SETTINGS` or `~/.beacon/settings.json`
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `BEACON_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_overrides, deep_merge, load_settings_from_path, load_with_env, settings_path};
pub use types::{BeaconSettings, LogFormat, LoggingSettings, ServerSettings};
