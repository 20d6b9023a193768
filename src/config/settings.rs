//! Application settings loading from retainer.toml
//!
//! The settings file seeds the organization settings row on first start and tunes the
//! scheduled close run. Every field has a default, so a missing file is not an error.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::{path::Path, time::Duration};

/// Default settings file, overridable with `RETAINER_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "retainer.toml";

/// Configuration structure representing the entire retainer.toml file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub organization: OrganizationSettings,
    pub closing: ClosingSettings,
}

/// `[organization]` - seeded into the organization settings table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OrganizationSettings {
    /// Display name copied onto invoices
    pub name: String,
    /// Invoice currency; USD when absent
    pub default_currency: Option<String>,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            name: "My Organization".to_string(),
            default_currency: None,
        }
    }
}

/// `[closing]` - scheduled period close run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClosingSettings {
    /// How long a close waits for another close of the same agreement
    pub lock_timeout_ms: u64,
    /// Member recorded as `closed_by` for scheduled closes
    pub actor_id: i64,
}

impl Default for ClosingSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5000,
            actor_id: 0,
        }
    }
}

impl ClosingSettings {
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Parses settings from a TOML string.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid TOML for [`Settings`].
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!(
            "Failed to read settings file {}: {e}",
            path.as_ref().display()
        ),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `path`, using defaults when the file does not exist.
///
/// A file that exists but cannot be parsed is still an error.
pub fn load_settings_or_default<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(path = %path.display(), "No settings file found, using defaults");
        return Ok(Settings::default());
    }
    load_settings(path)
}

/// Settings path from `RETAINER_CONFIG`, or [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn settings_path() -> String {
    std::env::var("RETAINER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
