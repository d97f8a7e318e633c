//! Settings.
//!
//! Parsed from TOML; every key is optional:
//!
//! ```toml
//! database_url = "route_sync.db"
//! activation_period_days = 30
//! timezone = "Europe/Oslo"
//! batch_size = 1000
//! default_codespace = "UNK"
//! ```
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`load_settings_str`]
//! - Parse + validate from a file path: [`load_settings_path`]
//! - Resolve from the environment (`ROUTE_SYNC_CONFIG`, `DATABASE_URL`): [`Settings::from_env`]

use std::path::Path;

use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared_utils::env::{env_var_opt, get_env_var};

use crate::activation::DEFAULT_CODESPACE;
use crate::bulk::DEFAULT_BUFFER_SIZE;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "ROUTE_SYNC_CONFIG";
/// Environment variable overriding [`Settings::database_url`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// SQLite database path.
    pub database_url: String,
    /// Days after today that activation covers by default.
    pub activation_period_days: u64,
    /// IANA timezone used to compute today's date.
    pub timezone: String,
    /// Rows buffered per table before a bulk insert.
    pub batch_size: usize,
    /// Codespace for journey refs without one.
    pub default_codespace: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "route_sync.db".to_string(),
            activation_period_days: 30,
            timezone: "Europe/Oslo".to_string(),
            batch_size: DEFAULT_BUFFER_SIZE,
            default_codespace: DEFAULT_CODESPACE.to_string(),
        }
    }
}

impl Settings {
    /// Check values that serde cannot.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            bail!("database_url cannot be empty");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.activation_period_days == 0 {
            bail!("activation_period_days must be at least 1");
        }
        if self.default_codespace.trim().is_empty() || self.default_codespace.contains(':') {
            bail!(
                "default_codespace `{}` must be non-empty and contain no ':'",
                self.default_codespace
            );
        }
        self.tz()?;
        Ok(())
    }

    /// Parsed timezone.
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone `{}`: {e}", self.timezone))
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> anyhow::Result<NaiveDate> {
        Ok(Utc::now().with_timezone(&self.tz()?).date_naive())
    }

    /// Settings from the file named by `ROUTE_SYNC_CONFIG` (defaults when unset), with
    /// `DATABASE_URL` applied on top.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut settings = match get_env_var(CONFIG_ENV) {
            Ok(path) => load_settings_path(path)?,
            Err(_) => Settings::default(),
        };
        if let Some(url) = env_var_opt(DATABASE_URL_ENV) {
            settings.database_url = url;
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Parse and validate settings from a TOML string.
pub fn load_settings_str(toml_str: &str) -> anyhow::Result<Settings> {
    let settings: Settings = toml::from_str(toml_str).context("failed to parse settings TOML")?;
    settings.validate()?;
    Ok(settings)
}

/// Read, parse and validate a settings file.
pub fn load_settings_path(path: impl AsRef<Path>) -> anyhow::Result<Settings> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read settings file {}", path.as_ref().display()))?;
    load_settings_str(&text)
}
