//! Runtime settings
//!
//! Resolved in order of increasing priority:
//! 1. Built-in defaults
//! 2. JSON file (~/.config/ferry/settings.json), if present
//! 3. Environment variables (a `.env` file is loaded by the binary)
//!
//! The provider secret key may only come from the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::provider::HttpProvider;
use crate::sync::RetryPolicy;

/// Settings filename in the ferry config directory
const SETTINGS_FILE: &str = "settings.json";

pub const SECRET_KEY_VAR: &str = "CLERK_SECRET_KEY";
pub const API_URL_VAR: &str = "CLERK_API_URL";
pub const DELAY_VAR: &str = "DELAY_MS";
pub const RETRY_DELAY_VAR: &str = "RETRY_DELAY_MS";

const OFFLINE_SECRET_KEY: &str = "sk_offline";

/// Optional overrides read from the settings file
#[derive(Debug, Default, Deserialize)]
pub struct SettingsFile {
    pub api_url: Option<String>,
    pub delay_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub page_size: Option<usize>,
}

/// Overrides read from environment variables
#[derive(Debug, Default)]
pub struct EnvOverrides {
    pub secret_key: Option<String>,
    pub api_url: Option<String>,
    pub delay_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            secret_key: config::env_string(SECRET_KEY_VAR),
            api_url: config::env_string(API_URL_VAR),
            delay_ms: config::env_parse(DELAY_VAR)?,
            retry_delay_ms: config::env_parse(RETRY_DELAY_VAR)?,
        })
    }
}

/// Everything a run needs from its environment
#[derive(Clone)]
pub struct Settings {
    pub secret_key: String,
    pub api_url: String,
    /// Pause between distinct records
    pub delay: Duration,
    /// Cooldown after a rate-limited request
    pub retry_delay: Duration,
    /// Listing page size, when the settings file sets one
    pub page_size: Option<usize>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("secret_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("delay", &self.delay)
            .field("retry_delay", &self.retry_delay)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl Settings {
    /// Load settings from the settings file and the environment
    ///
    /// Fails when the secret key is missing or an override is malformed.
    pub fn load() -> Result<Self> {
        Self::from_parts(Self::load_file()?, EnvOverrides::from_env()?)
    }

    /// Like [`Settings::load`], but a missing secret key is replaced by a
    /// placeholder; for runs that never reach the network
    pub fn load_offline() -> Result<Self> {
        let mut env = EnvOverrides::from_env()?;
        env.secret_key.get_or_insert_with(|| OFFLINE_SECRET_KEY.to_string());
        Self::from_parts(Self::load_file()?, env)
    }

    fn load_file() -> Result<SettingsFile> {
        if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)
        } else {
            Ok(SettingsFile::default())
        }
    }

    /// Combine file and environment overrides over the defaults
    pub fn from_parts(file: SettingsFile, env: EnvOverrides) -> Result<Self> {
        let secret_key = env.secret_key.with_context(|| {
            format!("{SECRET_KEY_VAR} is required. Copy .env.example to .env and add your key.")
        })?;

        Ok(Self {
            secret_key,
            api_url: env
                .api_url
                .or(file.api_url)
                .unwrap_or_else(|| HttpProvider::DEFAULT_BASE_URL.to_string()),
            delay: env
                .delay_ms
                .or(file.delay_ms)
                .map_or(RetryPolicy::DEFAULT_PACING, Duration::from_millis),
            retry_delay: env
                .retry_delay_ms
                .or(file.retry_delay_ms)
                .map_or(RetryPolicy::DEFAULT_COOLDOWN, Duration::from_millis),
            page_size: file.page_size.filter(|&size| size > 0),
        })
    }

    /// Path of the optional settings file
    pub fn default_settings_path() -> Option<PathBuf> {
        config::config_path(SETTINGS_FILE)
    }

    /// Retry policy using the configured cooldown and pacing
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            cooldown: self.retry_delay,
            pacing: Some(self.delay).filter(|d| !d.is_zero()),
            ..Default::default()
        }
    }

    /// HTTP provider client for these settings
    pub fn provider(&self) -> HttpProvider {
        HttpProvider::new(&self.api_url, &self.secret_key)
    }
}
