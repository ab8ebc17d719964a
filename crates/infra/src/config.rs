//! Environment-driven configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use clusterview_jobs::ResolverConfig;
use clusterview_stream::RetryPolicy;
use clusterview_updates::UpdateConfig;

use crate::settings_file::default_settings_path;

pub const UPSTREAM_URL: &str = "CLUSTERVIEW_UPSTREAM_URL";
pub const POLL_INTERVAL_MS: &str = "CLUSTERVIEW_POLL_INTERVAL_MS";
pub const VERSION_CHECK_INTERVAL_MS: &str = "CLUSTERVIEW_VERSION_CHECK_INTERVAL_MS";
pub const VERSION_CHECK_COOLDOWN_MS: &str = "CLUSTERVIEW_VERSION_CHECK_COOLDOWN_MS";
pub const PACKAGE_NAME: &str = "CLUSTERVIEW_PACKAGE_NAME";
pub const SETTINGS_PATH: &str = "CLUSTERVIEW_SETTINGS_PATH";
pub const FETCH_RETRIES: &str = "CLUSTERVIEW_FETCH_RETRIES";
pub const LISTEN_ADDR: &str = "CLUSTERVIEW_LISTEN_ADDR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("no data directory available; set CLUSTERVIEW_SETTINGS_PATH")]
    NoSettingsPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub upstream_url: String,
    pub listen_addr: SocketAddr,
    pub poll_interval: Duration,
    pub version_check_interval: Duration,
    pub version_check_cooldown: Duration,
    pub package_name: String,
    pub settings_path: PathBuf,
    pub fetch_retries: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process env in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            if value.is_none() {
                debug!(key, "not set; using default");
            }
            value
        };

        let settings_path = match var(SETTINGS_PATH) {
            Some(path) => PathBuf::from(path),
            None => default_settings_path().ok_or(ConfigError::NoSettingsPath)?,
        };

        let upstream_url = var(UPSTREAM_URL).unwrap_or_else(|| {
            warn!("{UPSTREAM_URL} not set; using local dev default");
            "http://127.0.0.1:8080".to_string()
        });

        Ok(Self {
            upstream_url: upstream_url.trim_end_matches('/').to_string(),
            listen_addr: parse(LISTEN_ADDR, var(LISTEN_ADDR), "0.0.0.0:8090")?,
            poll_interval: millis(POLL_INTERVAL_MS, var(POLL_INTERVAL_MS), 2000)?,
            version_check_interval: millis(
                VERSION_CHECK_INTERVAL_MS,
                var(VERSION_CHECK_INTERVAL_MS),
                2000,
            )?,
            version_check_cooldown: millis(
                VERSION_CHECK_COOLDOWN_MS,
                var(VERSION_CHECK_COOLDOWN_MS),
                24 * 60 * 60 * 1000,
            )?,
            package_name: var(PACKAGE_NAME).unwrap_or_else(|| "dcos-ui".to_string()),
            settings_path,
            fetch_retries: parse(FETCH_RETRIES, var(FETCH_RETRIES), "4")?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.fetch_retries, Duration::ZERO)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            poll_interval: self.poll_interval,
            retry: self.retry_policy(),
        }
    }

    pub fn update_config(&self) -> UpdateConfig {
        UpdateConfig {
            interval: self.version_check_interval,
            cooldown: self.version_check_cooldown,
            retry: self.retry_policy(),
        }
    }
}

fn parse<T>(key: &'static str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value.as_deref().unwrap_or(default);
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: format!("{raw:?}: {e}"),
    })
}

/// A positive number of milliseconds.
fn millis(key: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let ms: u64 = match value {
        Some(raw) => parse(key, Some(raw), "")?,
        None => default,
    };
    if ms == 0 {
        return Err(ConfigError::Invalid {
            key,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}
