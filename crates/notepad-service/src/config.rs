//! Notepad service configuration.
//!
//! Configuration is loaded from environment variables. The Redis URL and pad
//! host API keys are redacted in Debug output.

use crate::models::PadHost;
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Default key prefix of the per-host active session sets.
pub const DEFAULT_ACTIVE_SESSION_KEY_PREFIX: &str = "pnm:etherpad:";

/// Default key prefix of room metadata records.
pub const DEFAULT_ROOM_METADATA_KEY_PREFIX: &str = "pnm:room:metadata:";

/// Pad host API version used in request paths.
pub const DEFAULT_PAD_API_VERSION: &str = "1.2.15";

/// Default timeout for a single pad host call in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// Default timeout for a single shared store call in seconds.
pub const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for both timeouts.
pub const MAX_TIMEOUT_SECONDS: u64 = 60;

/// Notepad service configuration.
#[derive(Clone)]
pub struct Config {
    /// Shared store URL. May embed credentials.
    pub redis_url: SecretString,

    /// HTTP bind address (default: "0.0.0.0:8090").
    pub bind_address: String,

    /// Configured pad hosts, in registry order.
    pub pad_hosts: Vec<PadHost>,

    /// Prefix of the per-host active session set keys.
    pub active_session_key_prefix: String,

    /// Prefix of the room metadata keys.
    pub room_metadata_key_prefix: String,

    /// Pad host API version (default: "1.2.15").
    pub pad_api_version: String,

    /// Timeout for one pad host call.
    pub request_timeout: Duration,

    /// Timeout for one shared store call.
    pub store_timeout: Duration,

    /// Seconds to wait after a shutdown signal before exiting.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host_ids: Vec<&str> = self.pad_hosts.iter().map(|h| h.id.as_str()).collect();
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("pad_hosts", &host_ids)
            .field("active_session_key_prefix", &self.active_session_key_prefix)
            .field("room_metadata_key_prefix", &self.room_metadata_key_prefix)
            .field("pad_api_version", &self.pad_api_version)
            .field("request_timeout", &self.request_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid pad host configuration: {0}")]
    InvalidPadHosts(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis_url = SecretString::from(
            vars.get("REDIS_URL")
                .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL".to_string()))?
                .clone(),
        );

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let pad_hosts = match vars.get("NOTEPAD_HOSTS") {
            Some(raw) => parse_pad_hosts(raw)?,
            None => Vec::new(),
        };

        let active_session_key_prefix = vars
            .get("NOTEPAD_KEY_PREFIX")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ACTIVE_SESSION_KEY_PREFIX.to_string());

        let room_metadata_key_prefix = vars
            .get("NOTEPAD_ROOM_METADATA_PREFIX")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ROOM_METADATA_KEY_PREFIX.to_string());

        if active_session_key_prefix.is_empty() || room_metadata_key_prefix.is_empty() {
            return Err(ConfigError::InvalidValue(
                "Store key prefixes must not be empty".to_string(),
            ));
        }

        let pad_api_version = vars
            .get("NOTEPAD_API_VERSION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PAD_API_VERSION.to_string());

        let request_timeout = parse_timeout(
            vars,
            "NOTEPAD_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        let store_timeout = parse_timeout(
            vars,
            "NOTEPAD_STORE_TIMEOUT_SECONDS",
            DEFAULT_STORE_TIMEOUT_SECONDS,
        )?;

        let drain_seconds = if let Some(value_str) = vars.get("NOTEPAD_DRAIN_SECONDS") {
            value_str.parse().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "NOTEPAD_DRAIN_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            0
        };

        Ok(Config {
            redis_url,
            bind_address,
            pad_hosts,
            active_session_key_prefix,
            room_metadata_key_prefix,
            pad_api_version,
            request_timeout,
            store_timeout,
            drain_seconds,
        })
    }
}

/// Parse the `NOTEPAD_HOSTS` JSON array.
fn parse_pad_hosts(raw: &str) -> Result<Vec<PadHost>, ConfigError> {
    let hosts: Vec<PadHost> = serde_json::from_str(raw).map_err(|e| {
        ConfigError::InvalidPadHosts(format!("NOTEPAD_HOSTS must be a JSON array of hosts: {e}"))
    })?;

    let mut seen = HashSet::new();
    for host in &hosts {
        if host.id.is_empty() {
            return Err(ConfigError::InvalidPadHosts(
                "Pad host id must not be empty".to_string(),
            ));
        }
        if !seen.insert(host.id.as_str()) {
            return Err(ConfigError::InvalidPadHosts(format!(
                "Duplicate pad host id '{}'",
                host.id
            )));
        }
        if !(host.base_url.starts_with("http://") || host.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidPadHosts(format!(
                "Pad host '{}' must use an http:// or https:// URL",
                host.id
            )));
        }
    }

    Ok(hosts)
}

fn parse_timeout(
    vars: &HashMap<String, String>,
    name: &str,
    default_secs: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(Duration::from_secs(default_secs));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 || value > MAX_TIMEOUT_SECONDS {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be between 1 and {}, got {}",
            name, MAX_TIMEOUT_SECONDS, value
        )));
    }

    Ok(Duration::from_secs(value))
}
