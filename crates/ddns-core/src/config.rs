//! Configuration types for the DDNS system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default DynDNS2 update endpoint
pub const DEFAULT_UPDATE_URL: &str = "https://domains.google.com/nic/update";

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Path of the JSON credentials file
    pub credentials_path: PathBuf,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Network restart configuration
    #[serde(default)]
    pub restart: RestartConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Create a new configuration with defaults for everything but the hostname
    pub fn new(credentials_path: impl Into<PathBuf>, hostname: impl Into<String>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            provider: ProviderConfig::new(hostname),
            restart: RestartConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.credentials_path.as_os_str().is_empty() {
            return Err(crate::Error::config("Credentials path cannot be empty"));
        }

        self.provider.validate()?;
        self.restart.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// DynDNS2 provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Update endpoint, e.g. `https://domains.google.com/nic/update`
    #[serde(default = "default_update_url")]
    pub update_url: String,

    /// Hostname passed in the `hostname` query parameter
    pub hostname: String,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    /// TLS trust settings
    #[serde(default)]
    pub tls: TlsConfig,
}

impl ProviderConfig {
    /// Create a provider configuration for `hostname` with default endpoint and timeout
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            update_url: default_update_url(),
            hostname: hostname.into(),
            timeout_secs: default_http_timeout_secs(),
            tls: TlsConfig::default(),
        }
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.update_url.is_empty() {
            return Err(crate::Error::config("Update URL cannot be empty"));
        }
        if !self.update_url.starts_with("https://") && !self.update_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Update URL must use HTTP or HTTPS scheme. Got: {}",
                self.update_url
            )));
        }
        if self.hostname.is_empty() {
            return Err(crate::Error::config("Hostname cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        Ok(())
    }
}

/// TLS trust configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Extra PEM bundle added to the bundled root certificates
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,

    /// Verify server certificates (disable only for self-signed endpoints)
    #[serde(default = "default_verify_certificates")]
    pub verify_certificates: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ca_bundle: None,
            verify_certificates: default_verify_certificates(),
        }
    }
}

/// Network restart configuration
///
/// Commands are argv vectors; the first element is the program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    /// Reloads the service manager configuration (failure is tolerated)
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,

    /// Restarts the networking service
    #[serde(default = "default_restart_command")]
    pub restart_command: Vec<String>,

    /// Upper bound for each command (in seconds)
    #[serde(default = "default_restart_timeout_secs")]
    pub timeout_secs: u64,
}

impl RestartConfig {
    /// Validate the restart configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.restart_command.first().is_none_or(|p| p.is_empty()) {
            return Err(crate::Error::config("Restart command cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Restart timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            reload_command: default_reload_command(),
            restart_command: default_restart_command(),
            timeout_secs: default_restart_timeout_secs(),
        }
    }
}

/// What the engine does when a failure it cannot recover from happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the engine with an error
    Exit,
    /// Log the failure and wait for the next tick
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exit" => Ok(Self::Exit),
            "continue" => Ok(Self::Continue),
            other => Err(crate::Error::config(format!(
                "Unknown failure policy '{}'. Valid: exit, continue",
                other
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between scheduled updates (in seconds)
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Handling of a failed update at startup
    #[serde(default = "default_startup_failure")]
    pub startup_failure: FailurePolicy,

    /// Handling of a failed retry after a successful network restart
    #[serde(default = "default_post_restart_failure")]
    pub post_restart_failure: FailurePolicy,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 100 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.update_interval_secs == 0 {
            return Err(crate::Error::config("Update interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            startup_failure: default_startup_failure(),
            post_restart_failure: default_post_restart_failure(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_update_url() -> String {
    DEFAULT_UPDATE_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_verify_certificates() -> bool {
    true
}

fn default_reload_command() -> Vec<String> {
    ["sudo", "systemctl", "daemon-reload"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_restart_command() -> Vec<String> {
    ["sudo", "systemctl", "restart", "networking.service"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_restart_timeout_secs() -> u64 {
    60
}

fn default_update_interval_secs() -> u64 {
    180
}

fn default_startup_failure() -> FailurePolicy {
    FailurePolicy::Continue
}

fn default_post_restart_failure() -> FailurePolicy {
    FailurePolicy::Exit
}

fn default_event_channel_capacity() -> usize {
    100
}
