//! Configuration schema definitions.
//!
//! Two documents are described here: the proxy settings (TOML, read once at
//! startup) and the rule file (JSON or TOML, reloaded while running).
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::{Balancing, GroupOptions};

/// Root settings for the router process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Rule file location and reload behaviour.
    pub rules: RulesConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Rule file settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Path to the rule file. `.toml` selects the TOML format, anything else JSON.
    pub path: String,

    /// Reload the rule file when it changes on disk.
    pub watch: bool,

    /// Quiet period after a change event before reloading, in milliseconds.
    pub debounce_ms: u64,

    /// Load balancing algorithm used inside each backend group.
    pub balancing: Balancing,

    /// Maximum concurrent requests per backend.
    pub max_backend_connections: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: "rules.json".to_string(),
            watch: true,
            debounce_ms: 50,
            balancing: Balancing::RoundRobin,
            max_backend_connections: 100,
        }
    }
}

impl RulesConfig {
    /// Options used to build backend groups from the rule file.
    pub fn group_options(&self) -> GroupOptions {
        GroupOptions {
            balancing: self.balancing,
            max_connections: self.max_backend_connections,
        }
    }
}

/// Timeout configuration for upstream requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One record of the rule file: a domain pattern and its backends.
///
/// Field names are accepted capitalized (`Domain`, `Backends`) or lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleRecord {
    #[serde(alias = "Domain")]
    pub domain: String,

    #[serde(alias = "Backends")]
    pub backends: Vec<String>,
}

/// TOML rule file layout: a list of `[[rule]]` tables.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlRuleFile {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleRecord>,
}
