//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::failover::ApiResolutionSettings;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// Primary API endpoint and request defaults.
    pub api: ApiSection,

    /// Alternate hostnames used while disconnected.
    pub failover: FailoverConfig,

    /// HTTP client settings.
    pub transport: TransportConfig,

    /// Where the failover hostname is persisted.
    pub storage: StorageConfig,

    pub observability: ObservabilityConfig,
}

/// Primary API endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiSection {
    /// Hostname used while connected (may carry a port).
    pub primary_hostname: String,

    /// URL scheme for every request.
    pub scheme: String,

    pub ignore_ssl_errors: bool,

    /// Log full response bodies at debug level.
    pub log_api_response: bool,

    /// Timeout for requests built by the JSON helpers, in milliseconds.
    pub default_timeout_ms: u64,
}

impl ApiSection {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            primary_hostname: "api.example.com".to_string(),
            scheme: "https".to_string(),
            ignore_ssl_errors: false,
            log_api_response: false,
            default_timeout_ms: 10_000,
        }
    }
}

/// Failover candidates.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FailoverConfig {
    /// Candidate hostnames, tried in order.
    pub hostnames: Vec<String>,

    pub resolution: ApiResolutionSettings,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    pub user_agent: String,

    /// DNS servers passed with every exchange; empty means the system resolver.
    pub dns_servers: Vec<IpAddr>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("server-api/{}", env!("CARGO_PKG_VERSION")),
            dns_servers: Vec::new(),
        }
    }
}

/// Persistent store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store file. Empty keeps everything in memory.
    pub path: String,

    /// Secret the encryption key is derived from.
    pub secret: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            // WARNING: placeholder, set a per-install secret.
            secret: "CHANGE_ME".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// tracing-subscriber filter, overridden by RUST_LOG.
    pub log_filter: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: crate::observability::logging::DEFAULT_LOG_FILTER.to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: ApiConfig = toml::from_str(
            r#"
            [api]
            primary_hostname = "api.vpn.test"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.primary_hostname, "api.vpn.test");
        assert_eq!(config.api.scheme, "https");
        assert_eq!(config.api.default_timeout(), Duration::from_secs(10));
        assert!(config.failover.hostnames.is_empty());
        assert!(config.failover.resolution.automatic);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_full_config() {
        let config: ApiConfig = toml::from_str(
            r#"
            [api]
            primary_hostname = "api.vpn.test"
            scheme = "http"
            ignore_ssl_errors = true
            default_timeout_ms = 2500

            [failover]
            hostnames = ["alt1.vpn.test", "alt2.vpn.test"]

            [failover.resolution]
            automatic = false
            manual_address = "manual.vpn.test"

            [transport]
            dns_servers = ["1.1.1.1", "9.9.9.9"]

            [storage]
            path = "/tmp/server-api.json"
            secret = "s3cret"
            "#,
        )
        .unwrap();

        assert!(config.api.ignore_ssl_errors);
        assert_eq!(config.failover.hostnames.len(), 2);
        assert_eq!(config.failover.resolution.manual_address, "manual.vpn.test");
        assert_eq!(config.transport.dns_servers.len(), 2);
        assert_eq!(config.storage.secret, "s3cret");
    }
}
