//! Configuration schema definitions.
//!
//! This module defines the service configuration of the gateway configuration
//! daemon. All types derive Serde traits for deserialization from TOML files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::layout::UserDomain;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Admin API settings.
    pub admin: AdminConfig,

    /// Where domain configuration files live.
    pub domains: DomainsConfig,

    /// How compiled plans are written and the gateway reloaded.
    pub apply: ApplyConfig,

    /// Certificate lookup for SSL termination.
    pub certificates: CertificatesConfig,

    /// The live gateway configuration shown by the layout view.
    pub gateway: GatewayFileConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token). Empty disables auth.
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            bind_address: "127.0.0.1:9091".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Domain configuration files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DomainsConfig {
    /// Directory holding one `.toml` or `.json` file per domain.
    pub dir: PathBuf,

    /// Reload, recompile and re-apply when the directory changes.
    pub watch: bool,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("domains"),
            watch: true,
        }
    }
}

/// Apply collaborator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Write plans and reload the gateway. When false, plans are only compiled.
    pub enabled: bool,

    /// Path the rendered gateway configuration is written to.
    pub output_path: PathBuf,

    /// Reload command as an argv vector; empty skips the reload step.
    pub reload_command: Vec<String>,

    /// Backend name the system sentinel renders as.
    pub system_backend: String,

    /// System backend for SSL passthrough domains; a `mode tcp` backend.
    pub system_tls_backend: String,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_path: PathBuf::from("gateway.domains.cfg"),
            reload_command: Vec::new(),
            system_backend: "web_backend".to_string(),
            system_tls_backend: "web_backend_tls".to_string(),
        }
    }
}

/// Certificate lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificatesConfig {
    /// Directory searched for `<domain>.pem` bundles.
    pub dir: PathBuf,
}

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("certs"),
        }
    }
}

/// Live gateway configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayFileConfig {
    /// Full gateway configuration, read on every layout request.
    pub path: PathBuf,

    /// Domains hosted outside this daemon, drawn next to their pools.
    pub user_domains: Vec<UserDomain>,
}

impl Default for GatewayFileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/etc/haproxy/haproxy.cfg"),
            user_domains: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
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

    /// Pretty output for terminals, JSON for log shipping.
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
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
