//! Configuration loading from disk.
//!
//! Two kinds of files are read here: the daemon's own TOML service
//! configuration, and the per-domain configuration files (TOML or JSON by
//! extension) that feed the compiler.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::model::DomainConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported domain file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate the service configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = read(path)?;
    let config: ServiceConfig = toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// True for files the domain loader understands.
pub fn is_domain_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("toml") | Some("json")
    )
}

/// Parse one domain configuration file and bring it into canonical form.
///
/// The result is not validated: findings are the compiler's job.
pub fn load_domain_file(path: &Path) -> Result<DomainConfig, ConfigError> {
    let content = read(path)?;
    let mut config: DomainConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?,
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };
    config.normalize();
    Ok(config)
}

/// Load every domain file in `dir`, in file-name order.
///
/// Files that fail to parse are logged and skipped, as are later files that
/// repeat an already loaded domain.
pub fn load_domains(dir: &Path) -> Result<Vec<DomainConfig>, ConfigError> {
    let entries = fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_domain_file(p))
        .collect();
    paths.sort();

    let mut domains: Vec<DomainConfig> = Vec::with_capacity(paths.len());
    for path in paths {
        match load_domain_file(&path) {
            Ok(config) => {
                if domains.iter().any(|d| d.domain() == config.domain()) {
                    tracing::warn!(
                        path = ?path,
                        domain = %config.domain(),
                        "Duplicate domain file ignored"
                    );
                    continue;
                }
                domains.push(config);
            }
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Failed to load domain file");
            }
        }
    }

    tracing::info!(dir = ?dir, count = domains.len(), "Domain files loaded");
    Ok(domains)
}
