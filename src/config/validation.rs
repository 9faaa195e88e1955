//! Service configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate bind addresses, timeouts and the reload command
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// One semantic problem in the service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", config.admin.bind_address),
            ));
        }
        if config.admin.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "admin.request_timeout_secs",
                "must be greater than zero",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if config.apply.enabled {
        if config.apply.output_path.as_os_str().is_empty() {
            errors.push(ValidationError::new("apply.output_path", "must not be empty"));
        }
        if config.apply.reload_command.iter().any(|arg| arg.is_empty()) {
            errors.push(ValidationError::new(
                "apply.reload_command",
                "arguments must not be empty",
            ));
        }
    }

    if config.apply.system_backend.trim().is_empty() {
        errors.push(ValidationError::new("apply.system_backend", "must not be empty"));
    }
    if config.apply.system_tls_backend.trim().is_empty() {
        errors.push(ValidationError::new(
            "apply.system_tls_backend",
            "must not be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ServiceConfig::default();
        config.admin.bind_address = "nowhere".into();
        config.admin.request_timeout_secs = 0;
        config.apply.system_backend = " ".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].field, "admin.bind_address");
    }
}
