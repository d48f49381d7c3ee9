//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject empty or repeated secret entries; an empty list is allowed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RpcConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RpcConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("auth.secrets[{0}] is empty")]
    EmptySecret(usize),

    #[error("auth.secrets contains the same secret more than once")]
    DuplicateSecret,
}

pub fn validate_config(config: &RpcConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("limits.max_body_bytes"));
    }

    if config.auth.lifetime.as_duration().is_zero() {
        errors.push(ValidationError::Zero("auth.lifetime"));
    }

    for (index, secret) in config.auth.secrets.iter().enumerate() {
        if secret.is_empty() {
            errors.push(ValidationError::EmptySecret(index));
        }
    }
    let secrets = &config.auth.secrets;
    if secrets
        .iter()
        .enumerate()
        .any(|(i, secret)| secrets[..i].contains(secret))
    {
        errors.push(ValidationError::DuplicateSecret);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
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
    use crate::auth::Lifetime;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RpcConfig::default()), Ok(()));
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = RpcConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.timeouts.request_secs = 0;
        config.limits.max_body_bytes = 0;
        config.auth.lifetime = Lifetime::Hours(0);
        config.auth.secrets = vec!["a".into(), String::new(), "a".into()];
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "bad".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.contains(&ValidationError::EmptySecret(1)));
        assert!(errors.contains(&ValidationError::DuplicateSecret));
        assert!(errors.contains(&ValidationError::Zero("auth.lifetime")));
    }

    #[test]
    fn test_empty_secret_list_is_valid() {
        let mut config = RpcConfig::default();
        assert!(config.auth.secrets.is_empty());
        assert_eq!(validate_config(&config), Ok(()));

        config.auth.secrets = vec![String::new()];
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::EmptySecret(0)])
        );
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = RpcConfig::default();
        config.observability.metrics_address = "bad".into();
        assert!(validate_config(&config).is_ok());
    }
}
