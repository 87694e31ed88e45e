//! Registry settings validation
//!
//! Validates the admin API endpoint, credentials and request timeout.

use url::Url;

use super::{ErrorCategory, ValidationError, ValidationResult};
use crate::RegistrySettings;

/// Upper bound for a single admin API request
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Validate registry settings
pub fn validate_registry(registry: &RegistrySettings) -> ValidationResult {
    let mut result = ValidationResult::new();

    if registry.host.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Registry,
            "Registry host is required (--control-host)",
        ));
    } else {
        match Url::parse(&registry.host) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Registry,
                    format!(
                        "Registry host '{}' uses unsupported scheme '{}'",
                        registry.host,
                        url.scheme()
                    ),
                ));
            }
            Err(e) => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Registry,
                    format!("Registry host '{}' is not a valid URL: {}", registry.host, e),
                ));
            }
        }
    }

    if registry.token.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Registry,
            "Registry token is required (--token)",
        ));
    }

    if registry.timeout_secs == 0 || registry.timeout_secs > MAX_TIMEOUT_SECS {
        result.add_error(ValidationError::new(
            ErrorCategory::Registry,
            format!(
                "Registry timeout must be between 1 and {} seconds, got {}",
                MAX_TIMEOUT_SECS, registry.timeout_secs
            ),
        ));
    }

    result
}
