//! Configuration linting
//!
//! Flags settings that are legal but likely to surprise an operator.

use url::Url;

use super::{ValidationResult, ValidationWarning};
use crate::RenewConfig;

/// Lint configuration for risky settings
pub fn lint_config(config: &RenewConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    // The admin token travels in a header on every request
    if let Ok(url) = Url::parse(&config.registry.host) {
        if url.scheme() == "http" && !is_loopback(&url) {
            result.add_warning(ValidationWarning::new(format!(
                "Registry host '{}' uses plain HTTP; the admin token is sent unencrypted",
                config.registry.host
            )));
        }
    }

    if config.debug {
        result.add_warning(ValidationWarning::new(
            "Debug mode issues certificates from the ACME staging CA; browsers will not trust them",
        ));
    }

    if config.force {
        result.add_warning(ValidationWarning::new(format!(
            "Force is enabled: a new registry entry will be created if none matches '{}'",
            config.domain
        )));
    }

    result
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]"))
}
