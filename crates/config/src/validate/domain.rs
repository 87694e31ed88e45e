//! Domain name validation
//!
//! Accepts plain and wildcard DNS names as understood by acme.sh:
//! `example.com`, `api.example.com`, `*.example.com`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ErrorCategory, ValidationError, ValidationResult};

/// Maximum total length of a domain name
const MAX_DOMAIN_LEN: usize = 255;

/// Maximum length of a single label
const MAX_LABEL_LEN: usize = 63;

/// Letters, digits and inner hyphens
static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?$").expect("valid regex"));

/// Check a domain name, returning the reason it is rejected
pub fn check_domain(domain: &str) -> Result<(), String> {
    if domain.is_empty() {
        return Err("domain cannot be empty".to_string());
    }

    if domain.len() > MAX_DOMAIN_LEN {
        return Err(format!(
            "domain is {} characters long (max {})",
            domain.len(),
            MAX_DOMAIN_LEN
        ));
    }

    let mut labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= 1 {
        return Err("domain needs at least two labels".to_string());
    }

    if labels[0] == "*" {
        labels.remove(0);
    }

    for label in labels {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(format!(
                "label '{}' must be 1-{} characters",
                label, MAX_LABEL_LEN
            ));
        }
        if !LABEL_RE.is_match(label) {
            return Err(format!("label '{}' contains invalid characters", label));
        }
    }

    Ok(())
}

/// Validate the configured domain
pub fn validate_domain(domain: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if let Err(reason) = check_domain(domain) {
        result.add_error(ValidationError::new(
            ErrorCategory::Domain,
            format!("Invalid domain '{}': {}", domain, reason),
        ));
    }

    result
}
