//! Certificate validation
//!
//! Validates the certificate and key files written by the ACME step
//! before they are pushed to the registry.

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::RenewConfig;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Certificates expiring sooner than this produce a warning
const EXPIRY_WARNING_WINDOW: Duration = Duration::from_secs(30 * 86400);

/// Validate the certificate files for the configured domain
pub fn validate_certificates(config: &RenewConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    let cert_file = config.cert_file();
    let key_file = config.key_file();

    if !cert_file.exists() {
        result.add_error(ValidationError::new(
            ErrorCategory::Certificate,
            format!(
                "Certificate not found: {:?} (use --force to issue a new one)",
                cert_file
            ),
        ));
        return result;
    }

    if !key_file.exists() {
        result.add_error(ValidationError::new(
            ErrorCategory::Certificate,
            format!("Private key not found: {:?}", key_file),
        ));
        return result;
    }

    match load_and_validate_cert(&cert_file) {
        Ok(Some(expiry_warning)) => {
            result.add_warning(expiry_warning);
        }
        Ok(None) => {}
        Err(e) => {
            result.add_error(e);
        }
    }

    result
}

/// Load a certificate and check its expiry
fn load_and_validate_cert(cert_path: &Path) -> Result<Option<ValidationWarning>, ValidationError> {
    use std::fs;

    let cert_pem = fs::read(cert_path).map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("Failed to read certificate {:?}: {}", cert_path, e),
        )
    })?;

    // acme.sh writes the leaf first, so the first PEM block is the one we want
    let pem = pem::parse(&cert_pem).map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("Failed to parse certificate {:?}: {}", cert_path, e),
        )
    })?;

    let (_, cert) = x509_parser::parse_x509_certificate(pem.contents()).map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("Invalid X509 certificate {:?}: {}", cert_path, e),
        )
    })?;

    let now = SystemTime::now();
    let not_after = cert.validity().not_after.timestamp().max(0) as u64;
    let expiry_time = SystemTime::UNIX_EPOCH + Duration::from_secs(not_after);

    if expiry_time < now {
        return Err(ValidationError::new(
            ErrorCategory::Certificate,
            format!(
                "Certificate expired: {:?} (expired at {})",
                cert_path,
                cert.validity().not_after
            ),
        ));
    }

    if expiry_time < now + EXPIRY_WARNING_WINDOW {
        return Ok(Some(ValidationWarning::new(format!(
            "Certificate expires soon: {:?} (expires at {})",
            cert_path,
            cert.validity().not_after
        ))));
    }

    Ok(None)
}
