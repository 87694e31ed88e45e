//! Top-level error type
//!
//! Every component error converges here so the binary has a single place
//! that reports the failure and sets the exit status.

use thiserror::Error;

use certsync_config::{ConfigError, ValidationError};

use crate::acme::AcmeError;
use crate::inspect::InspectionError;
use crate::reconcile::ReconcileError;
use crate::registry::RegistryError;

/// Errors that abort a certsync run
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Certificate files are not usable:\n{}", format_errors(.0))]
    CertificateFiles(Vec<ValidationError>),

    #[error(transparent)]
    Acme(#[from] AcmeError),

    #[error(transparent)]
    Inspection(#[from] InspectionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result alias for certsync operations
pub type SyncResult<T> = Result<T, SyncError>;
