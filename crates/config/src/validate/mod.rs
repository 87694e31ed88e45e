//! Configuration validation
//!
//! Checks are grouped by concern and collected into a [`ValidationResult`]
//! so that every problem is reported at once instead of failing on the first.
//!
//! - [`domain`] - domain name syntax
//! - [`registry`] - registry host, token and timeout
//! - [`certs`] - certificate files produced by the ACME step
//! - [`lint`] - non-fatal warnings about risky settings

pub mod certs;
pub mod domain;
pub mod lint;
pub mod registry;

use std::fmt;

pub use certs::validate_certificates;
pub use domain::validate_domain;
pub use lint::lint_config;
pub use registry::validate_registry;

/// Area of the configuration a validation error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Domain,
    Registry,
    Certificate,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Domain => write!(f, "domain"),
            ErrorCategory::Registry => write!(f, "registry"),
            ErrorCategory::Certificate => write!(f, "certificate"),
        }
    }
}

/// A fatal validation problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// A non-fatal validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Accumulated errors and warnings
#[derive(Debug, Default, Clone)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}
