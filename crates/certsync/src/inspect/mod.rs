//! Certificate inspection
//!
//! Extracts the identity of a renewed certificate: its DNS subject
//! alternative names (in order of appearance) and its validity window as
//! Unix timestamps.
//!
//! Two implementations are provided:
//!
//! - [`X509Inspector`] parses the PEM file in-process with `x509-parser`
//! - [`OpensslInspector`] shells out to `openssl x509` and parses its text
//!   output, for hosts where the certificate format is only known to OpenSSL

mod openssl;
mod x509;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

pub use openssl::{parse_dns_names, parse_openssl_date, OpensslInspector};
pub use x509::X509Inspector;

/// Errors raised while inspecting a certificate file
#[derive(Debug, Error)]
pub enum InspectionError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid certificate {path:?}: {message}")]
    InvalidCertificate { path: PathBuf, message: String },

    #[error("Unparseable date '{value}': {message}")]
    InvalidDate { value: String, message: String },

    #[error("Inspection tool failed for {path:?}: {message}")]
    Tool { path: PathBuf, message: String },
}

/// Certificate validity interval in Unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub start: i64,
    pub end: i64,
}

/// Reads identity fields from a certificate on disk
#[async_trait]
pub trait CertificateInspector: Send + Sync {
    /// DNS subject alternative names in order of appearance; empty if none
    async fn subject_names(&self, path: &Path) -> Result<Vec<String>, InspectionError>;

    /// The certificate's "not before" / "not after" interval
    async fn validity_window(&self, path: &Path) -> Result<ValidityWindow, InspectionError>;
}

/// A renewed certificate with its key and identity
///
/// Loaded once per run and never modified.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    /// DNS names; the first is the primary name
    pub subject_names: Vec<String>,
    pub cert_pem: String,
    pub key_pem: String,
    pub validity_start: i64,
    pub validity_end: i64,
}

impl CertificateBundle {
    /// First subject name, if the certificate has any
    pub fn primary_name(&self) -> Option<&str> {
        self.subject_names.first().map(String::as_str)
    }
}

impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("subject_names", &self.subject_names)
            .field("cert_pem_len", &self.cert_pem.len())
            .field("key_pem", &"<redacted>")
            .field("validity_start", &self.validity_start)
            .field("validity_end", &self.validity_end)
            .finish()
    }
}

/// Load a certificate bundle from the certificate and key files
pub async fn load_bundle(
    inspector: &dyn CertificateInspector,
    cert_path: &Path,
    key_path: &Path,
) -> Result<CertificateBundle, InspectionError> {
    let cert_pem = read_pem(cert_path).await?;
    let key_pem = read_pem(key_path).await?;

    let subject_names = inspector.subject_names(cert_path).await?;
    let window = inspector.validity_window(cert_path).await?;

    debug!(
        cert = %cert_path.display(),
        subject_names = ?subject_names,
        validity_start = window.start,
        validity_end = window.end,
        "Loaded certificate bundle"
    );

    Ok(CertificateBundle {
        subject_names,
        cert_pem,
        key_pem,
        validity_start: window.start,
        validity_end: window.end,
    })
}

async fn read_pem(path: &Path) -> Result<String, InspectionError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InspectionError::Read {
            path: path.to_path_buf(),
            source,
        })
}
