//! In-process certificate inspection with `x509-parser`

use std::path::Path;

use async_trait::async_trait;
use tracing::trace;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use super::{CertificateInspector, InspectionError, ValidityWindow};

/// Parses the first PEM block of a certificate file
#[derive(Debug, Default, Clone, Copy)]
pub struct X509Inspector;

impl X509Inspector {
    pub fn new() -> Self {
        Self
    }

    /// Read the file and hand the parsed leaf certificate to `f`
    async fn with_certificate<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&X509Certificate<'_>) -> Result<T, InspectionError>,
    ) -> Result<T, InspectionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| InspectionError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let (_, pem) = parse_x509_pem(&bytes).map_err(|e| InspectionError::InvalidCertificate {
            path: path.to_path_buf(),
            message: format!("Failed to parse PEM: {}", e),
        })?;

        let (_, cert) = X509Certificate::from_der(&pem.contents).map_err(|e| {
            InspectionError::InvalidCertificate {
                path: path.to_path_buf(),
                message: format!("Failed to parse certificate: {}", e),
            }
        })?;

        f(&cert)
    }
}

#[async_trait]
impl CertificateInspector for X509Inspector {
    async fn subject_names(&self, path: &Path) -> Result<Vec<String>, InspectionError> {
        self.with_certificate(path, |cert| {
            let san = cert
                .subject_alternative_name()
                .map_err(|e| InspectionError::InvalidCertificate {
                    path: path.to_path_buf(),
                    message: format!("Malformed subject alternative name: {}", e),
                })?;

            let names: Vec<String> = san
                .map(|ext| {
                    ext.value
                        .general_names
                        .iter()
                        .filter_map(|name| match name {
                            GeneralName::DNSName(dns) => Some(dns.to_string()),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();

            trace!(path = %path.display(), names = ?names, "Extracted DNS names");
            Ok(names)
        })
        .await
    }

    async fn validity_window(&self, path: &Path) -> Result<ValidityWindow, InspectionError> {
        self.with_certificate(path, |cert| {
            let validity = cert.validity();
            Ok(ValidityWindow {
                start: validity.not_before.timestamp(),
                end: validity.not_after.timestamp(),
            })
        })
        .await
    }
}
