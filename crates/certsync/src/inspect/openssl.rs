//! Certificate inspection through the `openssl x509` command
//!
//! `openssl x509 -noout -text` prints the SAN extension as
//!
//! ```text
//!             X509v3 Subject Alternative Name:
//!                 DNS:*.example.com, DNS:example.com
//! ```
//!
//! and `-startdate` / `-enddate` print `notBefore=Apr 17 14:13:41 2024 GMT`.
//! Dates are always English month abbreviations in GMT, independent of the
//! host locale.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::process::Command;
use tracing::trace;

use super::{CertificateInspector, InspectionError, ValidityWindow};

/// Header line preceding the SAN entries in `-text` output
const SAN_HEADER: &str = "X509v3 Subject Alternative Name";

/// Date layout used by `openssl x509 -startdate/-enddate`
const OPENSSL_DATE_FORMAT: &str = "%b %d %H:%M:%S %Y GMT";

/// Inspects certificates by invoking the `openssl` binary
#[derive(Debug, Clone)]
pub struct OpensslInspector {
    binary: PathBuf,
}

impl Default for OpensslInspector {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("openssl"),
        }
    }
}

impl OpensslInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific openssl binary
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `openssl x509 -in <path> -noout <flag>` and return stdout
    async fn x509(&self, path: &Path, flag: &str) -> Result<String, InspectionError> {
        if !path.exists() {
            return Err(InspectionError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }

        trace!(binary = %self.binary.display(), path = %path.display(), flag, "Running openssl");

        let output = Command::new(&self.binary)
            .arg("x509")
            .arg("-in")
            .arg(path)
            .arg("-noout")
            .arg(flag)
            .output()
            .await
            .map_err(|e| InspectionError::Tool {
                path: path.to_path_buf(),
                message: format!("failed to run {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(InspectionError::InvalidCertificate {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl CertificateInspector for OpensslInspector {
    async fn subject_names(&self, path: &Path) -> Result<Vec<String>, InspectionError> {
        let text = self.x509(path, "-text").await?;
        Ok(parse_dns_names(&text))
    }

    async fn validity_window(&self, path: &Path) -> Result<ValidityWindow, InspectionError> {
        let start = self.x509(path, "-startdate").await?;
        let end = self.x509(path, "-enddate").await?;

        Ok(ValidityWindow {
            start: parse_openssl_date(&start)?,
            end: parse_openssl_date(&end)?,
        })
    }
}

/// Extract DNS names from `openssl x509 -text` output, in order
///
/// Only the line following the SAN header is considered, so `DNS:` text
/// elsewhere (e.g. in a subject) is ignored. Non-DNS entries such as
/// `IP Address:` are skipped.
pub fn parse_dns_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        if !line.contains(SAN_HEADER) {
            continue;
        }
        if let Some(entries) = lines.next() {
            names.extend(
                entries
                    .split(',')
                    .filter_map(|entry| entry.trim().strip_prefix("DNS:"))
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty()),
            );
        }
    }

    names
}

/// Parse a `notBefore=` / `notAfter=` line into Unix seconds
pub fn parse_openssl_date(line: &str) -> Result<i64, InspectionError> {
    let value = line.trim();
    let value = value
        .strip_prefix("notBefore=")
        .or_else(|| value.strip_prefix("notAfter="))
        .unwrap_or(value);

    // Single-digit days are space padded ("Jan  2"); collapse the run
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");

    NaiveDateTime::parse_from_str(&normalized, OPENSSL_DATE_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| InspectionError::InvalidDate {
            value: value.to_string(),
            message: e.to_string(),
        })
}
