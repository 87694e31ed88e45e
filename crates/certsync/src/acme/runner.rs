//! acme.sh issuance

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use certsync_config::AcmeSettings;

use super::error::AcmeError;

/// acme.sh exit status when the certificate is not yet due for renewal
pub const EXIT_SKIPPED: i32 = 2;

/// Parameters of one `--issue` call
#[derive(Debug, Clone, Copy)]
pub struct IssueRequest<'a> {
    pub domain: &'a str,
    /// Passed as `-w`; omitted when empty
    pub cert_path: &'a Path,
    /// Re-issue even if the current certificate is still fresh
    pub force: bool,
    /// Use the staging CA with verbose output
    pub debug: bool,
}

/// Result of a successful acme.sh run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// A new certificate was written
    Issued,
    /// acme.sh skipped issuance because the certificate is not due
    Skipped,
}

/// Runs acme.sh to obtain a certificate through a DNS-01 challenge
#[derive(Debug, Clone)]
pub struct AcmeRunner {
    script: PathBuf,
    dns_channel: String,
}

impl AcmeRunner {
    pub fn new(settings: &AcmeSettings) -> Self {
        Self {
            script: settings.script_path(),
            dns_channel: settings.dns_channel.clone(),
        }
    }

    /// Command-line arguments for an issue request
    pub fn issue_args(&self, request: &IssueRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--issue".into(),
            "-d".into(),
            request.domain.into(),
            "--dns".into(),
            self.dns_channel.as_str().into(),
        ];

        if !request.cert_path.as_os_str().is_empty() {
            args.push("-w".into());
            args.push(request.cert_path.as_os_str().to_owned());
        }

        if request.debug {
            args.push("--staging".into());
            args.push("--debug".into());
        }

        if request.force {
            args.push("--force".into());
        }

        args
    }

    /// Run acme.sh, streaming its output to ours
    pub async fn issue(&self, request: &IssueRequest<'_>) -> Result<IssueOutcome, AcmeError> {
        let args = self.issue_args(request);

        info!(
            domain = %request.domain,
            dns_channel = %self.dns_channel,
            force = request.force,
            staging = request.debug,
            "Requesting certificate from acme.sh"
        );
        debug!(script = %self.script.display(), args = ?args, "Spawning acme.sh");

        let status = Command::new(&self.script)
            .args(&args)
            .status()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AcmeError::NotInstalled {
                    path: self.script.clone(),
                },
                _ => AcmeError::Io(e),
            })?;

        match status.code() {
            Some(0) => {
                info!(domain = %request.domain, "Certificate issued");
                Ok(IssueOutcome::Issued)
            }
            Some(EXIT_SKIPPED) => {
                info!(
                    domain = %request.domain,
                    "Certificate is not due for renewal; acme.sh skipped issuance"
                );
                Ok(IssueOutcome::Skipped)
            }
            _ => Err(AcmeError::RenewalFailed {
                domain: request.domain.to_string(),
                status: status.to_string(),
            }),
        }
    }
}
