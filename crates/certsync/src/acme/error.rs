//! ACME client error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while installing or running acme.sh
#[derive(Debug, Error)]
pub enum AcmeError {
    /// acme.sh could not be found or executed
    #[error("acme.sh not found at {path:?}")]
    NotInstalled { path: PathBuf },

    /// Downloading or running the installer failed
    #[error("Failed to install acme.sh: {0}")]
    Install(String),

    /// acme.sh exited with a failure status
    #[error("acme.sh failed to issue certificate for '{domain}' (exit status {status})")]
    RenewalFailed { domain: String, status: String },

    /// IO error while spawning a process or writing the installer
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for AcmeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AcmeError::Install(format!("installer download timed out: {}", e))
        } else {
            AcmeError::Install(e.to_string())
        }
    }
}
