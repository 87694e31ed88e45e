//! acme.sh installation
//!
//! Detects an existing acme.sh by running `<script> -v` and, when that
//! fails, downloads the official installer and runs it with `sh`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tokio::process::Command;
use tracing::{debug, info, warn};

use certsync_config::AcmeSettings;

use super::error::AcmeError;

/// Installs acme.sh on demand
#[derive(Debug, Clone)]
pub struct AcmeInstaller {
    script: PathBuf,
    install_url: String,
    client: Client,
}

impl AcmeInstaller {
    pub fn new(settings: &AcmeSettings) -> Result<Self, AcmeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.download_timeout_secs))
            .build()?;

        Ok(Self {
            script: settings.script_path(),
            install_url: settings.install_url.clone(),
            client,
        })
    }

    /// Resolved path of the acme.sh script
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Version reported by `acme.sh -v`, or `None` if it cannot be run
    pub async fn installed_version(&self) -> Option<String> {
        let output = Command::new(&self.script).arg("-v").output().await.ok()?;

        if !output.status.success() {
            debug!(
                script = %self.script.display(),
                status = %output.status,
                "acme.sh version check failed"
            );
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Some(parse_version_output(&stdout).unwrap_or_else(|| "unknown".to_string()))
    }

    /// Make sure acme.sh is runnable, installing it if necessary
    pub async fn ensure_installed(&self) -> Result<String, AcmeError> {
        if let Some(version) = self.installed_version().await {
            info!(script = %self.script.display(), version = %version, "acme.sh is installed");
            return Ok(version);
        }

        warn!(
            script = %self.script.display(),
            "acme.sh is not installed; running installer"
        );
        self.install().await?;

        self.installed_version()
            .await
            .ok_or_else(|| AcmeError::NotInstalled {
                path: self.script.clone(),
            })
    }

    /// Download the installer and run it
    pub async fn install(&self) -> Result<(), AcmeError> {
        info!(url = %self.install_url, "Downloading acme.sh installer");

        let response = self.client.get(&self.install_url).send().await?;
        if !response.status().is_success() {
            return Err(AcmeError::Install(format!(
                "installer download returned HTTP {}",
                response.status()
            )));
        }
        let script = response.bytes().await?;

        let mut installer = tempfile::Builder::new()
            .prefix("install-acme")
            .suffix(".sh")
            .tempfile()?;
        installer.write_all(&script)?;
        installer.flush()?;

        debug!(
            path = %installer.path().display(),
            bytes = script.len(),
            "Running acme.sh installer"
        );

        let status = Command::new("sh").arg(installer.path()).status().await?;
        if !status.success() {
            return Err(AcmeError::Install(format!("installer exited with {}", status)));
        }

        info!("acme.sh installer finished");
        Ok(())
    }
}

/// Parse a version number from `acme.sh -v` output
///
/// acme.sh prints its project URL followed by a line such as `v3.0.7`.
pub fn parse_version_output(output: &str) -> Option<String> {
    for line in output.lines() {
        for word in line.split_whitespace() {
            let word = word.strip_prefix('v').unwrap_or(word);
            if word.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
                && word.contains('.')
                && !word.contains('/')
            {
                let version = word.split('-').next().unwrap_or(word);
                let version = version.split('+').next().unwrap_or(version);
                return Some(version.to_string());
            }
        }
    }

    None
}
