//! Configuration for certsync
//!
//! A single [`RenewConfig`] value is built once at startup and handed by
//! reference to every component. Values are layered:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config` / `CERTSYNC_CONFIG`)
//! 3. Command-line flags and environment variables ([`ConfigOverrides`])
//!
//! # Example
//!
//! ```toml
//! domain = "*.example.com"
//! cert_path = "/root/.acme.sh/*.example.com_ecc"
//!
//! [acme]
//! script = "~/.acme.sh/acme.sh"
//! dns_channel = "dns_cf"
//!
//! [registry]
//! host = "https://dash.example.com:9180"
//! token = "edd1c9f034335f136f87ad84b625c8f1"
//! timeout_secs = 30
//! ```

pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use validate::{
    lint_config, validate_certificates, validate_domain, validate_registry, ErrorCategory,
    ValidationError, ValidationResult, ValidationWarning,
};

/// Default location of the acme.sh script
pub const DEFAULT_ACME_SCRIPT: &str = "~/.acme.sh/acme.sh";

/// Default acme.sh DNS API hook
pub const DEFAULT_DNS_CHANNEL: &str = "dns_cf";

/// Default acme.sh installer URL
pub const DEFAULT_INSTALL_URL: &str = "https://get.acme.sh";

/// Default timeout for downloading the acme.sh installer
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Default admin API prefix of the registry
pub const DEFAULT_API_PREFIX: &str = "/apisix/admin";

/// Default timeout for one admin API request
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration:\n{}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Settings for the external ACME client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmeSettings {
    /// Path to acme.sh (`~` is expanded against `$HOME`)
    pub script: PathBuf,
    /// acme.sh DNS API hook used for the DNS-01 challenge
    pub dns_channel: String,
    /// Where to fetch the installer when acme.sh is missing
    pub install_url: String,
    /// Ceiling for the installer download in seconds
    pub download_timeout_secs: u64,
}

impl Default for AcmeSettings {
    fn default() -> Self {
        Self {
            script: PathBuf::from(DEFAULT_ACME_SCRIPT),
            dns_channel: DEFAULT_DNS_CHANNEL.to_string(),
            install_url: DEFAULT_INSTALL_URL.to_string(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

impl AcmeSettings {
    /// Script path with a leading `~` resolved
    pub fn script_path(&self) -> PathBuf {
        expand_home(&self.script)
    }
}

/// Settings for the remote certificate registry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Base URL of the admin API, e.g. `http://127.0.0.1:9180`
    pub host: String,
    /// Admin API key sent as `X-API-KEY`
    pub token: String,
    /// Path prefix of the admin API
    pub api_prefix: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for RegistrySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySettings")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("api_prefix", &self.api_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Complete configuration for one renewal run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewConfig {
    /// Domain to renew; also the registry matching key
    pub domain: String,
    /// Directory holding `<domain>.cer` and `<domain>.key`
    pub cert_path: PathBuf,
    /// Re-issue even if acme.sh considers the certificate fresh, and create
    /// a registry entry when none matches
    pub force: bool,
    /// Use the ACME staging CA with verbose acme.sh output
    pub debug: bool,
    pub acme: AcmeSettings,
    pub registry: RegistrySettings,
}

impl Default for RenewConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            cert_path: PathBuf::from("."),
            force: false,
            debug: false,
            acme: AcmeSettings::default(),
            registry: RegistrySettings::default(),
        }
    }
}

/// Values supplied on the command line or via environment
///
/// `None` leaves the file/default value in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub domain: Option<String>,
    pub cert_path: Option<PathBuf>,
    pub acme_script: Option<PathBuf>,
    pub dns_channel: Option<String>,
    pub host: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub force: bool,
    pub debug: bool,
}

impl RenewConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RenewConfig = toml::from_str(content)?;
        trace!(domain = %config.domain, "Parsed configuration");
        Ok(config)
    }

    /// Layer command-line values over this configuration
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(domain) = overrides.domain {
            self.domain = domain;
        }
        if let Some(cert_path) = overrides.cert_path {
            self.cert_path = cert_path;
        }
        if let Some(script) = overrides.acme_script {
            self.acme.script = script;
        }
        if let Some(dns_channel) = overrides.dns_channel {
            self.acme.dns_channel = dns_channel;
        }
        if let Some(host) = overrides.host {
            self.registry.host = host;
        }
        if let Some(token) = overrides.token {
            self.registry.token = token;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.registry.timeout_secs = timeout_secs;
        }
        // Flags only ever switch behaviour on
        self.force |= overrides.force;
        self.debug |= overrides.debug;
        self
    }

    /// Path of the certificate file written by acme.sh
    pub fn cert_file(&self) -> PathBuf {
        self.cert_path.join(format!("{}.cer", self.domain))
    }

    /// Path of the private key written by acme.sh
    pub fn key_file(&self) -> PathBuf {
        self.cert_path.join(format!("{}.key", self.domain))
    }

    /// Run all static checks
    pub fn validate(&self) -> ValidationResult {
        let mut result = validate_domain(&self.domain);
        result.merge(validate_registry(&self.registry));
        result.merge(lint_config(self));
        result
    }

    /// Checks that do not involve the registry, for runs that never contact it
    pub fn validate_offline(&self) -> ValidationResult {
        let mut result = validate_domain(&self.domain);
        result.merge(lint_config(self));
        result
    }

    /// Validate, logging warnings and failing on errors
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        Self::ensure(self.validate())
    }

    /// Like [`ensure_valid`](Self::ensure_valid) without the registry checks
    pub fn ensure_valid_offline(&self) -> Result<(), ConfigError> {
        Self::ensure(self.validate_offline())
    }

    fn ensure(result: ValidationResult) -> Result<(), ConfigError> {
        for warning in &result.warnings {
            warn!("{}", warning);
        }
        if result.is_ok() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(result.errors))
        }
    }
}

/// Resolve a leading `~` against `$HOME`
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(rest),
            Err(_) => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
