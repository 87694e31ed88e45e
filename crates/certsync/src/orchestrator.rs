//! Run sequencing
//!
//! `renew`: ensure acme.sh → issue → check files → inspect → reconcile.
//! `sync`: check files → inspect → reconcile, for certificates that are
//! already on disk.
//!
//! Steps run strictly one after another; each must finish before the next
//! starts and the first failure ends the run.

use tracing::{info, warn};

use certsync_config::{validate_certificates, RenewConfig};

use crate::acme::{AcmeInstaller, AcmeRunner, IssueOutcome, IssueRequest};
use crate::error::{SyncError, SyncResult};
use crate::inspect::{load_bundle, CertificateBundle, CertificateInspector, X509Inspector};
use crate::reconcile::{ReconcileOptions, ReconcileOutcome, Reconciler};
use crate::registry::{Registry, RegistryClient};

/// Result of a `renew` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A certificate was issued and pushed to the registry
    Synced(ReconcileOutcome),
    /// acme.sh found the certificate not yet due; the registry was not touched
    NotDue,
}

/// Sequences the renewal steps for one configured domain
pub struct Orchestrator<'a> {
    config: &'a RenewConfig,
    installer: AcmeInstaller,
    runner: AcmeRunner,
    registry: Box<dyn Registry>,
    inspector: Box<dyn CertificateInspector>,
}

impl<'a> Orchestrator<'a> {
    /// Build the components from configuration
    pub fn new(config: &'a RenewConfig) -> SyncResult<Self> {
        let registry = RegistryClient::new(&config.registry)?;
        Ok(Self {
            config,
            installer: AcmeInstaller::new(&config.acme)?,
            runner: AcmeRunner::new(&config.acme),
            registry: Box::new(registry),
            inspector: Box::new(X509Inspector::new()),
        })
    }

    /// Replace the certificate inspector
    pub fn with_inspector(mut self, inspector: Box<dyn CertificateInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Replace the registry backend
    pub fn with_registry(mut self, registry: Box<dyn Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Issue a certificate with acme.sh and push it to the registry
    pub async fn renew(&self) -> SyncResult<RunOutcome> {
        self.installer.ensure_installed().await?;

        let outcome = self
            .runner
            .issue(&IssueRequest {
                domain: &self.config.domain,
                cert_path: &self.config.cert_path,
                force: self.config.force,
                debug: self.config.debug,
            })
            .await?;

        if outcome == IssueOutcome::Skipped {
            info!(
                domain = %self.config.domain,
                "Nothing to publish; run `certsync sync` to push the current certificate"
            );
            return Ok(RunOutcome::NotDue);
        }

        self.sync().await.map(RunOutcome::Synced)
    }

    /// Push the certificate currently on disk to the registry
    pub async fn sync(&self) -> SyncResult<ReconcileOutcome> {
        self.preflight()?;

        let reconciler = Reconciler::new(
            self.registry.as_ref(),
            ReconcileOptions {
                domain: self.config.domain.clone(),
                force: self.config.force,
            },
        );

        Ok(reconciler
            .run(
                self.inspector.as_ref(),
                &self.config.cert_file(),
                &self.config.key_file(),
            )
            .await?)
    }

    /// Validate and load the certificate files without touching the registry
    pub async fn check(&self) -> SyncResult<CertificateBundle> {
        self.preflight()?;
        Ok(load_bundle(
            self.inspector.as_ref(),
            &self.config.cert_file(),
            &self.config.key_file(),
        )
        .await?)
    }

    /// Refuse missing, unparseable or expired certificate files
    fn preflight(&self) -> SyncResult<()> {
        let result = validate_certificates(self.config);
        for warning in &result.warnings {
            warn!("{}", warning);
        }
        if !result.is_ok() {
            return Err(SyncError::CertificateFiles(result.errors));
        }

        info!(
            cert = %self.config.cert_file().display(),
            key = %self.config.key_file().display(),
            "Certificate files passed pre-flight checks"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("domain", &self.config.domain)
            .field("cert_path", &self.config.cert_path)
            .field("runner", &self.runner)
            .finish()
    }
}
