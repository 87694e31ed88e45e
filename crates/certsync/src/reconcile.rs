//! Certificate reconciliation
//!
//! Decides which registry entry a renewed certificate belongs to and
//! writes it there:
//!
//! 1. Fetch a fresh registry snapshot
//! 2. Select the first entry whose primary SNI equals the target domain
//! 3. Matched: replace that entry. Unmatched: fail with
//!    [`ReconcileError::NoExistingRecord`], or with `force` create a new
//!    entry under a synthesized id
//!
//! Matching compares the first SNI only. A record listing the same names
//! in a different order does not match.
//!
//! The matched entry is overwritten even when it already holds the same
//! certificate, so the registry always ends up with the bundle that was
//! just issued. The workflow assumes it is the only writer for the domain.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use certsync_common::SslId;

use crate::inspect::{load_bundle, CertificateBundle, CertificateInspector, InspectionError};
use crate::registry::{Registry, RegistryError, RegistryRecord, RegistrySnapshot, SslPayload};

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("No registry entry matches '{domain}'; use --force to create one")]
    NoExistingRecord { domain: String },

    #[error("Synthesized id '{id}' is already used by the entry for '{existing}'; retry later")]
    IdCollision { id: SslId, existing: String },

    #[error(transparent)]
    Inspection(#[from] InspectionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Inputs that steer a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Target domain; the matching key and the SNI written
    pub domain: String,
    /// Create an entry when none matches
    pub force: bool,
}

/// What the run did to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// An existing entry was replaced
    Updated,
    /// A new entry was created under a synthesized id
    Created,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub id: SslId,
    pub action: ReconcileAction,
}

/// Select the first record whose primary name equals `domain`
pub fn find_match<'a>(snapshot: &'a RegistrySnapshot, domain: &str) -> Option<&'a RegistryRecord> {
    snapshot
        .iter()
        .find(|record| record.primary_name() == Some(domain))
}

/// Drives one create-or-update against the registry
pub struct Reconciler<'a, R: Registry + ?Sized> {
    registry: &'a R,
    options: ReconcileOptions,
}

impl<'a, R: Registry + ?Sized> Reconciler<'a, R> {
    pub fn new(registry: &'a R, options: ReconcileOptions) -> Self {
        Self { registry, options }
    }

    /// Load the renewed files and reconcile them
    pub async fn run(
        &self,
        inspector: &dyn CertificateInspector,
        cert_file: &Path,
        key_file: &Path,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let bundle = load_bundle(inspector, cert_file, key_file).await?;
        self.reconcile(&bundle).await
    }

    /// Push `bundle` to the entry matching the target domain
    pub async fn reconcile(
        &self,
        bundle: &CertificateBundle,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let domain = self.options.domain.as_str();

        match bundle.primary_name() {
            Some(primary) if primary != domain => {
                warn!(
                    domain = %domain,
                    certificate_primary = %primary,
                    "Certificate primary name differs from target domain; matching on target domain"
                );
            }
            None => {
                warn!(domain = %domain, "Certificate carries no DNS subject names");
            }
            _ => {}
        }

        let snapshot = self.registry.list_records().await?;
        debug!(entries = snapshot.len(), domain = %domain, "Scanning registry snapshot");

        let (id, action) = match find_match(&snapshot, domain) {
            Some(record) => {
                let duplicates = snapshot
                    .iter()
                    .filter(|r| r.primary_name() == Some(domain))
                    .count();
                if duplicates > 1 {
                    warn!(
                        domain = %domain,
                        id = %record.id,
                        duplicates = duplicates - 1,
                        "Multiple registry entries match; updating the first only"
                    );
                }
                info!(domain = %domain, id = %record.id, "Found existing registry entry");
                (record.id.clone(), ReconcileAction::Updated)
            }
            None if self.options.force => {
                let id = SslId::synthesize();
                // PUT replaces whatever is stored at the id, so a reused id
                // would overwrite another domain's certificate
                if let Some(taken) = snapshot.iter().find(|r| r.id == id) {
                    return Err(ReconcileError::IdCollision {
                        id,
                        existing: taken.primary_name().unwrap_or_default().to_string(),
                    });
                }
                info!(domain = %domain, id = %id, "No registry entry matches; creating one");
                (id, ReconcileAction::Created)
            }
            None => {
                return Err(ReconcileError::NoExistingRecord {
                    domain: domain.to_string(),
                });
            }
        };

        let payload = SslPayload::for_domain(domain, bundle);
        self.registry.upsert_record(&id, &payload).await?;

        info!(
            domain = %domain,
            id = %id,
            action = ?action,
            validity_end = bundle.validity_end,
            "Registry reconciled"
        );

        Ok(ReconcileOutcome { id, action })
    }
}
