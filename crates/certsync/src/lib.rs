//! certsync library
//!
//! Renews a TLS certificate with acme.sh and publishes it to a gateway's
//! admin-controlled certificate registry (APISIX `/apisix/admin/ssls`).
//!
//! - **Inspection**: reads subject names and validity from the renewed
//!   certificate ([`inspect`])
//! - **Registry**: lists and writes SSL entries over the admin API
//!   ([`registry`])
//! - **Reconciliation**: picks the entry to update, or creates one when
//!   forced ([`reconcile`])
//! - **ACME**: installs and drives acme.sh ([`acme`])
//!
//! # Example
//!
//! ```ignore
//! use certsync::{Orchestrator, RunOutcome};
//! use certsync_config::RenewConfig;
//!
//! let config = RenewConfig::from_file("/etc/certsync.toml")?;
//! config.ensure_valid()?;
//!
//! let orchestrator = Orchestrator::new(&config)?;
//! match orchestrator.renew().await? {
//!     RunOutcome::Synced(outcome) => println!("wrote entry {}", outcome.id),
//!     RunOutcome::NotDue => println!("certificate not due"),
//! }
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod acme;
pub mod error;
pub mod inspect;
pub mod orchestrator;
pub mod reconcile;
pub mod registry;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Errors
pub use error::{SyncError, SyncResult};

// Certificate inspection
pub use inspect::{
    load_bundle, CertificateBundle, CertificateInspector, InspectionError, OpensslInspector,
    ValidityWindow, X509Inspector,
};

// Registry access
pub use registry::{
    Registry, RegistryClient, RegistryError, RegistryRecord, RegistrySnapshot, SslPayload,
};

// Reconciliation
pub use reconcile::{
    find_match, ReconcileAction, ReconcileError, ReconcileOptions, ReconcileOutcome, Reconciler,
};

// ACME
pub use acme::{AcmeError, AcmeInstaller, AcmeRunner, IssueOutcome, IssueRequest};

// Orchestration
pub use orchestrator::{Orchestrator, RunOutcome};
