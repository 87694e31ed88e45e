//! ACME certificate issuance via acme.sh
//!
//! certsync does not speak ACME itself. It drives the `acme.sh` shell
//! client, which performs the DNS-01 challenge through one of its DNS API
//! hooks (`dns_cf`, `dns_ali`, ...) and writes `<domain>.cer` and
//! `<domain>.key` into its certificate directory.
//!
//! - [`AcmeInstaller`] - detects acme.sh and installs it when missing
//! - [`AcmeRunner`] - builds and runs the `--issue` invocation

mod error;
mod install;
mod runner;

pub use error::AcmeError;
pub use install::{parse_version_output, AcmeInstaller};
pub use runner::{AcmeRunner, IssueOutcome, IssueRequest, EXIT_SKIPPED};
