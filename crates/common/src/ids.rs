//! Type-safe identifier newtypes for certsync.
//!
//! Keeps registry-assigned SSL identifiers apart from the per-run
//! identifiers used to correlate log lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix for identifiers synthesized when no registry entry exists yet.
pub const SYNTHESIZED_ID_PREFIX: &str = "199200";

/// Identifier of one SSL entry in the remote registry.
///
/// Registry-assigned identifiers are opaque strings. An empty identifier
/// means "not created yet" and is never valid as a write target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SslId(String);

impl SslId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesize a fresh identifier from the current time.
    ///
    /// Only practically unique: two runs within the same second produce the
    /// same value, which the registry reports as a conflict.
    pub fn synthesize() -> Self {
        Self::synthesize_at(Utc::now())
    }

    /// Synthesize an identifier for a given instant.
    pub fn synthesize_at(now: DateTime<Utc>) -> Self {
        Self(format!("{}{}", SYNTHESIZED_ID_PREFIX, now.timestamp()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SslId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SslId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SslId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for one renewal/reconciliation run.
///
/// Attached to the top-level tracing span so every log line of a run can be
/// correlated, e.g. when several cron jobs write to the same journal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
