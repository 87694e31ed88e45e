//! Shared types for certsync crates.

pub mod ids;

pub use ids::{RunId, SslId, SYNTHESIZED_ID_PREFIX};
