//! Identifier types for the Tessera licensing system.
//!
//! Licenses and activations are keyed by UUID v7 so that rows sort by
//! creation time. Owners are referenced by whatever UUID the account
//! system assigned; the licensing core never creates them.

mod ids;

pub use ids::{ActivationId, LicenseId, OwnerId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
