//! Server-side license authority for Tessera.
//!
//! Builds on the trust core in `tessera-license` and the persistence in
//! `tessera-store`:
//!
//! - [`Issuer`] creates license rows and mints their signed tokens
//! - [`Validator`] answers online (store-backed) and offline (token-only)
//!   validation and runs activation against the ledger
//! - [`LicenseAuthority`] is the facade billing, account and transport
//!   layers call into
//!
//! Business outcomes (expired, revoked, hardware mismatch, activation limit)
//! come back as [`LicenseError`](tessera_license::LicenseError) values and are
//! never logged here; state changes are logged at `info`.

mod authority;
mod issuer;
mod validator;

pub use authority::LicenseAuthority;
pub use issuer::{Issuance, IssueRequest, Issuer};
pub use validator::Validator;
