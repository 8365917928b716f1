//! License trust core for the Tessera replication engine.
//!
//! This crate handles:
//! - Ed25519 key pairs for signing licenses, with versioned key rings
//! - Signed license tokens that verify without network access
//! - Tier entitlements (activation and pipeline limits)
//! - Offline validation, and online-first validation with offline fallback
//! - Host identity for hardware-bound activation
//!
//! It has no database dependency and is linked into engine builds. The
//! issuing server builds on it in `tessera-authority`.
//!
//! # Token Format
//!
//! Tokens are formatted as: `base64url(payload).base64url(signature)`
//! The payload is a JSON object signed with Ed25519, containing:
//! - License ID, owner ID, tier, issue and expiry timestamps, key version

mod clock;
mod device;
mod entitlement;
mod error;
mod fallback;
mod keys;
mod model;
mod offline;
mod tier;
mod token;
mod wire;

#[cfg(feature = "online")]
mod online;

pub use clock::{Clock, ManualClock, SystemClock};
pub use device::{HardwareId, HostInfo};
pub use entitlement::Entitlements;
pub use error::{LicenseError, LicenseResult};
pub use fallback::{
    FallbackConfig, FallbackValidator, OnlineValidator, Verdict, DEFAULT_ONLINE_DEADLINE,
    DEFAULT_REFRESH_INTERVAL,
};
pub use keys::{KeyPair, KeyRing, KeyVersion, SerializedKeyPair, SigningKey, VerifyingKey};
pub use model::{Activation, ActivationRequest, License, LicenseStatus};
pub use offline::{validate_offline, OfflineVerifier};
pub use tier::{Limit, Tier, TierFamily};
pub use token::{LicensePayload, LicenseToken};
pub use wire::{DeactivateRequest, ErrorBody, ValidateRequest, ValidationReport};

#[cfg(feature = "online")]
pub use online::RemoteValidator;
