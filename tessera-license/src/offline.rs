//! Offline validation: signature and embedded expiry only.
//!
//! Needs nothing but the token text and the public keys, so it runs inside
//! engines with no route to the license server. It cannot see revocations;
//! engines re-run online validation periodically to pick those up.

use crate::clock::{Clock, SystemClock};
use crate::error::{LicenseError, LicenseResult};
use crate::keys::KeyRing;
use crate::token::{LicensePayload, LicenseToken};
use std::sync::Arc;

/// Verifies tokens against a key ring and a clock.
#[derive(Clone)]
pub struct OfflineVerifier {
    keys: KeyRing,
    clock: Arc<dyn Clock>,
}

impl OfflineVerifier {
    /// Creates a verifier using wall-clock time.
    #[must_use]
    pub fn new(keys: KeyRing) -> Self {
        Self::with_clock(keys, Arc::new(SystemClock))
    }

    /// Creates a verifier with an explicit clock.
    #[must_use]
    pub fn with_clock(keys: KeyRing, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    /// Returns the accepted keys.
    #[must_use]
    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    /// Checks authenticity only, ignoring expiry.
    pub fn authenticate(&self, token: &str) -> LicenseResult<LicenseToken> {
        LicenseToken::decode(token, &self.keys)
    }

    /// Checks the embedded expiry of an already authenticated token.
    pub fn check_expiry(&self, token: &LicenseToken) -> LicenseResult<()> {
        let payload = token.payload();
        if payload.is_expired_at(self.clock.now()) {
            return Err(LicenseError::Expired(payload.expires_at().to_rfc3339()));
        }
        Ok(())
    }

    /// Authenticates the token and checks its embedded expiry.
    pub fn verify(&self, token: &str) -> LicenseResult<LicenseToken> {
        let token = self.authenticate(token)?;
        self.check_expiry(&token)?;
        Ok(token)
    }
}

impl std::fmt::Debug for OfflineVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineVerifier")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// One-shot offline validation against wall-clock time.
pub fn validate_offline(token: &str, keys: &KeyRing) -> LicenseResult<LicensePayload> {
    OfflineVerifier::new(keys.clone())
        .verify(token)
        .map(LicenseToken::into_payload)
}
