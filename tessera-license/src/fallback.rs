//! Engine-side validation with online-first, offline-fallback semantics.
//!
//! The engine always holds its signed token. On each check it authenticates
//! the token locally, then asks the license server under a short deadline.
//! An answer from the server is authoritative, including revocation. When
//! the server cannot answer (timeout, network or storage failure) the
//! engine keeps running on the offline verdict and flags when a refresh is
//! overdue. Revocation is therefore observed immediately online and
//! eventually offline.

use crate::clock::{Clock, SystemClock};
use crate::entitlement::Entitlements;
use crate::error::LicenseResult;
use crate::offline::OfflineVerifier;
use crate::token::LicenseToken;
use crate::wire::ValidationReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tessera_types::LicenseId;
use tracing::{debug, warn};

/// Default deadline for one online validation attempt.
pub const DEFAULT_ONLINE_DEADLINE: Duration = Duration::from_secs(3);

/// Default interval after which an offline engine should reach the server.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Something that can answer authoritatively about a license.
#[async_trait]
pub trait OnlineValidator: Send + Sync {
    /// Validates `license_id` for `hardware_id` against live state.
    async fn validate_online(
        &self,
        license_id: LicenseId,
        hardware_id: &str,
    ) -> LicenseResult<ValidationReport>;
}

#[async_trait]
impl<V: OnlineValidator + ?Sized> OnlineValidator for Arc<V> {
    async fn validate_online(
        &self,
        license_id: LicenseId,
        hardware_id: &str,
    ) -> LicenseResult<ValidationReport> {
        (**self).validate_online(license_id, hardware_id).await
    }
}

/// Timing knobs for [`FallbackValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackConfig {
    /// Upper bound on one online attempt.
    pub online_deadline: Duration,
    /// How long an offline verdict is acceptable before `refresh_due` is set.
    pub refresh_interval: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            online_deadline: DEFAULT_ONLINE_DEADLINE,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Outcome of a fallback validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The server answered.
    Online(ValidationReport),
    /// The server was unreachable; the token alone vouches for the license.
    Offline {
        token: LicenseToken,
        entitlements: Entitlements,
        /// True when the last successful online check is older than the
        /// refresh interval, or never happened.
        refresh_due: bool,
        /// Why the online attempt did not produce an answer.
        reason: String,
    },
}

impl Verdict {
    /// Entitlements the engine should enforce.
    #[must_use]
    pub fn entitlements(&self) -> &Entitlements {
        match self {
            Self::Online(report) => &report.entitlements,
            Self::Offline { entitlements, .. } => entitlements,
        }
    }

    /// Returns true if revocation state is reflected in this verdict.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::Online(_))
    }
}

/// Online-first validator with an offline fallback.
pub struct FallbackValidator<V> {
    online: V,
    offline: OfflineVerifier,
    config: FallbackConfig,
    clock: Arc<dyn Clock>,
    last_online: Mutex<Option<DateTime<Utc>>>,
}

impl<V: OnlineValidator> FallbackValidator<V> {
    /// Creates a validator using wall-clock time.
    pub fn new(online: V, offline: OfflineVerifier, config: FallbackConfig) -> Self {
        Self::with_clock(online, offline, config, Arc::new(SystemClock))
    }

    /// Creates a validator with an explicit clock for refresh bookkeeping.
    pub fn with_clock(
        online: V,
        offline: OfflineVerifier,
        config: FallbackConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            online,
            offline,
            config,
            clock,
            last_online: Mutex::new(None),
        }
    }

    /// Returns when the server last answered, if ever.
    pub fn last_online_check(&self) -> Option<DateTime<Utc>> {
        *self.last_online.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates `token` for `hardware_id`.
    ///
    /// # Errors
    ///
    /// Token authenticity failures are returned before any network call.
    /// Business outcomes reported by the server (revoked, expired, hardware
    /// mismatch, not found) are returned as-is. When falling back, an
    /// expired embedded timestamp yields [`LicenseError::Expired`].
    ///
    /// [`LicenseError::Expired`]: crate::LicenseError::Expired
    pub async fn validate(&self, token: &str, hardware_id: &str) -> LicenseResult<Verdict> {
        let token = self.offline.authenticate(token)?;
        let license_id = token.payload().lid;

        let attempt = tokio::time::timeout(
            self.config.online_deadline,
            self.online.validate_online(license_id, hardware_id),
        )
        .await;

        let reason = match attempt {
            Ok(Ok(report)) => {
                *self.last_online.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(self.clock.now());
                debug!(license = %license_id, "online validation succeeded");
                return Ok(Verdict::Online(report));
            }
            Ok(Err(err)) if !err.is_transient() => return Err(err),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!(
                "license server did not answer within {:?}",
                self.config.online_deadline
            ),
        };

        warn!(license = %license_id, %reason, "license server unavailable, using offline token");
        self.offline.check_expiry(&token)?;

        let refresh_due = match self.last_online_check() {
            Some(at) => {
                let elapsed = self.clock.now().signed_duration_since(at);
                elapsed.to_std().unwrap_or_default() >= self.config.refresh_interval
            }
            None => true,
        };

        Ok(Verdict::Offline {
            entitlements: Entitlements::for_tier(token.payload().tier),
            token,
            refresh_due,
            reason,
        })
    }
}
