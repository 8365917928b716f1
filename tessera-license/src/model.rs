//! License and activation records shared by the issuer, the store and
//! remote clients.

use crate::error::{LicenseError, LicenseResult};
use crate::tier::{Limit, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tessera_types::{ActivationId, LicenseId, OwnerId};

/// Stored lifecycle state of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Usable until `expires_at`.
    Active,
    /// Past `expires_at`. Written lazily the first time expiry is observed.
    Expired,
    /// Revoked by billing cancellation, supersession or an operator.
    Revoked,
}

impl LicenseStatus {
    /// Returns the lowercase storage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(LicenseError::InvalidRequest(format!(
                "unknown license status: {other}"
            ))),
        }
    }
}

/// A persisted license record. The source of truth that tokens are minted
/// from; never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub owner_id: OwnerId,
    pub tier: Tier,
    pub status: LicenseStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_activations: Limit,
}

impl License {
    /// Returns true once `now` is strictly past the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Status as observed at `now`. Elapsed time wins over the stored value,
    /// so an expired license reads as expired even if it was revoked first.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> LicenseStatus {
        if self.is_expired_at(now) {
            LicenseStatus::Expired
        } else {
            self.status
        }
    }

    /// Returns `Ok` if the license grants access at `now`.
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> LicenseResult<()> {
        match self.effective_status(now) {
            LicenseStatus::Active => Ok(()),
            LicenseStatus::Expired => Err(LicenseError::Expired(self.expires_at.to_rfc3339())),
            LicenseStatus::Revoked => Err(LicenseError::Revoked),
        }
    }
}

/// A binding of a license to one hardware identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub id: ActivationId,
    pub license_id: LicenseId,
    pub hardware_id: String,
    pub hostname: String,
    pub platform: String,
    pub version: String,
    pub activated_at: DateTime<Utc>,
    pub ip_address: String,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Activation {
    /// Returns true while the activation occupies a slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }
}

/// What an engine reports about itself when it activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub license_id: LicenseId,
    pub hardware_id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub ip_address: String,
}

impl ActivationRequest {
    /// Creates a request carrying only the binding key.
    #[must_use]
    pub fn new(license_id: LicenseId, hardware_id: impl Into<String>) -> Self {
        Self {
            license_id,
            hardware_id: hardware_id.into(),
            hostname: String::new(),
            platform: String::new(),
            version: String::new(),
            ip_address: String::new(),
        }
    }

    /// Rejects requests without a hardware identity.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.hardware_id.trim().is_empty() {
            return Err(LicenseError::InvalidRequest(
                "hardware_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Materializes the activation row this request creates at `now`.
    #[must_use]
    pub fn to_activation(&self, now: DateTime<Utc>) -> Activation {
        Activation {
            id: ActivationId::new(),
            license_id: self.license_id,
            hardware_id: self.hardware_id.clone(),
            hostname: self.hostname.clone(),
            platform: self.platform.clone(),
            version: self.version.clone(),
            activated_at: now,
            ip_address: self.ip_address.clone(),
            deactivated_at: None,
        }
    }
}
