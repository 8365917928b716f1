//! Error types for the licensing core.
//!
//! Variants fall into three groups that callers branch on differently:
//! business outcomes (not found, expired, revoked, hardware mismatch,
//! activation limit), hard token failures (bad signature, malformed token)
//! and transient infrastructure failures (storage, network).

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// License (or the record it refers to) does not exist.
    #[error("license not found: {0}")]
    NotFound(String),

    /// License is past its expiry instant. Carries the RFC 3339 expiry.
    #[error("license expired on {0}")]
    Expired(String),

    /// License has been revoked.
    #[error("license has been revoked")]
    Revoked,

    /// The hardware identity has no live activation for this license.
    #[error("hardware {0} is not activated for this license")]
    HardwareMismatch(String),

    /// Every activation slot is taken.
    #[error("activation limit reached (max {max} devices)")]
    ActivationLimitReached { max: u32 },

    /// Ed25519 signature verification failed.
    #[error("license token signature invalid")]
    InvalidSignature,

    /// Token text could not be parsed.
    #[error("malformed license token: {0}")]
    MalformedToken(String),

    /// Unknown tier name.
    #[error("invalid tier: {0}")]
    InvalidTier(String),

    /// Caller supplied an unusable argument.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Key material could not be decoded.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Network error talking to the license server.
    #[error("network error: {0}")]
    Network(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

impl LicenseError {
    /// Returns true for expected outcomes that callers are meant to branch on.
    #[must_use]
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Expired(_)
                | Self::Revoked
                | Self::HardwareMismatch(_)
                | Self::ActivationLimitReached { .. }
        )
    }

    /// Returns true when retrying later (or falling back offline) may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Network(_))
    }

    /// Stable machine-readable code used on the wire.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Expired(_) => "expired",
            Self::Revoked => "revoked",
            Self::HardwareMismatch(_) => "hardware_mismatch",
            Self::ActivationLimitReached { .. } => "activation_limit_reached",
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedToken(_) => "malformed_token",
            Self::InvalidTier(_) => "invalid_tier",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidKey(_) => "invalid_key",
            Self::Storage(_) => "storage",
            Self::Network(_) => "network",
            Self::Serialization(_) => "serialization",
        }
    }

    /// The variant payload as a string, if any. Paired with [`code`](Self::code)
    /// so a remote client can rebuild the same variant.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::NotFound(s)
            | Self::Expired(s)
            | Self::HardwareMismatch(s)
            | Self::MalformedToken(s)
            | Self::InvalidTier(s)
            | Self::InvalidRequest(s)
            | Self::InvalidKey(s)
            | Self::Storage(s)
            | Self::Network(s) => Some(s.clone()),
            Self::ActivationLimitReached { max } => Some(max.to_string()),
            Self::Serialization(e) => Some(e.to_string()),
            Self::Revoked | Self::InvalidSignature => None,
        }
    }

    /// Rebuilds an error from its wire code and detail.
    ///
    /// Unknown codes become [`LicenseError::Network`] so that a newer server
    /// never makes an older engine believe it was revoked.
    #[must_use]
    pub fn from_wire(code: &str, detail: Option<String>) -> Self {
        let detail_or_empty = || detail.clone().unwrap_or_default();
        match code {
            "not_found" => Self::NotFound(detail_or_empty()),
            "expired" => Self::Expired(detail_or_empty()),
            "revoked" => Self::Revoked,
            "hardware_mismatch" => Self::HardwareMismatch(detail_or_empty()),
            "activation_limit_reached" => Self::ActivationLimitReached {
                max: detail
                    .as_deref()
                    .and_then(|d| d.parse().ok())
                    .unwrap_or_default(),
            },
            "invalid_signature" => Self::InvalidSignature,
            "malformed_token" => Self::MalformedToken(detail_or_empty()),
            "invalid_tier" => Self::InvalidTier(detail_or_empty()),
            "invalid_request" => Self::InvalidRequest(detail_or_empty()),
            "invalid_key" => Self::InvalidKey(detail_or_empty()),
            "storage" => Self::Storage(detail_or_empty()),
            other => Self::Network(format!("server error {other}: {}", detail_or_empty())),
        }
    }

    /// Human-facing next step. Connectivity problems never read like a ban.
    #[must_use]
    pub fn remedy(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "check the license ID, or contact support if it was issued to you",
            Self::Expired(_) => {
                "renew the subscription; if it was renewed recently, reconnect to the license server to fetch a fresh token"
            }
            Self::Revoked => "this license was revoked; contact support",
            Self::HardwareMismatch(_) => "activate this machine before using the license on it",
            Self::ActivationLimitReached { .. } => {
                "deactivate an unused machine from your account, or upgrade your plan"
            }
            Self::InvalidSignature | Self::MalformedToken(_) => {
                "the license token is damaged or was not issued by us; copy it again from your account page"
            }
            Self::InvalidTier(_) | Self::InvalidRequest(_) | Self::InvalidKey(_) => {
                "fix the request and try again"
            }
            Self::Storage(_) | Self::Network(_) | Self::Serialization(_) => {
                "the license server is unreachable; the engine keeps running on its offline token, reconnect to refresh it"
            }
        }
    }
}
