//! Signed license tokens.
//!
//! Tokens use the format: `base64url(payload).base64url(signature)`
//!
//! The payload is a JSON object with fields in fixed declaration order:
//! - `lid`: license ID
//! - `sub`: owner ID
//! - `tier`: license tier
//! - `iat`: issued-at timestamp (seconds since epoch)
//! - `exp`: expiry timestamp (seconds since epoch)
//! - `kid`: version of the signing key
//!
//! The signature covers `payload_b64.as_bytes()` (the base64url text, not
//! the decoded JSON), so it is checked before anything in the payload is
//! parsed or trusted. New payload fields must be optional and appended;
//! unknown fields are ignored so older engines keep accepting newer tokens.

use crate::error::{LicenseError, LicenseResult};
use crate::keys::{KeyRing, KeyVersion, SigningKey, VerifyingKey};
use crate::model::License;
use crate::tier::Tier;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_types::{LicenseId, OwnerId};

/// The signed claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    /// License ID.
    pub lid: LicenseId,
    /// Owner ID.
    pub sub: OwnerId,
    /// Granted tier.
    pub tier: Tier,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiry timestamp (seconds since epoch).
    pub exp: i64,
    /// Signing key version.
    pub kid: KeyVersion,
}

impl LicensePayload {
    /// Captures the canonical fields of a license.
    #[must_use]
    pub fn from_license(license: &License, kid: KeyVersion) -> Self {
        Self {
            lid: license.id,
            sub: license.owner_id,
            tier: license.tier,
            iat: license.issued_at.timestamp(),
            exp: license.expires_at.timestamp(),
            kid,
        }
    }

    /// Issued-at as a UTC instant.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Expiry as a UTC instant.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Returns true once `now` is strictly past the embedded expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

/// A parsed and verified license token.
///
/// Only [`encode`](Self::encode) and the `decode` functions construct one.
/// Persist the raw string from [`as_str`](Self::as_str) and decode it again
/// on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseToken {
    /// The raw token string.
    raw: String,
    /// Decoded payload.
    payload: LicensePayload,
}

impl LicenseToken {
    /// Signs the canonical fields of `license` and encodes the token.
    pub fn encode(license: &License, signing_key: &SigningKey) -> LicenseResult<Self> {
        let payload = LicensePayload::from_license(license, signing_key.version());
        let payload_json = serde_json::to_vec(&payload)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);
        let signature = signing_key.sign(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

        Ok(Self {
            raw: format!("{payload_b64}.{sig_b64}"),
            payload,
        })
    }

    /// Parses and verifies a token against any key in `keys`.
    ///
    /// # Errors
    ///
    /// [`LicenseError::MalformedToken`] if the token does not have two
    /// non-empty parts, or if an authentic payload cannot be parsed.
    /// [`LicenseError::InvalidSignature`] if no key in the ring verifies the
    /// signature, including when the signature part itself is damaged.
    pub fn decode(token: &str, keys: &KeyRing) -> LicenseResult<Self> {
        let token = token.trim();

        let mut parts = token.split('.');
        let (payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(s), None) if !p.is_empty() && !s.is_empty() => (p, s),
            _ => {
                return Err(LicenseError::MalformedToken(
                    "token must have exactly two non-empty parts separated by a dot".to_string(),
                ));
            }
        };

        // A damaged signature part is a failed verification, not a parse error.
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| LicenseError::InvalidSignature)?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| LicenseError::InvalidSignature)?;

        let key = keys
            .iter()
            .find(|key| key.verify(payload_b64.as_bytes(), &signature).is_ok())
            .ok_or(LicenseError::InvalidSignature)?;

        let payload_json = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|e| {
            LicenseError::MalformedToken(format!("invalid payload base64: {e}"))
        })?;
        let payload: LicensePayload = serde_json::from_slice(&payload_json).map_err(|e| {
            LicenseError::MalformedToken(format!("invalid payload JSON: {e}"))
        })?;

        if payload.kid != key.version() {
            return Err(LicenseError::MalformedToken(format!(
                "token claims key {} but was signed with key {}",
                payload.kid,
                key.version()
            )));
        }

        Ok(Self {
            raw: token.to_string(),
            payload,
        })
    }

    /// Parses and verifies a token against a single public key.
    pub fn decode_with_key(token: &str, key: &VerifyingKey) -> LicenseResult<Self> {
        Self::decode(token, &KeyRing::from(key.clone()))
    }

    /// Returns the raw token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the decoded payload.
    #[must_use]
    pub fn payload(&self) -> &LicensePayload {
        &self.payload
    }

    /// Consumes the token, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> LicensePayload {
        self.payload
    }
}

impl fmt::Display for LicenseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
