//! JSON bodies exchanged between engines and the license server.

use crate::entitlement::Entitlements;
use crate::error::LicenseError;
use crate::model::License;
use serde::{Deserialize, Serialize};
use tessera_types::LicenseId;

/// Body of `POST /api/v1/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// A license ID or a full signed token.
    pub license: String,
    /// Empty for an identity-only check.
    #[serde(default)]
    pub hardware_id: String,
}

/// Body of `POST /api/v1/activations/deactivate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateRequest {
    pub license_id: LicenseId,
    pub hardware_id: String,
}

/// Result of an authoritative online validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub license: License,
    /// Owner-wide entitlements at validation time.
    pub entitlements: Entitlements,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&LicenseError> for ErrorBody {
    fn from(err: &LicenseError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            detail: err.detail(),
        }
    }
}

impl From<ErrorBody> for LicenseError {
    fn from(body: ErrorBody) -> Self {
        LicenseError::from_wire(&body.code, body.detail)
    }
}
