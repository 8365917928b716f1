//! License issuance.

use chrono::{Duration, SubsecRound};
use std::sync::Arc;
use tessera_license::{
    Activation, ActivationRequest, Clock, License, LicenseError, LicenseResult, LicenseStatus,
    LicenseToken, SigningKey, SystemClock, Tier,
};
use tessera_store::{LicenseStore, NewLicense};
use tessera_types::{LicenseId, OwnerId};
use tracing::info;

/// Parameters of a new license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub owner_id: OwnerId,
    pub tier: Tier,
    /// Validity window in days. Must be at least 1.
    pub valid_days: u32,
    /// Binds this machine in the same transaction when set.
    pub hardware_id: Option<String>,
}

impl IssueRequest {
    /// A request without an initial activation.
    #[must_use]
    pub fn new(owner_id: OwnerId, tier: Tier, valid_days: u32) -> Self {
        Self {
            owner_id,
            tier,
            valid_days,
            hardware_id: None,
        }
    }

    /// Adds an initial activation for `hardware_id`.
    #[must_use]
    pub fn with_hardware(mut self, hardware_id: impl Into<String>) -> Self {
        self.hardware_id = Some(hardware_id.into());
        self
    }
}

/// Everything produced by one issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuance {
    pub license: License,
    pub token: LicenseToken,
    pub activation: Option<Activation>,
    /// Prior licenses of the owner revoked by this issuance.
    pub superseded: Vec<LicenseId>,
}

/// Creates licenses and mints their tokens.
///
/// The signing key is fixed at construction.
pub struct Issuer<S> {
    store: Arc<S>,
    signing_key: SigningKey,
    clock: Arc<dyn Clock>,
}

impl<S: LicenseStore> Issuer<S> {
    /// Creates an issuer using wall-clock time.
    pub fn new(store: Arc<S>, signing_key: SigningKey) -> Self {
        Self::with_clock(store, signing_key, Arc::new(SystemClock))
    }

    /// Creates an issuer with an explicit clock.
    pub fn with_clock(store: Arc<S>, signing_key: SigningKey, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            signing_key,
            clock,
        }
    }

    /// Key used to sign new tokens.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Issues a license.
    ///
    /// The owner's other active licenses of the same tier family and an
    /// equal or lower tier are revoked in the same transaction that inserts
    /// the new row. Higher-tier licenses stay active.
    pub fn issue(&self, request: IssueRequest) -> LicenseResult<Issuance> {
        if request.valid_days == 0 {
            return Err(LicenseError::InvalidRequest(
                "valid_days must be at least 1".into(),
            ));
        }

        // Tokens carry whole seconds; rows must agree with them.
        let issued_at = self.clock.now().trunc_subsecs(0);
        let expires_at = Duration::try_days(i64::from(request.valid_days))
            .and_then(|validity| issued_at.checked_add_signed(validity))
            .ok_or_else(|| {
                LicenseError::InvalidRequest(format!(
                    "valid_days out of range: {}",
                    request.valid_days
                ))
            })?;

        let license = License {
            id: LicenseId::new(),
            owner_id: request.owner_id,
            tier: request.tier,
            status: LicenseStatus::Active,
            issued_at,
            expires_at,
            max_activations: request.tier.max_activations(),
        };
        let token = LicenseToken::encode(&license, &self.signing_key)?;

        let activation = match request.hardware_id {
            Some(hardware_id) => {
                let activation_request = ActivationRequest::new(license.id, hardware_id);
                activation_request.validate()?;
                Some(activation_request.to_activation(issued_at))
            }
            None => None,
        };

        let superseded = self.store.insert_license(NewLicense {
            license: &license,
            supersede: Some(license.tier.family()),
            initial_activation: activation.as_ref(),
        })?;

        info!(
            license = %license.id,
            owner = %license.owner_id,
            tier = %license.tier,
            expires_at = %license.expires_at,
            "issued license"
        );
        for id in &superseded {
            info!(license = %id, replaced_by = %license.id, "revoked superseded license");
        }

        Ok(Issuance {
            license,
            token,
            activation,
            superseded,
        })
    }

    /// Mints a fresh token for an existing, usable license.
    ///
    /// The row is left untouched; the new token carries the current key
    /// version.
    pub fn reissue_token(&self, license_id: LicenseId) -> LicenseResult<LicenseToken> {
        let license = self
            .store
            .get_license(license_id)?
            .ok_or_else(|| LicenseError::NotFound(license_id.to_string()))?;
        license.ensure_usable(self.clock.now())?;
        let token = LicenseToken::encode(&license, &self.signing_key)?;
        info!(license = %license_id, kid = %self.signing_key.version(), "reissued token");
        Ok(token)
    }
}
