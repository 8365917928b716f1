//! The license authority facade.

use crate::issuer::{Issuance, IssueRequest, Issuer};
use crate::validator::Validator;
use async_trait::async_trait;
use std::sync::Arc;
use tessera_license::{
    Activation, ActivationRequest, Clock, Entitlements, KeyRing, License, LicenseError,
    LicensePayload, LicenseResult, LicenseStatus, LicenseToken, Limit, OnlineValidator,
    SigningKey, SystemClock, ValidationReport,
};
use tessera_store::{ActivationLedger, LicenseStore};
use tessera_types::{LicenseId, OwnerId};
use tracing::{info, warn};

/// Entry point for every inbound licensing operation.
///
/// Billing drives [`issue_license`](Self::issue_license) and
/// [`revoke_license`](Self::revoke_license); engines drive activation and
/// validation, either through the HTTP layer or in-process via
/// [`OnlineValidator`].
pub struct LicenseAuthority<S> {
    store: Arc<S>,
    issuer: Issuer<S>,
    validator: Validator<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LicenseStore + ActivationLedger> LicenseAuthority<S> {
    /// Creates an authority using wall-clock time.
    ///
    /// The signing key's public half is always accepted, in addition to
    /// `retired_keys`.
    pub fn new(store: Arc<S>, signing_key: SigningKey, retired_keys: KeyRing) -> Self {
        Self::with_clock(store, signing_key, retired_keys, Arc::new(SystemClock))
    }

    /// Creates an authority with an explicit clock.
    pub fn with_clock(
        store: Arc<S>,
        signing_key: SigningKey,
        retired_keys: KeyRing,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let keys = retired_keys.with(signing_key.verifying_key());
        Self {
            validator: Validator::with_clock(Arc::clone(&store), keys, Arc::clone(&clock)),
            issuer: Issuer::with_clock(Arc::clone(&store), signing_key, Arc::clone(&clock)),
            store,
            clock,
        }
    }

    /// The issuing half.
    pub fn issuer(&self) -> &Issuer<S> {
        &self.issuer
    }

    /// The validating half.
    pub fn validator(&self) -> &Validator<S> {
        &self.validator
    }

    // ── Billing-facing ───────────────────────────────────────────

    /// Issues a license and its token.
    pub fn issue_license(&self, request: IssueRequest) -> LicenseResult<Issuance> {
        self.issuer.issue(request)
    }

    /// Revokes a license. Returns the revoked row for downstream consumers.
    pub fn revoke_license(&self, license_id: LicenseId) -> LicenseResult<License> {
        let license = self
            .store
            .set_status(license_id, LicenseStatus::Revoked)?
            .ok_or_else(|| LicenseError::NotFound(license_id.to_string()))?;
        info!(license = %license_id, owner = %license.owner_id, "revoked license");
        Ok(license)
    }

    /// Mints a fresh token for an existing license.
    pub fn reissue_token(&self, license_id: LicenseId) -> LicenseResult<LicenseToken> {
        self.issuer.reissue_token(license_id)
    }

    // ── Engine-facing ────────────────────────────────────────────

    /// Binds hardware to a license.
    pub fn activate_license(&self, request: &ActivationRequest) -> LicenseResult<Activation> {
        self.validator.activate(request)
    }

    /// Releases a hardware binding.
    pub fn deactivate_license(
        &self,
        license_id: LicenseId,
        hardware_id: &str,
    ) -> LicenseResult<Option<Activation>> {
        self.validator.deactivate(license_id, hardware_id)
    }

    /// Validates by license ID or token against live state.
    pub fn validate_license(
        &self,
        license_or_token: &str,
        hardware_id: &str,
    ) -> LicenseResult<ValidationReport> {
        self.validator.validate(license_or_token, hardware_id)
    }

    /// Validates a token without consulting the store.
    pub fn validate_offline(&self, token: &str) -> LicenseResult<LicensePayload> {
        self.validator.validate_offline(token)
    }

    // ── Queries ──────────────────────────────────────────────────

    /// All licenses of an owner.
    pub fn user_licenses(&self, owner_id: OwnerId) -> LicenseResult<Vec<License>> {
        self.validator.owner_licenses(owner_id)
    }

    /// Activation history of a license, live and closed.
    pub fn license_activations(&self, license_id: LicenseId) -> LicenseResult<Vec<Activation>> {
        if self.store.get_license(license_id)?.is_none() {
            return Err(LicenseError::NotFound(license_id.to_string()));
        }
        Ok(self.store.activations(license_id)?)
    }

    /// Owner-wide entitlements.
    pub fn entitlements(&self, owner_id: OwnerId) -> LicenseResult<Entitlements> {
        self.validator.entitlements(owner_id)
    }

    /// Pipeline limit of an owner.
    pub fn max_pipelines(&self, owner_id: OwnerId) -> LicenseResult<Limit> {
        self.validator.max_pipelines(owner_id)
    }

    /// Best-effort status lookup for telemetry.
    ///
    /// Never fails: unknown licenses and storage errors both yield `None`.
    pub fn telemetry_status(&self, license_id: LicenseId) -> Option<LicenseStatus> {
        match self.validator.load(license_id) {
            Ok(license) => Some(license.effective_status(self.clock.now())),
            Err(LicenseError::NotFound(_)) => None,
            Err(err) => {
                warn!(license = %license_id, error = %err, "telemetry license lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl<S: LicenseStore + ActivationLedger> OnlineValidator for LicenseAuthority<S> {
    async fn validate_online(
        &self,
        license_id: LicenseId,
        hardware_id: &str,
    ) -> LicenseResult<ValidationReport> {
        self.validator.report(license_id, hardware_id)
    }
}
