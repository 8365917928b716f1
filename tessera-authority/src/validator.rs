//! Online and offline validation, and activation against the ledger.

use std::sync::Arc;
use tessera_license::{
    Activation, ActivationRequest, Clock, Entitlements, KeyRing, License, LicenseError,
    LicensePayload, LicenseResult, LicenseStatus, Limit, OfflineVerifier, SystemClock,
    ValidationReport,
};
use tessera_store::{ActivationLedger, ActivationOutcome, LicenseStore};
use tessera_types::{LicenseId, OwnerId};
use tracing::{debug, info};

/// Validates licenses against the store, or against the token alone.
pub struct Validator<S> {
    store: Arc<S>,
    offline: OfflineVerifier,
    clock: Arc<dyn Clock>,
}

impl<S: LicenseStore + ActivationLedger> Validator<S> {
    /// Creates a validator using wall-clock time.
    pub fn new(store: Arc<S>, keys: KeyRing) -> Self {
        Self::with_clock(store, keys, Arc::new(SystemClock))
    }

    /// Creates a validator with an explicit clock.
    pub fn with_clock(store: Arc<S>, keys: KeyRing, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            offline: OfflineVerifier::with_clock(keys, clock.clone()),
            clock,
        }
    }

    /// Public keys accepted for offline validation.
    pub fn keys(&self) -> &KeyRing {
        self.offline.keys()
    }

    /// Loads a license, persisting an `active` → `expired` flip if the
    /// expiry instant has passed.
    pub fn load(&self, license_id: LicenseId) -> LicenseResult<License> {
        let mut license = self
            .store
            .get_license(license_id)?
            .ok_or_else(|| LicenseError::NotFound(license_id.to_string()))?;
        self.observe_expiry(&mut license)?;
        Ok(license)
    }

    fn observe_expiry(&self, license: &mut License) -> LicenseResult<()> {
        if license.status == LicenseStatus::Active && license.is_expired_at(self.clock.now()) {
            if self.store.mark_expired(license.id)? {
                debug!(license = %license.id, "license expired");
            }
            license.status = LicenseStatus::Expired;
        }
        Ok(())
    }

    /// Authoritative validation against live state.
    ///
    /// An empty or whitespace-only `hardware_id` checks the license alone;
    /// otherwise the hardware must hold a live activation.
    pub fn validate_online(&self, license_id: LicenseId, hardware_id: &str) -> LicenseResult<License> {
        let license = self.load(license_id)?;
        license.ensure_usable(self.clock.now())?;

        if !hardware_id.trim().is_empty()
            && self
                .store
                .find_active(license_id, hardware_id)?
                .is_none()
        {
            return Err(LicenseError::HardwareMismatch(hardware_id.to_string()));
        }
        Ok(license)
    }

    /// Token-only validation: signature and embedded expiry. Cannot observe
    /// revocation.
    pub fn validate_offline(&self, token: &str) -> LicenseResult<LicensePayload> {
        self.offline.verify(token).map(|token| token.into_payload())
    }

    /// Online validation plus the owner's entitlements.
    pub fn report(&self, license_id: LicenseId, hardware_id: &str) -> LicenseResult<ValidationReport> {
        let license = self.validate_online(license_id, hardware_id)?;
        let entitlements = self.entitlements(license.owner_id)?;
        Ok(ValidationReport {
            license,
            entitlements,
        })
    }

    /// Validates by license ID or by full token.
    ///
    /// A token only has to be authentic here; its embedded expiry is
    /// superseded by the stored row.
    pub fn validate(&self, license_or_token: &str, hardware_id: &str) -> LicenseResult<ValidationReport> {
        let license_or_token = license_or_token.trim();
        let license_id = match LicenseId::parse(license_or_token) {
            Ok(id) => id,
            Err(_) => self.offline.authenticate(license_or_token)?.payload().lid,
        };
        self.report(license_id, hardware_id)
    }

    /// Binds hardware to a license, or refreshes an existing binding.
    pub fn activate(&self, request: &ActivationRequest) -> LicenseResult<Activation> {
        request.validate()?;
        let license = self.load(request.license_id)?;
        let now = self.clock.now();
        license.ensure_usable(now)?;

        match self.store.activate(request, license.max_activations, now)? {
            ActivationOutcome::Created(activation) => {
                info!(
                    license = %activation.license_id,
                    hardware = %activation.hardware_id,
                    host = %activation.hostname,
                    "activated"
                );
                Ok(activation)
            }
            ActivationOutcome::Refreshed(activation) => {
                debug!(
                    license = %activation.license_id,
                    hardware = %activation.hardware_id,
                    "refreshed activation"
                );
                Ok(activation)
            }
            ActivationOutcome::LimitReached { active } => Err(LicenseError::ActivationLimitReached {
                max: license.max_activations.get().unwrap_or(active),
            }),
        }
    }

    /// Releases the hardware's slot. Succeeds with `None` when nothing was
    /// bound.
    pub fn deactivate(&self, license_id: LicenseId, hardware_id: &str) -> LicenseResult<Option<Activation>> {
        let closed = self
            .store
            .deactivate(license_id, hardware_id, self.clock.now())?;
        if let Some(activation) = &closed {
            info!(license = %license_id, hardware = %activation.hardware_id, "deactivated");
        }
        Ok(closed)
    }

    /// Owner-wide entitlements: the best of the owner's usable licenses, or
    /// community.
    pub fn entitlements(&self, owner_id: OwnerId) -> LicenseResult<Entitlements> {
        let licenses = self.store.licenses_for_owner(owner_id)?;
        Ok(Entitlements::for_licenses(&licenses, self.clock.now()))
    }

    /// Pipeline limit of an owner.
    pub fn max_pipelines(&self, owner_id: OwnerId) -> LicenseResult<Limit> {
        Ok(self.entitlements(owner_id)?.max_pipelines)
    }

    /// All licenses of an owner, with elapsed expiries persisted.
    pub fn owner_licenses(&self, owner_id: OwnerId) -> LicenseResult<Vec<License>> {
        let mut licenses = self.store.licenses_for_owner(owner_id)?;
        for license in &mut licenses {
            self.observe_expiry(license)?;
        }
        Ok(licenses)
    }
}
