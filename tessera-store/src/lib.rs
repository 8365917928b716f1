//! Persistence for licenses and activations.
//!
//! Two traits split the persisted state the way the authority uses it:
//!
//! - [`LicenseStore`]: license rows, including supersession on re-issue
//! - [`ActivationLedger`]: the hardware bindings of each license, with the
//!   per-license cap enforced atomically
//!
//! [`SqliteStore`] implements both over a single SQLite database. Rows are
//! never hard-deleted: licenses change status, activations are closed by
//! setting `deactivated_at`.

mod error;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use tessera_license::{Activation, ActivationRequest, License, LicenseStatus, Limit, TierFamily};
use tessera_types::{LicenseId, OwnerId};

/// A license to persist together with its side effects.
#[derive(Debug, Clone, Copy)]
pub struct NewLicense<'a> {
    pub license: &'a License,
    /// Revoke the owner's other active licenses of this family whose tier is
    /// not above the new license's tier.
    pub supersede: Option<TierFamily>,
    /// Activation to record in the same transaction.
    pub initial_activation: Option<&'a Activation>,
}

/// Result of an activation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// A new slot was taken.
    Created(Activation),
    /// The hardware already held a live activation; its details were refreshed.
    Refreshed(Activation),
    /// Every slot is taken.
    LimitReached { active: u32 },
}

/// Persistent store of license records.
pub trait LicenseStore: Send + Sync {
    /// Inserts a license and applies supersession atomically.
    ///
    /// Returns the IDs of licenses revoked by supersession.
    fn insert_license(&self, new: NewLicense<'_>) -> StoreResult<Vec<LicenseId>>;

    /// Loads a license by ID.
    fn get_license(&self, id: LicenseId) -> StoreResult<Option<License>>;

    /// Lists all licenses of an owner, oldest first.
    fn licenses_for_owner(&self, owner_id: OwnerId) -> StoreResult<Vec<License>>;

    /// Overwrites the stored status. Returns the updated row, or `None` if
    /// the license does not exist.
    fn set_status(&self, id: LicenseId, status: LicenseStatus) -> StoreResult<Option<License>>;

    /// Flips an `active` license to `expired`. Other statuses are kept.
    /// Returns true if a row changed.
    fn mark_expired(&self, id: LicenseId) -> StoreResult<bool>;
}

/// Persistent store of license-to-hardware bindings.
pub trait ActivationLedger: Send + Sync {
    /// Binds `request.hardware_id` to the license if a slot is free under
    /// `limit`, or refreshes an existing live binding.
    ///
    /// The live-count check and the insert happen in one serialized
    /// transaction, so concurrent callers can never exceed `limit`.
    fn activate(
        &self,
        request: &ActivationRequest,
        limit: Limit,
        now: DateTime<Utc>,
    ) -> StoreResult<ActivationOutcome>;

    /// Closes the live activation of `hardware_id`, if any.
    fn deactivate(
        &self,
        license_id: LicenseId,
        hardware_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Activation>>;

    /// Returns the live activation of `hardware_id`, if any.
    fn find_active(&self, license_id: LicenseId, hardware_id: &str)
    -> StoreResult<Option<Activation>>;

    /// Lists every activation of a license, live and closed, oldest first.
    fn activations(&self, license_id: LicenseId) -> StoreResult<Vec<Activation>>;

    /// Number of live activations.
    fn count_active(&self, license_id: LicenseId) -> StoreResult<u32>;
}
