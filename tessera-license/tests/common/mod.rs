//! Shared test helpers for license tests.

#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use tessera_license::{
    KeyRing, KeyVersion, License, LicenseStatus, SigningKey, Tier,
};
use tessera_types::{LicenseId, OwnerId};

const SEED: [u8; 32] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 32,
];

/// Returns a deterministic version-1 signing key and a ring accepting it.
pub fn test_keys() -> (SigningKey, KeyRing) {
    let signing_key = SigningKey::from_bytes(KeyVersion::new(1), &SEED);
    let ring = KeyRing::from(signing_key.verifying_key());
    (signing_key, ring)
}

/// Whole-second "now", matching token timestamp precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// An active license issued at `issued_at` and valid for `valid_days`.
pub fn license_issued_at(tier: Tier, issued_at: DateTime<Utc>, valid_days: i64) -> License {
    License {
        id: LicenseId::new(),
        owner_id: OwnerId::new(),
        tier,
        status: LicenseStatus::Active,
        issued_at,
        expires_at: issued_at + Duration::days(valid_days),
        max_activations: tier.max_activations(),
    }
}

/// An active license issued now.
pub fn sample_license(tier: Tier, valid_days: i64) -> License {
    license_issued_at(tier, now(), valid_days)
}

/// Signs an arbitrary payload string the same way the codec does.
pub fn sign_raw(signing_key: &SigningKey, payload_json: &str) -> String {
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    let signature = signing_key.sign(payload_b64.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
    format!("{payload_b64}.{sig_b64}")
}
