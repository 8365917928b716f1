//! Shared fixtures for store tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, SubsecRound, Utc};
use tessera_license::{ActivationRequest, License, LicenseStatus, Tier};
use tessera_types::{LicenseId, OwnerId};

pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn license_for(owner_id: OwnerId, tier: Tier) -> License {
    let issued_at = now();
    License {
        id: LicenseId::new(),
        owner_id,
        tier,
        status: LicenseStatus::Active,
        issued_at,
        expires_at: issued_at + Duration::days(30),
        max_activations: tier.max_activations(),
    }
}

pub fn request(license_id: LicenseId, hardware_id: &str) -> ActivationRequest {
    ActivationRequest {
        hostname: format!("host-{hardware_id}"),
        platform: "linux/x86_64".into(),
        version: "1.0.0".into(),
        ip_address: "203.0.113.7".into(),
        ..ActivationRequest::new(license_id, hardware_id)
    }
}
