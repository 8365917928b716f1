//! Whole-lifecycle scenarios across issuer, ledger and validators.

mod common;

use chrono::Duration;
use common::harness;
use std::sync::{Arc, Barrier};
use std::thread;
use tessera_authority::IssueRequest;
use tessera_license::{
    ActivationRequest, FallbackConfig, FallbackValidator, LicenseError, LicenseStatus, Limit,
    OfflineVerifier, Tier, Verdict, validate_offline,
};
use tessera_store::{ActivationLedger, LicenseStore};
use tessera_types::OwnerId;

#[test]
fn pro_license_lifecycle() {
    let h = harness();
    let owner = OwnerId::new();
    let issuance = h
        .authority
        .issue_license(IssueRequest::new(owner, Tier::Pro, 30))
        .unwrap();
    let id = issuance.license.id;
    let id_text = id.to_string();

    h.authority
        .activate_license(&ActivationRequest::new(id, "hw-A"))
        .unwrap();
    let report = h.authority.validate_license(&id_text, "hw-A").unwrap();
    assert_eq!(report.entitlements.max_pipelines, Limit::Bounded(10));

    h.authority.deactivate_license(id, "hw-A").unwrap().unwrap();
    assert!(matches!(
        h.authority.validate_license(&id_text, "hw-A"),
        Err(LicenseError::HardwareMismatch(_))
    ));

    h.authority
        .activate_license(&ActivationRequest::new(id, "hw-B"))
        .unwrap();
    assert!(h.authority.validate_license(&id_text, "hw-B").is_ok());

    let revoked = h.authority.revoke_license(id).unwrap();
    assert_eq!(revoked.id, id);
    assert!(matches!(
        h.authority.validate_license(&id_text, "hw-B"),
        Err(LicenseError::Revoked)
    ));
}

#[test]
fn revocation_is_seen_online_but_not_offline() {
    let h = harness();
    let issuance = h
        .authority
        .issue_license(IssueRequest::new(OwnerId::new(), Tier::Pro, 30))
        .unwrap();
    h.authority.revoke_license(issuance.license.id).unwrap();

    assert!(matches!(
        h.authority.validate_license(issuance.token.as_str(), ""),
        Err(LicenseError::Revoked)
    ));
    let payload = validate_offline(issuance.token.as_str(), &h.engine_keys()).unwrap();
    assert_eq!(payload.lid, issuance.license.id);
}

#[test]
fn past_expiry_is_always_expired() {
    let h = harness();
    let issuance = h
        .authority
        .issue_license(IssueRequest::new(OwnerId::new(), Tier::Trial, 14))
        .unwrap();
    let id = issuance.license.id.to_string();

    h.clock.advance(Duration::days(15));
    for _ in 0..3 {
        assert!(matches!(
            h.authority.validate_license(&id, ""),
            Err(LicenseError::Expired(_))
        ));
        assert!(matches!(
            h.authority.validate_offline(issuance.token.as_str()),
            Err(LicenseError::Expired(_))
        ));
    }
    h.authority.revoke_license(issuance.license.id).unwrap();
    assert!(matches!(
        h.authority.validate_license(&id, ""),
        Err(LicenseError::Expired(_))
    ));
}

#[test]
fn adding_a_license_never_lowers_entitlements() {
    let h = harness();
    let owner = OwnerId::new();
    h.authority
        .issue_license(IssueRequest::new(owner, Tier::Community, 3650))
        .unwrap();
    assert_eq!(h.authority.max_pipelines(owner).unwrap(), Limit::Bounded(1));

    h.authority
        .issue_license(IssueRequest::new(owner, Tier::Pro, 30))
        .unwrap();
    assert_eq!(h.authority.max_pipelines(owner).unwrap(), Limit::Bounded(10));

    let entitlements = h.authority.entitlements(owner).unwrap();
    assert_eq!(entitlements.tier, Tier::Pro);
    assert_eq!(entitlements.max_activations, Limit::Bounded(5));

    // pro lapses, community remains
    h.clock.advance(Duration::days(31));
    assert_eq!(h.authority.max_pipelines(owner).unwrap(), Limit::Bounded(1));
}

#[test]
fn trial_does_not_replace_enterprise() {
    let h = harness();
    let owner = OwnerId::new();
    let enterprise = h
        .authority
        .issue_license(IssueRequest::new(owner, Tier::Enterprise, 365))
        .unwrap()
        .license;
    assert_eq!(h.authority.max_pipelines(owner).unwrap(), Limit::Unbounded);

    let trial = h
        .authority
        .issue_license(IssueRequest::new(owner, Tier::Trial, 14))
        .unwrap();
    assert!(trial.superseded.is_empty());

    assert_eq!(
        h.store.get_license(enterprise.id).unwrap().unwrap().status,
        LicenseStatus::Active
    );
    assert_eq!(h.authority.max_pipelines(owner).unwrap(), Limit::Unbounded);
    assert_eq!(h.authority.entitlements(owner).unwrap().tier, Tier::Enterprise);
    h.authority
        .validate_license(&enterprise.id.to_string(), "")
        .unwrap();
}

#[test]
fn renewal_at_same_tier_replaces_prior() {
    let h = harness();
    let owner = OwnerId::new();
    let first = h
        .authority
        .issue_license(IssueRequest::new(owner, Tier::Pro, 30))
        .unwrap()
        .license;
    let renewal = h
        .authority
        .issue_license(IssueRequest::new(owner, Tier::Pro, 365))
        .unwrap();
    assert_eq!(renewal.superseded, vec![first.id]);
    assert_eq!(h.authority.max_pipelines(owner).unwrap(), Limit::Bounded(10));
}

#[test]
fn concurrent_activation_admits_exactly_the_cap() {
    let h = harness();
    let issuance = h
        .authority
        .issue_license(IssueRequest::new(OwnerId::new(), Tier::Pro, 30))
        .unwrap();
    let license_id = issuance.license.id;
    let cap = 5;
    let barrier = Arc::new(Barrier::new(cap + 1));

    let handles: Vec<_> = (0..=cap)
        .map(|i| {
            let authority = Arc::clone(&h.authority);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                authority.activate_license(&ActivationRequest::new(license_id, format!("hw-{i}")))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let limited = results
        .iter()
        .filter(|r| matches!(r, Err(LicenseError::ActivationLimitReached { max: 5 })))
        .count();
    assert_eq!(ok, cap);
    assert_eq!(limited, 1);
    assert_eq!(h.store.count_active(license_id).unwrap() as usize, cap);
}

#[tokio::test]
async fn engine_prefers_authority_and_falls_back_to_token() {
    let h = harness();
    let issuance = h
        .authority
        .issue_license(IssueRequest::new(OwnerId::new(), Tier::Pro, 30).with_hardware("hw-A"))
        .unwrap();

    let fallback = FallbackValidator::new(
        Arc::clone(&h.authority),
        OfflineVerifier::new(h.engine_keys()),
        FallbackConfig::default(),
    );
    let verdict = fallback
        .validate(issuance.token.as_str(), "hw-A")
        .await
        .unwrap();
    assert!(matches!(verdict, Verdict::Online(_)));

    h.authority.revoke_license(issuance.license.id).unwrap();
    assert!(matches!(
        fallback.validate(issuance.token.as_str(), "hw-A").await,
        Err(LicenseError::Revoked)
    ));
}
