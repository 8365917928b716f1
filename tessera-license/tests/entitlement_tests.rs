mod common;

use chrono::Duration;
use common::{now, sample_license};
use std::str::FromStr;
use tessera_license::{Entitlements, LicenseError, LicenseStatus, Limit, Tier, TierFamily};

// ── Tier ─────────────────────────────────────────────────────────

#[test]
fn max_activations_per_tier() {
    assert_eq!(Tier::Community.max_activations(), Limit::Bounded(1));
    assert_eq!(Tier::Trial.max_activations(), Limit::Bounded(2));
    assert_eq!(Tier::Pro.max_activations(), Limit::Bounded(5));
    assert_eq!(Tier::Enterprise.max_activations(), Limit::Unbounded);
}

#[test]
fn max_pipelines_per_tier() {
    assert_eq!(Tier::Community.max_pipelines(), Limit::Bounded(1));
    assert_eq!(Tier::Trial.max_pipelines(), Limit::Bounded(5));
    assert_eq!(Tier::Pro.max_pipelines(), Limit::Bounded(10));
    assert_eq!(Tier::Enterprise.max_pipelines(), Limit::Unbounded);
}

#[test]
fn limits_never_decrease_with_tier() {
    for pair in Tier::ALL.windows(2) {
        assert!(pair[0] < pair[1]);
        assert!(pair[0].max_activations() <= pair[1].max_activations());
        assert!(pair[0].max_pipelines() <= pair[1].max_pipelines());
    }
}

#[test]
fn tier_families() {
    assert_eq!(Tier::Community.family(), TierFamily::Free);
    assert_eq!(Tier::Trial.family(), TierFamily::Subscription);
    assert_eq!(Tier::Pro.family(), TierFamily::Subscription);
    assert_eq!(Tier::Enterprise.family(), TierFamily::Subscription);
}

#[test]
fn tier_parse() {
    assert_eq!(Tier::from_str("pro").unwrap(), Tier::Pro);
    assert_eq!(Tier::from_str(" Enterprise ").unwrap(), Tier::Enterprise);
    assert!(matches!(
        Tier::from_str("platinum"),
        Err(LicenseError::InvalidTier(t)) if t == "platinum"
    ));
}

#[test]
fn tier_serde_is_lowercase() {
    assert_eq!(serde_json::to_string(&Tier::Community).unwrap(), "\"community\"");
    let parsed: Tier = serde_json::from_str("\"trial\"").unwrap();
    assert_eq!(parsed, Tier::Trial);
}

// ── Limit ────────────────────────────────────────────────────────

#[test]
fn bounded_limit_admits_below_cap() {
    let limit = Limit::Bounded(2);
    assert!(limit.admits(0));
    assert!(limit.admits(1));
    assert!(!limit.admits(2));
    assert!(!limit.admits(3));
}

#[test]
fn unbounded_admits_anything() {
    assert!(Limit::Unbounded.admits(u32::MAX));
}

#[test]
fn unbounded_is_the_maximum() {
    assert!(Limit::Unbounded > Limit::Bounded(u32::MAX));
    assert_eq!(Limit::Bounded(3).max(Limit::Unbounded), Limit::Unbounded);
    assert_eq!(Limit::Bounded(3).max(Limit::Bounded(7)), Limit::Bounded(7));
}

#[test]
fn limit_serializes_as_number_or_null() {
    assert_eq!(serde_json::to_string(&Limit::Bounded(5)).unwrap(), "5");
    assert_eq!(serde_json::to_string(&Limit::Unbounded).unwrap(), "null");
    let parsed: Limit = serde_json::from_str("null").unwrap();
    assert_eq!(parsed, Limit::Unbounded);
}

#[test]
fn limit_display() {
    assert_eq!(Limit::Bounded(10).to_string(), "10");
    assert_eq!(Limit::Unbounded.to_string(), "unlimited");
}

// ── Owner entitlements ───────────────────────────────────────────

#[test]
fn community_and_pro_resolve_to_pro_not_sum() {
    let licenses = [
        sample_license(Tier::Community, 365),
        sample_license(Tier::Pro, 30),
    ];
    let entitlements = Entitlements::for_licenses(&licenses, now());
    assert_eq!(entitlements.tier, Tier::Pro);
    assert_eq!(entitlements.max_pipelines, Limit::Bounded(10));
    assert_eq!(entitlements.max_activations, Limit::Bounded(5));
}

#[test]
fn order_of_licenses_does_not_matter() {
    let a = sample_license(Tier::Pro, 30);
    let b = sample_license(Tier::Trial, 14);
    let forward = Entitlements::for_licenses([&a, &b], now());
    let backward = Entitlements::for_licenses([&b, &a], now());
    assert_eq!(forward, backward);
}

#[test]
fn expired_and_revoked_licenses_do_not_count() {
    let mut revoked = sample_license(Tier::Enterprise, 365);
    revoked.status = LicenseStatus::Revoked;
    let expired = sample_license(Tier::Pro, 1);
    let community = sample_license(Tier::Community, 3650);

    let later = now() + Duration::days(2);
    let entitlements = Entitlements::for_licenses([&revoked, &expired, &community], later);
    assert_eq!(entitlements, Entitlements::for_tier(Tier::Community));
}

#[test]
fn no_license_falls_back_to_community() {
    let entitlements = Entitlements::for_licenses(std::iter::empty(), now());
    assert_eq!(entitlements, Entitlements::for_tier(Tier::Community));
}

#[test]
fn enterprise_is_unbounded() {
    let licenses = [sample_license(Tier::Enterprise, 365), sample_license(Tier::Pro, 30)];
    let entitlements = Entitlements::for_licenses(&licenses, now());
    assert!(entitlements.max_pipelines.is_unbounded());
    assert!(entitlements.max_activations.is_unbounded());
}
