use proptest::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;
use tessera_types::{ActivationId, LicenseId, OwnerId};

// ── LicenseId ─────────────────────────────────────────────────────

#[test]
fn license_id_new_is_unique() {
    let a = LicenseId::new();
    let b = LicenseId::new();
    assert_ne!(a, b);
}

#[test]
fn license_ids_sort_by_creation() {
    let first = LicenseId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = LicenseId::new();
    assert!(first < second);
}

#[test]
fn license_id_display_and_parse() {
    let id = LicenseId::new();
    let parsed = LicenseId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn license_id_parse_trims_whitespace() {
    let id = LicenseId::new();
    let parsed = LicenseId::parse(&format!("  {id}\n")).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn license_id_parse_invalid() {
    assert!(LicenseId::parse("not-a-uuid").is_err());
    assert!(LicenseId::from_str("garbage").is_err());
}

#[test]
fn license_id_serializes_as_plain_string() {
    let id = LicenseId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let parsed: LicenseId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, parsed);
}

// ── OwnerId ───────────────────────────────────────────────────────

#[test]
fn owner_id_accepts_v4_uuids() {
    let uuid = uuid::Uuid::new_v4();
    let id = OwnerId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
    assert_eq!(OwnerId::parse(&uuid.to_string()).unwrap(), id);
}

#[test]
fn owner_id_from_uuid_conversion() {
    let uuid = uuid::Uuid::new_v4();
    let id: OwnerId = uuid.into();
    assert_eq!(id.as_uuid(), uuid);
}

// ── ActivationId ──────────────────────────────────────────────────

#[test]
fn activation_id_hash_and_eq() {
    let id = ActivationId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

#[test]
fn activation_id_debug_names_type() {
    let id = ActivationId::default();
    assert!(format!("{id:?}").contains("ActivationId"));
}

proptest! {
    #[test]
    fn any_uuid_roundtrips_through_display(bytes in prop::array::uniform16(any::<u8>())) {
        let id = LicenseId::from_uuid(uuid::Uuid::from_bytes(bytes));
        let parsed: LicenseId = id.to_string().parse().unwrap();
        prop_assert_eq!(id, parsed);
    }
}
