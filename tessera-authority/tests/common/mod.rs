//! Shared harness for authority tests.

#![allow(dead_code)]

use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use tessera_authority::LicenseAuthority;
use tessera_license::{KeyRing, KeyVersion, ManualClock, SigningKey};
use tessera_store::SqliteStore;

pub struct Harness {
    pub authority: Arc<LicenseAuthority<SqliteStore>>,
    pub store: Arc<SqliteStore>,
    pub clock: ManualClock,
    pub signing_key: SigningKey,
}

impl Harness {
    /// Ring holding only the current public key, as shipped in an engine.
    pub fn engine_keys(&self) -> KeyRing {
        KeyRing::from(self.signing_key.verifying_key())
    }
}

pub fn signing_key(version: u32, seed: u8) -> SigningKey {
    SigningKey::from_bytes(KeyVersion::new(version), &[seed; 32])
}

/// In-memory authority with a frozen clock.
pub fn harness() -> Harness {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = ManualClock::new(Utc::now().trunc_subsecs(0));
    let signing_key = signing_key(1, 7);
    let authority = LicenseAuthority::with_clock(
        Arc::clone(&store),
        signing_key.clone(),
        KeyRing::new(),
        Arc::new(clock.clone()),
    );
    Harness {
        authority: Arc::new(authority),
        store,
        clock,
        signing_key,
    }
}
