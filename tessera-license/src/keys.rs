//! Ed25519 key material for signing and verifying license tokens.
//!
//! The private half lives only on the issuing server. The public half is
//! compiled into engine binaries, so every key carries a [`KeyVersion`]
//! and verifiers hold a [`KeyRing`] that can accept several versions while
//! a rotation rolls out.

use crate::error::{LicenseError, LicenseResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{
    Signature, Signer as _, SigningKey as DalekSigningKey, VerifyingKey as DalekVerifyingKey,
    PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// Version tag of a signing key, written into every token as `kid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyVersion(u32);

impl KeyVersion {
    /// Creates a key version tag.
    #[must_use]
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// Returns the numeric version.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Ed25519 signing key (secret). Only the issuer holds one.
#[derive(Clone)]
pub struct SigningKey {
    version: KeyVersion,
    inner: DalekSigningKey,
}

impl SigningKey {
    /// Creates a signing key from a raw 32-byte secret.
    #[must_use]
    pub fn from_bytes(version: KeyVersion, bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            version,
            inner: DalekSigningKey::from_bytes(bytes),
        }
    }

    /// Decodes a signing key from standard base64.
    pub fn from_base64(version: KeyVersion, encoded: &str) -> LicenseResult<Self> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(encoded.trim())
                .map_err(|e| LicenseError::InvalidKey(format!("private key base64: {e}")))?,
        );
        let secret: &[u8; SECRET_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            LicenseError::InvalidKey(format!(
                "private key must be {SECRET_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(version, secret))
    }

    /// Encodes the secret as standard base64 in a buffer wiped on drop.
    #[must_use]
    pub fn to_base64(&self) -> Zeroizing<String> {
        let secret = Zeroizing::new(self.inner.to_bytes());
        Zeroizing::new(BASE64.encode(secret.as_slice()))
    }

    /// Returns the key version.
    #[must_use]
    pub fn version(&self) -> KeyVersion {
        self.version
    }

    /// Signs a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.inner.sign(message)
    }

    /// Returns the matching verifying key, with the same version.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            version: self.version,
            inner: self.inner.verifying_key(),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("version", &self.version)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SigningKey {
    fn eq(&self, other: &Self) -> bool {
        let ours = Zeroizing::new(self.inner.to_bytes());
        let theirs = Zeroizing::new(other.inner.to_bytes());
        self.version == other.version && *ours == *theirs
    }
}

impl Eq for SigningKey {}

/// Ed25519 verifying key (public). Embedded in engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    version: KeyVersion,
    inner: DalekVerifyingKey,
}

impl VerifyingKey {
    /// Creates a verifying key from a raw 32-byte public key.
    pub fn from_bytes(version: KeyVersion, bytes: &[u8; PUBLIC_KEY_LENGTH]) -> LicenseResult<Self> {
        let inner = DalekVerifyingKey::from_bytes(bytes)
            .map_err(|_| LicenseError::InvalidKey("public key is not a valid curve point".into()))?;
        Ok(Self { version, inner })
    }

    /// Decodes a verifying key from standard base64.
    pub fn from_base64(version: KeyVersion, encoded: &str) -> LicenseResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| LicenseError::InvalidKey(format!("public key base64: {e}")))?;
        let public: &[u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            LicenseError::InvalidKey(format!(
                "public key must be {PUBLIC_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Self::from_bytes(version, public)
    }

    /// Encodes the public key as standard base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.inner.as_bytes())
    }

    /// Returns the raw 32-byte public key.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.inner.to_bytes()
    }

    /// Returns the key version.
    #[must_use]
    pub fn version(&self) -> KeyVersion {
        self.version
    }

    /// Verifies a signature, rejecting non-canonical encodings.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> LicenseResult<()> {
        self.inner
            .verify_strict(message, signature)
            .map_err(|_| LicenseError::InvalidSignature)
    }
}

/// A signing/verifying key pair for one issuer deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a fresh key pair from the OS entropy source.
    #[must_use]
    pub fn generate(version: KeyVersion) -> Self {
        Self {
            signing_key: SigningKey {
                version,
                inner: DalekSigningKey::generate(&mut OsRng),
            },
        }
    }

    /// Returns the signing half.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Returns the verifying half.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Encodes both halves for storage and distribution.
    #[must_use]
    pub fn serialize(&self) -> SerializedKeyPair {
        SerializedKeyPair {
            version: self.signing_key.version,
            private_key: self.signing_key.to_base64(),
            public_key: self.verifying_key().to_base64(),
        }
    }

    /// Restores a key pair, checking that both halves belong together.
    pub fn deserialize(serialized: &SerializedKeyPair) -> LicenseResult<Self> {
        let signing_key = SigningKey::from_base64(serialized.version, &serialized.private_key)?;
        let public = VerifyingKey::from_base64(serialized.version, &serialized.public_key)?;
        if signing_key.verifying_key() != public {
            return Err(LicenseError::InvalidKey(
                "public key does not match private key".into(),
            ));
        }
        Ok(Self { signing_key })
    }
}

/// Base64 form of a [`KeyPair`]. The private half goes to the secret store,
/// the public half into engine builds.
#[derive(Debug, Clone)]
pub struct SerializedKeyPair {
    pub version: KeyVersion,
    pub private_key: Zeroizing<String>,
    pub public_key: String,
}

/// The set of public keys a verifier accepts, by version.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: BTreeMap<KeyVersion, VerifyingKey>,
}

impl KeyRing {
    /// Creates an empty key ring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key, replacing any key with the same version.
    pub fn insert(&mut self, key: VerifyingKey) {
        self.keys.insert(key.version, key);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: VerifyingKey) -> Self {
        self.insert(key);
        self
    }

    /// Returns the key for a version.
    #[must_use]
    pub fn get(&self, version: KeyVersion) -> Option<&VerifyingKey> {
        self.keys.get(&version)
    }

    /// Iterates keys newest version first.
    pub fn iter(&self) -> impl Iterator<Item = &VerifyingKey> {
        self.keys.values().rev()
    }

    /// Number of accepted keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no key is accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl From<VerifyingKey> for KeyRing {
    fn from(key: VerifyingKey) -> Self {
        Self::new().with(key)
    }
}

impl FromIterator<VerifyingKey> for KeyRing {
    fn from_iter<I: IntoIterator<Item = VerifyingKey>>(iter: I) -> Self {
        let mut ring = Self::new();
        for key in iter {
            ring.insert(key);
        }
        ring
    }
}
