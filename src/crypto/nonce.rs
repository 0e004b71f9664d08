//! Nonce and identifier generation.
//!
//! `NonceFactory` produces values that must be globally unique (single-use
//! nonces) or unlinkable-yet-reproducible (identifiers derived from a user
//! identity). Uniqueness of [`NonceFactory::random_nonce`] holds from either
//! the timestamp prefix or the random tail alone, giving defense in depth.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use blake2::digest::consts::{U16, U32};
use blake2::digest::Mac;
use blake2::Blake2bMac;

use crate::core::{
    DEVICE_ID_HASH_SIZE, NONCE_SIZE, NONCE_TIMESTAMP_PREFIX, USER_ID_HASH_PREFIX, USER_ID_SIZE,
};

use super::random::SecureRandom;

/// BLAKE2b MAC with 16-byte output (user-specific ids).
type Blake2bMac128 = Blake2bMac<U16>;

/// BLAKE2b MAC with 32-byte output (device ids).
type Blake2bMac256 = Blake2bMac<U32>;

/// Fixed MAC key for user-specific ids.
const USER_ID_KEY: [u8; 64] = pad_key(b"tether.user-id.v1");

/// Fixed MAC key (personalization) for device ids.
const DEVICE_ID_KEY: [u8; 64] = pad_key(b"tether.device-id.v1");

/// Zero-pad a personalization tag to the BLAKE2b key size.
const fn pad_key(tag: &[u8]) -> [u8; 64] {
    let mut key = [0u8; 64];
    let mut i = 0;
    while i < tag.len() {
        key[i] = tag[i];
        i += 1;
    }
    key
}

/// Current unix time in milliseconds.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A 42-byte user-specific identifier.
///
/// The first 16 bytes are a keyed hash of `username ∥ timestamp`, the
/// remaining 26 bytes are secure random.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpecificId([u8; USER_ID_SIZE]);

impl UserSpecificId {
    /// Raw bytes of the identifier.
    pub fn as_bytes(&self) -> &[u8; USER_ID_SIZE] {
        &self.0
    }

    /// Standard base64 encoding.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Factory for single-use nonces and identity-derived ids.
#[derive(Debug, Clone, Copy)]
pub struct NonceFactory {
    rng: SecureRandom,
}

impl NonceFactory {
    /// Create a factory drawing randomness from `rng`.
    pub fn new(rng: SecureRandom) -> Self {
        Self { rng }
    }

    /// Produce a globally-unique 24-byte single-use nonce.
    ///
    /// Layout: bytes 0..4 are the low 32 bits of the current millisecond
    /// timestamp (big-endian), which stay unique across roughly 50 days of
    /// millisecond-granularity values even if the random bytes were
    /// predictable; bytes 4..24 are secure random.
    pub fn random_nonce(&self) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        let stamp = (unix_millis() & 0xFFFF_FFFF) as u32;
        nonce[..NONCE_TIMESTAMP_PREFIX].copy_from_slice(&stamp.to_be_bytes());
        self.rng.fill(&mut nonce[NONCE_TIMESTAMP_PREFIX..]);
        nonce
    }

    /// Produce a 42-byte id bound to `username` but unlinkable without the
    /// random tail.
    pub fn user_specific_id(&self, username: &str) -> UserSpecificId {
        // Key length is static and valid for BLAKE2b.
        let mut mac = Blake2bMac128::new_from_slice(&USER_ID_KEY).unwrap();
        mac.update(username.as_bytes());
        mac.update(&unix_millis().to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let mut id = [0u8; USER_ID_SIZE];
        id[..USER_ID_HASH_PREFIX].copy_from_slice(&digest);
        self.rng.fill(&mut id[USER_ID_HASH_PREFIX..]);
        UserSpecificId(id)
    }

    /// Derive a device id for `username`.
    ///
    /// Folds in the supplied device-unique string, or fresh secure random
    /// bytes when none is available. Hashing the randomness instead of
    /// returning it raw keeps PRNG output off the wire while the result
    /// stays unique per device. Returned as standard base64.
    pub fn device_id(&self, username: &str, device_uid: Option<&str>) -> String {
        // Key length is static and valid for BLAKE2b.
        let mut mac = Blake2bMac256::new_from_slice(&DEVICE_ID_KEY).unwrap();
        mac.update(username.as_bytes());
        match device_uid {
            Some(uid) => mac.update(uid.as_bytes()),
            None => {
                let mut entropy = [0u8; DEVICE_ID_HASH_SIZE];
                self.rng.fill(&mut entropy);
                mac.update(&entropy);
            }
        }
        BASE64.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> NonceFactory {
        NonceFactory::new(SecureRandom::new().unwrap())
    }

    #[test]
    fn test_random_nonce_size_and_distinctness() {
        let factory = factory();
        let a = factory.random_nonce();
        let b = factory.random_nonce();
        assert_eq!(a.len(), NONCE_SIZE);
        // Distinct even within the same millisecond thanks to the tail.
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_nonce_timestamp_prefix() {
        let factory = factory();
        let before = (unix_millis() & 0xFFFF_FFFF) as u32;
        let nonce = factory.random_nonce();
        let after = (unix_millis() & 0xFFFF_FFFF) as u32;

        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&nonce[..4]);
        let stamp = u32::from_be_bytes(prefix);
        assert!(stamp >= before && stamp <= after);
    }

    #[test]
    fn test_user_specific_id_shape() {
        let factory = factory();
        let id = factory.user_specific_id("alice");
        assert_eq!(id.as_bytes().len(), USER_ID_SIZE);
        assert_eq!(id.to_hex().len(), USER_ID_SIZE * 2);
        assert_eq!(id.to_hex(), hex::encode(id.as_bytes()));
        assert!(!id.to_base64().is_empty());
    }

    #[test]
    fn test_user_specific_id_unique_per_call() {
        let factory = factory();
        let a = factory.user_specific_id("alice");
        let b = factory.user_specific_id("alice");
        assert_ne!(a, b);
    }

    #[test]
    fn test_device_id_stable_for_same_uid() {
        let factory = factory();
        let a = factory.device_id("alice", Some("device-7"));
        let b = factory.device_id("alice", Some("device-7"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_device_id_varies_by_user_and_uid() {
        let factory = factory();
        let a = factory.device_id("alice", Some("device-7"));
        let b = factory.device_id("bob", Some("device-7"));
        let c = factory.device_id("alice", Some("device-8"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_device_id_without_uid_is_unique() {
        let factory = factory();
        let a = factory.device_id("alice", None);
        let b = factory.device_id("alice", None);
        assert_ne!(a, b);
    }
}
