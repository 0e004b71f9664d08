//! Pluggable detached-signature facade.
//!
//! Call sites that sign or verify must not care which backend does the
//! work: some platforms sign through an asynchronous native bridge, others
//! synchronously in-process. `SignatureFacade` therefore exposes both
//! operations as futures regardless of the backend, and lets platform
//! initialization swap the implementation exactly once at startup.
//!
//! Verification runs on untrusted input, so it never raises: every backend
//! error is logged and reported as a plain `false`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::core::{CryptoError, SIGNING_KEY_SIZE, VERIFYING_KEY_SIZE};

/// Future returned by a signing backend.
pub type SignFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, CryptoError>> + Send>>;

/// Future returned by a verification backend.
pub type VerifyFuture = Pin<Box<dyn Future<Output = Result<bool, CryptoError>> + Send>>;

/// Signing backend: `(message, secret_key) -> signature`.
pub type SignFn = Arc<dyn Fn(Vec<u8>, Vec<u8>) -> SignFuture + Send + Sync>;

/// Verification backend: `(message, signature, public_key) -> valid`.
pub type VerifyFn = Arc<dyn Fn(Vec<u8>, Vec<u8>, Vec<u8>) -> VerifyFuture + Send + Sync>;

/// Default Ed25519 signing backend.
fn ed25519_sign(message: Vec<u8>, secret_key: Vec<u8>) -> SignFuture {
    Box::pin(async move {
        let mut key: [u8; SIGNING_KEY_SIZE] = secret_key.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("signing key must be {SIGNING_KEY_SIZE} bytes"))
        })?;
        let signing = SigningKey::from_bytes(&key);
        key.zeroize();
        Ok(signing.sign(&message).to_bytes().to_vec())
    })
}

/// Default Ed25519 verification backend.
fn ed25519_verify(message: Vec<u8>, signature: Vec<u8>, public_key: Vec<u8>) -> VerifyFuture {
    Box::pin(async move {
        let key: [u8; VERIFYING_KEY_SIZE] = public_key.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("verifying key must be {VERIFYING_KEY_SIZE} bytes"))
        })?;
        let verifying =
            VerifyingKey::from_bytes(&key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let signature =
            Signature::from_slice(&signature).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(verifying.verify_strict(&message, &signature).is_ok())
    })
}

/// Facade over the process-wide detached-signature implementation.
///
/// Defaults to Ed25519; [`Self::set_implementation`] swaps both functions
/// during platform initialization.
#[derive(Clone)]
pub struct SignatureFacade {
    sign: SignFn,
    verify: VerifyFn,
}

impl Default for SignatureFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SignatureFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureFacade").finish_non_exhaustive()
    }
}

impl SignatureFacade {
    /// Create a facade backed by the default Ed25519 implementation.
    pub fn new() -> Self {
        Self {
            sign: Arc::new(ed25519_sign),
            verify: Arc::new(ed25519_verify),
        }
    }

    /// Replace both backend functions.
    ///
    /// Intended to be called once during platform initialization, before
    /// any signing traffic.
    pub fn set_implementation(&mut self, sign: SignFn, verify: VerifyFn) {
        self.sign = sign;
        self.verify = verify;
    }

    /// Produce a detached signature over `message` with `secret_key`.
    ///
    /// Always asynchronous, even when the backend is synchronous, so call
    /// sites never special-case platforms.
    ///
    /// # Errors
    /// [`CryptoError::InvalidKey`] or [`CryptoError::SigningFailed`]
    /// depending on the backend.
    pub async fn sign_detached(
        &self,
        message: &[u8],
        secret_key: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        (self.sign)(message.to_vec(), secret_key.to_vec()).await
    }

    /// Verify a detached signature.
    ///
    /// Never raises: malformed or attacker-supplied input must not be able
    /// to crash the caller, so backend errors are logged and mapped to
    /// `false`.
    pub async fn verify_detached(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> bool {
        match (self.verify)(message.to_vec(), signature.to_vec(), public_key.to_vec()).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "signature verification errored, treating as invalid");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::SIGNATURE_SIZE;
    use crate::crypto::random::SecureRandom;

    fn keypair() -> ([u8; SIGNING_KEY_SIZE], [u8; VERIFYING_KEY_SIZE]) {
        let rng = SecureRandom::new().unwrap();
        let mut secret = [0u8; SIGNING_KEY_SIZE];
        rng.fill(&mut secret);
        let public = SigningKey::from_bytes(&secret).verifying_key().to_bytes();
        (secret, public)
    }

    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let facade = SignatureFacade::new();
        let (secret, public) = keypair();

        let message = b"authenticate this request";
        let signature = facade.sign_detached(message, &secret).await.unwrap();
        assert_eq!(signature.len(), SIGNATURE_SIZE);
        assert!(facade.verify_detached(message, &signature, &public).await);
    }

    #[tokio::test]
    async fn test_flipped_message_byte_fails() {
        let facade = SignatureFacade::new();
        let (secret, public) = keypair();

        let message = b"authenticate this request".to_vec();
        let signature = facade.sign_detached(&message, &secret).await.unwrap();

        let mut tampered = message.clone();
        tampered[3] ^= 0x01;
        assert!(!facade.verify_detached(&tampered, &signature, &public).await);
    }

    #[tokio::test]
    async fn test_flipped_signature_byte_fails() {
        let facade = SignatureFacade::new();
        let (secret, public) = keypair();

        let message = b"authenticate this request";
        let mut signature = facade.sign_detached(message, &secret).await.unwrap();
        signature[10] ^= 0x01;
        assert!(!facade.verify_detached(message, &signature, &public).await);
    }

    #[tokio::test]
    async fn test_malformed_input_returns_false_not_panic() {
        let facade = SignatureFacade::new();
        let (secret, _) = keypair();
        let message = b"msg";
        let signature = facade.sign_detached(message, &secret).await.unwrap();

        // Wrong-sized public key, wrong-sized signature, empty everything.
        assert!(!facade.verify_detached(message, &signature, &[1, 2, 3]).await);
        assert!(!facade.verify_detached(message, &[0u8; 5], &[0u8; 32]).await);
        assert!(!facade.verify_detached(&[], &[], &[]).await);
    }

    #[tokio::test]
    async fn test_sign_rejects_bad_key_size() {
        let facade = SignatureFacade::new();
        assert!(matches!(
            facade.sign_detached(b"msg", &[0u8; 16]).await,
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_set_implementation_swaps_backend() {
        let mut facade = SignatureFacade::new();
        facade.set_implementation(
            Arc::new(|_msg, _key| -> SignFuture {
                Box::pin(async { Ok(vec![0xAB; SIGNATURE_SIZE]) })
            }),
            Arc::new(|_msg, signature, _key| -> VerifyFuture {
                Box::pin(async move { Ok(signature == vec![0xAB; SIGNATURE_SIZE]) })
            }),
        );

        let signature = facade.sign_detached(b"msg", &[]).await.unwrap();
        assert_eq!(signature, vec![0xAB; SIGNATURE_SIZE]);
        assert!(facade.verify_detached(b"msg", &signature, &[]).await);
        assert!(!facade.verify_detached(b"msg", &[0u8; 64], &[]).await);
    }
}
