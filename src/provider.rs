//! Process-wide cryptographic primitive provider.
//!
//! All hashing and curve operations in this crate go through a single
//! installed [`PrimitiveProvider`] so the capability set is explicit and
//! swappable. Installation is exactly-once and safe under concurrent
//! first use; if nothing was installed, first use installs the standard
//! sha3/ed25519-dalek provider.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use once_cell::sync::OnceCell;
use sha3::{Digest, Sha3_256};

use crate::error::SextantError;

/// Capability surface over the underlying primitives: a 256-bit
/// collision-resistant hash plus Ed25519 sign/verify. A provider may refuse
/// a capability with `UnavailablePrimitive`.
pub trait PrimitiveProvider: Send + Sync {
    /// Collision-resistant 256-bit hash (SHA3-256 on the standard provider).
    fn hash256(&self, data: &[u8]) -> [u8; 32];

    fn ed25519_sign(&self, key: &[u8; 32], message: &[u8]) -> Result<[u8; 64], SextantError>;

    fn ed25519_verify(
        &self,
        public_key: &[u8; 32],
        message: &[u8],
        signature: &[u8; 64],
    ) -> Result<(), SextantError>;
}

/// Default provider backed by `sha3` and `ed25519-dalek`.
pub struct StandardProvider;

impl PrimitiveProvider for StandardProvider {
    fn hash256(&self, data: &[u8]) -> [u8; 32] {
        let digest = Sha3_256::digest(data);
        digest.into()
    }

    fn ed25519_sign(&self, key: &[u8; 32], message: &[u8]) -> Result<[u8; 64], SextantError> {
        let signing_key = SigningKey::from_bytes(key);
        Ok(signing_key.sign(message).to_bytes())
    }

    fn ed25519_verify(
        &self,
        public_key: &[u8; 32],
        message: &[u8],
        signature: &[u8; 64],
    ) -> Result<(), SextantError> {
        let verifying_key = VerifyingKey::from_bytes(public_key)
            .map_err(|_| SextantError::InvalidValue("malformed ed25519 public key".to_string()))?;
        let signature = Signature::from_bytes(signature);
        verifying_key
            .verify(message, &signature)
            .map_err(|_| SextantError::SignatureMismatch("ed25519 verification failed".to_string()))
    }
}

static PROVIDER: OnceCell<Box<dyn PrimitiveProvider>> = OnceCell::new();

/// Install a provider. Idempotent: the first install wins and later calls
/// return `false` without replacing anything.
pub fn install(provider: Box<dyn PrimitiveProvider>) -> bool {
    let installed = PROVIDER.set(provider).is_ok();
    if installed {
        tracing::debug!("primitive provider installed");
    }
    installed
}

/// Handle to the installed provider, installing the standard one on first use.
pub fn provider() -> &'static dyn PrimitiveProvider {
    PROVIDER.get_or_init(|| Box::new(StandardProvider)).as_ref()
}

/// Convenience wrapper for the hash capability.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    provider().hash256(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSignProvider;

    impl PrimitiveProvider for NoSignProvider {
        fn hash256(&self, _data: &[u8]) -> [u8; 32] {
            [0u8; 32]
        }

        fn ed25519_sign(&self, _key: &[u8; 32], _msg: &[u8]) -> Result<[u8; 64], SextantError> {
            Err(SextantError::UnavailablePrimitive("ed25519 sign".to_string()))
        }

        fn ed25519_verify(
            &self,
            _pk: &[u8; 32],
            _msg: &[u8],
            _sig: &[u8; 64],
        ) -> Result<(), SextantError> {
            Err(SextantError::UnavailablePrimitive("ed25519 verify".to_string()))
        }
    }

    #[test]
    fn test_standard_hash() {
        // sha3-256 of the empty string, a fixed reference value.
        assert_eq!(
            hex::encode(StandardProvider.hash256(b"")),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let provider = StandardProvider;
        let key = [7u8; 32];
        let signature = provider.ed25519_sign(&key, b"message").unwrap();
        let public_key = SigningKey::from_bytes(&key).verifying_key().to_bytes();
        provider.ed25519_verify(&public_key, b"message", &signature).unwrap();
        assert!(provider.ed25519_verify(&public_key, b"other", &signature).is_err());
    }

    #[test]
    fn test_install_is_exactly_once() {
        // Force initialization, then confirm a second install is refused.
        let _ = provider().hash256(b"init");
        assert!(!install(Box::new(StandardProvider)));
    }

    #[test]
    fn test_missing_capability_is_reported() {
        let fake = NoSignProvider;
        assert!(matches!(
            fake.ed25519_sign(&[0u8; 32], b"m"),
            Err(SextantError::UnavailablePrimitive(_))
        ));
    }
}
