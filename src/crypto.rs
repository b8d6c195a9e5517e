//! Ed25519 key and signature types.
//!
//! Private scalars are zeroized on drop and never printed. Curve operations
//! route through the installed primitive provider.

use std::fmt;
use std::io::{self, Write};

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::address::{AuthenticationKey, Scheme};
use crate::encoding::{write_bytes, CanonicalDeserialize, CanonicalSerialize, Decoder};
use crate::error::SextantError;
use crate::hexutil;
use crate::provider;

pub const ED25519_PRIVATE_KEY_LENGTH: usize = 32;
pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;
pub const ED25519_SIGNATURE_LENGTH: usize = 64;

/// Ed25519 private scalar. Holds the only sensitive key material in the
/// single-key scheme.
#[derive(Clone)]
pub struct Ed25519PrivateKey {
    bytes: Zeroizing<[u8; ED25519_PRIVATE_KEY_LENGTH]>,
}

impl Ed25519PrivateKey {
    /// Generate a fresh key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; ED25519_PRIVATE_KEY_LENGTH]);
        OsRng.fill_bytes(&mut *bytes);
        Ed25519PrivateKey { bytes }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SextantError> {
        if bytes.len() != ED25519_PRIVATE_KEY_LENGTH {
            return Err(SextantError::InvalidValue(format!(
                "ed25519 private key must be {} bytes, got {}",
                ED25519_PRIVATE_KEY_LENGTH,
                bytes.len()
            )));
        }
        let mut out = Zeroizing::new([0u8; ED25519_PRIVATE_KEY_LENGTH]);
        out.copy_from_slice(bytes);
        Ok(Ed25519PrivateKey { bytes: out })
    }

    /// Parse from lowercase hex, "0x" prefix optional.
    pub fn from_hex(s: &str) -> Result<Self, SextantError> {
        let bytes = Zeroizing::new(hexutil::decode(s)?);
        Ed25519PrivateKey::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; ED25519_PRIVATE_KEY_LENGTH] {
        *self.bytes
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        let verifying = SigningKey::from_bytes(&self.bytes).verifying_key();
        Ed25519PublicKey(verifying.to_bytes())
    }

    /// Sign raw message bytes.
    pub fn sign(&self, message: &[u8]) -> Result<Ed25519Signature, SextantError> {
        let bytes = provider::provider().ed25519_sign(&self.bytes, message)?;
        Ok(Ed25519Signature(bytes))
    }
}

impl fmt::Debug for Ed25519PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never leak the scalar through logs.
        write!(f, "Ed25519PrivateKey(<redacted>)")
    }
}

/// Ed25519 public key. Any 32 bytes decode; point validity is checked at
/// verification time so the wire round-trip law stays total.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; ED25519_PUBLIC_KEY_LENGTH]);

impl Ed25519PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SextantError> {
        if bytes.len() != ED25519_PUBLIC_KEY_LENGTH {
            return Err(SextantError::InvalidValue(format!(
                "ed25519 public key must be {} bytes, got {}",
                ED25519_PUBLIC_KEY_LENGTH,
                bytes.len()
            )));
        }
        let mut out = [0u8; ED25519_PUBLIC_KEY_LENGTH];
        out.copy_from_slice(bytes);
        Ok(Ed25519PublicKey(out))
    }

    pub fn from_hex(s: &str) -> Result<Self, SextantError> {
        Ed25519PublicKey::from_bytes(&hexutil::decode(s)?)
    }

    pub fn to_bytes(&self) -> [u8; ED25519_PUBLIC_KEY_LENGTH] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hexutil::encode(&self.0)
    }

    /// Authentication key under the plain single-signer scheme.
    pub fn authentication_key(&self) -> AuthenticationKey {
        AuthenticationKey::from_preimage(&self.0, Scheme::Ed25519)
    }

    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), SextantError> {
        provider::provider().ed25519_verify(&self.0, message, &signature.0)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519PublicKey(0x{})", self.to_hex())
    }
}

impl fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl CanonicalSerialize for Ed25519PublicKey {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        // Keys travel as length-prefixed byte strings on the wire.
        write_bytes(writer, &self.0)
    }
}

impl CanonicalDeserialize for Ed25519PublicKey {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ed25519PublicKey::from_bytes(decoder.read_var_bytes()?)
    }
}

/// Detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature([u8; ED25519_SIGNATURE_LENGTH]);

impl Ed25519Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SextantError> {
        if bytes.len() != ED25519_SIGNATURE_LENGTH {
            return Err(SextantError::InvalidValue(format!(
                "ed25519 signature must be {} bytes, got {}",
                ED25519_SIGNATURE_LENGTH,
                bytes.len()
            )));
        }
        let mut out = [0u8; ED25519_SIGNATURE_LENGTH];
        out.copy_from_slice(bytes);
        Ok(Ed25519Signature(out))
    }

    pub fn from_hex(s: &str) -> Result<Self, SextantError> {
        Ed25519Signature::from_bytes(&hexutil::decode(s)?)
    }

    pub fn to_bytes(&self) -> [u8; ED25519_SIGNATURE_LENGTH] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hexutil::encode(&self.0)
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Signature(0x{})", self.to_hex())
    }
}

impl CanonicalSerialize for Ed25519Signature {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &self.0)
    }
}

impl CanonicalDeserialize for Ed25519Signature {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ed25519Signature::from_bytes(decoder.read_var_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{CanonicalDeserialize, CanonicalSerialize};

    #[test]
    fn test_sign_and_verify() {
        let key = Ed25519PrivateKey::generate();
        let public_key = key.public_key();
        let signature = key.sign(b"sextant core").unwrap();
        public_key.verify(b"sextant core", &signature).unwrap();
        assert!(public_key.verify(b"tampered", &signature).is_err());
    }

    #[test]
    fn test_deterministic_public_key() {
        let key = Ed25519PrivateKey::from_bytes(&[3u8; 32]).unwrap();
        assert_eq!(key.public_key(), key.public_key());
        // Same key material, same authentication key.
        assert_eq!(
            key.public_key().authentication_key(),
            key.public_key().authentication_key()
        );
    }

    #[test]
    fn test_hex_forms() {
        let key = Ed25519PrivateKey::from_hex(
            "0xcc92c0eaf80206d817f150e21917f797e49cf644a33ac514de3c316baa2f1bf5",
        )
        .unwrap();
        assert_eq!(
            key.public_key().to_hex(),
            "a686f0309ab80312979606cfccc10ea2740147ae6888351488d11c46f08fbf60"
        );
        let without_prefix = Ed25519PrivateKey::from_hex(
            "cc92c0eaf80206d817f150e21917f797e49cf644a33ac514de3c316baa2f1bf5",
        )
        .unwrap();
        assert_eq!(key.to_bytes(), without_prefix.to_bytes());
    }

    #[test]
    fn test_redacted_debug() {
        let key = Ed25519PrivateKey::generate();
        assert_eq!(format!("{:?}", key), "Ed25519PrivateKey(<redacted>)");
    }

    #[test]
    fn test_wire_round_trip() {
        let key = Ed25519PrivateKey::generate();
        let public_key = key.public_key();
        let encoded = CanonicalSerialize::to_bytes(&public_key);
        assert_eq!(encoded.len(), 33); // uleb length prefix + 32 bytes
        let decoded = <Ed25519PublicKey as CanonicalDeserialize>::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, public_key);

        let signature = key.sign(b"m").unwrap();
        let encoded = CanonicalSerialize::to_bytes(&signature);
        assert_eq!(encoded.len(), 65);
        let decoded = <Ed25519Signature as CanonicalDeserialize>::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, signature);
    }
}
