//! Mixed-scheme accounts: an ordered list of public keys that may combine
//! classical Ed25519 members with keyless members, under one threshold.

use std::fmt;
use std::io::{self, Write};

use crate::address::{AuthenticationKey, Scheme};
use crate::crypto::{Ed25519PublicKey, Ed25519Signature};
use crate::encoding::{
    write_bytes, write_uleb128, CanonicalDeserialize, CanonicalSerialize, Decoder,
};
use crate::error::SextantError;
use crate::keyless::{KeylessPublicKey, KeylessSignature};
use crate::multisig::{BITMAP_NUM_OF_BYTES, MAX_NUM_OF_KEYS};

// Wire variant indices. 1 and 2 are reserved for the secp256k1/secp256r1
// schemes this client does not carry.
const VARIANT_ED25519: u32 = 0;
const VARIANT_KEYLESS: u32 = 3;

/// A member public key of a mixed-scheme account.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AnyPublicKey {
    Ed25519(Ed25519PublicKey),
    Keyless(KeylessPublicKey),
}

impl AnyPublicKey {
    /// Authentication key under the unified single-key scheme.
    pub fn authentication_key(&self) -> AuthenticationKey {
        AuthenticationKey::from_preimage(&CanonicalSerialize::to_bytes(self), Scheme::SingleKey)
    }
}

impl CanonicalSerialize for AnyPublicKey {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            AnyPublicKey::Ed25519(key) => {
                write_uleb128(writer, VARIANT_ED25519)?;
                key.canonical_serialize(writer)
            }
            AnyPublicKey::Keyless(key) => {
                write_uleb128(writer, VARIANT_KEYLESS)?;
                key.canonical_serialize(writer)
            }
        }
    }
}

impl CanonicalDeserialize for AnyPublicKey {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        match decoder.read_uleb128()? {
            VARIANT_ED25519 => Ok(AnyPublicKey::Ed25519(Ed25519PublicKey::canonical_deserialize(
                decoder,
            )?)),
            VARIANT_KEYLESS => Ok(AnyPublicKey::Keyless(KeylessPublicKey::canonical_deserialize(
                decoder,
            )?)),
            other => Err(SextantError::UnsupportedScheme(other.min(255) as u8)),
        }
    }
}

/// A member signature matching [`AnyPublicKey`] variant-for-variant.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AnySignature {
    Ed25519(Ed25519Signature),
    Keyless(KeylessSignature),
}

impl AnySignature {
    /// Verify against the matching member key. Keyless proofs are delegated
    /// to an external verifier, never checked here.
    pub fn verify(&self, public_key: &AnyPublicKey, message: &[u8]) -> Result<(), SextantError> {
        match (self, public_key) {
            (AnySignature::Ed25519(signature), AnyPublicKey::Ed25519(key)) => {
                key.verify(message, signature)
            }
            (AnySignature::Keyless(_), AnyPublicKey::Keyless(_)) => {
                Err(SextantError::UnavailablePrimitive(
                    "keyless proof verification requires the external verifier".to_string(),
                ))
            }
            _ => Err(SextantError::SignatureMismatch(
                "signature scheme does not match member key scheme".to_string(),
            )),
        }
    }
}

impl CanonicalSerialize for AnySignature {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            AnySignature::Ed25519(signature) => {
                write_uleb128(writer, VARIANT_ED25519)?;
                signature.canonical_serialize(writer)
            }
            AnySignature::Keyless(signature) => {
                write_uleb128(writer, VARIANT_KEYLESS)?;
                signature.canonical_serialize(writer)
            }
        }
    }
}

impl CanonicalDeserialize for AnySignature {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        match decoder.read_uleb128()? {
            VARIANT_ED25519 => Ok(AnySignature::Ed25519(Ed25519Signature::canonical_deserialize(
                decoder,
            )?)),
            VARIANT_KEYLESS => Ok(AnySignature::Keyless(KeylessSignature::canonical_deserialize(
                decoder,
            )?)),
            other => Err(SextantError::UnsupportedScheme(other.min(255) as u8)),
        }
    }
}

/// Mixed-scheme key set: ordered members plus the number of signatures
/// required. Same threshold invariant as the homogeneous form.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MultiKey {
    public_keys: Vec<AnyPublicKey>,
    signatures_required: u8,
}

impl MultiKey {
    pub fn new(public_keys: Vec<AnyPublicKey>, signatures_required: u8) -> Result<Self, SextantError> {
        let num_keys = public_keys.len();
        if num_keys == 0
            || num_keys > MAX_NUM_OF_KEYS
            || signatures_required == 0
            || signatures_required as usize > num_keys
        {
            return Err(SextantError::InvalidThreshold {
                threshold: signatures_required,
                num_keys,
            });
        }
        Ok(MultiKey { public_keys, signatures_required })
    }

    pub fn public_keys(&self) -> &[AnyPublicKey] {
        &self.public_keys
    }

    pub fn signatures_required(&self) -> u8 {
        self.signatures_required
    }

    pub fn authentication_key(&self) -> AuthenticationKey {
        AuthenticationKey::from_preimage(&CanonicalSerialize::to_bytes(self), Scheme::MultiKey)
    }

    /// Verify a composite mixed-scheme signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &MultiKeySignature) -> Result<(), SextantError> {
        let collected = signature
            .bitmap
            .iter()
            .map(|byte| byte.count_ones())
            .sum::<u32>() as usize;
        if collected < self.signatures_required as usize {
            return Err(SextantError::InsufficientSignatures {
                collected,
                threshold: self.signatures_required,
            });
        }
        if collected != signature.signatures.len() {
            return Err(SextantError::InvalidValue(format!(
                "bitmap claims {} signer(s) but {} signature(s) present",
                collected,
                signature.signatures.len()
            )));
        }
        let mut component = 0usize;
        for index in 0..MAX_NUM_OF_KEYS {
            if signature.bitmap[index / 8] & (0x80 >> (index % 8)) == 0 {
                continue;
            }
            let key = self.public_keys.get(index).ok_or_else(|| {
                SextantError::InvalidValue(format!(
                    "bitmap bit {} has no matching member key",
                    index
                ))
            })?;
            signature.signatures[component].verify(key, message)?;
            component += 1;
        }
        Ok(())
    }
}

impl fmt::Display for MultiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-of-{} multi-key", self.signatures_required, self.public_keys.len())
    }
}

impl CanonicalSerialize for MultiKey {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.public_keys.canonical_serialize(writer)?;
        self.signatures_required.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for MultiKey {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        let public_keys = Vec::<AnyPublicKey>::canonical_deserialize(decoder)?;
        let signatures_required = decoder.read_u8()?;
        MultiKey::new(public_keys, signatures_required)
    }
}

/// Composite signature for a mixed-scheme account: components in ascending
/// bit order plus the signer bitmap.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MultiKeySignature {
    signatures: Vec<AnySignature>,
    bitmap: [u8; BITMAP_NUM_OF_BYTES],
}

impl MultiKeySignature {
    /// Build from `(signer index, signature)` pairs in any order.
    pub fn new(pairs: Vec<(u8, AnySignature)>) -> Result<Self, SextantError> {
        let mut ordered = std::collections::BTreeMap::new();
        for (index, signature) in pairs {
            if index as usize >= MAX_NUM_OF_KEYS {
                return Err(SextantError::InvalidValue(format!(
                    "signer index {} out of range (max {})",
                    index,
                    MAX_NUM_OF_KEYS - 1
                )));
            }
            if ordered.insert(index, signature).is_some() {
                return Err(SextantError::InvalidValue(format!(
                    "duplicate signature for signer index {}",
                    index
                )));
            }
        }
        let mut bitmap = [0u8; BITMAP_NUM_OF_BYTES];
        let mut signatures = Vec::with_capacity(ordered.len());
        for (index, signature) in ordered {
            bitmap[index as usize / 8] |= 0x80 >> (index % 8);
            signatures.push(signature);
        }
        Ok(MultiKeySignature { signatures, bitmap })
    }

    pub fn signatures(&self) -> &[AnySignature] {
        &self.signatures
    }

    pub fn bitmap(&self) -> &[u8; BITMAP_NUM_OF_BYTES] {
        &self.bitmap
    }
}

impl CanonicalSerialize for MultiKeySignature {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.signatures.canonical_serialize(writer)?;
        write_bytes(writer, &self.bitmap)
    }
}

impl CanonicalDeserialize for MultiKeySignature {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        let signatures = Vec::<AnySignature>::canonical_deserialize(decoder)?;
        let bitmap_bytes = decoder.read_var_bytes()?;
        if bitmap_bytes.len() != BITMAP_NUM_OF_BYTES {
            return Err(SextantError::InvalidValue(format!(
                "signer bitmap must be {} bytes, got {}",
                BITMAP_NUM_OF_BYTES,
                bitmap_bytes.len()
            )));
        }
        let mut bitmap = [0u8; BITMAP_NUM_OF_BYTES];
        bitmap.copy_from_slice(bitmap_bytes);
        let claimed = bitmap.iter().map(|byte| byte.count_ones()).sum::<u32>() as usize;
        if claimed != signatures.len() {
            return Err(SextantError::InvalidValue(
                "bitmap population does not match signature count".to_string(),
            ));
        }
        Ok(MultiKeySignature { signatures, bitmap })
    }
}
