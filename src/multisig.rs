//! Threshold multi-Ed25519 accounts: K-of-N over an ordered key list, with a
//! 4-byte signer bitmap on the composite signature.
//!
//! The bitmap is ordered by key position, not by signature arrival. Component
//! signatures MUST line up with ascending set bits; the aggregator below
//! enforces that by construction.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use crate::address::{AuthenticationKey, Scheme};
use crate::crypto::{
    Ed25519PublicKey, Ed25519Signature, ED25519_PUBLIC_KEY_LENGTH, ED25519_SIGNATURE_LENGTH,
};
use crate::encoding::{write_bytes, CanonicalDeserialize, CanonicalSerialize, Decoder};
use crate::error::SextantError;

/// Hard cap on the number of member keys.
pub const MAX_NUM_OF_KEYS: usize = 32;
pub const BITMAP_NUM_OF_BYTES: usize = 4;

fn bitmap_set_bit(bitmap: &mut [u8; BITMAP_NUM_OF_BYTES], index: u8) {
    bitmap[index as usize / 8] |= 0x80 >> (index % 8);
}

fn bitmap_get_bit(bitmap: &[u8; BITMAP_NUM_OF_BYTES], index: u8) -> bool {
    bitmap[index as usize / 8] & (0x80 >> (index % 8)) != 0
}

fn bitmap_count_ones(bitmap: &[u8; BITMAP_NUM_OF_BYTES]) -> u32 {
    bitmap.iter().map(|byte| byte.count_ones()).sum()
}

/// Ordered member key list plus the signing threshold.
#[derive(Clone, PartialEq, Eq)]
pub struct MultiEd25519PublicKey {
    public_keys: Vec<Ed25519PublicKey>,
    threshold: u8,
}

impl MultiEd25519PublicKey {
    /// Validates `1 <= threshold <= n <= 32`.
    pub fn new(public_keys: Vec<Ed25519PublicKey>, threshold: u8) -> Result<Self, SextantError> {
        let num_keys = public_keys.len();
        if num_keys == 0
            || num_keys > MAX_NUM_OF_KEYS
            || threshold == 0
            || threshold as usize > num_keys
        {
            return Err(SextantError::InvalidThreshold { threshold, num_keys });
        }
        Ok(MultiEd25519PublicKey { public_keys, threshold })
    }

    pub fn public_keys(&self) -> &[Ed25519PublicKey] {
        &self.public_keys
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Key-material form: each member key concatenated, then the threshold
    /// byte. This is the authentication-key preimage and the wire payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.public_keys.len() * ED25519_PUBLIC_KEY_LENGTH + 1);
        for key in &self.public_keys {
            bytes.extend_from_slice(&key.to_bytes());
        }
        bytes.push(self.threshold);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SextantError> {
        if bytes.is_empty() || (bytes.len() - 1) % ED25519_PUBLIC_KEY_LENGTH != 0 {
            return Err(SextantError::InvalidValue(
                "multi-ed25519 key material must be n*32 key bytes plus a threshold byte"
                    .to_string(),
            ));
        }
        let threshold = bytes[bytes.len() - 1];
        let public_keys = bytes[..bytes.len() - 1]
            .chunks(ED25519_PUBLIC_KEY_LENGTH)
            .map(Ed25519PublicKey::from_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        MultiEd25519PublicKey::new(public_keys, threshold)
    }

    pub fn authentication_key(&self) -> AuthenticationKey {
        AuthenticationKey::from_preimage(&self.to_bytes(), Scheme::MultiEd25519)
    }

    /// Verify a composite signature over `message`.
    ///
    /// Rejects with `InsufficientSignatures` when the bitmap population is
    /// below the threshold, and with `SignatureMismatch` when any claimed
    /// component fails under its member key.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &MultiEd25519Signature,
    ) -> Result<(), SextantError> {
        let collected = bitmap_count_ones(&signature.bitmap) as usize;
        if collected < self.threshold as usize {
            return Err(SextantError::InsufficientSignatures {
                collected,
                threshold: self.threshold,
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
        for index in 0..MAX_NUM_OF_KEYS as u8 {
            if !bitmap_get_bit(&signature.bitmap, index) {
                continue;
            }
            let key = self.public_keys.get(index as usize).ok_or_else(|| {
                SextantError::InvalidValue(format!(
                    "bitmap bit {} has no matching member key",
                    index
                ))
            })?;
            key.verify(message, &signature.signatures[component]).map_err(|_| {
                SextantError::SignatureMismatch(format!(
                    "component signature for signer {} failed",
                    index
                ))
            })?;
            component += 1;
        }
        Ok(())
    }
}

impl fmt::Debug for MultiEd25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MultiEd25519PublicKey({}-of-{})",
            self.threshold,
            self.public_keys.len()
        )
    }
}

impl CanonicalSerialize for MultiEd25519PublicKey {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &self.to_bytes())
    }
}

impl CanonicalDeserialize for MultiEd25519PublicKey {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        MultiEd25519PublicKey::from_bytes(decoder.read_var_bytes()?)
    }
}

/// Composite signature: component signatures in ascending bit order plus the
/// signer bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct MultiEd25519Signature {
    signatures: Vec<Ed25519Signature>,
    bitmap: [u8; BITMAP_NUM_OF_BYTES],
}

impl MultiEd25519Signature {
    /// Build from `(signer index, signature)` pairs in any order. Duplicate
    /// or out-of-range indices are rejected.
    pub fn new(pairs: Vec<(u8, Ed25519Signature)>) -> Result<Self, SextantError> {
        let mut ordered = BTreeMap::new();
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
            bitmap_set_bit(&mut bitmap, index);
            signatures.push(signature);
        }
        Ok(MultiEd25519Signature { signatures, bitmap })
    }

    pub fn signatures(&self) -> &[Ed25519Signature] {
        &self.signatures
    }

    pub fn bitmap(&self) -> &[u8; BITMAP_NUM_OF_BYTES] {
        &self.bitmap
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(self.signatures.len() * ED25519_SIGNATURE_LENGTH + BITMAP_NUM_OF_BYTES);
        for signature in &self.signatures {
            bytes.extend_from_slice(&signature.to_bytes());
        }
        bytes.extend_from_slice(&self.bitmap);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SextantError> {
        if bytes.len() < BITMAP_NUM_OF_BYTES
            || (bytes.len() - BITMAP_NUM_OF_BYTES) % ED25519_SIGNATURE_LENGTH != 0
        {
            return Err(SextantError::InvalidValue(
                "multi-ed25519 signature must be n*64 signature bytes plus a 4-byte bitmap"
                    .to_string(),
            ));
        }
        let split = bytes.len() - BITMAP_NUM_OF_BYTES;
        let signatures = bytes[..split]
            .chunks(ED25519_SIGNATURE_LENGTH)
            .map(Ed25519Signature::from_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        let mut bitmap = [0u8; BITMAP_NUM_OF_BYTES];
        bitmap.copy_from_slice(&bytes[split..]);
        if bitmap_count_ones(&bitmap) as usize != signatures.len() {
            return Err(SextantError::InvalidValue(
                "bitmap population does not match signature count".to_string(),
            ));
        }
        Ok(MultiEd25519Signature { signatures, bitmap })
    }
}

impl fmt::Debug for MultiEd25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MultiEd25519Signature({} component(s), bitmap {:02x}{:02x}{:02x}{:02x})",
            self.signatures.len(),
            self.bitmap[0],
            self.bitmap[1],
            self.bitmap[2],
            self.bitmap[3]
        )
    }
}

impl CanonicalSerialize for MultiEd25519Signature {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &self.to_bytes())
    }
}

impl CanonicalDeserialize for MultiEd25519Signature {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        MultiEd25519Signature::from_bytes(decoder.read_var_bytes()?)
    }
}

// --- Aggregation ---

/// Where a collection stands against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationState {
    Collecting,
    Complete,
}

/// Collects `(signer index, signature)` contributions against a fixed key
/// list and threshold, then emits the composite with the bitmap ordering
/// invariant guaranteed (contributions are keyed by index, so arrival order
/// never matters).
pub struct SignatureAggregator {
    public_key: MultiEd25519PublicKey,
    message: Vec<u8>,
    contributions: BTreeMap<u8, Ed25519Signature>,
}

impl SignatureAggregator {
    pub fn new(public_key: MultiEd25519PublicKey, message: Vec<u8>) -> Self {
        SignatureAggregator {
            public_key,
            message,
            contributions: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> AggregationState {
        if self.contributions.len() >= self.public_key.threshold() as usize {
            AggregationState::Complete
        } else {
            AggregationState::Collecting
        }
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Record one signer's contribution and report the new state. The index
    /// must name a member key; a second contribution for the same index is
    /// rejected rather than silently replaced.
    pub fn add_signature(
        &mut self,
        index: u8,
        signature: Ed25519Signature,
    ) -> Result<AggregationState, SextantError> {
        if index as usize >= self.public_key.public_keys().len() {
            return Err(SextantError::InvalidValue(format!(
                "signer index {} out of range for {} member key(s)",
                index,
                self.public_key.public_keys().len()
            )));
        }
        if self.contributions.contains_key(&index) {
            return Err(SextantError::InvalidValue(format!(
                "signer index {} already contributed",
                index
            )));
        }
        self.contributions.insert(index, signature);
        Ok(self.state())
    }

    /// Emit the composite signature. Fails while still collecting.
    pub fn finalize(self) -> Result<MultiEd25519Signature, SextantError> {
        if self.state() == AggregationState::Collecting {
            return Err(SextantError::InsufficientSignatures {
                collected: self.contributions.len(),
                threshold: self.public_key.threshold(),
            });
        }
        MultiEd25519Signature::new(self.contributions.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519PrivateKey;

    fn member_keys(n: usize) -> (Vec<Ed25519PrivateKey>, Vec<Ed25519PublicKey>) {
        let private: Vec<Ed25519PrivateKey> =
            (0..n).map(|_| Ed25519PrivateKey::generate()).collect();
        let public = private.iter().map(|k| k.public_key()).collect();
        (private, public)
    }

    #[test]
    fn test_threshold_validation() {
        let (_, keys) = member_keys(3);
        assert!(MultiEd25519PublicKey::new(keys.clone(), 0).is_err());
        assert!(MultiEd25519PublicKey::new(keys.clone(), 4).is_err());
        assert!(MultiEd25519PublicKey::new(vec![], 1).is_err());
        assert!(MultiEd25519PublicKey::new(keys, 2).is_ok());

        let (_, too_many) = member_keys(MAX_NUM_OF_KEYS + 1);
        assert!(matches!(
            MultiEd25519PublicKey::new(too_many, 1),
            Err(SextantError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_key_material_round_trip() {
        let (_, keys) = member_keys(4);
        let multi = MultiEd25519PublicKey::new(keys, 3).unwrap();
        let bytes = multi.to_bytes();
        assert_eq!(bytes.len(), 4 * 32 + 1);
        assert_eq!(MultiEd25519PublicKey::from_bytes(&bytes).unwrap(), multi);
        // Deterministic authentication key.
        assert_eq!(multi.authentication_key(), multi.authentication_key());
    }

    #[test]
    fn test_one_of_two_second_signer() {
        // Spec vector: 1-of-2, only the second key signs; bit 1 alone is set
        // and verification accepts.
        let (private, public) = member_keys(2);
        let multi = MultiEd25519PublicKey::new(public, 1).unwrap();
        let message = b"bitmap ordering";

        let mut aggregator = SignatureAggregator::new(multi.clone(), message.to_vec());
        assert_eq!(aggregator.state(), AggregationState::Collecting);
        let state = aggregator
            .add_signature(1, private[1].sign(message).unwrap())
            .unwrap();
        assert_eq!(state, AggregationState::Complete);
        let composite = aggregator.finalize().unwrap();

        assert_eq!(composite.bitmap(), &[0b0100_0000, 0, 0, 0]);
        multi.verify(message, &composite).unwrap();
    }

    #[test]
    fn test_threshold_two_rejects_single_signature() {
        let (private, public) = member_keys(2);
        let multi = MultiEd25519PublicKey::new(public, 2).unwrap();
        let message = b"bitmap ordering";

        let composite =
            MultiEd25519Signature::new(vec![(1, private[1].sign(message).unwrap())]).unwrap();
        assert!(matches!(
            multi.verify(message, &composite),
            Err(SextantError::InsufficientSignatures { collected: 1, threshold: 2 })
        ));

        let mut aggregator = SignatureAggregator::new(multi, message.to_vec());
        aggregator.add_signature(1, private[1].sign(message).unwrap()).unwrap();
        assert!(matches!(
            aggregator.finalize(),
            Err(SextantError::InsufficientSignatures { .. })
        ));
    }

    #[test]
    fn test_any_valid_subset_accepted() {
        let (private, public) = member_keys(4);
        let multi = MultiEd25519PublicKey::new(public, 2).unwrap();
        let message = b"subset independence";

        for subset in [[0u8, 2], [1, 3], [2, 3]] {
            let mut aggregator = SignatureAggregator::new(multi.clone(), message.to_vec());
            // Contribute in reverse arrival order; bitmap order must win.
            for &index in subset.iter().rev() {
                aggregator
                    .add_signature(index, private[index as usize].sign(message).unwrap())
                    .unwrap();
            }
            let composite = aggregator.finalize().unwrap();
            multi.verify(message, &composite).unwrap();
        }
    }

    #[test]
    fn test_mismatched_component_rejected() {
        let (private, public) = member_keys(2);
        let multi = MultiEd25519PublicKey::new(public, 1).unwrap();
        let message = b"message";

        // Signature claims index 0 but was produced by key 1.
        let composite =
            MultiEd25519Signature::new(vec![(0, private[1].sign(message).unwrap())]).unwrap();
        assert!(matches!(
            multi.verify(message, &composite),
            Err(SextantError::SignatureMismatch(_))
        ));
    }

    #[test]
    fn test_duplicate_contribution_rejected() {
        let (private, public) = member_keys(2);
        let multi = MultiEd25519PublicKey::new(public, 2).unwrap();
        let message = b"message";
        let mut aggregator = SignatureAggregator::new(multi, message.to_vec());
        aggregator.add_signature(0, private[0].sign(message).unwrap()).unwrap();
        assert!(aggregator.add_signature(0, private[0].sign(message).unwrap()).is_err());
    }

    #[test]
    fn test_wire_round_trip() {
        use crate::encoding::{CanonicalDeserialize, CanonicalSerialize};
        let (private, public) = member_keys(3);
        let multi = MultiEd25519PublicKey::new(public, 2).unwrap();
        let composite = MultiEd25519Signature::new(vec![
            (0, private[0].sign(b"m").unwrap()),
            (2, private[2].sign(b"m").unwrap()),
        ])
        .unwrap();

        let encoded = CanonicalSerialize::to_bytes(&multi);
        let decoded = <MultiEd25519PublicKey as CanonicalDeserialize>::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, multi);

        let encoded = CanonicalSerialize::to_bytes(&composite);
        let decoded =
            <MultiEd25519Signature as CanonicalDeserialize>::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, composite);
    }
}
