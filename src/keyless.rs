//! Keyless accounts: the "key" is a commitment to an identity-provider
//! assertion rather than a curve point. This core only carries the opaque
//! wire forms; proof verification belongs to an external verifier.

use std::fmt;
use std::io::{self, Write};

use crate::encoding::{write_bytes, CanonicalDeserialize, CanonicalSerialize, Decoder};
use crate::error::SextantError;
use crate::hexutil;

pub const ID_COMMITMENT_LENGTH: usize = 32;

/// Public identity of a keyless account: the issuer URL and a 32-byte
/// identity commitment binding the provider's subject to a pepper.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeylessPublicKey {
    pub iss: String,
    pub idc: [u8; ID_COMMITMENT_LENGTH],
}

impl KeylessPublicKey {
    pub fn new(iss: impl Into<String>, idc: [u8; ID_COMMITMENT_LENGTH]) -> Self {
        KeylessPublicKey { iss: iss.into(), idc }
    }

    /// Parse the canonical wire form from hex (with or without "0x").
    pub fn from_hex(s: &str) -> Result<Self, SextantError> {
        let bytes = hexutil::decode(s)?;
        <KeylessPublicKey as CanonicalDeserialize>::from_bytes(&bytes)
    }
}

impl fmt::Debug for KeylessPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeylessPublicKey({}, 0x{})", self.iss, hexutil::encode(&self.idc))
    }
}

impl CanonicalSerialize for KeylessPublicKey {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.iss.canonical_serialize(writer)?;
        write_bytes(writer, &self.idc)
    }
}

impl CanonicalDeserialize for KeylessPublicKey {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        let iss = String::canonical_deserialize(decoder)?;
        let idc_bytes = decoder.read_var_bytes()?;
        if idc_bytes.len() != ID_COMMITMENT_LENGTH {
            return Err(SextantError::InvalidValue(format!(
                "identity commitment must be {} bytes, got {}",
                ID_COMMITMENT_LENGTH,
                idc_bytes.len()
            )));
        }
        let mut idc = [0u8; ID_COMMITMENT_LENGTH];
        idc.copy_from_slice(idc_bytes);
        Ok(KeylessPublicKey { iss, idc })
    }
}

/// Opaque keyless proof artifact in its wire form. Carried verbatim through
/// authenticators; never inspected here.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeylessSignature(Vec<u8>);

impl KeylessSignature {
    pub fn from_wire_bytes(bytes: Vec<u8>) -> Self {
        KeylessSignature(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, SextantError> {
        Ok(KeylessSignature(hexutil::decode(s)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for KeylessSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeylessSignature({} bytes)", self.0.len())
    }
}

impl CanonicalSerialize for KeylessSignature {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &self.0)
    }
}

impl CanonicalDeserialize for KeylessSignature {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ok(KeylessSignature(decoder.read_var_bytes()?.to_vec()))
    }
}
