//! Account addresses and authentication keys.
//!
//! An address is a fixed 32-byte identifier derived from a scheme-tagged
//! hash of key material. At account creation the address equals the
//! authentication key; rotation may later re-point the authentication key
//! without changing the address.

use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::encoding::{CanonicalDeserialize, CanonicalSerialize, Decoder};
use crate::error::SextantError;
use crate::hexutil;
use crate::provider;

pub const ADDRESS_LENGTH: usize = 32;

/// Scheme tag byte mixed into every authentication-key hash. Distinct tags
/// guarantee two different key-material/scheme pairs cannot collide on the
/// tag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Scheme {
    Ed25519 = 0,
    MultiEd25519 = 1,
    SingleKey = 2,
    MultiKey = 3,
    DeriveAuid = 251,
    DeriveObjectFromObject = 252,
    DeriveObjectFromGuid = 253,
    DeriveObjectFromSeed = 254,
    DeriveResourceAccount = 255,
}

impl TryFrom<u8> for Scheme {
    type Error = SextantError;

    fn try_from(byte: u8) -> Result<Self, SextantError> {
        match byte {
            0 => Ok(Scheme::Ed25519),
            1 => Ok(Scheme::MultiEd25519),
            2 => Ok(Scheme::SingleKey),
            3 => Ok(Scheme::MultiKey),
            251 => Ok(Scheme::DeriveAuid),
            252 => Ok(Scheme::DeriveObjectFromObject),
            253 => Ok(Scheme::DeriveObjectFromGuid),
            254 => Ok(Scheme::DeriveObjectFromSeed),
            255 => Ok(Scheme::DeriveResourceAccount),
            other => Err(SextantError::UnsupportedScheme(other)),
        }
    }
}

/// Fixed 32-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress([u8; ADDRESS_LENGTH]);

impl AccountAddress {
    /// Reserved all-zero address.
    pub const ZERO: AccountAddress = AccountAddress([0u8; ADDRESS_LENGTH]);

    /// Reserved framework address 0x1.
    pub const ONE: AccountAddress = {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 1] = 1;
        AccountAddress(bytes)
    };

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        AccountAddress(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SextantError> {
        if bytes.len() != ADDRESS_LENGTH {
            return Err(SextantError::InvalidValue(format!(
                "address must be {} bytes, got {}",
                ADDRESS_LENGTH,
                bytes.len()
            )));
        }
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(bytes);
        Ok(AccountAddress(out))
    }

    /// Parse a hex address, with or without "0x". Short forms are
    /// left-padded with zeros ("0x1" is the framework address).
    pub fn from_hex(s: &str) -> Result<Self, SextantError> {
        let stripped = hexutil::strip_prefix(s);
        if stripped.is_empty() || stripped.len() > ADDRESS_LENGTH * 2 {
            return Err(SextantError::InvalidValue(format!(
                "address hex must be 1..={} characters",
                ADDRESS_LENGTH * 2
            )));
        }
        let padded = format!("{:0>width$}", stripped, width = ADDRESS_LENGTH * 2);
        Ok(AccountAddress(hexutil::decode_fixed(&padded)?))
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_LENGTH] {
        self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hexutil::encode(&self.0)
    }

    pub fn to_hex_literal(&self) -> String {
        hexutil::encode_prefixed(&self.0)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_literal())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_literal())
    }
}

impl CanonicalSerialize for AccountAddress {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        // Fixed-length array: raw bytes, no length prefix.
        writer.write_all(&self.0)
    }
}

impl CanonicalDeserialize for AccountAddress {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        let bytes = decoder.read_exact(ADDRESS_LENGTH)?;
        AccountAddress::from_bytes(bytes)
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_literal())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AccountAddress::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// 32-byte value identifying which key material currently authorizes an
/// account: `hash256(key_material || scheme_byte)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticationKey([u8; ADDRESS_LENGTH]);

impl AuthenticationKey {
    /// Hash serialized key material under the given scheme tag.
    pub fn from_preimage(key_material: &[u8], scheme: Scheme) -> Self {
        let mut preimage = Vec::with_capacity(key_material.len() + 1);
        preimage.extend_from_slice(key_material);
        preimage.push(scheme as u8);
        AuthenticationKey(provider::hash256(&preimage))
    }

    /// Address derived from an object creator and a seed (DeriveObjectFromSeed).
    pub fn object_address_from_seed(creator: &AccountAddress, seed: &[u8]) -> Self {
        let mut material = Vec::with_capacity(ADDRESS_LENGTH + seed.len());
        material.extend_from_slice(creator.as_slice());
        material.extend_from_slice(seed);
        AuthenticationKey::from_preimage(&material, Scheme::DeriveObjectFromSeed)
    }

    /// Address of the resource account owned by `creator` under `seed`.
    pub fn resource_account_address(creator: &AccountAddress, seed: &[u8]) -> Self {
        let mut material = Vec::with_capacity(ADDRESS_LENGTH + seed.len());
        material.extend_from_slice(creator.as_slice());
        material.extend_from_slice(seed);
        AuthenticationKey::from_preimage(&material, Scheme::DeriveResourceAccount)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SextantError> {
        Ok(AuthenticationKey(AccountAddress::from_bytes(bytes)?.to_bytes()))
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_LENGTH] {
        self.0
    }

    /// The account address this key authenticates (identical bytes at
    /// account creation).
    pub fn derived_address(&self) -> AccountAddress {
        AccountAddress(self.0)
    }

    pub fn to_hex(&self) -> String {
        hexutil::encode(&self.0)
    }
}

impl fmt::Display for AuthenticationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for AuthenticationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        let addr = AccountAddress::from_hex("0x1").unwrap();
        assert_eq!(addr, AccountAddress::ONE);
        assert_eq!(
            addr.to_hex_literal(),
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );

        let full = AccountAddress::from_hex(&addr.to_hex()).unwrap();
        assert_eq!(full, addr);

        assert!(AccountAddress::from_hex("").is_err());
        assert!(AccountAddress::from_hex("0x").is_err());
        assert!(AccountAddress::from_hex(&"f".repeat(65)).is_err());
        assert!(AccountAddress::from_hex("0xzz").is_err());
    }

    #[test]
    fn test_canonical_round_trip() {
        let addr = AccountAddress::from_hex("0xabc123").unwrap();
        let encoded = addr.to_bytes().to_vec();
        // No length prefix on the fixed-size array.
        assert_eq!(addr.to_bytes().len(), 32);
        assert_eq!(AccountAddress::from_bytes(&encoded).unwrap(), addr);

        use crate::encoding::CanonicalSerialize;
        assert_eq!(addr.to_bytes().to_vec(), CanonicalSerialize::to_bytes(&addr));
    }

    #[test]
    fn test_scheme_tags() {
        assert_eq!(Scheme::try_from(0).unwrap(), Scheme::Ed25519);
        assert_eq!(Scheme::try_from(1).unwrap(), Scheme::MultiEd25519);
        assert_eq!(Scheme::try_from(255).unwrap(), Scheme::DeriveResourceAccount);
        assert!(matches!(
            Scheme::try_from(9),
            Err(SextantError::UnsupportedScheme(9))
        ));
    }

    #[test]
    fn test_auth_key_is_deterministic() {
        let material = [0x11u8; 32];
        let a = AuthenticationKey::from_preimage(&material, Scheme::Ed25519);
        let b = AuthenticationKey::from_preimage(&material, Scheme::Ed25519);
        assert_eq!(a, b);
        // A different scheme tag must change the key.
        let c = AuthenticationKey::from_preimage(&material, Scheme::MultiEd25519);
        assert_ne!(a, c);
        assert_eq!(a.derived_address().to_bytes(), a.to_bytes());
    }

    #[test]
    fn test_serde_hex_form() {
        let addr = AccountAddress::ONE;
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.contains("0x"));
        let back: AccountAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
