//! Password-encrypted storage for account private keys.
//!
//! The sealed blob is `nonce || ciphertext` under AES-256-GCM, with the key
//! stretched from the password by PBKDF2-HMAC-SHA256. The public key rides
//! along in the clear so an unseal can prove it recovered the right
//! material before handing it back.

use std::fs;
use std::path::Path;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::Ed25519PrivateKey;
use crate::error::SextantError;

const PBKDF2_ITERATIONS: u32 = 100_000;
const NONCE_LENGTH: usize = 12;
const SALT_LENGTH: usize = 16;

/// A sealed private key, safe to persist.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KeyVault {
    /// Hex-encoded public key of the sealed private key.
    pub public_key: String,
    encrypted_key: Vec<u8>,
    salt: Vec<u8>,
}

fn derive_cipher_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *key);
    key
}

impl KeyVault {
    /// Encrypt a private key under `password`.
    pub fn seal(private_key: &Ed25519PrivateKey, password: &str) -> Result<Self, SextantError> {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        let key = derive_cipher_key(password, &salt);

        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|e| SextantError::Vault(format!("cipher init: {}", e)))?;
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = Zeroizing::new(private_key.to_bytes());
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| SextantError::Vault(format!("encryption failed: {:?}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(KeyVault {
            public_key: private_key.public_key().to_hex(),
            encrypted_key: blob,
            salt: salt.to_vec(),
        })
    }

    /// Decrypt with `password` and verify the recovered key matches the
    /// stored public key before returning it.
    pub fn unseal(&self, password: &str) -> Result<Ed25519PrivateKey, SextantError> {
        if self.encrypted_key.len() < NONCE_LENGTH {
            return Err(SextantError::Vault("encrypted blob too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = self.encrypted_key.split_at(NONCE_LENGTH);
        let key = derive_cipher_key(password, &self.salt);

        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|e| SextantError::Vault(format!("cipher init: {}", e)))?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                .map_err(|_| SextantError::Vault("wrong password or corrupted blob".to_string()))?,
        );

        let private_key = Ed25519PrivateKey::from_bytes(&plaintext)?;
        if private_key.public_key().to_hex() != self.public_key {
            return Err(SextantError::Vault(
                "decrypted key does not match stored public key".to_string(),
            ));
        }
        Ok(private_key)
    }

    /// Persist as JSON (only the sealed parts exist in this struct).
    pub fn save(&self, path: &Path) -> Result<(), SextantError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SextantError::Vault(e.to_string()))?;
        fs::write(path, json).map_err(|e| SextantError::Vault(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, SextantError> {
        let content =
            fs::read_to_string(path).map_err(|e| SextantError::Vault(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| SextantError::Vault(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_unseal() {
        let key = Ed25519PrivateKey::generate();
        let vault = KeyVault::seal(&key, "correct horse battery staple").unwrap();
        let recovered = vault.unseal("correct horse battery staple").unwrap();
        assert_eq!(recovered.to_bytes(), key.to_bytes());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let key = Ed25519PrivateKey::generate();
        let vault = KeyVault::seal(&key, "right").unwrap();
        assert!(matches!(
            vault.unseal("wrong"),
            Err(SextantError::Vault(_))
        ));
    }

    #[test]
    fn test_tampered_blob_rejected() {
        let key = Ed25519PrivateKey::generate();
        let mut vault = KeyVault::seal(&key, "password").unwrap();
        let last = vault.encrypted_key.len() - 1;
        vault.encrypted_key[last] ^= 0xff;
        assert!(vault.unseal("password").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let key = Ed25519PrivateKey::generate();
        let vault = KeyVault::seal(&key, "password").unwrap();
        let json = serde_json::to_string(&vault).unwrap();
        // No raw key material in the serialized form.
        assert!(!json.contains(&hex::encode(key.to_bytes())));
        let loaded: KeyVault = serde_json::from_str(&json).unwrap();
        let recovered = loaded.unseal("password").unwrap();
        assert_eq!(recovered.to_bytes(), key.to_bytes());
    }
}
