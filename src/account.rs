//! A locally-held account: key pair, derived address, and signing
//! convenience over the transaction protocol.

use crate::address::{AccountAddress, AuthenticationKey};
use crate::authenticator::SignedTransaction;
use crate::crypto::{Ed25519PrivateKey, Ed25519PublicKey};
use crate::error::SextantError;
use crate::hd_wallet::{self, DerivationPath};
use crate::transaction::RawTransaction;

/// An account whose private key is held in this process.
pub struct LocalAccount {
    private_key: Ed25519PrivateKey,
    public_key: Ed25519PublicKey,
    address: AccountAddress,
}

impl LocalAccount {
    /// Bind an account to an existing private key. The address defaults to
    /// the derived authentication key; pass an explicit address for rotated
    /// accounts.
    pub fn from_private_key(
        private_key: Ed25519PrivateKey,
        address: Option<AccountAddress>,
    ) -> Self {
        let public_key = private_key.public_key();
        let address =
            address.unwrap_or_else(|| public_key.authentication_key().derived_address());
        LocalAccount { private_key, public_key, address }
    }

    /// Generate a brand-new account from OS entropy.
    pub fn generate() -> Self {
        LocalAccount::from_private_key(Ed25519PrivateKey::generate(), None)
    }

    /// Recover the account at `path` from a mnemonic phrase.
    pub fn from_derive_path(mnemonic: &str, path: &DerivationPath) -> Result<Self, SextantError> {
        let private_key = hd_wallet::derive_key(mnemonic, path)?;
        Ok(LocalAccount::from_private_key(private_key, None))
    }

    pub fn address(&self) -> AccountAddress {
        self.address
    }

    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &Ed25519PrivateKey {
        &self.private_key
    }

    pub fn authentication_key(&self) -> AuthenticationKey {
        self.public_key.authentication_key()
    }

    /// Sign a raw transaction as the single sender.
    pub fn sign_transaction(
        &self,
        raw_txn: RawTransaction,
    ) -> Result<SignedTransaction, SextantError> {
        raw_txn.sign(&self.private_key)
    }
}

impl std::fmt::Debug for LocalAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAccount")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ChainId;
    use crate::transaction::{
        EntryFunction, Identifier, ModuleId, TransactionConfig, TransactionFactory,
        TransactionPayload,
    };

    const MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_golden_account_address() {
        let account = LocalAccount::from_derive_path(MNEMONIC, &DerivationPath::account(0)).unwrap();
        assert_eq!(
            account.address().to_hex(),
            "eb663b681209e7087d681c5d3eed12aaa8e1915e7c87794542c3f96e94b3d3bf"
        );
        // Address equals the initial authentication key.
        assert_eq!(
            account.address(),
            account.authentication_key().derived_address()
        );
    }

    #[test]
    fn test_end_to_end_transfer_signing() {
        let account = LocalAccount::generate();
        let config = TransactionConfig::new(200_000, 100, 60, ChainId(4)).unwrap();
        let factory = TransactionFactory::new(config);

        let payload = TransactionPayload::EntryFunction(EntryFunction::new(
            ModuleId::new(crate::address::AccountAddress::ONE, Identifier::new("coin").unwrap()),
            Identifier::new("transfer").unwrap(),
            vec![],
            vec![
                LocalAccount::generate().address().to_bytes().to_vec(),
                500u64.to_le_bytes().to_vec(),
            ],
        ));
        let raw = factory.build(account.address(), 0, payload);
        let signed = account.sign_transaction(raw).unwrap();
        signed.verify_signatures().unwrap();
    }

    #[test]
    fn test_explicit_address_for_rotated_account() {
        let key = Ed25519PrivateKey::generate();
        let rotated_to = AccountAddress::from_hex("0xcafe").unwrap();
        let account = LocalAccount::from_private_key(key, Some(rotated_to));
        assert_eq!(account.address(), rotated_to);
        // Authentication key still follows the key material.
        assert_ne!(account.authentication_key().derived_address(), rotated_to);
    }
}
