//! Account and transaction authenticators: the proof-of-authorization half
//! of a signed transaction.
//!
//! An account authenticator pairs key material with a signature for one
//! signing slot; a transaction authenticator arranges the slots (sender,
//! secondary signers, fee payer) and is serialized together with the raw
//! transaction as the submitted unit.

use std::io::{self, Write};

use crate::address::AccountAddress;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature};
use crate::encoding::{write_uleb128, CanonicalDeserialize, CanonicalSerialize, Decoder};
use crate::error::SextantError;
use crate::multikey::{AnyPublicKey, AnySignature, MultiKey, MultiKeySignature};
use crate::multisig::{MultiEd25519PublicKey, MultiEd25519Signature};
use crate::transaction::{RawTransaction, RawTransactionWithData, Signable};

/// One signer slot: key material plus the signature it produced.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AccountAuthenticator {
    Ed25519 {
        public_key: Ed25519PublicKey,
        signature: Ed25519Signature,
    },
    MultiEd25519 {
        public_key: MultiEd25519PublicKey,
        signature: MultiEd25519Signature,
    },
    SingleKey {
        public_key: AnyPublicKey,
        signature: AnySignature,
    },
    MultiKey {
        public_key: MultiKey,
        signature: MultiKeySignature,
    },
}

impl AccountAuthenticator {
    /// Check this slot's signature over the signing-message bytes.
    pub fn verify(&self, message: &[u8]) -> Result<(), SextantError> {
        match self {
            AccountAuthenticator::Ed25519 { public_key, signature } => {
                public_key.verify(message, signature)
            }
            AccountAuthenticator::MultiEd25519 { public_key, signature } => {
                public_key.verify(message, signature)
            }
            AccountAuthenticator::SingleKey { public_key, signature } => {
                signature.verify(public_key, message)
            }
            AccountAuthenticator::MultiKey { public_key, signature } => {
                public_key.verify(message, signature)
            }
        }
    }
}

impl CanonicalSerialize for AccountAuthenticator {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            AccountAuthenticator::Ed25519 { public_key, signature } => {
                write_uleb128(writer, 0)?;
                public_key.canonical_serialize(writer)?;
                signature.canonical_serialize(writer)
            }
            AccountAuthenticator::MultiEd25519 { public_key, signature } => {
                write_uleb128(writer, 1)?;
                public_key.canonical_serialize(writer)?;
                signature.canonical_serialize(writer)
            }
            AccountAuthenticator::SingleKey { public_key, signature } => {
                write_uleb128(writer, 2)?;
                public_key.canonical_serialize(writer)?;
                signature.canonical_serialize(writer)
            }
            AccountAuthenticator::MultiKey { public_key, signature } => {
                write_uleb128(writer, 3)?;
                public_key.canonical_serialize(writer)?;
                signature.canonical_serialize(writer)
            }
        }
    }
}

impl CanonicalDeserialize for AccountAuthenticator {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        match decoder.read_uleb128()? {
            0 => Ok(AccountAuthenticator::Ed25519 {
                public_key: Ed25519PublicKey::canonical_deserialize(decoder)?,
                signature: Ed25519Signature::canonical_deserialize(decoder)?,
            }),
            1 => Ok(AccountAuthenticator::MultiEd25519 {
                public_key: MultiEd25519PublicKey::canonical_deserialize(decoder)?,
                signature: MultiEd25519Signature::canonical_deserialize(decoder)?,
            }),
            2 => Ok(AccountAuthenticator::SingleKey {
                public_key: AnyPublicKey::canonical_deserialize(decoder)?,
                signature: AnySignature::canonical_deserialize(decoder)?,
            }),
            3 => Ok(AccountAuthenticator::MultiKey {
                public_key: MultiKey::canonical_deserialize(decoder)?,
                signature: MultiKeySignature::canonical_deserialize(decoder)?,
            }),
            other => Err(SextantError::UnsupportedScheme(other.min(255) as u8)),
        }
    }
}

/// How a whole transaction is authenticated: which slots exist and what
/// message shape each signed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TransactionAuthenticator {
    /// Plain single-sender transaction.
    Ed25519 {
        public_key: Ed25519PublicKey,
        signature: Ed25519Signature,
    },
    /// Threshold-key single-sender transaction.
    MultiEd25519 {
        public_key: MultiEd25519PublicKey,
        signature: MultiEd25519Signature,
    },
    /// Sender plus secondary signers, no sponsor.
    MultiAgent {
        sender: AccountAuthenticator,
        secondary_signer_addresses: Vec<AccountAddress>,
        secondary_signers: Vec<AccountAuthenticator>,
    },
    /// Sponsored transaction: gas charged to the fee payer.
    FeePayer {
        sender: AccountAuthenticator,
        secondary_signer_addresses: Vec<AccountAddress>,
        secondary_signers: Vec<AccountAuthenticator>,
        fee_payer_address: AccountAddress,
        fee_payer_signer: AccountAuthenticator,
    },
    /// Single sender using any account-authenticator scheme.
    SingleSender(AccountAuthenticator),
}

impl TransactionAuthenticator {
    /// Verify every signing slot against the role-correct signing message
    /// for `raw_txn`. All parties of a multi-agent or fee-payer transaction
    /// must have signed the identical with-data bytes.
    pub fn verify(&self, raw_txn: &RawTransaction) -> Result<(), SextantError> {
        match self {
            TransactionAuthenticator::Ed25519 { public_key, signature } => {
                public_key.verify(&raw_txn.signing_message(), signature)
            }
            TransactionAuthenticator::MultiEd25519 { public_key, signature } => {
                public_key.verify(&raw_txn.signing_message(), signature)
            }
            TransactionAuthenticator::MultiAgent {
                sender,
                secondary_signer_addresses,
                secondary_signers,
            } => {
                if secondary_signer_addresses.len() != secondary_signers.len() {
                    return Err(SextantError::InvalidValue(
                        "secondary signer addresses and authenticators differ in length"
                            .to_string(),
                    ));
                }
                let message = RawTransactionWithData::MultiAgent {
                    raw_txn: raw_txn.clone(),
                    secondary_signer_addresses: secondary_signer_addresses.clone(),
                }
                .signing_message();
                sender.verify(&message)?;
                for signer in secondary_signers {
                    signer.verify(&message)?;
                }
                Ok(())
            }
            TransactionAuthenticator::FeePayer {
                sender,
                secondary_signer_addresses,
                secondary_signers,
                fee_payer_address,
                fee_payer_signer,
            } => {
                if secondary_signer_addresses.len() != secondary_signers.len() {
                    return Err(SextantError::InvalidValue(
                        "secondary signer addresses and authenticators differ in length"
                            .to_string(),
                    ));
                }
                let message = RawTransactionWithData::MultiAgentWithFeePayer {
                    raw_txn: raw_txn.clone(),
                    secondary_signer_addresses: secondary_signer_addresses.clone(),
                    fee_payer_address: *fee_payer_address,
                }
                .signing_message();
                sender.verify(&message)?;
                for signer in secondary_signers {
                    signer.verify(&message)?;
                }
                fee_payer_signer.verify(&message)
            }
            TransactionAuthenticator::SingleSender(sender) => {
                sender.verify(&raw_txn.signing_message())
            }
        }
    }
}

impl CanonicalSerialize for TransactionAuthenticator {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            TransactionAuthenticator::Ed25519 { public_key, signature } => {
                write_uleb128(writer, 0)?;
                public_key.canonical_serialize(writer)?;
                signature.canonical_serialize(writer)
            }
            TransactionAuthenticator::MultiEd25519 { public_key, signature } => {
                write_uleb128(writer, 1)?;
                public_key.canonical_serialize(writer)?;
                signature.canonical_serialize(writer)
            }
            TransactionAuthenticator::MultiAgent {
                sender,
                secondary_signer_addresses,
                secondary_signers,
            } => {
                write_uleb128(writer, 2)?;
                sender.canonical_serialize(writer)?;
                secondary_signer_addresses.canonical_serialize(writer)?;
                secondary_signers.canonical_serialize(writer)
            }
            TransactionAuthenticator::FeePayer {
                sender,
                secondary_signer_addresses,
                secondary_signers,
                fee_payer_address,
                fee_payer_signer,
            } => {
                write_uleb128(writer, 3)?;
                sender.canonical_serialize(writer)?;
                secondary_signer_addresses.canonical_serialize(writer)?;
                secondary_signers.canonical_serialize(writer)?;
                fee_payer_address.canonical_serialize(writer)?;
                fee_payer_signer.canonical_serialize(writer)
            }
            TransactionAuthenticator::SingleSender(sender) => {
                write_uleb128(writer, 4)?;
                sender.canonical_serialize(writer)
            }
        }
    }
}

impl CanonicalDeserialize for TransactionAuthenticator {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        match decoder.read_uleb128()? {
            0 => Ok(TransactionAuthenticator::Ed25519 {
                public_key: Ed25519PublicKey::canonical_deserialize(decoder)?,
                signature: Ed25519Signature::canonical_deserialize(decoder)?,
            }),
            1 => Ok(TransactionAuthenticator::MultiEd25519 {
                public_key: MultiEd25519PublicKey::canonical_deserialize(decoder)?,
                signature: MultiEd25519Signature::canonical_deserialize(decoder)?,
            }),
            2 => Ok(TransactionAuthenticator::MultiAgent {
                sender: AccountAuthenticator::canonical_deserialize(decoder)?,
                secondary_signer_addresses: Vec::<AccountAddress>::canonical_deserialize(decoder)?,
                secondary_signers: Vec::<AccountAuthenticator>::canonical_deserialize(decoder)?,
            }),
            3 => Ok(TransactionAuthenticator::FeePayer {
                sender: AccountAuthenticator::canonical_deserialize(decoder)?,
                secondary_signer_addresses: Vec::<AccountAddress>::canonical_deserialize(decoder)?,
                secondary_signers: Vec::<AccountAuthenticator>::canonical_deserialize(decoder)?,
                fee_payer_address: AccountAddress::canonical_deserialize(decoder)?,
                fee_payer_signer: AccountAuthenticator::canonical_deserialize(decoder)?,
            }),
            4 => Ok(TransactionAuthenticator::SingleSender(
                AccountAuthenticator::canonical_deserialize(decoder)?,
            )),
            other => Err(SextantError::InvalidValue(format!(
                "unknown transaction authenticator variant {}",
                other
            ))),
        }
    }
}

/// The terminal artifact: raw transaction plus its authenticator, encoded
/// back-to-back as the unit submitted to the transport.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignedTransaction {
    raw_txn: RawTransaction,
    authenticator: TransactionAuthenticator,
}

impl SignedTransaction {
    pub fn new(raw_txn: RawTransaction, authenticator: TransactionAuthenticator) -> Self {
        SignedTransaction { raw_txn, authenticator }
    }

    pub fn raw_transaction(&self) -> &RawTransaction {
        &self.raw_txn
    }

    pub fn authenticator(&self) -> &TransactionAuthenticator {
        &self.authenticator
    }

    /// Check every signature against the role-correct signing message.
    pub fn verify_signatures(&self) -> Result<(), SextantError> {
        self.authenticator.verify(&self.raw_txn)
    }
}

impl CanonicalSerialize for SignedTransaction {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.raw_txn.canonical_serialize(writer)?;
        self.authenticator.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for SignedTransaction {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ok(SignedTransaction {
            raw_txn: RawTransaction::canonical_deserialize(decoder)?,
            authenticator: TransactionAuthenticator::canonical_deserialize(decoder)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519PrivateKey;
    use crate::encoding::{CanonicalDeserialize, CanonicalSerialize};
    use crate::multisig::SignatureAggregator;
    use crate::network::ChainId;
    use crate::transaction::{
        EntryFunction, Identifier, ModuleId, TransactionPayload,
    };

    fn sample_raw_txn(sender: AccountAddress) -> RawTransaction {
        RawTransaction {
            sender,
            sequence_number: 1,
            payload: TransactionPayload::EntryFunction(EntryFunction::new(
                ModuleId::new(AccountAddress::ONE, Identifier::new("coin").unwrap()),
                Identifier::new("transfer").unwrap(),
                vec![],
                vec![AccountAddress::ZERO.to_bytes().to_vec(), 1u64.to_le_bytes().to_vec()],
            )),
            max_gas_amount: 100_000,
            gas_unit_price: 100,
            expiration_timestamp_secs: 1_755_000_000,
            chain_id: ChainId(4),
        }
    }

    #[test]
    fn test_plain_sign_and_verify() {
        let key = Ed25519PrivateKey::generate();
        let sender = key.public_key().authentication_key().derived_address();
        let signed = sample_raw_txn(sender).sign(&key).unwrap();
        signed.verify_signatures().unwrap();

        // Wire round trip of the submitted unit.
        let encoded = CanonicalSerialize::to_bytes(&signed);
        let decoded = <SignedTransaction as CanonicalDeserialize>::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, signed);
        decoded.verify_signatures().unwrap();
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let key = Ed25519PrivateKey::generate();
        let impostor = Ed25519PrivateKey::generate();
        let sender = key.public_key().authentication_key().derived_address();
        let raw = sample_raw_txn(sender);
        let signature = impostor.sign(&raw.signing_message()).unwrap();
        let signed = SignedTransaction::new(
            raw,
            TransactionAuthenticator::Ed25519 { public_key: key.public_key(), signature },
        );
        assert!(signed.verify_signatures().is_err());
    }

    #[test]
    fn test_multi_ed25519_transaction() {
        let members: Vec<Ed25519PrivateKey> =
            (0..3).map(|_| Ed25519PrivateKey::generate()).collect();
        let multi = MultiEd25519PublicKey::new(
            members.iter().map(|k| k.public_key()).collect(),
            2,
        )
        .unwrap();
        let sender = multi.authentication_key().derived_address();
        let raw = sample_raw_txn(sender);

        let mut aggregator = SignatureAggregator::new(multi.clone(), raw.signing_message());
        let message = aggregator.message().to_vec();
        aggregator.add_signature(2, members[2].sign(&message).unwrap()).unwrap();
        aggregator.add_signature(0, members[0].sign(&message).unwrap()).unwrap();
        let composite = aggregator.finalize().unwrap();

        let signed = raw.sign_multi_ed25519(multi, composite);
        signed.verify_signatures().unwrap();
    }

    #[test]
    fn test_multi_agent_all_roles_sign_same_bytes() {
        let sender_key = Ed25519PrivateKey::generate();
        let secondary_key = Ed25519PrivateKey::generate();
        let sender = sender_key.public_key().authentication_key().derived_address();
        let secondary = secondary_key.public_key().authentication_key().derived_address();

        let signed = sample_raw_txn(sender)
            .sign_multi_agent(&sender_key, &[(secondary, &secondary_key)])
            .unwrap();
        signed.verify_signatures().unwrap();

        match signed.authenticator() {
            TransactionAuthenticator::MultiAgent {
                secondary_signer_addresses,
                secondary_signers,
                ..
            } => {
                assert_eq!(secondary_signer_addresses, &[secondary]);
                assert_eq!(secondary_signers.len(), 1);
            }
            other => panic!("unexpected authenticator: {:?}", other),
        }
    }

    #[test]
    fn test_fee_payer_transaction() {
        let sender_key = Ed25519PrivateKey::generate();
        let sponsor_key = Ed25519PrivateKey::generate();
        let sender = sender_key.public_key().authentication_key().derived_address();
        let sponsor = sponsor_key.public_key().authentication_key().derived_address();

        let signed = sample_raw_txn(sender)
            .sign_fee_payer(&sender_key, &[], sponsor, &sponsor_key)
            .unwrap();
        signed.verify_signatures().unwrap();

        // A fee-payer signature is bound to the sponsor address: swapping it
        // changes the signing message and must fail verification.
        let tampered = match signed.authenticator().clone() {
            TransactionAuthenticator::FeePayer {
                sender,
                secondary_signer_addresses,
                secondary_signers,
                fee_payer_signer,
                ..
            } => TransactionAuthenticator::FeePayer {
                sender,
                secondary_signer_addresses,
                secondary_signers,
                fee_payer_address: AccountAddress::ZERO,
                fee_payer_signer,
            },
            other => panic!("unexpected authenticator: {:?}", other),
        };
        let tampered = SignedTransaction::new(signed.raw_transaction().clone(), tampered);
        assert!(tampered.verify_signatures().is_err());
    }

    #[test]
    fn test_authenticator_wire_round_trip() {
        let key = Ed25519PrivateKey::generate();
        let signature = key.sign(b"m").unwrap();
        let authenticator = TransactionAuthenticator::SingleSender(AccountAuthenticator::Ed25519 {
            public_key: key.public_key(),
            signature,
        });
        let encoded = CanonicalSerialize::to_bytes(&authenticator);
        assert_eq!(encoded[0], 4);
        let decoded =
            <TransactionAuthenticator as CanonicalDeserialize>::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, authenticator);
    }
}
