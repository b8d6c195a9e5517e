//! Raw transactions, payloads, and the signing protocol.
//!
//! The signing message for a plain transaction is
//! `hash256("SEXTANT::RawTransaction") || encode(raw_txn)`. Transactions
//! carrying secondary signers and/or a fee payer sign
//! `hash256("SEXTANT::RawTransactionWithData") || encode(tagged_variant)`
//! instead. Every signer (sender, secondary, or fee payer) signs the
//! identical bytes; role is declared by the authenticator slot, never by a
//! per-role message.

use std::fmt;
use std::io::{self, Write};

use crate::address::AccountAddress;
use crate::authenticator::{AccountAuthenticator, SignedTransaction, TransactionAuthenticator};
use crate::crypto::Ed25519PrivateKey;
use crate::encoding::{
    write_bytes, write_uleb128, CanonicalDeserialize, CanonicalSerialize, Decoder,
};
use crate::error::SextantError;
use crate::multisig::{MultiEd25519PublicKey, MultiEd25519Signature};
use crate::network::ChainId;
use crate::provider;

/// Domain separator for plain transactions.
pub const RAW_TRANSACTION_SALT: &str = "SEXTANT::RawTransaction";
/// Domain separator for multi-agent and fee-payer transactions.
pub const RAW_TRANSACTION_WITH_DATA_SALT: &str = "SEXTANT::RawTransactionWithData";

/// Anything that can produce the exact byte sequence a signer must sign.
/// The one capability the signing protocol needs from a transaction-like
/// value; no reflection anywhere.
pub trait Signable {
    fn signing_message(&self) -> Vec<u8>;
}

fn domain_prefixed(salt: &str, body: &impl CanonicalSerialize) -> Vec<u8> {
    let prefix = provider::hash256(salt.as_bytes());
    let mut message = Vec::with_capacity(prefix.len() + 64);
    message.extend_from_slice(&prefix);
    body.canonical_serialize(&mut message).expect("memory write failed");
    message
}

// --- Identifiers and type tags ---

/// A Move-style identifier: `[a-zA-Z_][a-zA-Z0-9_]*`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> Result<Self, SextantError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_head = chars.next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_head || !valid_tail {
            return Err(SextantError::InvalidValue(format!("invalid identifier: {:?}", name)));
        }
        Ok(Identifier(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CanonicalSerialize for Identifier {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, self.0.as_bytes())
    }
}

impl CanonicalDeserialize for Identifier {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Identifier::new(String::canonical_deserialize(decoder)?)
    }
}

/// Fully-qualified on-chain module.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ModuleId {
    pub address: AccountAddress,
    pub name: Identifier,
}

impl ModuleId {
    pub fn new(address: AccountAddress, name: Identifier) -> Self {
        ModuleId { address, name }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.address, self.name)
    }
}

impl CanonicalSerialize for ModuleId {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.address.canonical_serialize(writer)?;
        self.name.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for ModuleId {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ok(ModuleId {
            address: AccountAddress::canonical_deserialize(decoder)?,
            name: Identifier::canonical_deserialize(decoder)?,
        })
    }
}

/// On-chain type grammar.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

impl CanonicalSerialize for TypeTag {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            TypeTag::Bool => write_uleb128(writer, 0),
            TypeTag::U8 => write_uleb128(writer, 1),
            TypeTag::U64 => write_uleb128(writer, 2),
            TypeTag::U128 => write_uleb128(writer, 3),
            TypeTag::Address => write_uleb128(writer, 4),
            TypeTag::Signer => write_uleb128(writer, 5),
            TypeTag::Vector(inner) => {
                write_uleb128(writer, 6)?;
                inner.canonical_serialize(writer)
            }
            TypeTag::Struct(tag) => {
                write_uleb128(writer, 7)?;
                tag.canonical_serialize(writer)
            }
            TypeTag::U16 => write_uleb128(writer, 8),
            TypeTag::U32 => write_uleb128(writer, 9),
            TypeTag::U256 => write_uleb128(writer, 10),
        }
    }
}

impl CanonicalDeserialize for TypeTag {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        match decoder.read_uleb128()? {
            0 => Ok(TypeTag::Bool),
            1 => Ok(TypeTag::U8),
            2 => Ok(TypeTag::U64),
            3 => Ok(TypeTag::U128),
            4 => Ok(TypeTag::Address),
            5 => Ok(TypeTag::Signer),
            6 => Ok(TypeTag::Vector(Box::new(TypeTag::canonical_deserialize(decoder)?))),
            7 => Ok(TypeTag::Struct(Box::new(StructTag::canonical_deserialize(decoder)?))),
            8 => Ok(TypeTag::U16),
            9 => Ok(TypeTag::U32),
            10 => Ok(TypeTag::U256),
            other => Err(SextantError::InvalidValue(format!("unknown type tag {}", other))),
        }
    }
}

/// Fully-qualified struct type, e.g. `0x1::sextant_coin::SextantCoin`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StructTag {
    pub address: AccountAddress,
    pub module: Identifier,
    pub name: Identifier,
    pub type_args: Vec<TypeTag>,
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)
    }
}

impl CanonicalSerialize for StructTag {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.address.canonical_serialize(writer)?;
        self.module.canonical_serialize(writer)?;
        self.name.canonical_serialize(writer)?;
        self.type_args.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for StructTag {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ok(StructTag {
            address: AccountAddress::canonical_deserialize(decoder)?,
            module: Identifier::canonical_deserialize(decoder)?,
            name: Identifier::canonical_deserialize(decoder)?,
            type_args: Vec::<TypeTag>::canonical_deserialize(decoder)?,
        })
    }
}

// --- Payloads ---

/// Literal argument for a transaction script.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TransactionArgument {
    U8(u8),
    U64(u64),
    U128(u128),
    Address(AccountAddress),
    U8Vector(Vec<u8>),
    Bool(bool),
    U16(u16),
    U32(u32),
}

impl CanonicalSerialize for TransactionArgument {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            TransactionArgument::U8(value) => {
                write_uleb128(writer, 0)?;
                value.canonical_serialize(writer)
            }
            TransactionArgument::U64(value) => {
                write_uleb128(writer, 1)?;
                value.canonical_serialize(writer)
            }
            TransactionArgument::U128(value) => {
                write_uleb128(writer, 2)?;
                value.canonical_serialize(writer)
            }
            TransactionArgument::Address(value) => {
                write_uleb128(writer, 3)?;
                value.canonical_serialize(writer)
            }
            TransactionArgument::U8Vector(value) => {
                write_uleb128(writer, 4)?;
                write_bytes(writer, value)
            }
            TransactionArgument::Bool(value) => {
                write_uleb128(writer, 5)?;
                value.canonical_serialize(writer)
            }
            TransactionArgument::U16(value) => {
                write_uleb128(writer, 6)?;
                value.canonical_serialize(writer)
            }
            TransactionArgument::U32(value) => {
                write_uleb128(writer, 7)?;
                value.canonical_serialize(writer)
            }
        }
    }
}

impl CanonicalDeserialize for TransactionArgument {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        match decoder.read_uleb128()? {
            0 => Ok(TransactionArgument::U8(decoder.read_u8()?)),
            1 => Ok(TransactionArgument::U64(decoder.read_u64()?)),
            2 => Ok(TransactionArgument::U128(decoder.read_u128()?)),
            3 => Ok(TransactionArgument::Address(AccountAddress::canonical_deserialize(decoder)?)),
            4 => Ok(TransactionArgument::U8Vector(decoder.read_var_bytes()?.to_vec())),
            5 => Ok(TransactionArgument::Bool(decoder.read_bool()?)),
            6 => Ok(TransactionArgument::U16(decoder.read_u16()?)),
            7 => Ok(TransactionArgument::U32(decoder.read_u32()?)),
            other => Err(SextantError::InvalidValue(format!(
                "unknown script argument tag {}",
                other
            ))),
        }
    }
}

/// Compiled script payload.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Script {
    pub code: Vec<u8>,
    pub ty_args: Vec<TypeTag>,
    pub args: Vec<TransactionArgument>,
}

impl CanonicalSerialize for Script {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &self.code)?;
        self.ty_args.canonical_serialize(writer)?;
        self.args.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for Script {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ok(Script {
            code: decoder.read_var_bytes()?.to_vec(),
            ty_args: Vec::<TypeTag>::canonical_deserialize(decoder)?,
            args: Vec::<TransactionArgument>::canonical_deserialize(decoder)?,
        })
    }
}

/// Entry-function call payload. Arguments arrive already canonically
/// encoded, one byte string per parameter.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EntryFunction {
    pub module: ModuleId,
    pub function: Identifier,
    pub ty_args: Vec<TypeTag>,
    pub args: Vec<Vec<u8>>,
}

impl EntryFunction {
    pub fn new(
        module: ModuleId,
        function: Identifier,
        ty_args: Vec<TypeTag>,
        args: Vec<Vec<u8>>,
    ) -> Self {
        EntryFunction { module, function, ty_args, args }
    }
}

impl CanonicalSerialize for EntryFunction {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.module.canonical_serialize(writer)?;
        self.function.canonical_serialize(writer)?;
        self.ty_args.canonical_serialize(writer)?;
        write_uleb128(writer, self.args.len() as u32)?;
        for arg in &self.args {
            write_bytes(writer, arg)?;
        }
        Ok(())
    }
}

impl CanonicalDeserialize for EntryFunction {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        let module = ModuleId::canonical_deserialize(decoder)?;
        let function = Identifier::canonical_deserialize(decoder)?;
        let ty_args = Vec::<TypeTag>::canonical_deserialize(decoder)?;
        let arg_count = decoder.read_uleb128()? as usize;
        let mut args = Vec::with_capacity(arg_count.min(4096));
        for _ in 0..arg_count {
            args.push(decoder.read_var_bytes()?.to_vec());
        }
        Ok(EntryFunction { module, function, ty_args, args })
    }
}

/// What a transaction executes. Variant index 1 is the retired
/// module-bundle form; index 3 is reserved for on-chain multisig payloads.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TransactionPayload {
    Script(Script),
    EntryFunction(EntryFunction),
}

impl CanonicalSerialize for TransactionPayload {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            TransactionPayload::Script(script) => {
                write_uleb128(writer, 0)?;
                script.canonical_serialize(writer)
            }
            TransactionPayload::EntryFunction(entry) => {
                write_uleb128(writer, 2)?;
                entry.canonical_serialize(writer)
            }
        }
    }
}

impl CanonicalDeserialize for TransactionPayload {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        match decoder.read_uleb128()? {
            0 => Ok(TransactionPayload::Script(Script::canonical_deserialize(decoder)?)),
            1 => Err(SextantError::InvalidValue(
                "module-bundle payloads are retired".to_string(),
            )),
            2 => Ok(TransactionPayload::EntryFunction(EntryFunction::canonical_deserialize(
                decoder,
            )?)),
            other => Err(SextantError::InvalidValue(format!(
                "unknown payload variant {}",
                other
            ))),
        }
    }
}

// --- Raw transactions ---

/// The unsigned transaction body. Immutable once constructed; all signing
/// flows read it, none mutate it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RawTransaction {
    pub sender: AccountAddress,
    pub sequence_number: u64,
    pub payload: TransactionPayload,
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    pub expiration_timestamp_secs: u64,
    pub chain_id: ChainId,
}

impl RawTransaction {
    /// Sign as a plain single-sender transaction.
    pub fn sign(self, key: &Ed25519PrivateKey) -> Result<SignedTransaction, SextantError> {
        let signature = key.sign(&self.signing_message())?;
        let authenticator = TransactionAuthenticator::Ed25519 {
            public_key: key.public_key(),
            signature,
        };
        Ok(SignedTransaction::new(self, authenticator))
    }

    /// Sign with a threshold key set; the composite must already be
    /// complete (the aggregator enforces bitmap order).
    pub fn sign_multi_ed25519(
        self,
        public_key: MultiEd25519PublicKey,
        signature: MultiEd25519Signature,
    ) -> SignedTransaction {
        let authenticator = TransactionAuthenticator::MultiEd25519 { public_key, signature };
        SignedTransaction::new(self, authenticator)
    }

    /// Sign a multi-agent transaction: the sender plus every secondary
    /// signer signs the same with-data message.
    pub fn sign_multi_agent(
        self,
        sender_key: &Ed25519PrivateKey,
        secondary_signers: &[(AccountAddress, &Ed25519PrivateKey)],
    ) -> Result<SignedTransaction, SextantError> {
        let secondary_signer_addresses: Vec<AccountAddress> =
            secondary_signers.iter().map(|(address, _)| *address).collect();
        let with_data = RawTransactionWithData::MultiAgent {
            raw_txn: self,
            secondary_signer_addresses: secondary_signer_addresses.clone(),
        };
        let message = with_data.signing_message();

        let sender = authenticate_ed25519(sender_key, &message)?;
        let secondary = secondary_signers
            .iter()
            .map(|(_, key)| authenticate_ed25519(key, &message))
            .collect::<Result<Vec<_>, _>>()?;

        let raw_txn = match with_data {
            RawTransactionWithData::MultiAgent { raw_txn, .. } => raw_txn,
            _ => unreachable!("constructed as MultiAgent above"),
        };
        Ok(SignedTransaction::new(
            raw_txn,
            TransactionAuthenticator::MultiAgent {
                sender,
                secondary_signer_addresses,
                secondary_signers: secondary,
            },
        ))
    }

    /// Sign a sponsored transaction: gas is charged to the fee payer, and
    /// the fee payer countersigns the same with-data message as everyone
    /// else.
    pub fn sign_fee_payer(
        self,
        sender_key: &Ed25519PrivateKey,
        secondary_signers: &[(AccountAddress, &Ed25519PrivateKey)],
        fee_payer_address: AccountAddress,
        fee_payer_key: &Ed25519PrivateKey,
    ) -> Result<SignedTransaction, SextantError> {
        let secondary_signer_addresses: Vec<AccountAddress> =
            secondary_signers.iter().map(|(address, _)| *address).collect();
        let with_data = RawTransactionWithData::MultiAgentWithFeePayer {
            raw_txn: self,
            secondary_signer_addresses: secondary_signer_addresses.clone(),
            fee_payer_address,
        };
        let message = with_data.signing_message();

        let sender = authenticate_ed25519(sender_key, &message)?;
        let secondary = secondary_signers
            .iter()
            .map(|(_, key)| authenticate_ed25519(key, &message))
            .collect::<Result<Vec<_>, _>>()?;
        let fee_payer_signer = authenticate_ed25519(fee_payer_key, &message)?;

        let raw_txn = match with_data {
            RawTransactionWithData::MultiAgentWithFeePayer { raw_txn, .. } => raw_txn,
            _ => unreachable!("constructed as MultiAgentWithFeePayer above"),
        };
        Ok(SignedTransaction::new(
            raw_txn,
            TransactionAuthenticator::FeePayer {
                sender,
                secondary_signer_addresses,
                secondary_signers: secondary,
                fee_payer_address,
                fee_payer_signer,
            },
        ))
    }
}

fn authenticate_ed25519(
    key: &Ed25519PrivateKey,
    message: &[u8],
) -> Result<AccountAuthenticator, SextantError> {
    Ok(AccountAuthenticator::Ed25519 {
        public_key: key.public_key(),
        signature: key.sign(message)?,
    })
}

impl Signable for RawTransaction {
    fn signing_message(&self) -> Vec<u8> {
        domain_prefixed(RAW_TRANSACTION_SALT, self)
    }
}

impl CanonicalSerialize for RawTransaction {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.sender.canonical_serialize(writer)?;
        self.sequence_number.canonical_serialize(writer)?;
        self.payload.canonical_serialize(writer)?;
        self.max_gas_amount.canonical_serialize(writer)?;
        self.gas_unit_price.canonical_serialize(writer)?;
        self.expiration_timestamp_secs.canonical_serialize(writer)?;
        self.chain_id.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for RawTransaction {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ok(RawTransaction {
            sender: AccountAddress::canonical_deserialize(decoder)?,
            sequence_number: decoder.read_u64()?,
            payload: TransactionPayload::canonical_deserialize(decoder)?,
            max_gas_amount: decoder.read_u64()?,
            gas_unit_price: decoder.read_u64()?,
            expiration_timestamp_secs: decoder.read_u64()?,
            chain_id: ChainId::canonical_deserialize(decoder)?,
        })
    }
}

/// Signing-message body for transactions with more than one signing role.
/// Only ever built to produce the message; the submitted artifact still
/// carries the plain [`RawTransaction`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RawTransactionWithData {
    MultiAgent {
        raw_txn: RawTransaction,
        secondary_signer_addresses: Vec<AccountAddress>,
    },
    MultiAgentWithFeePayer {
        raw_txn: RawTransaction,
        secondary_signer_addresses: Vec<AccountAddress>,
        fee_payer_address: AccountAddress,
    },
}

impl Signable for RawTransactionWithData {
    fn signing_message(&self) -> Vec<u8> {
        domain_prefixed(RAW_TRANSACTION_WITH_DATA_SALT, self)
    }
}

impl CanonicalSerialize for RawTransactionWithData {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            RawTransactionWithData::MultiAgent { raw_txn, secondary_signer_addresses } => {
                write_uleb128(writer, 0)?;
                raw_txn.canonical_serialize(writer)?;
                secondary_signer_addresses.canonical_serialize(writer)
            }
            RawTransactionWithData::MultiAgentWithFeePayer {
                raw_txn,
                secondary_signer_addresses,
                fee_payer_address,
            } => {
                write_uleb128(writer, 1)?;
                raw_txn.canonical_serialize(writer)?;
                secondary_signer_addresses.canonical_serialize(writer)?;
                fee_payer_address.canonical_serialize(writer)
            }
        }
    }
}

impl CanonicalDeserialize for RawTransactionWithData {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        match decoder.read_uleb128()? {
            0 => Ok(RawTransactionWithData::MultiAgent {
                raw_txn: RawTransaction::canonical_deserialize(decoder)?,
                secondary_signer_addresses: Vec::<AccountAddress>::canonical_deserialize(decoder)?,
            }),
            1 => Ok(RawTransactionWithData::MultiAgentWithFeePayer {
                raw_txn: RawTransaction::canonical_deserialize(decoder)?,
                secondary_signer_addresses: Vec::<AccountAddress>::canonical_deserialize(decoder)?,
                fee_payer_address: AccountAddress::canonical_deserialize(decoder)?,
            }),
            other => Err(SextantError::InvalidValue(format!(
                "unknown signing-message variant {}",
                other
            ))),
        }
    }
}

// --- Factory ---

/// Immutable transaction-build parameters, validated once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionConfig {
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    pub transaction_ttl_secs: u64,
    pub chain_id: ChainId,
}

impl TransactionConfig {
    pub fn new(
        max_gas_amount: u64,
        gas_unit_price: u64,
        transaction_ttl_secs: u64,
        chain_id: ChainId,
    ) -> Result<Self, SextantError> {
        if max_gas_amount == 0 {
            return Err(SextantError::InvalidValue("max gas amount must be positive".to_string()));
        }
        if transaction_ttl_secs == 0 {
            return Err(SextantError::InvalidValue("transaction ttl must be positive".to_string()));
        }
        Ok(TransactionConfig { max_gas_amount, gas_unit_price, transaction_ttl_secs, chain_id })
    }
}

/// Builds raw transactions from a fixed [`TransactionConfig`], stamping the
/// expiration from the wall clock at build time.
pub struct TransactionFactory {
    config: TransactionConfig,
}

impl TransactionFactory {
    pub fn new(config: TransactionConfig) -> Self {
        TransactionFactory { config }
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub fn build(
        &self,
        sender: AccountAddress,
        sequence_number: u64,
        payload: TransactionPayload,
    ) -> RawTransaction {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        RawTransaction {
            sender,
            sequence_number,
            payload,
            max_gas_amount: self.config.max_gas_amount,
            gas_unit_price: self.config.gas_unit_price,
            expiration_timestamp_secs: now + self.config.transaction_ttl_secs,
            chain_id: self.config.chain_id,
        }
    }
}
