//! Sextant client core: canonical encoding, account/address derivation,
//! HD key derivation, and the transaction signing protocol.

pub mod account;
pub mod address;
pub mod authenticator;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod hd_wallet;
pub mod hexutil;
pub mod keyless;
pub mod multikey;
pub mod multisig;
pub mod network;
pub mod provider;
pub mod transaction;
pub mod vault;
