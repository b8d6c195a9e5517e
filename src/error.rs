use thiserror::Error;

/// Crate-wide error type. Every failure a caller can act on is a distinct
/// variant; nothing here is silently downgraded to a default value.
#[derive(Error, Debug)]
pub enum SextantError {
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Unsupported scheme: {0:#04x}")]
    UnsupportedScheme(u8),
    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),
    #[error("Invalid threshold: {threshold} of {num_keys} keys")]
    InvalidThreshold { threshold: u8, num_keys: usize },
    #[error("Insufficient signatures: have {collected}, need {threshold}")]
    InsufficientSignatures { collected: usize, threshold: u8 },
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),
    #[error("Unavailable primitive: {0}")]
    UnavailablePrimitive(String),
    #[error("Vault error: {0}")]
    Vault(String),
}
