//! Cryptographic errors

use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signing failed
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Invalid signature
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Invalid recovery ID
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Recovery failed
    #[error("public key recovery failed: {0}")]
    RecoveryFailed(String),

    /// Invalid private key
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// Curve point is malformed or not on the curve
    #[error("invalid curve point: {0}")]
    InvalidPoint(&'static str),

    /// Malformed input to a primitive
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The provider does not implement this operation
    #[error("operation not supported by this provider: {0}")]
    Unsupported(&'static str),
}

/// Crypto result type
pub type CryptoResult<T> = Result<T, CryptoError>;
