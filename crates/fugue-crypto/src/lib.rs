//! # fugue-crypto
//!
//! Cryptography consumed by the fugue EVM.
//!
//! - Keccak-256, SHA2-256, RIPEMD-160
//! - secp256k1 recovery (ECRECOVER) and signing
//! - BLAKE2b compression, alt_bn128 arithmetic, modular exponentiation
//! - the [`Crypto`] provider trait and its [`NativeCrypto`] implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blake2;
mod bn254;
mod error;
mod hash;
mod native;
mod provider;
mod signature;

pub use error::{CryptoError, CryptoResult};
pub use hash::{keccak256, ripemd160, sha256};
pub use native::NativeCrypto;
pub use provider::Crypto;
pub use signature::{
    private_key_to_address, public_key_to_address, recover_public_key, sign, Signature,
};
