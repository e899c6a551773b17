//! The crypto seam between the EVM and its primitive implementations

use crate::{CryptoError, CryptoResult};
use fugue_primitives::{Address, H256};

/// Every cryptographic operation the execution core calls.
///
/// The VM holds an `Arc<dyn Crypto>` and never names a concrete library.
pub trait Crypto: Send + Sync + std::fmt::Debug {
    /// Keccak-256
    fn keccak256(&self, input: &[u8]) -> H256 {
        crate::keccak256(input)
    }

    /// SHA2-256 (precompile 0x02)
    fn sha256(&self, input: &[u8]) -> [u8; 32];

    /// RIPEMD-160 (precompile 0x03)
    fn ripemd160(&self, input: &[u8]) -> [u8; 20];

    /// Recover the signer of `msg` (precompile 0x01). `recid` is 0 or 1.
    fn secp256k1_ecrecover(&self, msg: &[u8; 32], sig: &[u8; 64], recid: u8)
        -> CryptoResult<Address>;

    /// `base ^ exp mod modulus`, left-padded to `modulus.len()` (precompile 0x05)
    fn modexp(&self, base: &[u8], exp: &[u8], modulus: &[u8]) -> CryptoResult<Vec<u8>>;

    /// BLAKE2b `F` with an explicit round count (precompile 0x09)
    fn blake2_compress(&self, rounds: u32, h: &mut [u64; 8], m: &[u64; 16], t: &[u64; 2], last: bool);

    /// alt_bn128 point addition (precompile 0x06)
    fn bn254_add(&self, p1: &[u8; 64], p2: &[u8; 64]) -> CryptoResult<[u8; 64]>;

    /// alt_bn128 scalar multiplication (precompile 0x07)
    fn bn254_mul(&self, point: &[u8; 64], scalar: &[u8; 32]) -> CryptoResult<[u8; 64]>;

    /// alt_bn128 pairing product check (precompile 0x08)
    fn bn254_pairing_check(&self, pairs: &[([u8; 64], [u8; 128])]) -> CryptoResult<bool>;

    /// KZG opening proof check (precompile 0x0a).
    ///
    /// Needs a trusted setup, which is loaded outside this crate.
    fn verify_kzg_proof(
        &self,
        _commitment: &[u8; 48],
        _z: &[u8; 32],
        _y: &[u8; 32],
        _proof: &[u8; 48],
    ) -> CryptoResult<bool> {
        Err(CryptoError::Unsupported("kzg point evaluation"))
    }
}
