//! Pure-Rust crypto provider

use crate::provider::Crypto;
use crate::signature::{public_key_to_address, recover_public_key};
use crate::{blake2, bn254, hash, CryptoError, CryptoResult};
use fugue_primitives::Address;
use num_bigint::BigUint;

/// [`Crypto`] backed by k256, sha2, ripemd, num-bigint and arkworks
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCrypto;

impl Crypto for NativeCrypto {
    fn sha256(&self, input: &[u8]) -> [u8; 32] {
        hash::sha256(input)
    }

    fn ripemd160(&self, input: &[u8]) -> [u8; 20] {
        hash::ripemd160(input)
    }

    fn secp256k1_ecrecover(
        &self,
        msg: &[u8; 32],
        sig: &[u8; 64],
        recid: u8,
    ) -> CryptoResult<Address> {
        let key = recover_public_key(msg, sig, recid)?;
        Ok(public_key_to_address(&key))
    }

    fn modexp(&self, base: &[u8], exp: &[u8], modulus: &[u8]) -> CryptoResult<Vec<u8>> {
        let m = BigUint::from_bytes_be(modulus);
        let mut out = vec![0u8; modulus.len()];
        // x mod 0 and x mod 1 are both defined as zero
        if m.bits() <= 1 {
            return Ok(out);
        }
        let result = BigUint::from_bytes_be(base).modpow(&BigUint::from_bytes_be(exp), &m);
        let bytes = result.to_bytes_be();
        if result.bits() == 0 {
            return Ok(out);
        }
        if bytes.len() > out.len() {
            return Err(CryptoError::InvalidInput("modexp result wider than modulus"));
        }
        let start = out.len() - bytes.len();
        out[start..].copy_from_slice(&bytes);
        Ok(out)
    }

    fn blake2_compress(&self, rounds: u32, h: &mut [u64; 8], m: &[u64; 16], t: &[u64; 2], last: bool) {
        blake2::compress(rounds, h, m, t, last);
    }

    fn bn254_add(&self, p1: &[u8; 64], p2: &[u8; 64]) -> CryptoResult<[u8; 64]> {
        bn254::g1_add(p1, p2)
    }

    fn bn254_mul(&self, point: &[u8; 64], scalar: &[u8; 32]) -> CryptoResult<[u8; 64]> {
        bn254::g1_mul(point, scalar)
    }

    fn bn254_pairing_check(&self, pairs: &[([u8; 64], [u8; 128])]) -> CryptoResult<bool> {
        bn254::pairing_check(pairs)
    }
}
