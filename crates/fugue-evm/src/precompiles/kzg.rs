//! KZG point evaluation (EIP-4844)
//!
//! Input: versioned_hash (32) || z (32) || y (32) || commitment (48) || proof (48).

use super::{failure, success, PrecompileOutput};
use crate::error::PrecompileError;
use fugue_crypto::{Crypto, CryptoError};

const INPUT_LENGTH: usize = 192;
const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;
const FIELD_ELEMENTS_PER_BLOB: u64 = 4096;
const BLS_MODULUS: [u8; 32] = [
    0x73, 0xed, 0xa7, 0x53, 0x29, 0x9d, 0x7d, 0x48, 0x33, 0x39, 0xd8, 0x08, 0x09, 0xa1, 0xd8, 0x05,
    0x53, 0xbd, 0xa4, 0x02, 0xff, 0xfe, 0x5b, 0xfe, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01,
];

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Constant output of a successful evaluation
pub(crate) fn success_output() -> Vec<u8> {
    let mut out = vec![0u8; 64];
    out[24..32].copy_from_slice(&FIELD_ELEMENTS_PER_BLOB.to_be_bytes());
    out[32..].copy_from_slice(&BLS_MODULUS);
    out
}

pub(super) fn point_evaluation(
    input: &[u8],
    crypto: &dyn Crypto,
) -> Result<PrecompileOutput, PrecompileError> {
    if input.len() != INPUT_LENGTH {
        return failure();
    }
    let versioned_hash = &input[..32];
    let z: [u8; 32] = array(&input[32..64]);
    let y: [u8; 32] = array(&input[64..96]);
    let commitment: [u8; 48] = array(&input[96..144]);
    let proof: [u8; 48] = array(&input[144..192]);

    let mut expected = crypto.sha256(&commitment);
    expected[0] = VERSIONED_HASH_VERSION_KZG;
    if versioned_hash != expected {
        return failure();
    }

    match crypto.verify_kzg_proof(&commitment, &z, &y, &proof) {
        Ok(true) => success(success_output()),
        Ok(false) => failure(),
        Err(err @ CryptoError::Unsupported(_)) => Err(err.into()),
        Err(err) => {
            tracing::trace!(error = %err, "kzg proof rejected");
            failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fugue_crypto::NativeCrypto;

    fn input_with_matching_hash() -> Vec<u8> {
        let mut input = vec![0u8; INPUT_LENGTH];
        let mut hash = NativeCrypto.sha256(&input[96..144]);
        hash[0] = VERSIONED_HASH_VERSION_KZG;
        input[..32].copy_from_slice(&hash);
        input
    }

    #[test]
    fn test_success_output_layout() {
        let out = success_output();
        assert_eq!(
            hex::encode(out),
            "0000000000000000000000000000000000000000000000000000000000001000\
             73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001"
        );
    }

    #[test]
    fn test_wrong_length_fails() {
        let (_, ok) = point_evaluation(&[0u8; 191], &NativeCrypto).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_hash_mismatch_fails() {
        let mut input = input_with_matching_hash();
        input[0] = 0x02;
        let (_, ok) = point_evaluation(&input, &NativeCrypto).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_missing_backend_is_reported() {
        let input = input_with_matching_hash();
        let err = point_evaluation(&input, &NativeCrypto).unwrap_err();
        assert!(matches!(
            err,
            PrecompileError::Crypto(CryptoError::Unsupported(_))
        ));
    }
}
