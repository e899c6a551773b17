//! alt_bn128 precompiles (EIP-196, EIP-197)

use super::{failure, padded, success, PrecompileOutput};
use crate::error::PrecompileError;
use fugue_crypto::Crypto;

const PAIR_SIZE: usize = 192;

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

pub(super) fn add(input: &[u8], crypto: &dyn Crypto) -> Result<PrecompileOutput, PrecompileError> {
    let input = padded(input, 0, 128);
    match crypto.bn254_add(&array(&input[..64]), &array(&input[64..128])) {
        Ok(point) => success(point.to_vec()),
        Err(err) => {
            tracing::trace!(error = %err, "bn254 add rejected input");
            failure()
        }
    }
}

pub(super) fn mul(input: &[u8], crypto: &dyn Crypto) -> Result<PrecompileOutput, PrecompileError> {
    let input = padded(input, 0, 96);
    match crypto.bn254_mul(&array(&input[..64]), &array(&input[64..96])) {
        Ok(point) => success(point.to_vec()),
        Err(err) => {
            tracing::trace!(error = %err, "bn254 mul rejected input");
            failure()
        }
    }
}

pub(super) fn pairing(input: &[u8], crypto: &dyn Crypto) -> Result<PrecompileOutput, PrecompileError> {
    if input.len() % PAIR_SIZE != 0 {
        return failure();
    }
    let pairs: Vec<([u8; 64], [u8; 128])> = input
        .chunks_exact(PAIR_SIZE)
        .map(|chunk| (array(&chunk[..64]), array(&chunk[64..])))
        .collect();

    match crypto.bn254_pairing_check(&pairs) {
        Ok(holds) => {
            let mut out = vec![0u8; 32];
            out[31] = u8::from(holds);
            success(out)
        }
        Err(err) => {
            tracing::trace!(error = %err, "bn254 pairing rejected input");
            failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fugue_crypto::NativeCrypto;

    fn generator() -> [u8; 64] {
        let mut g = [0u8; 64];
        g[31] = 1;
        g[63] = 2;
        g
    }

    #[test]
    fn test_add_identity() {
        let mut input = generator().to_vec();
        input.extend_from_slice(&[0u8; 64]);
        let (out, ok) = add(&input, &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(&out[..], &generator());
    }

    #[test]
    fn test_add_empty_input_is_infinity() {
        let (out, ok) = add(&[], &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(&out[..], &[0u8; 64]);
    }

    #[test]
    fn test_add_rejects_point_off_curve() {
        let mut input = [0u8; 128];
        input[31] = 1;
        input[63] = 1;
        let (out, ok) = add(&input, &NativeCrypto).unwrap();
        assert!(!ok);
        assert!(out.is_empty());
    }

    #[test]
    fn test_mul_by_one() {
        let mut input = generator().to_vec();
        let mut scalar = [0u8; 32];
        scalar[31] = 1;
        input.extend_from_slice(&scalar);
        let (out, ok) = mul(&input, &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(&out[..], &generator());
    }

    #[test]
    fn test_empty_pairing_holds() {
        let (out, ok) = pairing(&[], &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(out[31], 1);
    }

    #[test]
    fn test_pairing_rejects_partial_pair() {
        let (out, ok) = pairing(&[0u8; 191], &NativeCrypto).unwrap();
        assert!(!ok);
        assert!(out.is_empty());
    }
}
