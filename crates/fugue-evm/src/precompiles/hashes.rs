//! SHA-256, RIPEMD-160 and identity

use super::{success, PrecompileOutput};
use crate::error::PrecompileError;
use fugue_crypto::Crypto;

pub(super) fn sha256(input: &[u8], crypto: &dyn Crypto) -> Result<PrecompileOutput, PrecompileError> {
    success(crypto.sha256(input).to_vec())
}

/// The 20-byte digest is left-padded to a word
pub(super) fn ripemd160(input: &[u8], crypto: &dyn Crypto) -> Result<PrecompileOutput, PrecompileError> {
    let mut out = vec![0u8; 32];
    out[12..].copy_from_slice(&crypto.ripemd160(input));
    success(out)
}

pub(super) fn identity(input: &[u8]) -> Result<PrecompileOutput, PrecompileError> {
    success(input.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fugue_crypto::NativeCrypto;

    #[test]
    fn test_sha256_empty() {
        let (out, ok) = sha256(&[], &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(
            hex::encode(out),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_ripemd160_is_left_padded() {
        let (out, ok) = ripemd160(&[], &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(out.len(), 32);
        assert_eq!(&out[..12], &[0u8; 12]);
        assert_eq!(hex::encode(&out[12..]), "9c1185a5c5e9fc54612808977ee8f548b2258d31");
    }

    #[test]
    fn test_identity() {
        let (out, ok) = identity(&[1, 2, 3]).unwrap();
        assert!(ok);
        assert_eq!(&out[..], &[1, 2, 3]);
    }
}
