//! ECRECOVER
//!
//! Input is `hash || v || r || s`, zero-padded to 128 bytes. Any malformed
//! field yields an empty output and still counts as success.

use super::{padded, success, PrecompileOutput};
use crate::error::PrecompileError;
use fugue_crypto::Crypto;

pub(super) fn run(input: &[u8], crypto: &dyn Crypto) -> Result<PrecompileOutput, PrecompileError> {
    let input = padded(input, 0, 128);

    if input[32..63].iter().any(|b| *b != 0) {
        return success(Vec::new());
    }
    let recid = match input[63] {
        27 => 0,
        28 => 1,
        _ => return success(Vec::new()),
    };

    let mut msg = [0u8; 32];
    msg.copy_from_slice(&input[..32]);
    let mut sig = [0u8; 64];
    sig.copy_from_slice(&input[64..128]);

    match crypto.secp256k1_ecrecover(&msg, &sig, recid) {
        Ok(address) => {
            let mut out = vec![0u8; 32];
            out[12..].copy_from_slice(address.as_bytes());
            success(out)
        }
        Err(err) => {
            tracing::trace!(error = %err, "ecrecover rejected signature");
            success(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fugue_crypto::NativeCrypto;

    // Vector from the go-ethereum precompile test suite
    const INPUT: &str = "38d18acb67d25c8bb9942764b62f18e17054f66a817bd4295423adf9ed98873e000000000000000000000000000000000000000000000000000000000000001b38d18acb67d25c8bb9942764b62f18e17054f66a817bd4295423adf9ed98873e789d1dd423d25f0772d2748d60f7e4b81bb14d086eba8e8e8efb6dcff8a4ae02";
    const SIGNER: &str = "000000000000000000000000ceaccac640adf55b2028469bd36ba501f28b699d";

    #[test]
    fn test_recovers_signer() {
        let input = hex::decode(INPUT).unwrap();
        let (out, ok) = run(&input, &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(hex::encode(out), SIGNER);
    }

    #[test]
    fn test_bad_v_gives_empty_success() {
        let mut input = hex::decode(INPUT).unwrap();
        input[63] = 29;
        let (out, ok) = run(&input, &NativeCrypto).unwrap();
        assert!(ok);
        assert!(out.is_empty());
    }

    #[test]
    fn test_dirty_v_word_gives_empty_success() {
        let mut input = hex::decode(INPUT).unwrap();
        input[40] = 1;
        let (out, ok) = run(&input, &NativeCrypto).unwrap();
        assert!(ok);
        assert!(out.is_empty());
    }

    #[test]
    fn test_short_input_is_padded() {
        let (out, ok) = run(&[0u8; 10], &NativeCrypto).unwrap();
        assert!(ok);
        assert!(out.is_empty());
    }
}
