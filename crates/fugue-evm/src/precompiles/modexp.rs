//! MODEXP (EIP-198, repriced by EIP-2565)
//!
//! Input is `len(B) || len(E) || len(M) || B || E || M` with 32-byte
//! big-endian lengths. Missing bytes read as zero.

use super::{padded, success, PrecompileOutput};
use crate::error::PrecompileError;
use crate::math::saturating_u64;
use crate::rules::ReleaseSpec;
use fugue_crypto::Crypto;
use fugue_primitives::U256;

struct Header {
    base_len: u64,
    exp_len: u64,
    mod_len: u64,
}

impl Header {
    fn parse(input: &[u8]) -> Self {
        let head = padded(input, 0, 96);
        Self {
            base_len: saturating_u64(U256::from_big_endian(&head[..32])),
            exp_len: saturating_u64(U256::from_big_endian(&head[32..64])),
            mod_len: saturating_u64(U256::from_big_endian(&head[64..96])),
        }
    }
}

fn offset(at: u64) -> usize {
    usize::try_from(at).unwrap_or(usize::MAX)
}

/// First (up to) 32 bytes of the exponent as a number
fn exponent_head(input: &[u8], header: &Header) -> U256 {
    let start = 96u64.saturating_add(header.base_len);
    let len = header.exp_len.min(32) as usize;
    U256::from_big_endian(&padded(input, offset(start), len))
}

fn adjusted_exponent_length(exp_len: u64, head: U256) -> u128 {
    let head_bits = head.bits().saturating_sub(1) as u128;
    if exp_len <= 32 {
        head_bits
    } else {
        8 * (exp_len as u128 - 32) + head_bits
    }
}

fn eip198_complexity(x: u128) -> u128 {
    if x <= 64 {
        x * x
    } else if x <= 1024 {
        x * x / 4 + 96 * x - 3072
    } else {
        x * x / 16 + 480 * x - 199_680
    }
}

pub(super) fn data_gas_cost(input: &[u8], rules: &ReleaseSpec) -> u64 {
    let header = Header::parse(input);
    let max_len = header.base_len.max(header.mod_len) as u128;
    let iterations = adjusted_exponent_length(header.exp_len, exponent_head(input, &header)).max(1);

    let gas = if rules.modexp_repricing {
        let words = max_len.div_ceil(8);
        let complexity = words.saturating_mul(words);
        (complexity.saturating_mul(iterations) / 3).max(200)
    } else {
        eip198_complexity(max_len).saturating_mul(iterations) / 20
    };
    u64::try_from(gas).unwrap_or(u64::MAX)
}

pub(super) fn run(
    input: &[u8],
    _rules: &ReleaseSpec,
    crypto: &dyn Crypto,
) -> Result<PrecompileOutput, PrecompileError> {
    let header = Header::parse(input);
    if header.mod_len == 0 {
        return success(Vec::new());
    }

    let base_start = 96u64;
    let exp_start = base_start.saturating_add(header.base_len);
    let mod_start = exp_start.saturating_add(header.exp_len);

    let base = padded(input, offset(base_start), offset(header.base_len));
    let exp = padded(input, offset(exp_start), offset(header.exp_len));
    let modulus = padded(input, offset(mod_start), offset(header.mod_len));

    success(crypto.modexp(&base, &exp, &modulus)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Fork;
    use fugue_crypto::NativeCrypto;

    fn encode(base: &[u8], exp: &[u8], modulus: &[u8]) -> Vec<u8> {
        let mut input = Vec::new();
        for len in [base.len(), exp.len(), modulus.len()] {
            let mut word = [0u8; 32];
            U256::from(len).to_big_endian(&mut word);
            input.extend_from_slice(&word);
        }
        input.extend_from_slice(base);
        input.extend_from_slice(exp);
        input.extend_from_slice(modulus);
        input
    }

    #[test]
    fn test_small_exponentiation() {
        let input = encode(&[3], &[5], &[7]);
        let rules = Fork::Cancun.spec();
        let (out, ok) = run(&input, &rules, &NativeCrypto).unwrap();
        assert!(ok);
        // 3^5 = 243 = 34 * 7 + 5
        assert_eq!(&out[..], &[5]);
    }

    #[test]
    fn test_output_padded_to_modulus_length() {
        let input = encode(&[2], &[2], &[0, 0, 100]);
        let rules = Fork::Cancun.spec();
        let (out, ok) = run(&input, &rules, &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(&out[..], &[0, 0, 4]);
    }

    #[test]
    fn test_zero_modulus_length_is_empty() {
        let input = encode(&[2], &[2], &[]);
        let (out, ok) = run(&input, &Fork::Cancun.spec(), &NativeCrypto).unwrap();
        assert!(ok);
        assert!(out.is_empty());
    }

    #[test]
    fn test_truncated_input_reads_zeros() {
        // claims a 1-byte modulus that is missing: x mod 0 = 0
        let mut input = encode(&[2], &[2], &[]);
        input[95] = 1;
        let (out, ok) = run(&input, &Fork::Cancun.spec(), &NativeCrypto).unwrap();
        assert!(ok);
        assert_eq!(&out[..], &[0]);
    }

    #[test]
    fn test_eip2565_minimum() {
        let input = encode(&[3], &[5], &[7]);
        assert_eq!(data_gas_cost(&input, &Fork::Berlin.spec()), 200);
    }

    #[test]
    fn test_eip198_pricing() {
        // x = 1, complexity 1, exponent 5 has bit length 3, adjusted 2
        let input = encode(&[3], &[5], &[7]);
        assert_eq!(data_gas_cost(&input, &Fork::Byzantium.spec()), 0);

        let base = [1u8; 64];
        let modulus = [1u8; 64];
        let exp = [0xffu8; 32];
        let input = encode(&base, &exp, &modulus);
        // 64^2 * 255 / 20
        assert_eq!(data_gas_cost(&input, &Fork::Byzantium.spec()), 4096 * 255 / 20);
        // ceil(64/8)^2 * 255 / 3
        assert_eq!(data_gas_cost(&input, &Fork::Berlin.spec()), 64 * 255 / 3);
    }

    #[test]
    fn test_long_exponent_adjustment() {
        assert_eq!(adjusted_exponent_length(40, U256::one()), 64);
        assert_eq!(adjusted_exponent_length(32, U256::zero()), 0);
        assert_eq!(adjusted_exponent_length(32, U256::from(256)), 8);
    }

    #[test]
    fn test_huge_lengths_saturate() {
        let mut input = vec![0xffu8; 96];
        input.extend_from_slice(&[1; 32]);
        assert_eq!(data_gas_cost(&input, &Fork::Byzantium.spec()), u64::MAX);
        assert_eq!(data_gas_cost(&input, &Fork::Cancun.spec()), u64::MAX);
    }
}
