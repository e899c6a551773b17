//! BLAKE2b F compression (EIP-152)
//!
//! Input: rounds (4 bytes BE) || h (64) || m (128) || t (16) || f (1).
//! The state and message words are little-endian.

use super::{failure, success, PrecompileOutput};
use crate::error::PrecompileError;
use fugue_crypto::Crypto;

const INPUT_LENGTH: usize = 213;

fn rounds(input: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&input[..4]);
    u32::from_be_bytes(buf)
}

fn le_words<const N: usize>(bytes: &[u8]) -> [u64; N] {
    let mut words = [0u64; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        *word = u64::from_le_bytes(buf);
    }
    words
}

/// One gas per round; malformed input costs nothing and fails at run time
pub(super) fn data_gas_cost(input: &[u8]) -> u64 {
    if input.len() == INPUT_LENGTH {
        rounds(input) as u64
    } else {
        0
    }
}

pub(super) fn run(input: &[u8], crypto: &dyn Crypto) -> Result<PrecompileOutput, PrecompileError> {
    if input.len() != INPUT_LENGTH {
        return failure();
    }
    let last = match input[212] {
        0 => false,
        1 => true,
        _ => return failure(),
    };

    let mut h: [u64; 8] = le_words(&input[4..68]);
    let m: [u64; 16] = le_words(&input[68..196]);
    let t: [u64; 2] = le_words(&input[196..212]);
    crypto.blake2_compress(rounds(input), &mut h, &m, &t, last);

    let mut out = Vec::with_capacity(64);
    for word in h {
        out.extend_from_slice(&word.to_le_bytes());
    }
    success(out)
}
