//! Precompiled contracts at addresses 0x01..=0x0a
//!
//! Each precompile prices its input with a base cost plus a data-dependent
//! cost and returns `(output, success)`. Malformed input is an ordinary
//! not-success result; `Err` is reserved for faults the caller should log.

mod blake2f;
mod bn254;
mod ecrecover;
mod hashes;
mod kzg;
mod modexp;

use crate::error::PrecompileError;
use crate::rules::ReleaseSpec;
use bytes::Bytes;
use fugue_crypto::Crypto;
use fugue_primitives::Address;

/// Output bytes and success flag
pub type PrecompileOutput = (Bytes, bool);

pub(crate) fn success(output: impl Into<Bytes>) -> Result<PrecompileOutput, PrecompileError> {
    Ok((output.into(), true))
}

pub(crate) fn failure() -> Result<PrecompileOutput, PrecompileError> {
    Ok((Bytes::new(), false))
}

/// Copy `input[offset..offset + len]`, zero-filling past the end
pub(crate) fn padded(input: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if offset < input.len() {
        let available = (input.len() - offset).min(len);
        out[..available].copy_from_slice(&input[offset..offset + available]);
    }
    out
}

/// Per-word pricing helper
pub(crate) fn words(len: usize) -> u64 {
    (len as u64).div_ceil(32)
}

/// Known precompiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precompile {
    /// 0x01 secp256k1 public key recovery
    EcRecover,
    /// 0x02 SHA-256
    Sha256,
    /// 0x03 RIPEMD-160
    Ripemd160,
    /// 0x04 identity
    Identity,
    /// 0x05 modular exponentiation (EIP-198)
    ModExp,
    /// 0x06 alt_bn128 addition (EIP-196)
    Bn254Add,
    /// 0x07 alt_bn128 scalar multiplication (EIP-196)
    Bn254Mul,
    /// 0x08 alt_bn128 pairing check (EIP-197)
    Bn254Pairing,
    /// 0x09 BLAKE2b F compression (EIP-152)
    Blake2F,
    /// 0x0a KZG point evaluation (EIP-4844)
    PointEvaluation,
}

impl Precompile {
    /// All precompiles in address order
    pub const ALL: [Precompile; 10] = [
        Precompile::EcRecover,
        Precompile::Sha256,
        Precompile::Ripemd160,
        Precompile::Identity,
        Precompile::ModExp,
        Precompile::Bn254Add,
        Precompile::Bn254Mul,
        Precompile::Bn254Pairing,
        Precompile::Blake2F,
        Precompile::PointEvaluation,
    ];

    /// Address of the RIPEMD-160 precompile
    pub const RIPEMD160_ADDRESS: Address = Address::from_low_u64(3);

    /// Precompile at `address` if it is enabled under `rules`
    pub fn from_address(address: &Address, rules: &ReleaseSpec) -> Option<Self> {
        if !rules.is_precompile(address) {
            return None;
        }
        let index = address.low_u64()?;
        Self::ALL.get(index.checked_sub(1)? as usize).copied()
    }

    /// Address
    pub fn address(self) -> Address {
        Address::from_low_u64(self as u64 + 1)
    }

    /// Fixed part of the cost
    pub fn base_gas_cost(self, rules: &ReleaseSpec) -> u64 {
        match self {
            Precompile::EcRecover => 3000,
            Precompile::Sha256 => 60,
            Precompile::Ripemd160 => 600,
            Precompile::Identity => 15,
            Precompile::ModExp | Precompile::Blake2F => 0,
            Precompile::Bn254Add if rules.istanbul_repricing => 150,
            Precompile::Bn254Add => 500,
            Precompile::Bn254Mul if rules.istanbul_repricing => 6000,
            Precompile::Bn254Mul => 40000,
            Precompile::Bn254Pairing if rules.istanbul_repricing => 45000,
            Precompile::Bn254Pairing => 100000,
            Precompile::PointEvaluation => 50000,
        }
    }

    /// Input-dependent part of the cost
    pub fn data_gas_cost(self, input: &[u8], rules: &ReleaseSpec) -> u64 {
        match self {
            Precompile::EcRecover | Precompile::Bn254Add | Precompile::Bn254Mul => 0,
            Precompile::PointEvaluation => 0,
            Precompile::Sha256 => 12 * words(input.len()),
            Precompile::Ripemd160 => 120 * words(input.len()),
            Precompile::Identity => 3 * words(input.len()),
            Precompile::ModExp => modexp::data_gas_cost(input, rules),
            Precompile::Bn254Pairing => {
                let per_pair: u64 = if rules.istanbul_repricing { 34000 } else { 80000 };
                per_pair.saturating_mul((input.len() / 192) as u64)
            }
            Precompile::Blake2F => blake2f::data_gas_cost(input),
        }
    }

    /// Full price of a call, `None` when it does not fit in a `u64`
    pub fn gas_cost(self, input: &[u8], rules: &ReleaseSpec) -> Option<u64> {
        total_cost(self.base_gas_cost(rules), self.data_gas_cost(input, rules))
    }

    /// Execute
    pub fn run(
        self,
        input: &[u8],
        rules: &ReleaseSpec,
        crypto: &dyn Crypto,
    ) -> Result<PrecompileOutput, PrecompileError> {
        match self {
            Precompile::EcRecover => ecrecover::run(input, crypto),
            Precompile::Sha256 => hashes::sha256(input, crypto),
            Precompile::Ripemd160 => hashes::ripemd160(input, crypto),
            Precompile::Identity => hashes::identity(input),
            Precompile::ModExp => modexp::run(input, rules, crypto),
            Precompile::Bn254Add => bn254::add(input, crypto),
            Precompile::Bn254Mul => bn254::mul(input, crypto),
            Precompile::Bn254Pairing => bn254::pairing(input, crypto),
            Precompile::Blake2F => blake2f::run(input, crypto),
            Precompile::PointEvaluation => kzg::point_evaluation(input, crypto),
        }
    }
}

fn total_cost(base: u64, data: u64) -> Option<u64> {
    base.checked_add(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Fork;

    #[test]
    fn test_addresses() {
        for (i, p) in Precompile::ALL.iter().enumerate() {
            assert_eq!(p.address(), Address::from_low_u64(i as u64 + 1));
        }
        assert_eq!(Precompile::Ripemd160.address(), Precompile::RIPEMD160_ADDRESS);
    }

    #[test]
    fn test_from_address_respects_rules() {
        let frontier = Fork::Frontier.spec();
        let cancun = Fork::Cancun.spec();
        let modexp = Address::from_low_u64(5);
        assert_eq!(Precompile::from_address(&modexp, &frontier), None);
        assert_eq!(
            Precompile::from_address(&modexp, &cancun),
            Some(Precompile::ModExp)
        );
        assert_eq!(Precompile::from_address(&Address::ZERO, &cancun), None);
        assert_eq!(
            Precompile::from_address(&Address::from_low_u64(11), &cancun),
            None
        );
    }

    #[test]
    fn test_padded() {
        assert_eq!(padded(&[1, 2, 3], 1, 4), vec![2, 3, 0, 0]);
        assert_eq!(padded(&[1, 2, 3], 5, 2), vec![0, 0]);
    }

    #[test]
    fn test_word_priced_costs() {
        let rules = Fork::Cancun.spec();
        assert_eq!(Precompile::Sha256.data_gas_cost(&[0; 33], &rules), 24);
        assert_eq!(Precompile::Ripemd160.data_gas_cost(&[0; 32], &rules), 120);
        assert_eq!(Precompile::Identity.data_gas_cost(&[], &rules), 0);
    }

    #[test]
    fn test_bn254_repricing() {
        let byzantium = Fork::Byzantium.spec();
        let istanbul = Fork::Istanbul.spec();
        assert_eq!(Precompile::Bn254Add.base_gas_cost(&byzantium), 500);
        assert_eq!(Precompile::Bn254Add.base_gas_cost(&istanbul), 150);
        assert_eq!(Precompile::Bn254Mul.base_gas_cost(&istanbul), 6000);
        assert_eq!(
            Precompile::Bn254Pairing.data_gas_cost(&[0; 384], &istanbul),
            68000
        );
        assert_eq!(
            Precompile::Bn254Pairing.data_gas_cost(&[0; 192], &byzantium),
            80000
        );
    }

    #[test]
    fn test_gas_cost_overflow_is_none() {
        let rules = Fork::Cancun.spec();
        assert_eq!(Precompile::Identity.gas_cost(&[0; 33], &rules), Some(15 + 6));
        assert_eq!(total_cost(45000, u64::MAX - 44999), None);
        assert_eq!(total_cost(45000, u64::MAX - 45000), Some(u64::MAX));

        // modexp has no fixed part, so a saturated data cost still fits
        let mut huge = vec![0xffu8; 96];
        huge.extend_from_slice(&[1; 32]);
        assert_eq!(Precompile::ModExp.gas_cost(&huge, &rules), Some(u64::MAX));
    }
}
