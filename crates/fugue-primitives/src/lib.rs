//! # fugue-primitives
//!
//! Primitive types shared by the fugue EVM crates: addresses, 256-bit
//! hashes, the account record and the `U256` word type.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
mod address;
mod hash;

pub use account::{Account, EMPTY_CODE_HASH, EMPTY_TRIE_ROOT};
pub use address::{Address, AddressError, WordBytes};
pub use hash::{HashError, H256};

// Re-export primitive-types for U256
pub use primitive_types::{U256, U512};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_wrapping() {
        let (sum, overflow) = U256::MAX.overflowing_add(U256::one());
        assert!(overflow);
        assert!(sum.is_zero());
    }
}
