//! EVM error types
//!
//! Two layers: [`ExceptionKind`] is a recoverable per-frame failure that
//! consumes the frame's gas and unwinds one level, while [`VmError`] aborts
//! the whole run.

use fugue_crypto::CryptoError;
use fugue_primitives::{Address, H256, U256};
use thiserror::Error;

/// Per-frame execution failure
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Stack underflow
    #[error("stack underflow")]
    StackUnderflow,

    /// Stack overflow
    #[error("stack overflow (max 1024)")]
    StackOverflow,

    /// Out of gas
    #[error("out of gas")]
    OutOfGas,

    /// Undefined or disabled opcode
    #[error("bad instruction")]
    BadInstruction,

    /// Jump to a non-JUMPDEST location
    #[error("invalid jump destination")]
    InvalidJumpDestination,

    /// State modification in static context
    #[error("state modification in static context")]
    StaticCallViolation,

    /// Code rejected at deposit time
    #[error("invalid code")]
    InvalidCode,

    /// Return data read out of bounds
    #[error("access violation")]
    AccessViolation,

    /// Execution reached BEGINSUB directly
    #[error("invalid subroutine entry")]
    InvalidSubroutineEntry,

    /// RETURNSUB with an empty return stack
    #[error("invalid subroutine return")]
    InvalidSubroutineReturn,

    /// Anything else
    #[error("other")]
    Other,
}

/// Fatal error that aborts the run
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Account references a code hash the world state cannot resolve
    #[error("code {code_hash} missing in the state for address {address}")]
    MissingCode {
        /// Account that owns the code
        address: Address,
        /// Unresolved code hash
        code_hash: H256,
    },

    /// A precompile failed while being the transaction target
    #[error("precompile {address} failed")]
    PrecompileFailure {
        /// Precompile address
        address: Address,
    },

    /// Invalid VM configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Result type for fatal VM operations
pub type VmResult<T> = Result<T, VmError>;

/// Unexpected precompile fault
///
/// Expected input rejections are reported as a not-success output, not as
/// this error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrecompileError {
    /// Input could not be interpreted
    #[error("invalid precompile input: {0}")]
    InvalidInput(&'static str),

    /// Crypto provider failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Transaction rejected before any state change
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Nonce does not match the sender account
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch {
        /// Account nonce
        expected: u64,
        /// Transaction nonce
        got: u64,
    },

    /// Sender nonce cannot be incremented (EIP-2681)
    #[error("sender nonce overflow")]
    NonceOverflow,

    /// Sender cannot cover gas, value and blob fees
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Up-front cost
        required: U256,
        /// Sender balance
        available: U256,
    },

    /// Gas limit below the intrinsic cost
    #[error("intrinsic gas too low: required {required}, limit {limit}")]
    IntrinsicGasTooLow {
        /// Intrinsic cost
        required: u64,
        /// Transaction gas limit
        limit: u64,
    },

    /// Fee cap below the block base fee
    #[error("max fee per gas {max_fee} below base fee {base_fee}")]
    FeeCapTooLow {
        /// Offered fee cap
        max_fee: U256,
        /// Block base fee
        base_fee: U256,
    },

    /// Creation init code over the EIP-3860 limit
    #[error("init code size {size} exceeds {limit}")]
    InitCodeTooLarge {
        /// Init code size
        size: usize,
        /// Allowed size
        limit: usize,
    },

    /// Gas limit above the block gas limit
    #[error("gas limit {limit} exceeds block gas limit {block_limit}")]
    GasLimitExceedsBlock {
        /// Transaction gas limit
        limit: u64,
        /// Block gas limit
        block_limit: u64,
    },

    /// Fatal VM error
    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Why an instruction stopped the interpreter loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Halt {
    Exception(ExceptionKind),
    Fatal(VmError),
}

impl From<ExceptionKind> for Halt {
    fn from(kind: ExceptionKind) -> Self {
        Halt::Exception(kind)
    }
}

impl From<VmError> for Halt {
    fn from(err: VmError) -> Self {
        Halt::Fatal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display() {
        assert_eq!(ExceptionKind::OutOfGas.to_string(), "out of gas");
        assert_eq!(
            ExceptionKind::StaticCallViolation.to_string(),
            "state modification in static context"
        );
    }

    #[test]
    fn test_missing_code_display() {
        let err = VmError::MissingCode {
            address: Address::from_low_u64(0xaa),
            code_hash: H256::ZERO,
        };
        let text = err.to_string();
        assert!(text.contains("0x00000000000000000000000000000000000000aa"));
        assert!(text.starts_with("code 0x0000"));
    }

    #[test]
    fn test_halt_from_exception() {
        let halt: Halt = ExceptionKind::StackUnderflow.into();
        assert_eq!(halt, Halt::Exception(ExceptionKind::StackUnderflow));
    }

    #[test]
    fn test_precompile_error_from_crypto() {
        let err: PrecompileError = CryptoError::Unsupported("kzg").into();
        assert!(err.to_string().contains("kzg"));
    }
}
