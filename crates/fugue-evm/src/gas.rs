//! Gas cost constants, the per-frame gas meter and memory expansion pricing

use crate::error::ExceptionKind;
use crate::math::div32_ceil;
use crate::memory::Memory;
use crate::opcode::Opcode;
use fugue_primitives::U256;

/// Gas costs for EVM operations
pub mod cost {
    /// Zero gas
    pub const ZERO: u64 = 0;
    /// Base gas
    pub const BASE: u64 = 2;
    /// Very low gas
    pub const VERYLOW: u64 = 3;
    /// Low gas
    pub const LOW: u64 = 5;
    /// Mid gas
    pub const MID: u64 = 8;
    /// High gas
    pub const HIGH: u64 = 10;

    /// Jump dest gas
    pub const JUMPDEST: u64 = 1;
    /// Exp gas
    pub const EXP: u64 = 10;
    /// Exp byte gas before EIP-160
    pub const EXP_BYTE: u64 = 10;
    /// Exp byte gas since EIP-160
    pub const EXP_BYTE_EIP160: u64 = 50;
    /// SHA3 base gas
    pub const SHA3: u64 = 30;
    /// SHA3 word gas
    pub const SHA3_WORD: u64 = 6;
    /// BLOCKHASH gas
    pub const BLOCKHASH: u64 = 20;
    /// SELFBALANCE gas
    pub const SELFBALANCE: u64 = 5;

    /// BALANCE before EIP-150
    pub const BALANCE: u64 = 20;
    /// BALANCE since EIP-150
    pub const BALANCE_EIP150: u64 = 400;
    /// BALANCE since EIP-1884
    pub const BALANCE_EIP1884: u64 = 700;
    /// EXTCODESIZE / EXTCODECOPY before EIP-150
    pub const EXT_CODE: u64 = 20;
    /// EXTCODESIZE / EXTCODECOPY since EIP-150
    pub const EXT_CODE_EIP150: u64 = 700;
    /// EXTCODEHASH (EIP-1052)
    pub const EXT_CODE_HASH: u64 = 400;
    /// EXTCODEHASH since EIP-1884
    pub const EXT_CODE_HASH_EIP1884: u64 = 700;
    /// SLOAD before EIP-150
    pub const SLOAD: u64 = 50;
    /// SLOAD since EIP-150
    pub const SLOAD_EIP150: u64 = 200;
    /// SLOAD since EIP-1884
    pub const SLOAD_EIP1884: u64 = 800;
    /// CALL before EIP-150
    pub const CALL: u64 = 40;
    /// CALL since EIP-150
    pub const CALL_EIP150: u64 = 700;

    /// Cold account access (EIP-2929)
    pub const COLD_ACCOUNT_ACCESS: u64 = 2600;
    /// Cold storage slot access (EIP-2929)
    pub const COLD_SLOAD: u64 = 2100;
    /// Warm state read (EIP-2929)
    pub const WARM_STATE_READ: u64 = 100;

    /// Sstore set gas
    pub const SSET: u64 = 20000;
    /// Sstore reset gas
    pub const SRESET: u64 = 5000;
    /// Sstore clear refund before EIP-3529
    pub const SCLEAR_REFUND: i64 = 15000;
    /// Sstore clear refund since EIP-3529
    pub const SCLEAR_REFUND_EIP3529: i64 = 4800;
    /// Net-metered no-op SSTORE (EIP-1283)
    pub const SSTORE_NET_METERED_EIP1283: u64 = 200;
    /// Net-metered no-op SSTORE (EIP-2200)
    pub const SSTORE_NET_METERED_EIP2200: u64 = 800;
    /// Gas left at or below which a net-metered SSTORE fails (EIP-2200)
    pub const SSTORE_STIPEND: u64 = 2300;

    /// Transient storage access
    pub const TSTORAGE: u64 = 100;
    /// BLOBHASH gas
    pub const BLOBHASH: u64 = 3;

    /// Log gas
    pub const LOG: u64 = 375;
    /// Log topic gas
    pub const LOG_TOPIC: u64 = 375;
    /// Log data gas (per byte)
    pub const LOG_DATA: u64 = 8;

    /// Create gas
    pub const CREATE: u64 = 32000;
    /// Init code word gas (EIP-3860)
    pub const INIT_CODE_WORD: u64 = 2;
    /// Hashing word gas for CREATE2
    pub const CREATE2_WORD: u64 = 6;
    /// Code deposit gas per byte
    pub const CODE_DEPOSIT_BYTE: u64 = 200;
    /// Call value transfer gas
    pub const CALL_VALUE: u64 = 9000;
    /// Call / selfdestruct new account gas
    pub const NEW_ACCOUNT: u64 = 25000;
    /// Call stipend
    pub const CALL_STIPEND: u64 = 2300;
    /// Selfdestruct gas since EIP-150
    pub const SELFDESTRUCT_EIP150: u64 = 5000;
    /// Refund per destroyed account before EIP-3529
    pub const DESTROY_REFUND: i64 = 24000;

    /// Memory gas per word
    pub const MEMORY: u64 = 3;
    /// Copy gas per word
    pub const COPY: u64 = 3;
    /// Quadratic memory divisor
    pub const QUAD_COEFF_DIV: u64 = 512;

    /// Transaction gas
    pub const TX: u64 = 21000;
    /// Additional contract creation gas (EIP-2)
    pub const TX_CREATE: u64 = 32000;
    /// Transaction data zero byte
    pub const TX_DATA_ZERO: u64 = 4;
    /// Transaction data non-zero byte
    pub const TX_DATA_NONZERO: u64 = 68;
    /// Transaction data non-zero byte since EIP-2028
    pub const TX_DATA_NONZERO_EIP2028: u64 = 16;
    /// Access list address gas
    pub const ACCESS_LIST_ADDRESS: u64 = 2400;
    /// Access list storage key gas
    pub const ACCESS_LIST_STORAGE_KEY: u64 = 1900;
    /// Blob gas per blob (EIP-4844)
    pub const BLOB_GAS_PER_BLOB: u64 = 131072;

    /// Max call depth
    pub const MAX_CALL_DEPTH: usize = 1024;
    /// Max code size (EIP-170)
    pub const MAX_CODE_SIZE: usize = 24576;
    /// Max init code size (EIP-3860)
    pub const MAX_INIT_CODE_SIZE: usize = 49152;
}

/// Memory regions ending beyond this are unpayable and fail as out of gas
pub const MAX_MEMORY_SIZE: u64 = u32::MAX as u64;

/// Static gas of an opcode whose price never changes between rule sets.
///
/// Only meaningful for [`Opcode::is_segment_op`] opcodes.
pub fn static_gas(opcode: Opcode) -> u64 {
    match opcode {
        Opcode::POP => cost::BASE,
        Opcode::JUMPDEST => cost::JUMPDEST,
        Opcode::MUL | Opcode::DIV | Opcode::SDIV | Opcode::MOD | Opcode::SMOD
        | Opcode::SIGNEXTEND => cost::LOW,
        Opcode::ADDMOD | Opcode::MULMOD => cost::MID,
        _ => cost::VERYLOW,
    }
}

/// Total cost of `words` words of memory
pub fn memory_cost(words: u64) -> u64 {
    cost::MEMORY
        .saturating_mul(words)
        .saturating_add(words.saturating_mul(words) / cost::QUAD_COEFF_DIV)
}

/// Incremental cost and new size for touching `[offset, offset + len)`.
///
/// `None` when `len` is zero or the region is already covered.
pub fn memory_expansion(
    current_size: usize,
    offset: U256,
    len: U256,
) -> Result<Option<(u64, usize)>, ExceptionKind> {
    if len.is_zero() {
        return Ok(None);
    }
    let (end, overflow) = offset.overflowing_add(len);
    if overflow || end > U256::from(MAX_MEMORY_SIZE) {
        return Err(ExceptionKind::OutOfGas);
    }
    let end = end.low_u64();
    if end <= current_size as u64 {
        return Ok(None);
    }
    let new_words = end.div_ceil(32);
    let old_words = current_size as u64 / 32;
    let delta = memory_cost(new_words) - memory_cost(old_words);
    Ok(Some((delta, (new_words * 32) as usize)))
}

/// Per-word copy cost for a length taken from the stack
pub fn copy_cost(len: U256) -> u64 {
    cost::COPY.saturating_mul(div32_ceil(len))
}

/// Code deposit cost for `len` bytes of runtime code
pub fn code_deposit_cost(len: usize) -> u64 {
    cost::CODE_DEPOSIT_BYTE.saturating_mul(len as u64)
}

/// All but one 64th (EIP-150)
pub fn all_but_one_64th(gas: u64) -> u64 {
    gas - gas / 64
}

/// Gas remaining in a frame.
///
/// Charges are checked before they are applied, so the counter never
/// goes negative: a charge that does not fit fails with `OutOfGas` and
/// leaves the meter unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GasMeter {
    remaining: u64,
}

impl GasMeter {
    /// Meter holding `limit` gas
    pub fn new(limit: u64) -> Self {
        Self { remaining: limit }
    }

    /// Gas left
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Deduct `amount`
    pub fn charge(&mut self, amount: u64) -> Result<(), ExceptionKind> {
        match self.remaining.checked_sub(amount) {
            Some(left) => {
                self.remaining = left;
                Ok(())
            }
            None => Err(ExceptionKind::OutOfGas),
        }
    }

    /// Give back gas returned by a child frame or an aborted call
    pub fn return_gas(&mut self, amount: u64) {
        self.remaining = self.remaining.saturating_add(amount);
    }

    /// Deduct up to `amount`, stopping at zero
    pub fn burn(&mut self, amount: u64) {
        self.remaining = self.remaining.saturating_sub(amount);
    }

    /// Drop all remaining gas
    pub fn consume_all(&mut self) {
        self.remaining = 0;
    }

    /// Charge for touching `[offset, offset + len)` and grow `memory`
    pub fn expand_memory(
        &mut self,
        memory: &mut Memory,
        offset: U256,
        len: U256,
    ) -> Result<(), ExceptionKind> {
        if let Some((cost, new_size)) = memory_expansion(memory.size(), offset, len)? {
            self.charge(cost)?;
            memory.expand(new_size);
        }
        Ok(())
    }
}
