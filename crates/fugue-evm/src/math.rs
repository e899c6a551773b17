//! 256-bit word arithmetic with EVM semantics
//!
//! Everything wraps modulo 2^256; division and modulo by zero yield zero.
//! Signed operations interpret words as two's complement.

use fugue_primitives::{U256, U512};

/// Check if a word is negative in two's complement
pub fn is_negative(v: &U256) -> bool {
    v.bit(255)
}

/// Two's complement negation: ~v + 1
pub fn twos_complement(v: U256) -> U256 {
    (!v).overflowing_add(U256::one()).0
}

fn abs(v: U256) -> U256 {
    if is_negative(&v) {
        twos_complement(v)
    } else {
        v
    }
}

/// DIV
pub fn div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        U256::zero()
    } else {
        a / b
    }
}

/// MOD
pub fn rem(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        U256::zero()
    } else {
        a % b
    }
}

/// SDIV, with `-2^255 / -1 = -2^255`
pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let negative = is_negative(&a) != is_negative(&b);
    let result = abs(a) / abs(b);
    if negative {
        twos_complement(result)
    } else {
        result
    }
}

/// SMOD, result takes the sign of the dividend
pub fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let result = abs(a) % abs(b);
    if is_negative(&a) {
        twos_complement(result)
    } else {
        result
    }
}

/// ADDMOD with an unbounded intermediate sum
pub fn addmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let sum = U512::from(a) + U512::from(b);
    narrow(sum % U512::from(n))
}

/// MULMOD with an unbounded intermediate product
pub fn mulmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    narrow(a.full_mul(b) % U512::from(n))
}

// Remainders modulo a 256-bit value always fit.
fn narrow(v: U512) -> U256 {
    U256::try_from(v).unwrap_or_default()
}

/// EXP modulo 2^256
pub fn exp(base: U256, exponent: U256) -> U256 {
    base.overflowing_pow(exponent).0
}

/// Number of bytes needed to represent the exponent, for EXP pricing
pub fn byte_len(v: &U256) -> u64 {
    (v.bits() as u64 + 7) / 8
}

/// SIGNEXTEND: sign-extend `x` from byte `b` (0 = least significant)
pub fn signextend(b: U256, x: U256) -> U256 {
    if b >= U256::from(31) {
        return x;
    }
    let bit = b.low_u64() as usize * 8 + 7;
    let mask = (U256::one() << (bit + 1)) - U256::one();
    if x.bit(bit) {
        x | !mask
    } else {
        x & mask
    }
}

/// BYTE: byte `i` of `x`, 0 being the most significant
pub fn byte(i: U256, x: U256) -> U256 {
    if i >= U256::from(32) {
        return U256::zero();
    }
    U256::from(x.byte(31 - i.low_u64() as usize))
}

/// SHL
pub fn shl(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        return U256::zero();
    }
    value << shift.low_u64() as usize
}

/// SHR (logical)
pub fn shr(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        return U256::zero();
    }
    value >> shift.low_u64() as usize
}

/// SAR (sign-preserving)
pub fn sar(shift: U256, value: U256) -> U256 {
    let negative = is_negative(&value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.low_u64() as usize;
    let shifted = value >> shift;
    if negative && shift > 0 {
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

/// Signed less-than
pub fn slt(a: &U256, b: &U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Signed greater-than
pub fn sgt(a: &U256, b: &U256) -> bool {
    slt(b, a)
}

/// Boolean as a word
pub fn bool_word(v: bool) -> U256 {
    if v {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Words needed to hold `len` bytes, saturating for oversized lengths
pub fn div32_ceil(len: U256) -> u64 {
    if len > U256::from(u64::MAX - 31) {
        return u64::MAX / 32 + 1;
    }
    (len.low_u64() + 31) / 32
}

/// Narrow a word to u64, saturating
pub fn saturating_u64(v: U256) -> u64 {
    if v > U256::from(u64::MAX) {
        u64::MAX
    } else {
        v.low_u64()
    }
}
