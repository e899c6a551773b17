//! Stack-only instructions
//!
//! [`apply`] is shared by the step loop and by precompiled segments, so a
//! segment produces exactly what stepping through it would.

use crate::error::ExceptionKind;
use crate::gas::{cost, GasMeter};
use crate::math::{self, bool_word};
use crate::opcode::Opcode;
use crate::stack::Stack;
use fugue_primitives::U256;

fn unary(stack: &mut Stack, f: impl FnOnce(U256) -> U256) -> Result<(), ExceptionKind> {
    let a = stack.pop()?;
    stack.push(f(a))
}

fn binary(stack: &mut Stack, f: impl FnOnce(U256, U256) -> U256) -> Result<(), ExceptionKind> {
    let a = stack.pop()?;
    let b = stack.pop()?;
    stack.push(f(a, b))
}

fn ternary(
    stack: &mut Stack,
    f: impl FnOnce(U256, U256, U256) -> U256,
) -> Result<(), ExceptionKind> {
    let a = stack.pop()?;
    let b = stack.pop()?;
    let n = stack.pop()?;
    stack.push(f(a, b, n))
}

/// Apply a stack-only opcode; `immediate` is the value a PUSHn pushes.
///
/// Gas is charged by the caller.
pub(crate) fn apply(stack: &mut Stack, opcode: Opcode, immediate: U256) -> Result<(), ExceptionKind> {
    use Opcode::*;
    match opcode {
        ADD => binary(stack, |a, b| a.overflowing_add(b).0),
        MUL => binary(stack, |a, b| a.overflowing_mul(b).0),
        SUB => binary(stack, |a, b| a.overflowing_sub(b).0),
        DIV => binary(stack, math::div),
        SDIV => binary(stack, math::sdiv),
        MOD => binary(stack, math::rem),
        SMOD => binary(stack, math::smod),
        ADDMOD => ternary(stack, math::addmod),
        MULMOD => ternary(stack, math::mulmod),
        SIGNEXTEND => binary(stack, math::signextend),
        LT => binary(stack, |a, b| bool_word(a < b)),
        GT => binary(stack, |a, b| bool_word(a > b)),
        SLT => binary(stack, |a, b| bool_word(math::slt(&a, &b))),
        SGT => binary(stack, |a, b| bool_word(math::sgt(&a, &b))),
        EQ => binary(stack, |a, b| bool_word(a == b)),
        ISZERO => unary(stack, |a| bool_word(a.is_zero())),
        AND => binary(stack, |a, b| a & b),
        OR => binary(stack, |a, b| a | b),
        XOR => binary(stack, |a, b| a ^ b),
        NOT => unary(stack, |a| !a),
        BYTE => binary(stack, math::byte),
        POP => stack.pop_limbo(),
        JUMPDEST => Ok(()),
        op if op.is_push() => stack.push(immediate),
        op if op.dup_depth() != 0 => stack.dup(op.dup_depth()),
        op if op.swap_depth() != 0 => stack.swap(op.swap_depth()),
        _ => Err(ExceptionKind::BadInstruction),
    }
}

/// SHL / SHR / SAR
pub(crate) fn shift(stack: &mut Stack, opcode: Opcode) -> Result<(), ExceptionKind> {
    match opcode {
        Opcode::SHL => binary(stack, math::shl),
        Opcode::SHR => binary(stack, math::shr),
        Opcode::SAR => binary(stack, math::sar),
        _ => Err(ExceptionKind::BadInstruction),
    }
}

/// EXP, priced per significant exponent byte
pub(crate) fn exp(stack: &mut Stack, gas: &mut GasMeter, byte_cost: u64) -> Result<(), ExceptionKind> {
    let base = stack.pop()?;
    let exponent = stack.pop()?;
    gas.charge(cost::EXP + byte_cost * math::byte_len(&exponent))?;
    stack.push(math::exp(base, exponent))
}
