//! Jumps and EIP-2315 subroutines

use crate::code::CodeInfo;
use crate::error::ExceptionKind;
use crate::frame::EvmState;
use crate::gas::cost;
use crate::interpreter::Interpreter;
use crate::stack::RETURN_STACK_SIZE;
use crate::tracer::Tracer;
use fugue_primitives::U256;

fn jump_target(
    code: &CodeInfo,
    destination: U256,
    is_subroutine: bool,
) -> Result<usize, ExceptionKind> {
    if destination > U256::from(i32::MAX) {
        return Err(ExceptionKind::InvalidJumpDestination);
    }
    let target = destination.low_u64() as usize;
    if !code.validate_jump(target, is_subroutine) {
        return Err(ExceptionKind::InvalidJumpDestination);
    }
    Ok(target)
}

impl<T: Tracer> Interpreter<'_, T> {
    pub(crate) fn jump(state: &mut EvmState, code: &CodeInfo) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::MID)?;
        let destination = state.stack.pop()?;
        state.pc = jump_target(code, destination, false)?;
        Ok(())
    }

    pub(crate) fn jumpi(state: &mut EvmState, code: &CodeInfo) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::HIGH)?;
        let destination = state.stack.pop()?;
        let condition = state.stack.pop()?;
        if !condition.is_zero() {
            state.pc = jump_target(code, destination, false)?;
        }
        Ok(())
    }

    /// BEGINSUB may only be reached through JUMPSUB
    pub(crate) fn beginsub(state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::BASE)?;
        Err(ExceptionKind::InvalidSubroutineEntry)
    }

    pub(crate) fn jumpsub(state: &mut EvmState, code: &CodeInfo) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::HIGH)?;
        if state.return_stack.len() >= RETURN_STACK_SIZE {
            return Err(ExceptionKind::StackOverflow);
        }
        let destination = state.stack.pop()?;
        let target = jump_target(code, destination, true)?;
        state.return_stack.push(state.pc);
        // execution continues after the BEGINSUB
        state.pc = target + 1;
        Ok(())
    }

    pub(crate) fn returnsub(state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::LOW)?;
        state.pc = state
            .return_stack
            .pop()
            .ok_or(ExceptionKind::InvalidSubroutineReturn)?;
        Ok(())
    }
}
