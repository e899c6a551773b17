//! Memory access, hashing, logs and frame output

use crate::error::ExceptionKind;
use crate::frame::EvmState;
use crate::gas::{copy_cost, cost};
use crate::interpreter::{region, Interpreter};
use crate::math::div32_ceil;
use crate::substate::Log;
use crate::tracer::Tracer;
use bytes::Bytes;
use fugue_primitives::{H256, U256};

impl<T: Tracer> Interpreter<'_, T> {
    pub(crate) fn mload(state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::VERYLOW)?;
        let offset = state.stack.pop()?;
        state
            .gas
            .expand_memory(&mut state.memory, offset, U256::from(32))?;
        let word = state.memory.load_word(offset.low_u64() as usize);
        state.stack.push_bytes(&word)
    }

    pub(crate) fn mstore(state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::VERYLOW)?;
        let offset = state.stack.pop()?;
        let value = state.stack.pop_bytes()?;
        state
            .gas
            .expand_memory(&mut state.memory, offset, U256::from(32))?;
        state.memory.store_word(offset.low_u64() as usize, &value);
        Ok(())
    }

    pub(crate) fn mstore8(state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::VERYLOW)?;
        let offset = state.stack.pop()?;
        let value = state.stack.pop()?;
        state
            .gas
            .expand_memory(&mut state.memory, offset, U256::one())?;
        state
            .memory
            .store_byte(offset.low_u64() as usize, value.low_u64() as u8);
        Ok(())
    }

    /// MCOPY (EIP-5656); expansion covers whichever region ends later
    pub(crate) fn mcopy(state: &mut EvmState) -> Result<(), ExceptionKind> {
        let dest = state.stack.pop()?;
        let src = state.stack.pop()?;
        let len = state.stack.pop()?;
        state
            .gas
            .charge(cost::VERYLOW.saturating_add(copy_cost(len)))?;
        state
            .gas
            .expand_memory(&mut state.memory, dest.max(src), len)?;
        if !len.is_zero() {
            let (dest, len) = region(dest, len);
            state.memory.copy_within(dest, src.low_u64() as usize, len);
        }
        Ok(())
    }

    pub(crate) fn keccak256(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        let offset = state.stack.pop()?;
        let len = state.stack.pop()?;
        let price = cost::SHA3.saturating_add(cost::SHA3_WORD.saturating_mul(div32_ceil(len)));
        state.gas.charge(price)?;
        state.gas.expand_memory(&mut state.memory, offset, len)?;
        let (offset, len) = region(offset, len);
        let data = state.memory.load(offset, len);
        let hash = self.vm.crypto().keccak256(&data);
        state.stack.push(hash.to_word())
    }

    /// Memory slice returned by RETURN and REVERT
    pub(crate) fn output(state: &mut EvmState) -> Result<Bytes, ExceptionKind> {
        let offset = state.stack.pop()?;
        let len = state.stack.pop()?;
        state.gas.expand_memory(&mut state.memory, offset, len)?;
        let (offset, len) = region(offset, len);
        Ok(Bytes::from(state.memory.load(offset, len)))
    }

    pub(crate) fn log(&mut self, state: &mut EvmState, topics: usize) -> Result<(), ExceptionKind> {
        if state.is_static {
            return Err(ExceptionKind::StaticCallViolation);
        }
        let offset = state.stack.pop()?;
        let len = state.stack.pop()?;
        state.gas.expand_memory(&mut state.memory, offset, len)?;
        let (offset, len) = region(offset, len);
        let price = cost::LOG
            + cost::LOG_TOPIC * topics as u64
            + cost::LOG_DATA.saturating_mul(len as u64);
        state.gas.charge(price)?;

        let data = Bytes::from(state.memory.load(offset, len));
        let mut topic_list = Vec::with_capacity(topics);
        for _ in 0..topics {
            topic_list.push(H256::from_word(state.stack.pop()?));
        }
        state.logs.push(Log {
            address: state.env.executing_account,
            topics: topic_list,
            data,
        });
        Ok(())
    }
}
