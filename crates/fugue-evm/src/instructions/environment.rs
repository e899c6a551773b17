//! Account, call-data, return-data and block queries

use crate::context::blockhash_in_range;
use crate::error::{ExceptionKind, Halt};
use crate::frame::EvmState;
use crate::gas::{copy_cost, cost};
use crate::interpreter::{region, source_offset, Interpreter};
use crate::tracer::Tracer;
use fugue_primitives::U256;

impl<T: Tracer> Interpreter<'_, T> {
    pub(crate) fn balance(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(self.rules.balance_cost())?;
        let address = state.stack.pop_address()?;
        self.charge_account_access(state, &address, true)?;
        let balance = self.world.get_balance(&address);
        state.stack.push(balance)
    }

    pub(crate) fn calldataload(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::VERYLOW)?;
        let start = source_offset(state.stack.pop()?);
        let input = &state.env.input;
        let mut word = [0u8; 32];
        if start < input.len() {
            let available = (input.len() - start).min(32);
            word[..available].copy_from_slice(&input[start..start + available]);
        }
        state.stack.push_bytes(&word)
    }

    /// CALLDATACOPY / CODECOPY: `source` is zero-extended past its end
    pub(crate) fn copy_to_memory(state: &mut EvmState, source: &[u8]) -> Result<(), ExceptionKind> {
        let dest = state.stack.pop()?;
        let offset = state.stack.pop()?;
        let len = state.stack.pop()?;
        state
            .gas
            .charge(cost::VERYLOW.saturating_add(copy_cost(len)))?;
        state.gas.expand_memory(&mut state.memory, dest, len)?;
        let (dest, len) = region(dest, len);
        state
            .memory
            .store_padded(dest, source, source_offset(offset), len);
        Ok(())
    }

    pub(crate) fn extcodesize(&mut self, state: &mut EvmState) -> Result<(), Halt> {
        state.gas.charge(self.rules.ext_code_cost())?;
        let address = state.stack.pop_address()?;
        self.charge_account_access(state, &address, true)?;
        let code = self.vm.get_cached_code(&*self.world, &address, self.rules)?;
        state.stack.push(U256::from(code.len()))?;
        Ok(())
    }

    pub(crate) fn extcodecopy(&mut self, state: &mut EvmState) -> Result<(), Halt> {
        let address = state.stack.pop_address()?;
        let dest = state.stack.pop()?;
        let offset = state.stack.pop()?;
        let len = state.stack.pop()?;
        state
            .gas
            .charge(self.rules.ext_code_cost().saturating_add(copy_cost(len)))?;
        self.charge_account_access(state, &address, true)?;
        state.gas.expand_memory(&mut state.memory, dest, len)?;
        let (dest, len) = region(dest, len);
        if len != 0 {
            let code = self.vm.get_cached_code(&*self.world, &address, self.rules)?;
            state
                .memory
                .store_padded(dest, code.code(), source_offset(offset), len);
        }
        Ok(())
    }

    pub(crate) fn returndatacopy(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        let dest = state.stack.pop()?;
        let offset = state.stack.pop()?;
        let len = state.stack.pop()?;
        state
            .gas
            .charge(cost::VERYLOW.saturating_add(copy_cost(len)))?;

        let (end, overflow) = offset.overflowing_add(len);
        if overflow || end > U256::from(self.return_data.len()) {
            return Err(ExceptionKind::AccessViolation);
        }
        if !len.is_zero() {
            state.gas.expand_memory(&mut state.memory, dest, len)?;
            let (dest, len) = region(dest, len);
            let start = offset.low_u64() as usize;
            state
                .memory
                .store(dest, &self.return_data[start..start + len]);
        }
        Ok(())
    }

    pub(crate) fn extcodehash(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(self.rules.ext_code_hash_cost())?;
        let address = state.stack.pop_address()?;
        self.charge_account_access(state, &address, true)?;
        if !self.world.account_exists(&address) || self.world.is_dead_account(&address) {
            return state.stack.push_zero();
        }
        let hash = self.world.get_code_hash(&address).unwrap_or_default();
        state.stack.push(hash.to_word())
    }

    pub(crate) fn blockhash(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::BLOCKHASH)?;
        let requested = state.stack.pop()?;
        let hash = blockhash_in_range(state.env.tx.block.number, requested)
            .and_then(|number| self.vm.blockhashes().block_hash(number));
        match hash {
            Some(hash) => state.stack.push(hash.to_word()),
            None => state.stack.push_zero(),
        }
    }

    pub(crate) fn blobhash(state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::BLOBHASH)?;
        let index = state.stack.pop()?;
        let hashes = &state.env.tx.blob_versioned_hashes;
        let hash = if index < U256::from(hashes.len()) {
            hashes[index.low_u64() as usize].to_word()
        } else {
            U256::zero()
        };
        state.stack.push(hash)
    }
}
