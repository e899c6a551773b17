//! Frame-spawning instructions and SELFDESTRUCT
//!
//! CALL and CREATE never recurse: they charge the parent, prepare the child
//! [`EvmState`] and hand it back as [`Flow::Call`]. Failures the caller can
//! observe without a child frame (depth limit, insufficient balance, nonce
//! overflow, address collision) push zero and continue.

use crate::address::{create2_address, create_address};
use crate::code::CodeInfo;
use crate::context::ExecutionEnvironment;
use crate::error::{ExceptionKind, Halt};
use crate::frame::{EvmState, ExecutionType};
use crate::gas::{all_but_one_64th, cost};
use crate::interpreter::{region, Flow, Interpreter};
use crate::math::div32_ceil;
use crate::opcode::Opcode;
use crate::tracer::Tracer;
use bytes::Bytes;
use fugue_primitives::{EMPTY_CODE_HASH, U256};
use std::sync::Arc;

impl<T: Tracer> Interpreter<'_, T> {
    /// Soft failure: nothing to run, the caller sees zero
    fn abort_call(&mut self, state: &mut EvmState) -> Result<Flow, Halt> {
        self.return_data = Bytes::new();
        state.stack.push_zero()?;
        Ok(Flow::Continue)
    }

    pub(crate) fn call(&mut self, state: &mut EvmState, opcode: Opcode) -> Result<Flow, Halt> {
        let rules = self.rules;
        let kind = match opcode {
            Opcode::CALL => ExecutionType::Call,
            Opcode::CALLCODE => ExecutionType::CallCode,
            Opcode::DELEGATECALL if rules.homestead => ExecutionType::DelegateCall,
            Opcode::STATICCALL if rules.static_call => ExecutionType::StaticCall,
            _ => return Err(ExceptionKind::BadInstruction.into()),
        };

        let requested_gas = state.stack.pop()?;
        let code_source = state.stack.pop_address()?;
        self.charge_account_access(state, &code_source, true)?;

        let call_value = match kind {
            ExecutionType::StaticCall => U256::zero(),
            ExecutionType::DelegateCall => state.env.value,
            _ => state.stack.pop()?,
        };
        let transfer_value = if kind == ExecutionType::DelegateCall {
            U256::zero()
        } else {
            call_value
        };
        let in_offset = state.stack.pop()?;
        let in_len = state.stack.pop()?;
        let out_offset = state.stack.pop()?;
        let out_len = state.stack.pop()?;

        if state.is_static && !transfer_value.is_zero() && kind != ExecutionType::CallCode {
            return Err(ExceptionKind::StaticCallViolation.into());
        }

        let executing = state.env.executing_account;
        let caller = if kind == ExecutionType::DelegateCall {
            state.env.caller
        } else {
            executing
        };
        let target = match kind {
            ExecutionType::Call | ExecutionType::StaticCall => code_source,
            _ => executing,
        };

        let mut extra = 0;
        if !transfer_value.is_zero() {
            extra += cost::CALL_VALUE;
        }
        if !rules.clear_empty_account_when_touched && !self.world.account_exists(&target) {
            extra += cost::NEW_ACCOUNT;
        } else if rules.clear_empty_account_when_touched
            && !transfer_value.is_zero()
            && self.world.is_dead_account(&target)
        {
            extra += cost::NEW_ACCOUNT;
        }

        state.gas.charge(rules.call_cost())?;
        state
            .gas
            .expand_memory(&mut state.memory, in_offset, in_len)?;
        state
            .gas
            .expand_memory(&mut state.memory, out_offset, out_len)?;
        state.gas.charge(extra)?;

        let mut gas_limit = requested_gas;
        if rules.use_63_over_64_rule {
            gas_limit = gas_limit.min(U256::from(all_but_one_64th(state.gas.remaining())));
        }
        if gas_limit >= U256::from(i64::MAX) {
            return Err(ExceptionKind::OutOfGas.into());
        }
        let mut child_gas = gas_limit.low_u64();
        state.gas.charge(child_gas)?;
        if !transfer_value.is_zero() {
            child_gas += cost::CALL_STIPEND;
        }

        if state.env.call_depth >= cost::MAX_CALL_DEPTH
            || (!transfer_value.is_zero() && self.world.get_balance(&executing) < transfer_value)
        {
            tracing::trace!(depth = state.env.call_depth, %target, "call aborted before entry");
            state.gas.return_gas(child_gas);
            return self.abort_call(state);
        }

        let (in_offset, in_len) = region(in_offset, in_len);
        let input = Bytes::from(state.memory.load(in_offset, in_len));
        let snapshot = self.world.take_snapshot();
        self.world.subtract_from_balance(&caller, transfer_value);

        let code = self.vm.get_cached_code(&*self.world, &code_source, rules)?;
        let env = ExecutionEnvironment {
            tx: state.env.tx.clone(),
            caller,
            code_source: Some(code_source),
            executing_account: target,
            transfer_value,
            value: call_value,
            input,
            code,
            call_depth: state.env.call_depth + 1,
        };
        let (out_offset, out_len) = region(out_offset, out_len);

        let mut child = EvmState::new(env, kind, child_gas);
        child.is_static = kind == ExecutionType::StaticCall || state.is_static;
        child.snapshot = snapshot;
        child.access_checkpoint = self.access.checkpoint();
        child.output_destination = out_offset;
        child.output_length = out_len;
        Ok(Flow::Call(Box::new(child)))
    }

    pub(crate) fn create(&mut self, state: &mut EvmState, opcode: Opcode) -> Result<Flow, Halt> {
        let rules = self.rules;
        let kind = match opcode {
            Opcode::CREATE => ExecutionType::Create,
            Opcode::CREATE2 if rules.create2_opcode => ExecutionType::Create2,
            _ => return Err(ExceptionKind::BadInstruction.into()),
        };
        if state.is_static {
            return Err(ExceptionKind::StaticCallViolation.into());
        }

        let executing = state.env.executing_account;
        if !self.world.account_exists(&executing) {
            self.world.create_account(executing, U256::zero());
        }

        let value = state.stack.pop()?;
        let offset = state.stack.pop()?;
        let len = state.stack.pop()?;
        let salt = if kind == ExecutionType::Create2 {
            Some(state.stack.pop_bytes()?)
        } else {
            None
        };

        // EIP-3860
        if rules.limit_init_code && len > U256::from(rules.max_init_code_size) {
            return Err(ExceptionKind::OutOfGas.into());
        }
        let words = div32_ceil(len);
        let mut price = cost::CREATE;
        if rules.limit_init_code {
            price = price.saturating_add(cost::INIT_CODE_WORD.saturating_mul(words));
        }
        if kind == ExecutionType::Create2 {
            price = price.saturating_add(cost::CREATE2_WORD.saturating_mul(words));
        }
        state.gas.charge(price)?;
        state.gas.expand_memory(&mut state.memory, offset, len)?;

        if state.env.call_depth >= cost::MAX_CALL_DEPTH {
            return self.abort_call(state);
        }
        let (offset, len) = region(offset, len);
        let init_code = Bytes::from(state.memory.load(offset, len));

        if value > self.world.get_balance(&executing) {
            return self.abort_call(state);
        }
        let nonce = self.world.get_nonce(&executing);
        if nonce == u64::MAX {
            return self.abort_call(state);
        }

        let child_gas = if rules.use_63_over_64_rule {
            all_but_one_64th(state.gas.remaining())
        } else {
            state.gas.remaining()
        };
        state.gas.charge(child_gas)?;

        let contract = match salt {
            Some(salt) => {
                let code_hash = self.vm.crypto().keccak256(&init_code);
                create2_address(&executing, &salt, &code_hash)
            }
            None => create_address(&executing, nonce),
        };
        if rules.use_hot_and_cold_storage {
            self.access.warm_up_address(contract);
        }

        self.world.increment_nonce(&executing);
        let snapshot = self.world.take_snapshot();

        let exists = self.world.account_exists(&contract);
        if exists
            && (self.world.get_code_hash(&contract) != Some(EMPTY_CODE_HASH)
                || self.world.get_nonce(&contract) != 0)
        {
            tracing::warn!(%contract, "contract address collision");
            return self.abort_call(state);
        }
        if exists {
            self.world.reset_storage_root(&contract);
        } else if self.world.is_dead_account(&contract) {
            self.world.clear_storage(&contract);
        }
        self.world.subtract_from_balance(&executing, value);

        let env = ExecutionEnvironment {
            tx: state.env.tx.clone(),
            caller: executing,
            code_source: None,
            executing_account: contract,
            transfer_value: value,
            value,
            input: Bytes::new(),
            code: Arc::new(CodeInfo::new(init_code)),
            call_depth: state.env.call_depth + 1,
        };
        let mut child = EvmState::new(env, kind, child_gas);
        child.is_create_on_pre_existing_account = exists;
        child.snapshot = snapshot;
        child.access_checkpoint = self.access.checkpoint();
        Ok(Flow::Call(Box::new(child)))
    }

    pub(crate) fn selfdestruct(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        if state.is_static {
            return Err(ExceptionKind::StaticCallViolation);
        }
        let rules = self.rules;
        if rules.use_shanghai_ddos_protection {
            state.gas.charge(cost::SELFDESTRUCT_EIP150)?;
        }
        let inheritor = state.stack.pop_address()?;
        self.charge_account_access(state, &inheritor, false)?;

        let executing = state.env.executing_account;
        // EIP-6780: only contracts created in this transaction are deleted
        let created_in_tx = self.access.was_created(&executing);
        if !rules.selfdestruct_only_same_transaction || created_in_tx {
            state.destroy(executing);
        }

        let balance = self.world.get_balance(&executing);
        if T::IS_TRACING_ACTIONS {
            self.tracer
                .report_selfdestruct(&executing, balance, &inheritor);
        }
        if rules.clear_empty_account_when_touched
            && !balance.is_zero()
            && self.world.is_dead_account(&inheritor)
        {
            state.gas.charge(cost::NEW_ACCOUNT)?;
        }
        let inheritor_exists = self.world.account_exists(&inheritor);
        if !rules.clear_empty_account_when_touched
            && !inheritor_exists
            && rules.use_shanghai_ddos_protection
        {
            state.gas.charge(cost::NEW_ACCOUNT)?;
        }

        if !inheritor_exists {
            self.world.create_account(inheritor, balance);
        } else if inheritor != executing {
            self.world.add_to_balance(&inheritor, balance);
        }
        // a surviving contract sending to itself keeps its balance
        if rules.selfdestruct_only_same_transaction && !created_in_tx && inheritor == executing {
            return Ok(());
        }
        self.world.subtract_from_balance(&executing, balance);
        Ok(())
    }
}
