//! Persistent and transient storage
//!
//! SSTORE pricing follows three schedules: the original set/reset model,
//! EIP-1283/2200 net metering, and net metering with EIP-2929 cold slots.
//! The numbers themselves come from [`crate::rules::ReleaseSpec`].

use crate::error::ExceptionKind;
use crate::frame::EvmState;
use crate::gas::cost;
use crate::interpreter::Interpreter;
use crate::state::StorageCell;
use crate::tracer::Tracer;

impl<T: Tracer> Interpreter<'_, T> {
    fn refund(&mut self, state: &mut EvmState, delta: i64) {
        state.refund += delta;
        if T::IS_TRACING_REFUNDS {
            self.tracer.report_refund(delta);
        }
    }

    pub(crate) fn sload(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(self.rules.sload_cost())?;
        let index = state.stack.pop()?;
        let cell = StorageCell::new(state.env.executing_account, index);
        self.charge_storage_access(state, cell, true)?;
        let value = self.world.get_storage(&cell);
        state.stack.push(value)
    }

    pub(crate) fn sstore(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        if state.is_static {
            return Err(ExceptionKind::StaticCallViolation);
        }
        let rules = self.rules;
        if !rules.use_net_gas_metering {
            state.gas.charge(rules.sstore_reset_cost())?;
        }
        // EIP-2200: never let a stipend-funded frame write storage
        if rules.net_gas_metering_stipend_fix && state.gas.remaining() <= cost::SSTORE_STIPEND {
            return Err(ExceptionKind::OutOfGas);
        }

        let index = state.stack.pop()?;
        let new = state.stack.pop()?;
        let cell = StorageCell::new(state.env.executing_account, index);
        self.charge_storage_access(state, cell, false)?;
        let current = self.world.get_storage(&cell);

        if !rules.use_net_gas_metering {
            if new.is_zero() {
                if !current.is_zero() {
                    self.refund(state, rules.sclear_refund());
                }
            } else if current.is_zero() {
                state.gas.charge(cost::SSET - cost::SRESET)?;
            }
        } else if new == current {
            state.gas.charge(rules.net_metered_sstore_cost())?;
        } else {
            let original = self.world.get_original_storage(&cell);
            if original == current {
                if current.is_zero() {
                    state.gas.charge(cost::SSET)?;
                } else {
                    state.gas.charge(rules.sstore_reset_cost())?;
                    if new.is_zero() {
                        self.refund(state, rules.sclear_refund());
                    }
                }
            } else {
                state.gas.charge(rules.net_metered_sstore_cost())?;
                if !original.is_zero() {
                    if current.is_zero() {
                        self.refund(state, -rules.sclear_refund());
                    }
                    if new.is_zero() {
                        self.refund(state, rules.sclear_refund());
                    }
                }
                if new == original {
                    let delta = if original.is_zero() {
                        rules.set_reversal_refund()
                    } else {
                        rules.clear_reversal_refund()
                    };
                    self.refund(state, delta);
                }
            }
        }

        if new != current {
            self.world.set_storage(cell, new);
        }
        if T::IS_TRACING_STORAGE {
            self.tracer
                .set_operation_storage(&cell.address, index, new, current);
        }
        Ok(())
    }

    pub(crate) fn tload(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        state.gas.charge(cost::TSTORAGE)?;
        let index = state.stack.pop()?;
        let cell = StorageCell::new(state.env.executing_account, index);
        let value = self.world.get_transient(&cell);
        state.stack.push(value)
    }

    pub(crate) fn tstore(&mut self, state: &mut EvmState) -> Result<(), ExceptionKind> {
        if state.is_static {
            return Err(ExceptionKind::StaticCallViolation);
        }
        state.gas.charge(cost::TSTORAGE)?;
        let index = state.stack.pop()?;
        let value = state.stack.pop()?;
        let cell = StorageCell::new(state.env.executing_account, index);
        self.world.set_transient(cell, value);
        Ok(())
    }
}
