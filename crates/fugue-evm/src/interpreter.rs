//! Per-frame execution
//!
//! [`Interpreter`] carries the transaction-wide pieces (world state, rules,
//! tracer, warm set, return-data buffer) while frames come and go. It runs
//! one frame until it stops, returns, reverts, fails or asks for a child
//! frame; the driver in [`crate::vm`] owns the frame stack.

use crate::access::AccessTracker;
use crate::analysis::{push_value, Segment};
use crate::code::CodeInfo;
use crate::error::{ExceptionKind, Halt, VmError, VmResult};
use crate::frame::EvmState;
use crate::gas::{cost, static_gas};
use crate::instructions::arithmetic;
use crate::opcode::Opcode;
use crate::precompiles::Precompile;
use crate::rules::ReleaseSpec;
use crate::stack::MAX_STACK_SIZE;
use crate::state::{StorageCell, WorldState};
use crate::tracer::Tracer;
use crate::vm::VirtualMachine;
use bytes::Bytes;
use fugue_primitives::{Address, U256};

/// How a frame left the interpreter
#[derive(Debug)]
pub(crate) enum CallResult {
    /// Suspend the frame and run this child first
    Child(Box<EvmState>),
    /// Normal completion or revert
    Return {
        output: Bytes,
        precompile_success: Option<bool>,
        should_revert: bool,
    },
    /// Exceptional halt; the frame's gas is gone
    Exception(ExceptionKind),
}

impl CallResult {
    fn empty() -> Self {
        CallResult::Return {
            output: Bytes::new(),
            precompile_success: None,
            should_revert: false,
        }
    }
}

/// What a single instruction asks the loop to do next
#[derive(Debug)]
pub(crate) enum Flow {
    Continue,
    Stop,
    Return(Bytes),
    Revert(Bytes),
    Call(Box<EvmState>),
}

/// Outcome of a child frame, applied when the parent resumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resume {
    pub status: U256,
    pub output: Bytes,
    pub destination: usize,
}

impl Resume {
    pub(crate) fn failure() -> Self {
        Self::status(U256::zero())
    }

    pub(crate) fn status(status: U256) -> Self {
        Self {
            status,
            output: Bytes::new(),
            destination: 0,
        }
    }
}

/// Offset and length of a memory region whose expansion is already paid for
pub(crate) fn region(offset: U256, len: U256) -> (usize, usize) {
    if len.is_zero() {
        (0, 0)
    } else {
        (offset.low_u64() as usize, len.low_u64() as usize)
    }
}

/// Read position inside a source buffer; anything past `usize` reads zeros
pub(crate) fn source_offset(offset: U256) -> usize {
    if offset > U256::from(usize::MAX) {
        usize::MAX
    } else {
        offset.low_u64() as usize
    }
}

fn push_with(
    state: &mut EvmState,
    gas: u64,
    value: impl FnOnce(&EvmState) -> U256,
) -> Result<(), ExceptionKind> {
    state.gas.charge(gas)?;
    let value = value(state);
    state.stack.push(value)
}

/// Transaction-wide execution context
pub(crate) struct Interpreter<'a, T: Tracer> {
    pub(crate) vm: &'a VirtualMachine,
    pub(crate) rules: &'a ReleaseSpec,
    pub(crate) world: &'a mut dyn WorldState,
    pub(crate) tracer: &'a mut T,
    pub(crate) access: AccessTracker,
    pub(crate) return_data: Bytes,
    ripemd_touched: bool,
}

impl<'a, T: Tracer> Interpreter<'a, T> {
    pub(crate) fn new(
        vm: &'a VirtualMachine,
        rules: &'a ReleaseSpec,
        world: &'a mut dyn WorldState,
        tracer: &'a mut T,
        access: AccessTracker,
    ) -> Self {
        Self {
            vm,
            rules,
            world,
            tracer,
            access,
            return_data: Bytes::new(),
            ripemd_touched: false,
        }
    }

    /// Roll back everything a failed or reverted frame did
    pub(crate) fn unwind(&mut self, state: &EvmState) {
        tracing::trace!(
            depth = state.env.call_depth,
            snapshot = state.snapshot.0,
            "restoring snapshot"
        );
        self.world.restore(state.snapshot);
        self.access.rollback(state.access_checkpoint);
    }

    /// EIP-161 consensus quirk: a zero-value touch of the RIPEMD-160
    /// precompile survives the failure of the frame that touched it.
    pub(crate) fn retouch_ripemd(&mut self) {
        if !self.ripemd_touched {
            return;
        }
        if self.world.account_exists(&Precompile::RIPEMD160_ADDRESS) {
            self.world
                .add_to_balance(&Precompile::RIPEMD160_ADDRESS, U256::zero());
        }
        self.ripemd_touched = false;
    }

    fn credit_target(&mut self, state: &EvmState) -> bool {
        let target = state.env.executing_account;
        let value = state.env.transfer_value;
        if !self.world.account_exists(&target) {
            self.world.create_account(target, value);
            true
        } else {
            self.world.add_to_balance(&target, value);
            false
        }
    }

    /// Run a precompile frame to completion
    pub(crate) fn execute_precompile(
        &mut self,
        state: &mut EvmState,
        precompile: Precompile,
    ) -> VmResult<CallResult> {
        let was_created = self.credit_target(state);
        if state.env.executing_account == Precompile::RIPEMD160_ADDRESS
            && !was_created
            && state.env.transfer_value.is_zero()
            && self.rules.clear_empty_account_when_touched
        {
            self.ripemd_touched = true;
        }

        let input = state.env.input.clone();
        let Some(price) = precompile.gas_cost(&input, self.rules) else {
            return Ok(CallResult::Exception(ExceptionKind::Other));
        };
        if let Err(kind) = state.gas.charge(price) {
            return Ok(CallResult::Exception(kind));
        }

        let (output, success) = match precompile.run(&input, self.rules, self.vm.crypto()) {
            Ok(result) => result,
            Err(err) => {
                if self.vm.config().log_precompile_faults {
                    tracing::error!(?precompile, error = %err, "precompile execution fault");
                }
                (Bytes::new(), false)
            }
        };
        if !success {
            if state.is_top_level {
                return Err(VmError::PrecompileFailure {
                    address: precompile.address(),
                });
            }
            tracing::warn!(?precompile, "precompile call failed");
            state.gas.consume_all();
        }
        Ok(CallResult::Return {
            output,
            precompile_success: Some(success),
            should_revert: !success,
        })
    }

    /// Enter or resume a bytecode frame
    pub(crate) fn execute_call(
        &mut self,
        state: &mut EvmState,
        resume: Option<Resume>,
    ) -> VmResult<CallResult> {
        if !state.is_continuation {
            self.credit_target(state);
            if state.kind.is_create() {
                self.access.mark_created(state.env.executing_account);
                if self.rules.clear_empty_account_when_touched {
                    self.world.increment_nonce(&state.env.executing_account);
                }
            }
        }

        let code = state.env.code.clone();
        if code.is_empty() {
            return Ok(CallResult::empty());
        }
        if !state.is_continuation {
            self.vm.notice_execution(&code);
        }

        if let Some(resume) = resume {
            if let Err(kind) = Self::apply_resume(state, resume) {
                return Ok(CallResult::Exception(kind));
            }
        }
        self.execute_code(state, &code)
    }

    fn apply_resume(state: &mut EvmState, resume: Resume) -> Result<(), ExceptionKind> {
        state.stack.push(resume.status)?;
        if !resume.output.is_empty() {
            state.gas.expand_memory(
                &mut state.memory,
                U256::from(resume.destination),
                U256::from(resume.output.len()),
            )?;
            state.memory.store(resume.destination, &resume.output);
        }
        Ok(())
    }

    fn execute_code(&mut self, state: &mut EvmState, code: &CodeInfo) -> VmResult<CallResult> {
        loop {
            let pc = state.pc;
            if pc >= code.len() {
                return Ok(CallResult::empty());
            }

            if !T::IS_TRACING_INSTRUCTIONS {
                if let Some(segment) = code.segment_at(pc) {
                    if segment.fits(state.stack.len(), state.gas.remaining(), MAX_STACK_SIZE) {
                        if let Err(kind) = Self::run_segment(state, segment) {
                            return Ok(CallResult::Exception(kind));
                        }
                        continue;
                    }
                }
            }

            let byte = code.code()[pc];
            if T::IS_TRACING_INSTRUCTIONS {
                self.start_trace(state, pc, byte);
            }
            state.pc += 1;

            let flow = match self.step(state, code, byte) {
                Ok(flow) => flow,
                Err(Halt::Exception(kind)) => {
                    if T::IS_TRACING_INSTRUCTIONS {
                        self.tracer.set_operation_error(kind, state.gas.remaining());
                    }
                    return Ok(CallResult::Exception(kind));
                }
                Err(Halt::Fatal(err)) => return Err(err),
            };
            if T::IS_TRACING_INSTRUCTIONS {
                self.tracer.end_operation(state.gas.remaining());
            }

            match flow {
                Flow::Continue => {}
                Flow::Stop => return Ok(CallResult::empty()),
                Flow::Return(output) => {
                    return Ok(CallResult::Return {
                        output,
                        precompile_success: None,
                        should_revert: false,
                    })
                }
                Flow::Revert(output) => {
                    return Ok(CallResult::Return {
                        output,
                        precompile_success: None,
                        should_revert: true,
                    })
                }
                Flow::Call(child) => return Ok(CallResult::Child(child)),
            }
        }
    }

    fn run_segment(state: &mut EvmState, segment: &Segment) -> Result<(), ExceptionKind> {
        state.gas.charge(segment.gas)?;
        for op in &segment.ops {
            arithmetic::apply(&mut state.stack, op.opcode, op.immediate)?;
        }
        state.pc = segment.end;
        Ok(())
    }

    #[cold]
    fn start_trace(&mut self, state: &EvmState, pc: usize, byte: u8) {
        self.tracer
            .start_operation(pc, byte, state.gas.remaining(), state.env.call_depth);
        if T::IS_TRACING_STACK {
            self.tracer.set_operation_stack(state.stack.as_slice());
        }
        if T::IS_TRACING_MEMORY {
            self.tracer.set_operation_memory(state.memory.data());
        }
    }

    /// Charge EIP-2929 account access
    pub(crate) fn charge_account_access(
        &mut self,
        state: &mut EvmState,
        address: &Address,
        charge_warm: bool,
    ) -> Result<(), ExceptionKind> {
        if !self.rules.use_hot_and_cold_storage {
            return Ok(());
        }
        if T::IS_TRACING_ACCESS {
            self.tracer.report_access(address, None);
        }
        if !self.access.is_warm(address) && !self.rules.is_precompile(address) {
            state.gas.charge(cost::COLD_ACCOUNT_ACCESS)?;
            self.access.warm_up_address(*address);
        } else if charge_warm {
            state.gas.charge(cost::WARM_STATE_READ)?;
        }
        Ok(())
    }

    /// Charge EIP-2929 storage access; warm writes are priced by SSTORE itself
    pub(crate) fn charge_storage_access(
        &mut self,
        state: &mut EvmState,
        cell: StorageCell,
        is_load: bool,
    ) -> Result<(), ExceptionKind> {
        if !self.rules.use_hot_and_cold_storage {
            return Ok(());
        }
        if T::IS_TRACING_ACCESS {
            self.tracer.report_access(&cell.address, Some(cell.index));
        }
        if self.access.warm_up_cell(cell) {
            state.gas.charge(cost::COLD_SLOAD)?;
        } else if is_load {
            state.gas.charge(cost::WARM_STATE_READ)?;
        }
        Ok(())
    }

    fn bad_instruction() -> Result<Flow, Halt> {
        Err(ExceptionKind::BadInstruction.into())
    }

    /// Execute the instruction `byte`; `state.pc` already points past it
    fn step(&mut self, state: &mut EvmState, code: &CodeInfo, byte: u8) -> Result<Flow, Halt> {
        use Opcode::*;

        let Some(opcode) = Opcode::from_byte(byte) else {
            return Self::bad_instruction();
        };
        let rules = self.rules;

        match opcode {
            STOP => return Ok(Flow::Stop),

            ADD | MUL | SUB | DIV | SDIV | MOD | SMOD | ADDMOD | MULMOD | SIGNEXTEND | LT | GT
            | SLT | SGT | EQ | ISZERO | AND | OR | XOR | NOT | BYTE | POP | JUMPDEST => {
                state.gas.charge(static_gas(opcode))?;
                arithmetic::apply(&mut state.stack, opcode, U256::zero())?;
            }
            EXP => arithmetic::exp(&mut state.stack, &mut state.gas, rules.exp_byte_cost())?,
            SHL | SHR | SAR => {
                if !rules.shift_opcodes {
                    return Self::bad_instruction();
                }
                state.gas.charge(cost::VERYLOW)?;
                arithmetic::shift(&mut state.stack, opcode)?;
            }

            KECCAK256 => self.keccak256(state)?,

            ADDRESS => push_with(state, cost::BASE, |s| s.env.executing_account.to_word())?,
            BALANCE => self.balance(state)?,
            ORIGIN => push_with(state, cost::BASE, |s| s.env.tx.origin.to_word())?,
            CALLER => push_with(state, cost::BASE, |s| s.env.caller.to_word())?,
            CALLVALUE => push_with(state, cost::BASE, |s| s.env.value)?,
            CALLDATALOAD => self.calldataload(state)?,
            CALLDATASIZE => push_with(state, cost::BASE, |s| U256::from(s.env.input.len()))?,
            CALLDATACOPY => {
                let input = state.env.input.clone();
                Self::copy_to_memory(state, &input)?;
            }
            CODESIZE => push_with(state, cost::BASE, |_| U256::from(code.len()))?,
            CODECOPY => Self::copy_to_memory(state, code.code())?,
            GASPRICE => push_with(state, cost::BASE, |s| s.env.tx.gas_price)?,
            EXTCODESIZE => self.extcodesize(state)?,
            EXTCODECOPY => self.extcodecopy(state)?,
            RETURNDATASIZE => {
                if !rules.return_data_opcodes {
                    return Self::bad_instruction();
                }
                let len = self.return_data.len();
                push_with(state, cost::BASE, |_| U256::from(len))?;
            }
            RETURNDATACOPY => {
                if !rules.return_data_opcodes {
                    return Self::bad_instruction();
                }
                self.returndatacopy(state)?;
            }
            EXTCODEHASH => {
                if !rules.ext_code_hash_opcode {
                    return Self::bad_instruction();
                }
                self.extcodehash(state)?;
            }

            BLOCKHASH => self.blockhash(state)?,
            COINBASE => push_with(state, cost::BASE, |s| s.env.tx.block.coinbase.to_word())?,
            TIMESTAMP => push_with(state, cost::BASE, |s| U256::from(s.env.tx.block.timestamp))?,
            NUMBER => push_with(state, cost::BASE, |s| U256::from(s.env.tx.block.number))?,
            PREVRANDAO => {
                let post_merge = rules.prevrandao;
                push_with(state, cost::BASE, |s| {
                    if post_merge {
                        s.env.tx.block.prev_randao.to_word()
                    } else {
                        s.env.tx.block.difficulty
                    }
                })?;
            }
            GASLIMIT => push_with(state, cost::BASE, |s| U256::from(s.env.tx.block.gas_limit))?,
            CHAINID => {
                if !rules.chain_id_opcode {
                    return Self::bad_instruction();
                }
                push_with(state, cost::BASE, |s| U256::from(s.env.tx.block.chain_id))?;
            }
            SELFBALANCE => {
                if !rules.self_balance_opcode {
                    return Self::bad_instruction();
                }
                let balance = self.world.get_balance(&state.env.executing_account);
                push_with(state, cost::SELFBALANCE, |_| balance)?;
            }
            BASEFEE => {
                if !rules.base_fee_opcode {
                    return Self::bad_instruction();
                }
                push_with(state, cost::BASE, |s| s.env.tx.block.base_fee)?;
            }
            BLOBHASH => {
                if !rules.blob_opcodes {
                    return Self::bad_instruction();
                }
                Self::blobhash(state)?;
            }
            BLOBBASEFEE => {
                if !rules.blob_opcodes {
                    return Self::bad_instruction();
                }
                let Some(fee) = state.env.tx.block.blob_base_fee else {
                    return Self::bad_instruction();
                };
                push_with(state, cost::BASE, |_| fee)?;
            }

            MLOAD => Self::mload(state)?,
            MSTORE => Self::mstore(state)?,
            MSTORE8 => Self::mstore8(state)?,
            SLOAD => self.sload(state)?,
            SSTORE => self.sstore(state)?,
            JUMP => Self::jump(state, code)?,
            JUMPI => Self::jumpi(state, code)?,
            PC => push_with(state, cost::BASE, |s| U256::from(s.pc - 1))?,
            MSIZE => push_with(state, cost::BASE, |s| U256::from(s.memory.size()))?,
            GAS => {
                state.gas.charge(cost::BASE)?;
                let left = state.gas.remaining();
                state.stack.push_u64(left)?;
            }

            // 0x5c..=0x5e: transient storage and MCOPY take precedence over
            // the legacy subroutine instructions sharing their bytes
            TLOAD => {
                if rules.transient_storage {
                    self.tload(state)?;
                } else if rules.subroutines {
                    Self::beginsub(state)?;
                } else {
                    return Self::bad_instruction();
                }
            }
            TSTORE => {
                if rules.transient_storage {
                    self.tstore(state)?;
                } else if rules.subroutines {
                    Self::returnsub(state)?;
                } else {
                    return Self::bad_instruction();
                }
            }
            MCOPY => {
                if rules.mcopy_opcode {
                    Self::mcopy(state)?;
                } else if rules.subroutines {
                    Self::jumpsub(state, code)?;
                } else {
                    return Self::bad_instruction();
                }
            }

            PUSH0 => {
                if !rules.push0 {
                    return Self::bad_instruction();
                }
                state.gas.charge(cost::BASE)?;
                state.stack.push_zero()?;
            }
            op if op.is_push() => {
                let size = op.push_size();
                let immediate = push_value(code.code(), state.pc, size);
                state.pc += size;
                state.gas.charge(cost::VERYLOW)?;
                state.stack.push(immediate)?;
            }
            op if op.dup_depth() != 0 || op.swap_depth() != 0 => {
                state.gas.charge(cost::VERYLOW)?;
                arithmetic::apply(&mut state.stack, op, U256::zero())?;
            }

            LOG0 | LOG1 | LOG2 | LOG3 | LOG4 => self.log(state, opcode.log_topics())?,

            CREATE | CREATE2 => return self.create(state, opcode),
            CALL | CALLCODE | DELEGATECALL | STATICCALL => return self.call(state, opcode),
            RETURN => return Ok(Flow::Return(Self::output(state)?)),
            REVERT => {
                if !rules.revert_opcode {
                    return Self::bad_instruction();
                }
                return Ok(Flow::Revert(Self::output(state)?));
            }
            INVALID => return Self::bad_instruction(),
            SELFDESTRUCT => {
                self.selfdestruct(state)?;
                return Ok(Flow::Stop);
            }

            _ => return Self::bad_instruction(),
        }
        Ok(Flow::Continue)
    }
}
