//! Execution observers
//!
//! The interpreter is generic over its [`Tracer`]. Every hook is guarded by
//! one of the associated `IS_TRACING_*` constants, so with [`NullTracer`]
//! the guards fold away at compile time.

mod call;
mod struct_log;

pub use call::{CallFrame, CallTracer};
pub use struct_log::{StructLog, StructLogTracer};

use crate::error::ExceptionKind;
use crate::frame::ExecutionType;
use bytes::Bytes;
use fugue_primitives::{Address, U256};

/// A frame about to start
#[derive(Debug, Clone)]
pub struct CallAction {
    /// Entry kind
    pub kind: ExecutionType,
    /// Sender
    pub from: Address,
    /// Target, or the new contract address for creation
    pub to: Address,
    /// Value moved
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// Gas given to the frame
    pub gas: u64,
    /// Frame depth
    pub depth: usize,
}

/// Observer of instructions and frame boundaries
#[allow(unused_variables)]
pub trait Tracer {
    /// Per-instruction hooks
    const IS_TRACING_INSTRUCTIONS: bool = false;
    /// Frame enter/exit hooks
    const IS_TRACING_ACTIONS: bool = false;
    /// Storage write hook
    const IS_TRACING_STORAGE: bool = false;
    /// Refund hook
    const IS_TRACING_REFUNDS: bool = false;
    /// Memory snapshot per instruction
    const IS_TRACING_MEMORY: bool = false;
    /// Stack snapshot per instruction
    const IS_TRACING_STACK: bool = false;
    /// Warm/cold access hook
    const IS_TRACING_ACCESS: bool = false;

    /// Instruction at `pc` is about to run
    fn start_operation(&mut self, pc: usize, opcode: u8, gas: u64, depth: usize) {}

    /// Stack before the instruction
    fn set_operation_stack(&mut self, stack: &[U256]) {}

    /// Memory before the instruction
    fn set_operation_memory(&mut self, memory: &[u8]) {}

    /// Instruction finished with `gas_left`
    fn end_operation(&mut self, gas_left: u64) {}

    /// Instruction failed
    fn set_operation_error(&mut self, error: ExceptionKind, gas_left: u64) {}

    /// Storage slot written
    fn set_operation_storage(&mut self, address: &Address, index: U256, new: U256, current: U256) {}

    /// Refund counter changed by `delta`
    fn report_refund(&mut self, delta: i64) {}

    /// Cold account or slot touched
    fn report_access(&mut self, address: &Address, index: Option<U256>) {}

    /// Frame entered
    fn report_action(&mut self, action: &CallAction) {}

    /// Frame returned
    fn report_action_end(&mut self, gas_left: u64, output: &[u8]) {}

    /// Creation frame returned and deployed code at `address`
    fn report_create_end(&mut self, gas_left: u64, address: &Address, code: &[u8]) {}

    /// Frame reverted
    fn report_action_revert(&mut self, gas_left: u64, output: &[u8]) {}

    /// Frame failed
    fn report_action_error(&mut self, error: ExceptionKind) {}

    /// SELFDESTRUCT moved `balance` to `beneficiary`
    fn report_selfdestruct(&mut self, address: &Address, balance: U256, beneficiary: &Address) {}
}

/// Tracer that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracer;

impl Tracer for NullTracer {}

pub(crate) fn opcode_name(byte: u8) -> String {
    match crate::opcode::Opcode::from_byte(byte) {
        Some(op) => op.name().to_string(),
        None => format!("0x{byte:02x}"),
    }
}
