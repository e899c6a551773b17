//! Call frames
//!
//! An [`EvmState`] holds everything mutable about one frame. Frames are
//! kept on an explicit stack by the VM; a parent suspended on a sub-call
//! resumes with `is_continuation` set.

use crate::access::{AccessCheckpoint, AccessTracker};
use crate::context::ExecutionEnvironment;
use crate::gas::GasMeter;
use crate::memory::Memory;
use crate::stack::Stack;
use crate::state::Snapshot;
use crate::substate::Log;
use fugue_primitives::Address;
use serde::Serialize;
use std::fmt;

/// How a frame was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionType {
    /// CALL, or a top-level message call
    Call,
    /// CALLCODE
    CallCode,
    /// DELEGATECALL
    DelegateCall,
    /// STATICCALL
    StaticCall,
    /// CREATE, or a top-level contract creation
    Create,
    /// CREATE2
    Create2,
}

impl ExecutionType {
    /// CREATE or CREATE2
    pub fn is_create(self) -> bool {
        matches!(self, ExecutionType::Create | ExecutionType::Create2)
    }

    /// Upper-case opcode-style name
    pub fn name(self) -> &'static str {
        match self {
            ExecutionType::Call => "CALL",
            ExecutionType::CallCode => "CALLCODE",
            ExecutionType::DelegateCall => "DELEGATECALL",
            ExecutionType::StaticCall => "STATICCALL",
            ExecutionType::Create => "CREATE",
            ExecutionType::Create2 => "CREATE2",
        }
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable state of one frame
#[derive(Debug)]
pub struct EvmState {
    /// Immutable environment
    pub env: ExecutionEnvironment,
    /// Entry kind
    pub kind: ExecutionType,
    /// Root of the frame tree
    pub is_top_level: bool,
    /// State modifications forbidden
    pub is_static: bool,
    /// Resuming after a child frame completed
    pub is_continuation: bool,
    /// Creation targets an address that already held an account
    pub is_create_on_pre_existing_account: bool,
    /// World state position to restore on failure
    pub snapshot: Snapshot,
    /// Access journal position to restore on failure
    pub access_checkpoint: AccessCheckpoint,
    /// Parent memory offset receiving the output
    pub output_destination: usize,
    /// Bytes of output the parent asked for
    pub output_length: usize,
    /// Program counter
    pub pc: usize,
    /// Gas meter
    pub gas: GasMeter,
    /// Data stack
    pub stack: Stack,
    /// Memory
    pub memory: Memory,
    /// Legacy subroutine return stack
    pub return_stack: Vec<usize>,
    /// Signed refund counter
    pub refund: i64,
    /// Logs emitted so far
    pub logs: Vec<Log>,
    /// Accounts scheduled for destruction, in order
    pub destroy_list: Vec<Address>,
    /// Transaction-wide warm sets; only populated on the top-level frame
    /// before the run starts
    pub access: AccessTracker,
}

impl EvmState {
    /// Fresh frame with `gas_limit` gas
    pub fn new(env: ExecutionEnvironment, kind: ExecutionType, gas_limit: u64) -> Self {
        Self {
            env,
            kind,
            is_top_level: false,
            is_static: false,
            is_continuation: false,
            is_create_on_pre_existing_account: false,
            snapshot: Snapshot::default(),
            access_checkpoint: AccessCheckpoint::default(),
            output_destination: 0,
            output_length: 0,
            pc: 0,
            gas: GasMeter::new(gas_limit),
            stack: Stack::new(),
            memory: Memory::new(),
            return_stack: Vec::new(),
            refund: 0,
            logs: Vec::new(),
            destroy_list: Vec::new(),
            access: AccessTracker::new(),
        }
    }

    /// Root frame of a transaction
    pub fn top_level(
        env: ExecutionEnvironment,
        kind: ExecutionType,
        gas_limit: u64,
        snapshot: Snapshot,
        access: AccessTracker,
    ) -> Self {
        Self {
            is_top_level: true,
            snapshot,
            access,
            ..Self::new(env, kind, gas_limit)
        }
    }

    /// Schedule `address` for destruction
    pub fn destroy(&mut self, address: Address) {
        if !self.destroy_list.contains(&address) {
            self.destroy_list.push(address);
        }
    }

    /// Hand logs, refund and destroy list to the parent after success
    pub fn commit_to_parent(self, parent: &mut EvmState) {
        parent.logs.extend(self.logs);
        parent.refund += self.refund;
        for address in self.destroy_list {
            parent.destroy(address);
        }
    }
}
