//! # fugue-evm
//!
//! Deterministic EVM execution core.
//!
//! This crate provides:
//! - a non-recursive frame-stack interpreter ([`VirtualMachine::run`])
//! - fork-aware gas metering and instruction gating ([`ReleaseSpec`])
//! - the standard precompiles
//! - a shared, concurrency-safe code cache with optional segment analysis
//! - transaction-level processing ([`TransactionProcessor`])
//!
//! World state is abstract ([`WorldState`]); [`InMemoryWorldState`] is a
//! journaled reference implementation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod address;
pub mod analysis;
pub mod cache;
pub mod code;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod gas;
mod instructions;
mod interpreter;
pub mod math;
pub mod memory;
pub mod opcode;
pub mod precompiles;
pub mod processor;
pub mod rules;
pub mod stack;
pub mod state;
pub mod substate;
pub mod tracer;
pub mod vm;

pub use access::AccessTracker;
pub use cache::CodeCache;
pub use code::CodeInfo;
pub use config::{AnalysisMode, VmConfig};
pub use context::{
    BlockContext, BlockhashProvider, ExecutionEnvironment, NoBlockhashes, TxExecutionContext,
};
pub use error::{ExceptionKind, PrecompileError, TransactionError, VmError, VmResult};
pub use frame::{EvmState, ExecutionType};
pub use gas::GasMeter;
pub use opcode::Opcode;
pub use precompiles::Precompile;
pub use processor::{intrinsic_gas, Transaction, TransactionOutcome, TransactionProcessor, TxStatus};
pub use rules::{FixedSpec, Fork, ForkSchedule, ReleaseSpec, SpecProvider};
pub use state::{InMemoryWorldState, Snapshot, StorageCell, WorldState};
pub use substate::{Log, TransactionSubstate};
pub use tracer::{CallTracer, NullTracer, StructLogTracer, Tracer};
pub use vm::VirtualMachine;
