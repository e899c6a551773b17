//! Instruction implementations, grouped by family
//!
//! Dispatch lives in [`crate::interpreter`]; the functions here assume the
//! opcode is enabled under the active rules and charge their own gas.

pub(crate) mod arithmetic;
mod control;
mod environment;
mod memory;
mod storage;
mod system;
