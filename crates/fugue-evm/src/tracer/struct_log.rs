//! geth-style per-instruction log

use super::{opcode_name, Tracer};
use crate::error::ExceptionKind;
use fugue_primitives::U256;
use serde::Serialize;

/// One executed instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructLog {
    /// Program counter
    pub pc: usize,
    /// Mnemonic
    pub op: String,
    /// Gas before the instruction
    pub gas: u64,
    /// Gas charged by the instruction
    pub gas_cost: u64,
    /// Frame depth, 1 at top level
    pub depth: usize,
    /// Stack before the instruction, bottom first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
    /// Memory before the instruction, in 32-byte hex words
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<String>>,
    /// Failure, if the instruction raised one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Collects a [`StructLog`] per instruction
#[derive(Debug, Clone, Default)]
pub struct StructLogTracer {
    logs: Vec<StructLog>,
    with_stack: bool,
    with_memory: bool,
    refund: i64,
}

impl StructLogTracer {
    /// Tracer capturing stack snapshots
    pub fn new() -> Self {
        Self {
            with_stack: true,
            ..Self::default()
        }
    }

    /// Also capture memory
    pub fn with_memory(mut self) -> Self {
        self.with_memory = true;
        self
    }

    /// Skip stack snapshots
    pub fn without_stack(mut self) -> Self {
        self.with_stack = false;
        self
    }

    /// Collected entries
    pub fn logs(&self) -> &[StructLog] {
        &self.logs
    }

    /// Refund counter as reported so far
    pub fn refund(&self) -> i64 {
        self.refund
    }

    /// Collected entries
    pub fn into_logs(self) -> Vec<StructLog> {
        self.logs
    }
}

impl Tracer for StructLogTracer {
    const IS_TRACING_INSTRUCTIONS: bool = true;
    const IS_TRACING_STACK: bool = true;
    const IS_TRACING_MEMORY: bool = true;
    const IS_TRACING_REFUNDS: bool = true;

    fn start_operation(&mut self, pc: usize, opcode: u8, gas: u64, depth: usize) {
        self.logs.push(StructLog {
            pc,
            op: opcode_name(opcode),
            gas,
            gas_cost: 0,
            depth: depth + 1,
            stack: None,
            memory: None,
            error: None,
        });
    }

    fn set_operation_stack(&mut self, stack: &[U256]) {
        if !self.with_stack {
            return;
        }
        if let Some(entry) = self.logs.last_mut() {
            entry.stack = Some(stack.iter().map(|v| format!("{v:#x}")).collect());
        }
    }

    fn set_operation_memory(&mut self, memory: &[u8]) {
        if !self.with_memory {
            return;
        }
        if let Some(entry) = self.logs.last_mut() {
            entry.memory = Some(memory.chunks(32).map(hex::encode).collect());
        }
    }

    fn end_operation(&mut self, gas_left: u64) {
        if let Some(entry) = self.logs.last_mut() {
            entry.gas_cost = entry.gas.saturating_sub(gas_left);
        }
    }

    fn set_operation_error(&mut self, error: ExceptionKind, gas_left: u64) {
        if let Some(entry) = self.logs.last_mut() {
            entry.gas_cost = entry.gas.saturating_sub(gas_left);
            entry.error = Some(error.to_string());
        }
    }

    fn report_refund(&mut self, delta: i64) {
        self.refund += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_cost_and_error() {
        let mut tracer = StructLogTracer::new();
        tracer.start_operation(0, 0x60, 100, 0);
        tracer.set_operation_stack(&[U256::from(255)]);
        tracer.end_operation(97);
        tracer.start_operation(2, 0x56, 97, 0);
        tracer.set_operation_error(ExceptionKind::InvalidJumpDestination, 0);

        let logs = tracer.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].op, "PUSH1");
        assert_eq!(logs[0].gas_cost, 3);
        assert_eq!(logs[0].depth, 1);
        assert_eq!(logs[0].stack.as_deref(), Some(&["0xff".to_string()][..]));
        assert_eq!(logs[1].error.as_deref(), Some("invalid jump destination"));
    }

    #[test]
    fn test_unknown_opcode_name() {
        let mut tracer = StructLogTracer::new().without_stack();
        tracer.start_operation(0, 0x0c, 10, 0);
        tracer.set_operation_stack(&[U256::one()]);
        assert_eq!(tracer.logs()[0].op, "0x0c");
        assert!(tracer.logs()[0].stack.is_none());
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut tracer = StructLogTracer::new().without_stack();
        tracer.start_operation(0, 0x00, 5, 0);
        tracer.end_operation(5);
        let json = serde_json::to_string(tracer.logs()).unwrap();
        assert_eq!(json, r#"[{"pc":0,"op":"STOP","gas":5,"gasCost":0,"depth":1}]"#);
    }
}
