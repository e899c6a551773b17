//! Nested call tree

use super::{CallAction, Tracer};
use crate::error::ExceptionKind;
use crate::substate::serialize_hex;
use bytes::Bytes;
use fugue_primitives::{Address, U256};
use serde::Serialize;

/// One frame in the call tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Entry kind, e.g. `CALL`
    #[serde(rename = "type")]
    pub kind: String,
    /// Sender
    pub from: Address,
    /// Target
    pub to: Address,
    /// Value moved
    pub value: U256,
    /// Gas given
    pub gas: u64,
    /// Gas consumed
    pub gas_used: u64,
    /// Call data or init code
    #[serde(serialize_with = "serialize_hex")]
    pub input: Bytes,
    /// Return or revert data
    #[serde(serialize_with = "serialize_hex")]
    pub output: Bytes,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sub-calls in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallFrame>,
}

/// Builds a [`CallFrame`] tree
#[derive(Debug, Clone, Default)]
pub struct CallTracer {
    open: Vec<CallFrame>,
    root: Option<CallFrame>,
}

impl CallTracer {
    /// Empty tracer
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of the finished tree
    pub fn root(&self) -> Option<&CallFrame> {
        self.root.as_ref()
    }

    /// Take the finished tree
    pub fn into_root(self) -> Option<CallFrame> {
        self.root
    }

    fn close(&mut self, gas_left: u64, output: &[u8], error: Option<String>) {
        let Some(mut frame) = self.open.pop() else {
            return;
        };
        frame.gas_used = frame.gas.saturating_sub(gas_left);
        frame.output = Bytes::copy_from_slice(output);
        frame.error = error;
        match self.open.last_mut() {
            Some(parent) => parent.calls.push(frame),
            None => self.root = Some(frame),
        }
    }
}

impl Tracer for CallTracer {
    const IS_TRACING_ACTIONS: bool = true;

    fn report_action(&mut self, action: &CallAction) {
        self.open.push(CallFrame {
            kind: action.kind.name().to_string(),
            from: action.from,
            to: action.to,
            value: action.value,
            gas: action.gas,
            gas_used: 0,
            input: action.input.clone(),
            output: Bytes::new(),
            error: None,
            calls: Vec::new(),
        });
    }

    fn report_action_end(&mut self, gas_left: u64, output: &[u8]) {
        self.close(gas_left, output, None);
    }

    fn report_create_end(&mut self, gas_left: u64, address: &Address, code: &[u8]) {
        if let Some(frame) = self.open.last_mut() {
            frame.to = *address;
        }
        self.close(gas_left, code, None);
    }

    fn report_action_revert(&mut self, gas_left: u64, output: &[u8]) {
        self.close(gas_left, output, Some("execution reverted".to_string()));
    }

    fn report_action_error(&mut self, error: ExceptionKind) {
        self.close(0, &[], Some(error.to_string()));
    }

    fn report_selfdestruct(&mut self, address: &Address, balance: U256, beneficiary: &Address) {
        if let Some(parent) = self.open.last_mut() {
            parent.calls.push(CallFrame {
                kind: "SELFDESTRUCT".to_string(),
                from: *address,
                to: *beneficiary,
                value: balance,
                gas: 0,
                gas_used: 0,
                input: Bytes::new(),
                output: Bytes::new(),
                error: None,
                calls: Vec::new(),
            });
        }
    }
}
