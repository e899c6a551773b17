//! Segment analysis for hot code
//!
//! Bytecode is decoded into `(pc, opcode, immediate)` triples and split
//! into straight-line runs of stack-only opcodes. Each run becomes a
//! [`Segment`] with its gas pre-summed and its stack requirements
//! pre-computed, so the interpreter can execute it after a single check
//! whenever the program counter lands on its first instruction.

use crate::code::CodeInfo;
use crate::gas::static_gas;
use crate::opcode::Opcode;
use fugue_primitives::U256;
use std::collections::HashMap;

/// Segments keyed by the pc of their first instruction
pub type SegmentMap = HashMap<usize, Segment>;

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOp {
    /// Position of the opcode byte
    pub pc: usize,
    /// Raw opcode byte
    pub byte: u8,
    /// Decoded opcode, `None` if undefined
    pub opcode: Option<Opcode>,
    /// Push immediate (zero for other opcodes)
    pub immediate: U256,
}

/// Value pushed by a PUSHn whose immediate starts at `start`.
///
/// Bytes past the end of the code read as zero.
pub fn push_value(code: &[u8], start: usize, size: usize) -> U256 {
    let mut buf = [0u8; 32];
    let available = code.len().saturating_sub(start).min(size);
    if available > 0 {
        buf[32 - size..32 - size + available].copy_from_slice(&code[start..start + available]);
    }
    U256::from_big_endian(&buf)
}

/// Decode the whole program, skipping push data
pub fn strip_bytecode(code: &[u8]) -> Vec<DecodedOp> {
    let mut ops = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let byte = code[pc];
        let opcode = Opcode::from_byte(byte);
        let size = opcode.map_or(0, Opcode::push_size);
        let immediate = if size > 0 {
            push_value(code, pc + 1, size)
        } else {
            U256::zero()
        };
        ops.push(DecodedOp {
            pc,
            byte,
            opcode,
            immediate,
        });
        pc += 1 + size;
    }
    ops
}

/// Instruction inside a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOp {
    /// Opcode
    pub opcode: Opcode,
    /// Push immediate
    pub immediate: U256,
}

/// Straight-line run of stack-only instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// pc of the first instruction
    pub start: usize,
    /// pc right after the last instruction
    pub end: usize,
    /// Instructions in order
    pub ops: Vec<SegmentOp>,
    /// Sum of static gas
    pub gas: u64,
    /// Stack height needed on entry to avoid underflow
    pub min_stack: usize,
    /// Largest height increase reached while running
    pub max_growth: usize,
}

impl Segment {
    fn from_ops(ops: &[DecodedOp], end: usize) -> Self {
        let mut height: isize = 0;
        let mut min_stack = 0usize;
        let mut max_growth = 0usize;
        let mut gas = 0u64;
        let mut seg_ops = Vec::with_capacity(ops.len());
        for decoded in ops {
            let Some(opcode) = decoded.opcode else {
                continue;
            };
            let (pops, pushes) = opcode.stack_io();
            let needed = pops as isize - height;
            if needed > min_stack as isize {
                min_stack = needed as usize;
            }
            height += pushes as isize - pops as isize;
            if height > max_growth as isize {
                max_growth = height as usize;
            }
            gas += static_gas(opcode);
            seg_ops.push(SegmentOp {
                opcode,
                immediate: decoded.immediate,
            });
        }
        Segment {
            start: ops.first().map_or(end, |op| op.pc),
            end,
            ops: seg_ops,
            gas,
            min_stack,
            max_growth,
        }
    }

    /// Whether the whole segment can run without any instruction failing
    pub fn fits(&self, stack_len: usize, gas: u64, max_stack: usize) -> bool {
        gas >= self.gas && stack_len >= self.min_stack && stack_len + self.max_growth <= max_stack
    }
}

/// Split code into segments of at least two instructions
pub fn compile_segments(code: &[u8]) -> SegmentMap {
    let ops = strip_bytecode(code);
    let mut segments = SegmentMap::new();
    let mut run_start = 0;
    for (i, op) in ops.iter().enumerate() {
        let eligible = op.opcode.is_some_and(Opcode::is_segment_op);
        if !eligible {
            push_segment(&mut segments, &ops[run_start..i], op.pc);
            run_start = i + 1;
        }
    }
    push_segment(&mut segments, &ops[run_start..], code.len());
    segments
}

fn push_segment(segments: &mut SegmentMap, run: &[DecodedOp], end: usize) {
    if run.len() < 2 {
        return;
    }
    let segment = Segment::from_ops(run, end);
    segments.insert(segment.start, segment);
}

/// Build and install segments for `info`; returns how many were built
pub fn analyze(info: &CodeInfo) -> usize {
    if info.has_segments() {
        return 0;
    }
    let segments = compile_segments(info.code());
    let count = segments.len();
    if info.install_segments(segments) {
        tracing::debug!(code_len = info.len(), segments = count, "code segments installed");
        count
    } else {
        0
    }
}
