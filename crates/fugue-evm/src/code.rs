//! Analyzed code
//!
//! A [`CodeInfo`] is immutable once built, apart from its execution
//! counter and the segment table that is installed at most once.

use crate::analysis::{Segment, SegmentMap};
use crate::opcode::Opcode;
use crate::precompiles::Precompile;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Bytecode plus its jump analysis
#[derive(Debug)]
pub struct CodeInfo {
    code: Bytes,
    jump_dests: Box<[u64]>,
    subroutine_entries: Box<[u64]>,
    precompile: Option<Precompile>,
    executions: AtomicU64,
    segments: OnceLock<SegmentMap>,
}

impl CodeInfo {
    /// Analyze `code`
    pub fn new(code: Bytes) -> Self {
        let words = code.len().div_ceil(64);
        let mut jump_dests = vec![0u64; words];
        let mut subroutine_entries = vec![0u64; words];

        let mut pc = 0;
        while pc < code.len() {
            let byte = code[pc];
            if byte == Opcode::JUMPDEST as u8 {
                jump_dests[pc / 64] |= 1 << (pc % 64);
            } else if byte == Opcode::BEGINSUB as u8 {
                subroutine_entries[pc / 64] |= 1 << (pc % 64);
            } else if let Some(op) = Opcode::from_byte(byte) {
                pc += op.push_size();
            }
            pc += 1;
        }

        Self {
            code,
            jump_dests: jump_dests.into_boxed_slice(),
            subroutine_entries: subroutine_entries.into_boxed_slice(),
            precompile: None,
            executions: AtomicU64::new(0),
            segments: OnceLock::new(),
        }
    }

    /// Code info with no bytecode
    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    /// Code info standing for a precompile
    pub fn for_precompile(precompile: Precompile) -> Self {
        Self {
            precompile: Some(precompile),
            ..Self::empty()
        }
    }

    /// Bytecode
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Shared handle to the bytecode
    pub fn bytes(&self) -> Bytes {
        self.code.clone()
    }

    /// Code length
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether there is no bytecode
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Precompile this code stands for
    pub fn precompile(&self) -> Option<Precompile> {
        self.precompile
    }

    /// Whether `target` is a JUMPDEST (or a BEGINSUB for subroutine jumps)
    /// outside push data
    pub fn validate_jump(&self, target: usize, is_subroutine: bool) -> bool {
        if target >= self.code.len() {
            return false;
        }
        let bitmap = if is_subroutine {
            &self.subroutine_entries
        } else {
            &self.jump_dests
        };
        bitmap[target / 64] & (1 << (target % 64)) != 0
    }

    /// Count one more execution; returns the new count
    pub fn notice_execution(&self) -> u64 {
        self.executions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Executions counted so far
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Install the segment table; ignored if one is already present
    pub fn install_segments(&self, segments: SegmentMap) -> bool {
        self.segments.set(segments).is_ok()
    }

    /// Whether a segment table is installed
    pub fn has_segments(&self) -> bool {
        self.segments.get().is_some()
    }

    /// Segment starting at `pc`
    pub fn segment_at(&self, pc: usize) -> Option<&Segment> {
        self.segments.get().and_then(|segments| segments.get(&pc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(code: &[u8]) -> CodeInfo {
        CodeInfo::new(Bytes::copy_from_slice(code))
    }

    #[test]
    fn test_jumpdest_detection() {
        // PUSH1 0x03 JUMP JUMPDEST
        let code = info(&[0x60, 0x03, 0x56, 0x5b]);
        assert!(code.validate_jump(3, false));
        assert!(!code.validate_jump(0, false));
        assert!(!code.validate_jump(4, false));
    }

    #[test]
    fn test_jumpdest_inside_push_data() {
        // PUSH2 0x5b5b JUMPDEST
        let code = info(&[0x61, 0x5b, 0x5b, 0x5b]);
        assert!(!code.validate_jump(1, false));
        assert!(!code.validate_jump(2, false));
        assert!(code.validate_jump(3, false));
    }

    #[test]
    fn test_truncated_push_at_end() {
        let code = info(&[0x5b, 0x7f, 0x5b]);
        assert!(code.validate_jump(0, false));
        assert!(!code.validate_jump(2, false));
    }

    #[test]
    fn test_subroutine_entries() {
        let code = info(&[0x5c, 0x5b, 0x60, 0x5c]);
        assert!(code.validate_jump(0, true));
        assert!(!code.validate_jump(0, false));
        assert!(code.validate_jump(1, false));
        assert!(!code.validate_jump(1, true));
        assert!(!code.validate_jump(3, true));
    }

    #[test]
    fn test_bitmap_crosses_word_boundary() {
        let mut bytes = vec![0x00; 130];
        bytes[64] = 0x5b;
        bytes[129] = 0x5b;
        let code = info(&bytes);
        assert!(code.validate_jump(64, false));
        assert!(code.validate_jump(129, false));
        assert!(!code.validate_jump(63, false));
    }

    #[test]
    fn test_execution_counter() {
        let code = CodeInfo::empty();
        assert_eq!(code.notice_execution(), 1);
        assert_eq!(code.notice_execution(), 2);
        assert_eq!(code.executions(), 2);
    }

    #[test]
    fn test_segments_installed_once() {
        let code = info(&[0x00]);
        assert!(!code.has_segments());
        assert!(code.install_segments(SegmentMap::new()));
        assert!(!code.install_segments(SegmentMap::new()));
        assert!(code.has_segments());
        assert!(code.segment_at(0).is_none());
    }

    #[test]
    fn test_precompile_code() {
        let code = CodeInfo::for_precompile(Precompile::Identity);
        assert!(code.is_empty());
        assert_eq!(code.precompile(), Some(Precompile::Identity));
    }
}
