//! EVM operand stack and subroutine return stack

use crate::error::ExceptionKind;
use fugue_primitives::{Address, WordBytes, U256};

/// Maximum number of words on the operand stack
pub const MAX_STACK_SIZE: usize = 1024;

/// Maximum number of entries on the subroutine return stack
pub const RETURN_STACK_SIZE: usize = 1023;

/// Operand stack with an explicit head.
///
/// Slots are allocated on first use and reused afterwards; `head` is the
/// number of live words.
#[derive(Clone, Debug, Default)]
pub struct Stack {
    data: Vec<U256>,
    head: usize,
}

impl Stack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: U256) -> Result<(), ExceptionKind> {
        if self.head >= MAX_STACK_SIZE {
            return Err(ExceptionKind::StackOverflow);
        }
        if self.head == self.data.len() {
            self.data.push(value);
        } else {
            self.data[self.head] = value;
        }
        self.head += 1;
        Ok(())
    }

    /// Push a u64
    pub fn push_u64(&mut self, value: u64) -> Result<(), ExceptionKind> {
        self.push(U256::from(value))
    }

    /// Push zero
    pub fn push_zero(&mut self) -> Result<(), ExceptionKind> {
        self.push(U256::zero())
    }

    /// Push one
    pub fn push_one(&mut self) -> Result<(), ExceptionKind> {
        self.push(U256::one())
    }

    /// Push an address, zero-extended
    pub fn push_address(&mut self, address: &Address) -> Result<(), ExceptionKind> {
        self.push(address.to_word())
    }

    /// Push up to 32 big-endian bytes, left-padded with zeros
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), ExceptionKind> {
        let bytes = if bytes.len() > 32 {
            &bytes[bytes.len() - 32..]
        } else {
            bytes
        };
        self.push(U256::from_big_endian(bytes))
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> Result<U256, ExceptionKind> {
        if self.head == 0 {
            return Err(ExceptionKind::StackUnderflow);
        }
        self.head -= 1;
        Ok(self.data[self.head])
    }

    /// Pop a word and truncate it to an address
    pub fn pop_address(&mut self) -> Result<Address, ExceptionKind> {
        self.pop().map(Address::from_word)
    }

    /// Pop a word as 32 big-endian bytes
    pub fn pop_bytes(&mut self) -> Result<[u8; 32], ExceptionKind> {
        self.pop().map(|w| w.to_big_endian_bytes())
    }

    /// Discard the top word
    pub fn pop_limbo(&mut self) -> Result<(), ExceptionKind> {
        self.pop().map(|_| ())
    }

    /// Peek at a specific depth (0 = top)
    pub fn peek(&self, depth: usize) -> Result<&U256, ExceptionKind> {
        if depth >= self.head {
            return Err(ExceptionKind::StackUnderflow);
        }
        Ok(&self.data[self.head - 1 - depth])
    }

    /// Duplicate item at depth to top (1 = dup top)
    pub fn dup(&mut self, depth: usize) -> Result<(), ExceptionKind> {
        if depth == 0 || depth > self.head {
            return Err(ExceptionKind::StackUnderflow);
        }
        let value = self.data[self.head - depth];
        self.push(value)
    }

    /// Swap top with item at depth (1 = swap with second item)
    pub fn swap(&mut self, depth: usize) -> Result<(), ExceptionKind> {
        if depth == 0 || depth >= self.head {
            return Err(ExceptionKind::StackUnderflow);
        }
        let top = self.head - 1;
        self.data.swap(top, top - depth);
        Ok(())
    }

    /// Get current stack size
    pub fn len(&self) -> usize {
        self.head
    }

    /// Check if stack is empty
    pub fn is_empty(&self) -> bool {
        self.head == 0
    }

    /// Live words, bottom first
    pub fn as_slice(&self) -> &[U256] {
        &self.data[..self.head]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: u64) -> Stack {
        let mut stack = Stack::new();
        for i in 0..n {
            stack.push_u64(i).unwrap();
        }
        stack
    }

    #[test]
    fn test_stack_push_pop() {
        let mut stack = Stack::new();
        stack.push_u64(42).unwrap();
        stack.push_u64(100).unwrap();

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().unwrap(), U256::from(100));
        assert_eq!(stack.pop().unwrap(), U256::from(42));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_stack_underflow() {
        let mut stack = Stack::new();
        assert_eq!(stack.pop(), Err(ExceptionKind::StackUnderflow));
        assert_eq!(stack.pop_limbo(), Err(ExceptionKind::StackUnderflow));
    }

    #[test]
    fn test_stack_overflow() {
        let mut stack = filled(1024);
        assert_eq!(stack.push_zero(), Err(ExceptionKind::StackOverflow));
        assert_eq!(stack.len(), MAX_STACK_SIZE);
    }

    #[test]
    fn test_slots_reused_after_pop() {
        let mut stack = filled(3);
        stack.pop().unwrap();
        stack.pop().unwrap();
        stack.push_u64(9).unwrap();
        assert_eq!(stack.as_slice(), &[U256::zero(), U256::from(9)]);
    }

    #[test]
    fn test_push_bytes_left_pads() {
        let mut stack = Stack::new();
        stack.push_bytes(&[0x12, 0x34]).unwrap();
        assert_eq!(stack.pop().unwrap(), U256::from(0x1234));
        stack.push_bytes(&[]).unwrap();
        assert_eq!(stack.pop().unwrap(), U256::zero());
    }

    #[test]
    fn test_pop_address_truncates() {
        let mut stack = Stack::new();
        stack.push(U256::MAX).unwrap();
        assert_eq!(
            stack.pop_address().unwrap(),
            Address::from_bytes([0xff; 20])
        );
    }

    #[test]
    fn test_stack_peek() {
        let stack = filled(3);
        assert_eq!(*stack.peek(0).unwrap(), U256::from(2));
        assert_eq!(*stack.peek(2).unwrap(), U256::zero());
        assert!(stack.peek(3).is_err());
    }

    // ==================== DUP / SWAP ====================

    #[test]
    fn test_stack_dup() {
        let mut stack = filled(3);
        stack.dup(2).unwrap();
        assert_eq!(stack.pop().unwrap(), U256::from(1));
    }

    #[test]
    fn test_stack_dup_overflow() {
        let mut stack = filled(1023);
        stack.dup(1).unwrap();
        assert_eq!(stack.dup(1), Err(ExceptionKind::StackOverflow));
    }

    #[test]
    fn test_stack_dup_underflow() {
        let mut stack = filled(1);
        stack.dup(1).unwrap();
        assert_eq!(stack.dup(3), Err(ExceptionKind::StackUnderflow));
        assert_eq!(stack.dup(0), Err(ExceptionKind::StackUnderflow));
    }

    #[test]
    fn test_stack_swap() {
        let mut stack = filled(3);
        stack.swap(2).unwrap();
        assert_eq!(stack.pop().unwrap(), U256::zero());
        assert_eq!(stack.pop().unwrap(), U256::from(1));
        assert_eq!(stack.pop().unwrap(), U256::from(2));
    }

    #[test]
    fn test_stack_swap_underflow() {
        let mut stack = filled(1);
        assert_eq!(stack.swap(1), Err(ExceptionKind::StackUnderflow));
        assert_eq!(stack.swap(0), Err(ExceptionKind::StackUnderflow));
    }

    #[test]
    fn test_stack_all_swap_depths() {
        for depth in 1..=16usize {
            let mut stack = filled(depth as u64 + 1);
            stack.swap(depth).unwrap();
            assert_eq!(stack.pop().unwrap(), U256::zero());
        }
    }
}
