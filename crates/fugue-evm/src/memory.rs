//! EVM memory implementation
//!
//! Callers charge for expansion through [`crate::gas::GasMeter::expand_memory`]
//! before touching a region; writes grow the buffer to a word boundary.

/// EVM memory (byte-addressable, expandable)
#[derive(Clone, Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Create new empty memory
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Get current memory size in bytes (always a multiple of 32)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Grow to cover `end` bytes, rounded up to a word boundary
    pub fn expand(&mut self, end: usize) {
        if end > self.data.len() {
            let aligned = end.div_ceil(32) * 32;
            self.data.resize(aligned, 0);
        }
    }

    /// Read `len` bytes, zero-padded past the end; never grows
    pub fn load(&self, offset: usize, len: usize) -> Vec<u8> {
        if len == 0 {
            return Vec::new();
        }
        let mut result = vec![0u8; len];
        if offset < self.data.len() {
            let end = offset.saturating_add(len).min(self.data.len());
            result[..end - offset].copy_from_slice(&self.data[offset..end]);
        }
        result
    }

    /// Read a 32-byte word
    pub fn load_word(&self, offset: usize) -> [u8; 32] {
        let mut word = [0u8; 32];
        word.copy_from_slice(&self.load(offset, 32));
        word
    }

    /// Write a byte slice
    pub fn store(&mut self, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.expand(offset + data.len());
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Write `len` bytes taken from `source` at `source_offset`, zero-filling
    /// whatever lies past the end of `source`
    pub fn store_padded(&mut self, offset: usize, source: &[u8], source_offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.expand(offset + len);
        let target = &mut self.data[offset..offset + len];
        let available = source.len().saturating_sub(source_offset).min(len);
        if available > 0 {
            target[..available].copy_from_slice(&source[source_offset..source_offset + available]);
        }
        target[available..].fill(0);
    }

    /// Write a 32-byte word
    pub fn store_word(&mut self, offset: usize, word: &[u8; 32]) {
        self.store(offset, word);
    }

    /// Write a single byte
    pub fn store_byte(&mut self, offset: usize, value: u8) {
        self.expand(offset + 1);
        self.data[offset] = value;
    }

    /// Copy within memory (MCOPY); regions may overlap
    pub fn copy_within(&mut self, dest: usize, src: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.expand(dest.max(src) + len);
        self.data.copy_within(src..src + len, dest);
    }

    /// Get raw data slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
