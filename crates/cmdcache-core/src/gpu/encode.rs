//! Command unit encoding.

use glam::{Mat4, Vec4};

use super::command::CommandHeader;
use super::registers::{self, UniformWindow};

/// Builds an encoded command stream.
///
/// Every unit is emitted padded to 8 bytes, so the encoded length is always
/// a multiple of 8.
#[derive(Debug, Clone, Default)]
pub struct CommandEncoder {
    bytes: Vec<u8>,
    window: UniformWindow,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: UniformWindow) -> Self {
        Self {
            bytes: Vec::new(),
            window,
        }
    }

    fn push_word(&mut self, word: u32) {
        self.bytes.extend_from_slice(&word.to_le_bytes());
    }

    /// Write `value` to `addr`.
    pub fn single(&mut self, addr: u16, value: u32) -> &mut Self {
        self.single_masked(addr, value, CommandHeader::BYTE_ENABLE_ALL)
    }

    /// Write `value` to `addr` with an explicit byte enable.
    pub fn single_masked(&mut self, addr: u16, value: u32, byte_enable: u8) -> &mut Self {
        let mut header = CommandHeader::single(addr);
        header.set_byte_enable(byte_enable);

        self.push_word(value);
        self.push_word(header.to_raw());
        self
    }

    /// Write `values` to consecutive addresses starting at `addr`.
    pub fn burst(&mut self, addr: u16, values: &[u32]) -> &mut Self {
        self.burst_with(addr, values, true)
    }

    /// Write every value of `values` to `addr`.
    pub fn burst_repeat(&mut self, addr: u16, values: &[u32]) -> &mut Self {
        self.burst_with(addr, values, false)
    }

    fn burst_with(&mut self, addr: u16, values: &[u32], sequential: bool) -> &mut Self {
        if values.len() == 1 {
            return self.single(addr, values[0]);
        }

        let header = CommandHeader::burst(addr, values.len(), sequential);
        self.push_word(values[0]);
        self.push_word(header.to_raw());
        for &value in &values[1..] {
            self.push_word(value);
        }

        // pad to the next unit boundary
        if values.len() % 2 == 0 {
            self.push_word(0);
        }

        self
    }

    /// Select the uniform register targeted by subsequent value writes.
    pub fn index_select(&mut self, register: u8, f32_mode: bool) -> &mut Self {
        let addr = self.window.index_select;
        self.single(addr, registers::uniform_index_select(register, f32_mode))
    }

    /// Upload `matrix` to the four registers starting at `register`.
    ///
    /// Row `i` lands in register `register + i` with its components written
    /// in `[w, z, y, x]` order.
    pub fn uniform_matrix(&mut self, register: u8, matrix: &Mat4) -> &mut Self {
        let mut words = [0u32; 16];
        for row in 0..4 {
            let v = matrix.row(row);
            words[row * 4..row * 4 + 4].copy_from_slice(&component_words(v));
        }

        let addr = self.window.value_begin;
        self.index_select(register, true).burst_repeat(addr, &words)
    }

    /// Upload `value` to `register`.
    pub fn uniform_vec4(&mut self, register: u8, value: Vec4) -> &mut Self {
        let addr = self.window.value_begin;
        self.index_select(register, true)
            .burst_repeat(addr, &component_words(value))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

/// The value words of `v` in component-slot order.
pub fn component_words(v: Vec4) -> [u32; 4] {
    [v.w.to_bits(), v.z.to_bits(), v.y.to_bits(), v.x.to_bits()]
}
