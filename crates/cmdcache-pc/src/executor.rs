//! Replays command streams into a model of the vertex shader float uniforms.

use cmdcache_core::cache::UniformCursor;
use cmdcache_core::gpu::registers::{UniformWindow, VS_UNIFORM_FLOAT_REG_NUM};
use cmdcache_core::gpu::CommandIter;
use glam::{Mat4, Vec4};

const REGISTER_COUNT: usize = VS_UNIFORM_FLOAT_REG_NUM as usize;

/// Uniform register contents captured when a draw was kicked.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSnapshot {
    /// Value written to the kick register.
    pub id: u32,
    pub registers: [Vec4; REGISTER_COUNT],
}

impl DrawSnapshot {
    /// The matrix held in the four registers starting at `base`.
    pub fn matrix(&self, base: u32) -> Mat4 {
        rows_to_matrix(&self.registers, base)
    }
}

fn rows_to_matrix(registers: &[Vec4; REGISTER_COUNT], base: u32) -> Mat4 {
    let b = base as usize;
    Mat4::from_cols(registers[b], registers[b + 1], registers[b + 2], registers[b + 3]).transpose()
}

/// The vertex shader float uniform registers as seen by executed commands.
///
/// Only f32-mode uploads are decoded. Packed f24 words are counted and
/// discarded.
#[derive(Debug, Clone)]
pub struct UniformFile {
    window: UniformWindow,
    /// Register whose writes kick a draw.
    kick: Option<u16>,
    cursor: UniformCursor,
    registers: [Vec4; REGISTER_COUNT],
    draws: Vec<DrawSnapshot>,
    skipped_f24: usize,
    dropped: usize,
    executed_bytes: usize,
}

impl Default for UniformFile {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformFile {
    pub fn new() -> Self {
        Self {
            window: UniformWindow::VERTEX_SHADER,
            kick: None,
            cursor: UniformCursor::new(),
            registers: [Vec4::ZERO; REGISTER_COUNT],
            draws: Vec::new(),
            skipped_f24: 0,
            dropped: 0,
            executed_bytes: 0,
        }
    }

    /// Snapshot the registers on every write to `addr`.
    pub fn with_kick(mut self, addr: u16) -> Self {
        self.kick = Some(addr);
        self
    }

    pub fn with_window(mut self, window: UniformWindow) -> Self {
        self.window = window;
        self
    }

    /// Execute the command units of `bytes`.
    pub fn execute(&mut self, bytes: &[u8]) {
        for write in CommandIter::new(bytes, 0, bytes.len()).writes() {
            if self.window.is_index_select(write.address) {
                self.cursor.select(write.value);
            } else if self.window.is_value(write.address) {
                self.write_value(write.value);
            } else if self.kick == Some(write.address) {
                self.draws.push(DrawSnapshot {
                    id: write.value,
                    registers: self.registers,
                });
            }
        }

        self.executed_bytes += bytes.len();
    }

    fn write_value(&mut self, value: u32) {
        match self.cursor.register() {
            Some(register) if self.cursor.is_f32_mode() && (register as usize) < REGISTER_COUNT => {
                let component = 3 - self.cursor.slot() as usize;
                self.registers[register as usize][component] = f32::from_bits(value);
            }
            Some(_) if !self.cursor.is_f32_mode() => self.skipped_f24 += 1,
            register => {
                log::trace!("dropped uniform value 0x{value:08X} (register {register:?})");
                self.dropped += 1;
            }
        }

        self.cursor.advance();
    }

    pub fn register(&self, index: usize) -> Vec4 {
        self.registers[index]
    }

    /// The matrix held in the four registers starting at `base`.
    ///
    /// # Panics
    /// If `base + 3` is not a valid register.
    pub fn matrix(&self, base: u32) -> Mat4 {
        rows_to_matrix(&self.registers, base)
    }

    pub fn draws(&self) -> &[DrawSnapshot] {
        &self.draws
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    /// Number of f24 words seen and not decoded.
    pub fn skipped_f24_words(&self) -> usize {
        self.skipped_f24
    }

    /// Number of value writes without a valid target register.
    pub fn dropped_values(&self) -> usize {
        self.dropped
    }

    pub fn executed_bytes(&self) -> usize {
        self.executed_bytes
    }

    /// Zero every register and counter.
    pub fn reset(&mut self) {
        *self = Self {
            window: self.window,
            kick: self.kick,
            ..Self::new()
        };
    }
}
