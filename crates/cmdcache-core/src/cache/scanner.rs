//! Locates the byte offsets at which a float uniform register is written in a
//! recorded command stream.

use crate::gpu::command::{CommandIter, RegisterWrite};
use crate::gpu::registers::{self, UniformWindow};

/// Byte offsets of the four component slots of one uniform register.
/// `None` marks a slot the scanned range never writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentOffsets(pub [Option<u32>; 4]);

impl ComponentOffsets {
    pub const NOT_FOUND: Self = Self([None; 4]);

    pub fn slot(&self, slot: usize) -> Option<u32> {
        self.0[slot]
    }

    /// Whether every slot was found.
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// Whether no slot was found.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// Component offsets of the four consecutive registers holding a matrix.
/// Index `i` is register `base + i`, which holds matrix row `i`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixOffsets(pub [ComponentOffsets; 4]);

impl MatrixOffsets {
    pub const NOT_FOUND: Self = Self([ComponentOffsets::NOT_FOUND; 4]);

    pub fn register(&self, index: usize) -> &ComponentOffsets {
        &self.0[index]
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(ComponentOffsets::is_empty)
    }
}

/// Tracks which register and component slot value writes currently land in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformCursor {
    /// `None` until the first index select.
    register: Option<u32>,
    slot: u8,
    f32_mode: bool,
}

impl UniformCursor {
    pub const fn new() -> Self {
        Self {
            register: None,
            slot: 0,
            f32_mode: false,
        }
    }

    /// Apply an index select write.
    pub fn select(&mut self, value: u32) {
        self.register = Some(value & registers::UNIFORM_INDEX_MASK);
        self.slot = 0;
        self.f32_mode = value & registers::UNIFORM_F32_MODE != 0;
    }

    /// Register the next value write lands in.
    pub fn register(&self) -> Option<u32> {
        self.register
    }

    /// Component slot the next value write lands in.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn is_f32_mode(&self) -> bool {
        self.f32_mode
    }

    fn slots_per_register(&self) -> u8 {
        if self.f32_mode {
            registers::F32_COMPONENTS
        } else {
            registers::F24_WORDS
        }
    }

    /// Move past one value write.
    pub fn advance(&mut self) {
        self.slot += 1;
        if self.slot == self.slots_per_register() {
            self.slot = 0;
            self.register = self.register.map(|r| r + 1);
        }
    }
}

/// Find the offsets of the value words written to float uniform `register`
/// in `buffer[start..size]`.
///
/// The scan stops early once slot 3 of `register` is found. A register that
/// is never written yields [`ComponentOffsets::NOT_FOUND`]; this is not an
/// error.
pub fn find_uniform_offsets(
    buffer: &[u8],
    start: usize,
    size: usize,
    window: &UniformWindow,
    register: u32,
) -> ComponentOffsets {
    let mut cursor = UniformCursor::new();
    let mut offsets = ComponentOffsets::NOT_FOUND;

    for RegisterWrite {
        address,
        value,
        offset,
    } in CommandIter::new(buffer, start, size).writes()
    {
        if window.is_index_select(address) {
            cursor.select(value);
            log::trace!("uniform select 0x{value:08X} at 0x{offset:X}");
        } else if window.is_value(address) {
            if cursor.register == Some(register) {
                offsets.0[cursor.slot as usize] = Some(offset as u32);
                if cursor.slot == 3 {
                    break;
                }
            }
            cursor.advance();
        }
    }

    offsets
}

/// Find the offsets of a matrix held in the four registers starting at
/// `base_register`.
pub fn scan_matrix(
    buffer: &[u8],
    start: usize,
    size: usize,
    window: &UniformWindow,
    base_register: u32,
) -> MatrixOffsets {
    let mut offsets = MatrixOffsets::NOT_FOUND;
    for (index, register) in offsets.0.iter_mut().enumerate() {
        *register = find_uniform_offsets(buffer, start, size, window, base_register + index as u32);
    }

    offsets
}
