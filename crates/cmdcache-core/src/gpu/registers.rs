//! Register addresses and bit-field constants of the vertex-shader uniform
//! upload path.

/// Address of the register selecting the vertex shader float uniform that
/// subsequent value writes target.
pub const VS_UNIFORM_FLOAT_REG_INDEX: u16 = 0x2C0;
/// First address of the float uniform value window.
pub const VS_UNIFORM_FLOAT_REG_VALUE_BEGIN: u16 = 0x2C1;
/// Last address of the float uniform value window.
pub const VS_UNIFORM_FLOAT_REG_VALUE_END: u16 = 0x2C8;

/// Number of vertex shader float uniform registers.
pub const VS_UNIFORM_FLOAT_REG_NUM: u32 = 96;
/// Number of 4x4 matrices that fit in the float uniform registers.
pub const VS_UNIFORM_FLOAT_REG_MATRIX_NUM: u32 = VS_UNIFORM_FLOAT_REG_NUM / 16;

/// Uniform index field of an index select value.
pub const UNIFORM_INDEX_MASK: u32 = 0xFF;
/// Index select flag enabling 4-component (f32) value writes. When clear,
/// values are written as 3 words per register (packed f24).
pub const UNIFORM_F32_MODE: u32 = 0x8000_0000;

/// Value words per register in f32 mode.
pub const F32_COMPONENTS: u8 = 4;
/// Value words per register in f24 mode.
pub const F24_WORDS: u8 = 3;

/// Maximum number of models sharing one command cache.
pub const MAX_MODELS: usize = 128;
/// Maximum number of uniform matrices patched per model.
pub const MAX_MATRIX_SLOTS: usize = VS_UNIFORM_FLOAT_REG_MATRIX_NUM as usize;

/// Build an index select value for `register`.
pub fn uniform_index_select(register: u8, f32_mode: bool) -> u32 {
    let mode = if f32_mode { UNIFORM_F32_MODE } else { 0 };
    mode | (register as u32 & UNIFORM_INDEX_MASK)
}

/// The control and value addresses of a uniform upload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformWindow {
    pub index_select: u16,
    pub value_begin: u16,
    pub value_end: u16,
}

impl UniformWindow {
    /// Vertex shader float uniforms.
    pub const VERTEX_SHADER: Self = Self {
        index_select: VS_UNIFORM_FLOAT_REG_INDEX,
        value_begin: VS_UNIFORM_FLOAT_REG_VALUE_BEGIN,
        value_end: VS_UNIFORM_FLOAT_REG_VALUE_END,
    };

    pub fn is_index_select(&self, addr: u16) -> bool {
        addr == self.index_select
    }

    pub fn is_value(&self, addr: u16) -> bool {
        (self.value_begin..=self.value_end).contains(&addr)
    }
}

impl Default for UniformWindow {
    fn default() -> Self {
        Self::VERTEX_SHADER
    }
}
