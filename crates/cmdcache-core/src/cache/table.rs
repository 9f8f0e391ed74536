//! Fixed-capacity per-model tables of the command cache.

use crate::gpu::registers::{MAX_MATRIX_SLOTS, MAX_MODELS, VS_UNIFORM_FLOAT_REG_NUM};

use super::scanner::MatrixOffsets;

/// Errors returned by table lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("model index {index} must be < {count}")]
    ModelOutOfRange { index: usize, count: usize },

    #[error("uniform matrix index {index} must be < {max}")]
    SlotOutOfRange { index: usize, max: usize },

    #[error("model count {count} is too large (max = {max})")]
    TooManyModels { count: usize, max: usize },

    #[error("uniform matrix at register {register} exceeds the {max} float registers")]
    RegisterOutOfRange { register: u32, max: u32 },
}

/// Patch location of one vertex shader uniform matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformMatrixPatch {
    /// Set when a register index has been assigned.
    pub valid: bool,
    /// First of the four float registers holding the matrix.
    pub register: u32,
    /// Whether `offsets` reflects the current recording.
    pub scanned: bool,
    pub offsets: MatrixOffsets,
}

/// Per-model cache state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelEntry {
    /// Byte offset of the model's first command in the recording list.
    pub start_offset: u32,
    /// Whether `start_offset` was saved during the current recording.
    pub saved: bool,
    pub matrices: [UniformMatrixPatch; MAX_MATRIX_SLOTS],
}

impl ModelEntry {
    /// Forget the previous recording, keeping register assignments.
    pub fn clear_recording(&mut self) {
        self.start_offset = 0;
        self.saved = false;
        for patch in self.matrices.iter_mut() {
            patch.scanned = false;
            patch.offsets = MatrixOffsets::NOT_FOUND;
        }
    }
}

/// Table of [`ModelEntry`] with a length fixed at [`ModelTable::resize`].
#[derive(Debug, Clone, Default)]
pub struct ModelTable {
    entries: heapless::Vec<ModelEntry, MAX_MODELS>,
}

impl ModelTable {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Reset the table to `count` default entries.
    pub fn resize(&mut self, count: usize) -> Result<(), TableError> {
        self.entries.clear();
        self.entries
            .resize_default(count)
            .map_err(|_| TableError::TooManyModels {
                count,
                max: MAX_MODELS,
            })
    }

    /// Reset every entry, keeping the length.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = ModelEntry::default();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model(&self, index: usize) -> Result<&ModelEntry, TableError> {
        let count = self.entries.len();
        self.entries
            .get(index)
            .ok_or(TableError::ModelOutOfRange { index, count })
    }

    pub fn model_mut(&mut self, index: usize) -> Result<&mut ModelEntry, TableError> {
        let count = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(TableError::ModelOutOfRange { index, count })
    }

    pub fn matrix(&self, model: usize, slot: usize) -> Result<&UniformMatrixPatch, TableError> {
        self.model(model)?.matrices.get(slot).ok_or(TableError::SlotOutOfRange {
            index: slot,
            max: MAX_MATRIX_SLOTS,
        })
    }

    pub fn matrix_mut(
        &mut self,
        model: usize,
        slot: usize,
    ) -> Result<&mut UniformMatrixPatch, TableError> {
        self.model_mut(model)?
            .matrices
            .get_mut(slot)
            .ok_or(TableError::SlotOutOfRange {
                index: slot,
                max: MAX_MATRIX_SLOTS,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ModelEntry> {
        self.entries.iter_mut()
    }
}

/// Check that a matrix starting at `register` fits the float registers.
pub fn check_matrix_register(register: u32) -> Result<(), TableError> {
    if register.saturating_add(4) > VS_UNIFORM_FLOAT_REG_NUM {
        return Err(TableError::RegisterOutOfRange {
            register,
            max: VS_UNIFORM_FLOAT_REG_NUM,
        });
    }

    Ok(())
}
