//! In-place rewriting of uniform values inside a recorded command buffer.

use glam::Mat4;

use super::scanner::MatrixOffsets;

/// Errors returned when writing into a [`CommandView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("word write at 0x{offset:X} exceeds the {len} byte view")]
    OutOfBounds { offset: usize, len: usize },
}

/// Mutable view over a recorded command region.
pub struct CommandView<'a> {
    bytes: &'a mut [u8],
}

impl<'a> CommandView<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Store `value` as a little-endian word at `offset`.
    pub fn write_word(&mut self, offset: usize, value: u32) -> Result<(), PatchError> {
        let len = self.bytes.len();
        let word = self
            .bytes
            .get_mut(offset..offset.saturating_add(4))
            .filter(|word| word.len() == 4)
            .ok_or(PatchError::OutOfBounds { offset, len })?;

        word.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Load the little-endian word at `offset`.
    pub fn read_word(&self, offset: usize) -> Option<u32> {
        let word = self.bytes.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
    }
}

/// Rewrite the 16 words of a matrix upload.
///
/// Register `i` holds row `i`. Component `c` of that row lives in slot
/// `3 - c`, so the last slot receives the row's first element. Slots without
/// an offset are skipped. Returns the number of words written.
pub fn patch_matrix(
    view: &mut CommandView<'_>,
    offsets: &MatrixOffsets,
    matrix: &Mat4,
) -> Result<usize, PatchError> {
    let mut written = 0;
    for (row, register) in offsets.0.iter().enumerate() {
        let values = matrix.row(row).to_array();
        for (column, value) in values.into_iter().enumerate() {
            if let Some(offset) = register.slot(3 - column) {
                view.write_word(offset as usize, value.to_bits())?;
                written += 1;
            }
        }
    }

    Ok(written)
}
