//! Patchable command cache.
//!
//! A [`CommandCache`] records the command sequence of a group of models once,
//! remembers where each model's uniform matrices are written inside it, and
//! replays the recording with only those matrix words rewritten.
//!
//! Calling convention:
//!
//! ```text
//! initialize -> set_vs_uniform_matrix_register_index*
//!            -> begin_save -> (save_command_buffer_start_offset, draw)* -> end_save
//!            -> (update_vs_uniform_matrix*, append)* per frame
//!            -> finalize
//! ```
//!
//! Misuse (wrong state, indices out of range) panics at the call site.
//! Failures of the command list backend are returned as [`CacheError`].

pub mod patch;
pub mod report;
pub mod scanner;
pub mod table;

use cmdcache_hal::{AppendMode, CommandList, RecordedRegion, StateMask};
use glam::Mat4;

use crate::gpu::registers::UniformWindow;
use patch::{CommandView, PatchError};
use report::CacheReport;
use table::{ModelTable, TableError, UniformMatrixPatch};

pub use scanner::{
    find_uniform_offsets, scan_matrix, ComponentOffsets, MatrixOffsets, UniformCursor,
};

/// Lifecycle state of a [`CommandCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Initialized,
    Finalized,
    /// Recording is in progress.
    BeginSave,
    /// A recording is available for patching and replay.
    EndSave,
}

impl core::fmt::Display for CacheState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Initialized => "INITIALIZED",
            Self::Finalized => "FINALIZED",
            Self::BeginSave => "BEGIN_SAVE",
            Self::EndSave => "END_SAVE",
        };
        f.write_str(name)
    }
}

/// Configuration fixed at [`CommandCache::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Byte capacity of the recording list.
    pub buffer_size: u32,
    /// Request capacity of the recording list.
    pub request_capacity: u32,
    /// Whether [`CommandCache::append`] copies or references the recording.
    pub append_mode: AppendMode,
    /// State groups restored on replay.
    pub state_mask: StateMask,
    /// Number of models sharing the recording.
    pub model_count: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            buffer_size: 0x10_0000,
            request_capacity: 32,
            append_mode: AppendMode::Copy,
            state_mask: StateMask::NONE,
            model_count: 1,
        }
    }
}

/// Error type for cache operations, generic over command list errors.
#[derive(Debug)]
pub enum CacheError<E: core::fmt::Debug> {
    /// Command list backend error.
    Backend(E),
    /// The backend has no buffer for the recording list.
    MissingBuffer,
    /// The recorded region does not fit the recording list buffer.
    RegionOutOfBounds(RecordedRegion),
    /// A patch offset points outside the recorded region.
    Patch(PatchError),
}

impl<E: core::fmt::Debug> From<E> for CacheError<E> {
    fn from(e: E) -> Self {
        CacheError::Backend(e)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for CacheError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "command list error: {e:?}"),
            Self::MissingBuffer => write!(f, "recording list has no command buffer"),
            Self::RegionOutOfBounds(region) => write!(
                f,
                "recorded region 0x{:X}+0x{:X} exceeds the recording buffer",
                region.byte_offset, region.byte_size
            ),
            Self::Patch(e) => write!(f, "{e}"),
        }
    }
}

impl<E: core::fmt::Debug> std::error::Error for CacheError<E> {}

fn region_range(region: &RecordedRegion) -> core::ops::Range<usize> {
    let start = region.byte_offset as usize;
    start..start + region.byte_size as usize
}

/// Bytes of `region` inside the buffer of `list`.
fn recorded_slice<'b, B: CommandList>(
    ctx: &'b B,
    list: B::Handle,
    region: &RecordedRegion,
) -> Result<&'b [u8], CacheError<B::Error>> {
    ctx.buffer(list)
        .ok_or(CacheError::MissingBuffer)?
        .get(region_range(region))
        .ok_or(CacheError::RegionOutOfBounds(*region))
}

/// Records a command sequence once and replays it with patched uniform
/// matrices. `H` is the list handle of the [`CommandList`] backend.
pub struct CommandCache<H> {
    state: CacheState,
    config: CacheConfig,
    window: UniformWindow,
    /// Number of start offsets saved in the current recording.
    model_cursor: usize,
    /// List bound before recording started.
    previous: Option<H>,
    /// Recording list.
    list: Option<H>,
    region: RecordedRegion,
    models: ModelTable,
}

impl<H> Default for CommandCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> CommandCache<H> {
    pub fn new() -> Self {
        Self {
            state: CacheState::Uninitialized,
            config: CacheConfig::default(),
            window: UniformWindow::VERTEX_SHADER,
            model_cursor: 0,
            previous: None,
            list: None,
            region: RecordedRegion::default(),
            models: ModelTable::new(),
        }
    }

    /// Use `window` instead of the vertex shader float uniform registers when
    /// scanning recordings.
    pub fn with_window(mut self, window: UniformWindow) -> Self {
        self.window = window;
        self
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Number of models whose start offset was saved since
    /// [`begin_save`](Self::begin_save).
    pub fn saved_model_count(&self) -> usize {
        self.models.iter().filter(|entry| entry.saved).count()
    }

    pub fn start_offset(&self, model: usize) -> Result<u32, TableError> {
        Ok(self.models.model(model)?.start_offset)
    }

    pub fn uniform_patch(
        &self,
        model: usize,
        slot: usize,
    ) -> Result<&UniformMatrixPatch, TableError> {
        self.models.matrix(model, slot)
    }

    /// Bounds of the recording, once [`end_save`](Self::end_save) returned.
    pub fn recorded_region(&self) -> Option<RecordedRegion> {
        (self.state == CacheState::EndSave).then_some(self.region)
    }

    fn expect_state(&self, expected: CacheState, operation: &str) {
        if self.state != expected {
            panic!("{operation}(): state is {} (expected {expected})", self.state);
        }
    }

    /// Configure the cache and reset its tables.
    ///
    /// # Panics
    /// If a recording is open or held, or if `config.model_count` exceeds
    /// [`MAX_MODELS`](crate::gpu::registers::MAX_MODELS).
    pub fn initialize(&mut self, config: CacheConfig) {
        if matches!(self.state, CacheState::BeginSave | CacheState::EndSave) {
            panic!("initialize(): state is {}; finalize() first", self.state);
        }

        self.models
            .resize(config.model_count)
            .unwrap_or_else(|err| panic!("initialize(): {err}"));

        self.config = config;
        self.model_cursor = 0;
        self.region = RecordedRegion::default();
        self.state = CacheState::Initialized;

        log::debug!(
            "command cache initialized: {} models, 0x{:X} bytes, {} requests, {:?}",
            config.model_count,
            config.buffer_size,
            config.request_capacity,
            config.append_mode
        );
    }

    /// Assign the first float register of uniform matrix `slot` of `model`.
    ///
    /// Must be called before [`end_save`](Self::end_save) for every slot that
    /// will be patched.
    ///
    /// # Panics
    /// If the cache is not initialized or an index is out of range.
    pub fn set_vs_uniform_matrix_register_index(
        &mut self,
        model: usize,
        slot: usize,
        register: u32,
    ) {
        if matches!(self.state, CacheState::Uninitialized | CacheState::Finalized) {
            panic!("set_vs_uniform_matrix_register_index(): state is {}", self.state);
        }

        table::check_matrix_register(register)
            .unwrap_or_else(|err| panic!("set_vs_uniform_matrix_register_index(): {err}"));

        let patch = self
            .models
            .matrix_mut(model, slot)
            .unwrap_or_else(|err| panic!("set_vs_uniform_matrix_register_index(): {err}"));

        patch.valid = true;
        patch.register = register;
        patch.scanned = false;
    }

    /// Print the cache state through the log.
    pub fn report(&self) -> CacheReport<'_, H> {
        CacheReport {
            state: self.state,
            list: self.list.as_ref(),
            append_mode: self.config.append_mode,
            region: self.region,
            model_cursor: self.model_cursor,
            model_count: self.models.len(),
        }
    }
}

impl<H: Copy + Eq + core::fmt::Debug> CommandCache<H> {
    /// Allocate a recording list, bind it and start recording.
    ///
    /// Accepted after [`initialize`](Self::initialize) and after
    /// [`end_save`](Self::end_save); the latter releases the previous
    /// recording.
    ///
    /// # Panics
    /// If the cache is in any other state.
    pub fn begin_save<B>(&mut self, ctx: &mut B) -> Result<(), CacheError<B::Error>>
    where
        B: CommandList<Handle = H>,
    {
        match self.state {
            CacheState::Initialized => (),
            CacheState::EndSave => {
                if let Some(list) = self.list.take() {
                    log::debug!("re-recording: releasing list {list:?}");
                    ctx.delete(list);
                }

                self.region = RecordedRegion::default();
                self.state = CacheState::Initialized;
            }
            state => panic!("begin_save(): state is {state} (expected INITIALIZED)"),
        }

        let previous = ctx.bound();
        let list = ctx.begin_recording(self.config.buffer_size, self.config.request_capacity)?;

        for entry in self.models.iter_mut() {
            entry.clear_recording();
        }
        self.previous = Some(previous);
        self.list = Some(list);
        self.model_cursor = 0;
        self.state = CacheState::BeginSave;

        log::debug!("recording into list {list:?} (previous {previous:?})");
        Ok(())
    }

    /// Remember the current recording position as the first command of
    /// `model`.
    ///
    /// # Panics
    /// If no recording is open or `model` is out of range.
    pub fn save_command_buffer_start_offset<B>(&mut self, ctx: &B, model: usize)
    where
        B: CommandList<Handle = H>,
    {
        self.expect_state(CacheState::BeginSave, "save_command_buffer_start_offset");

        let offset = ctx.used_byte_count();
        let entry = self
            .models
            .model_mut(model)
            .unwrap_or_else(|err| panic!("save_command_buffer_start_offset(): {err}"));

        entry.start_offset = offset;
        entry.saved = true;
        self.model_cursor += 1;

        log::trace!("model {model} starts at 0x{offset:X}");
    }

    /// Stop recording, locate every assigned uniform matrix inside the
    /// recording and rebind the previously bound list.
    ///
    /// # Panics
    /// If no recording is open or no start offset was saved.
    pub fn end_save<B>(&mut self, ctx: &mut B) -> Result<(), CacheError<B::Error>>
    where
        B: CommandList<Handle = H>,
    {
        self.expect_state(CacheState::BeginSave, "end_save");
        if self.model_cursor == 0 {
            panic!("end_save(): save_command_buffer_start_offset() must be called at least once");
        }

        let Some(list) = self.list else {
            unreachable!("recording without a list");
        };

        if !self.config.append_mode.is_copy() {
            ctx.split_draw()?;
        }

        let region = ctx.end_recording()?;
        self.model_cursor = 0;
        if let Some(previous) = self.previous.take() {
            ctx.bind(previous);
        }

        let scanned = recorded_slice(&*ctx, list, &region)
            .map(|recorded| self.scan_recording(recorded, &region));
        if let Err(err) = scanned {
            log::warn!("end_save(): {err}; releasing list {list:?}");
            self.list = None;
            ctx.delete(list);
            self.state = CacheState::Initialized;
            return Err(err);
        }

        self.region = region;
        self.state = CacheState::EndSave;

        log::debug!(
            "recorded 0x{:X} bytes at 0x{:X}, requests {}+{}",
            region.byte_size,
            region.byte_offset,
            region.request_begin_id,
            region.request_count
        );
        Ok(())
    }

    /// Locate every assigned uniform matrix of every saved model inside
    /// `recorded`.
    fn scan_recording(&mut self, recorded: &[u8], region: &RecordedRegion) {
        let size = region.byte_size as usize;
        for (model, entry) in self.models.iter_mut().enumerate() {
            let start = if entry.saved {
                entry.start_offset.checked_sub(region.byte_offset)
            } else {
                None
            };
            let Some(start) = start else {
                if entry.matrices.iter().any(|patch| patch.valid) {
                    log::warn!(
                        "model {model}: start offset 0x{:X} is not inside the recording \
                         (saved = {}); its matrices are not patched",
                        entry.start_offset,
                        entry.saved
                    );
                }
                for patch in entry.matrices.iter_mut().filter(|patch| patch.valid) {
                    patch.offsets = MatrixOffsets::NOT_FOUND;
                    patch.scanned = true;
                }
                continue;
            };

            for (slot, patch) in entry.matrices.iter_mut().enumerate() {
                if !patch.valid {
                    continue;
                }

                let register = patch.register;
                patch.offsets =
                    scanner::scan_matrix(recorded, start as usize, size, &self.window, register);
                patch.scanned = true;

                if patch.offsets.is_empty() {
                    log::debug!("model {model} matrix {slot}: register {register} not written");
                } else {
                    log::trace!("model {model} matrix {slot}: {:?}", patch.offsets);
                }
            }
        }
    }

    /// Rewrite uniform matrix `slot` of `model` inside the recording.
    ///
    /// The GPU must not be consuming the recording while it is patched.
    ///
    /// # Panics
    /// If there is no recording, an index is out of range, or the slot had no
    /// register assigned before [`end_save`](Self::end_save).
    pub fn update_vs_uniform_matrix<B>(
        &mut self,
        ctx: &mut B,
        model: usize,
        slot: usize,
        matrix: &Mat4,
    ) -> Result<(), CacheError<B::Error>>
    where
        B: CommandList<Handle = H>,
    {
        self.expect_state(CacheState::EndSave, "update_vs_uniform_matrix");

        let patch = self
            .models
            .matrix(model, slot)
            .unwrap_or_else(|err| panic!("update_vs_uniform_matrix(): {err}"));

        if !(patch.valid && patch.scanned) {
            panic!(
                "update_vs_uniform_matrix(): matrix {slot} of model {model} \
                 had no register index before end_save()"
            );
        }

        let Some(list) = self.list else {
            unreachable!("recording without a list");
        };

        let region = self.region;
        let buffer = ctx
            .buffer_mut(list)
            .ok_or(CacheError::<B::Error>::MissingBuffer)?;
        let recorded = buffer
            .get_mut(region_range(&region))
            .ok_or(CacheError::<B::Error>::RegionOutOfBounds(region))?;

        let mut view = CommandView::new(recorded);
        let written = patch::patch_matrix(&mut view, &patch.offsets, matrix)
            .map_err(CacheError::<B::Error>::Patch)?;

        log::trace!("model {model} matrix {slot}: patched {written} words");
        Ok(())
    }

    /// Append the recording to the bound list.
    ///
    /// # Panics
    /// If there is no recording.
    pub fn append<B>(&self, ctx: &mut B) -> Result<(), CacheError<B::Error>>
    where
        B: CommandList<Handle = H>,
    {
        self.expect_state(CacheState::EndSave, "append");

        let Some(list) = self.list else {
            unreachable!("recording without a list");
        };

        ctx.append_recorded(
            list,
            &self.region,
            self.config.state_mask,
            self.config.append_mode,
        )?;
        Ok(())
    }

    /// The recorded bytes, once [`end_save`](Self::end_save) returned.
    pub fn recorded_bytes<'b, B>(&self, ctx: &'b B) -> Option<&'b [u8]>
    where
        B: CommandList<Handle = H>,
    {
        let region = self.recorded_region()?;
        ctx.buffer(self.list?)?.get(region_range(&region))
    }

    /// Release the recording list and reset the tables. Accepted in any
    /// state; an open recording is abandoned.
    pub fn finalize<B>(&mut self, ctx: &mut B)
    where
        B: CommandList<Handle = H>,
    {
        if self.state == CacheState::BeginSave {
            log::warn!("finalize(): abandoning an open recording");
            if let Some(previous) = self.previous.take() {
                ctx.bind(previous);
            }
        }

        if let Some(list) = self.list.take() {
            ctx.delete(list);
        }

        self.models.reset();
        self.previous = None;
        self.region = RecordedRegion::default();
        self.model_cursor = 0;
        self.state = CacheState::Finalized;
    }
}

impl<H> Drop for CommandCache<H> {
    fn drop(&mut self) {
        if self.list.is_some() {
            log::warn!("command cache dropped without finalize(); its recording list is leaked");
        }
    }
}
