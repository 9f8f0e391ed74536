#![no_std]

/// Bit set of GPU state groups restored when a recorded region is replayed.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateMask(u32);

impl StateMask {
    /// Restore nothing.
    pub const NONE: Self = Self(0);
    /// Restore every state group.
    pub const ALL: Self = Self(u32::MAX);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// How a recorded region is put back into the live command stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppendMode {
    /// Copy the recorded bytes into the bound list.
    #[default]
    Copy,
    /// Reference the recorded bytes in place. The recording must outlive
    /// every list that references it.
    Reference,
}

impl AppendMode {
    pub fn is_copy(self) -> bool {
        matches!(self, Self::Copy)
    }
}

/// Bounds of a recorded region inside a command list, as returned by
/// [`CommandList::end_recording`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordedRegion {
    /// Byte offset of the first recorded command in the list buffer.
    pub byte_offset: u32,
    /// Number of recorded bytes.
    pub byte_size: u32,
    /// Id of the first recorded request.
    pub request_begin_id: u32,
    /// Number of recorded requests.
    pub request_count: u32,
}

/// Abstracts a GPU command-list facility that can record, expose and replay
/// command buffers.
///
/// Exactly one list is bound at a time. Emitted commands land in the bound
/// list, and a recording captures everything emitted into it between
/// [`begin_recording`](Self::begin_recording) and
/// [`end_recording`](Self::end_recording).
pub trait CommandList {
    type Error: core::fmt::Debug;
    type Handle: Copy + Eq + core::fmt::Debug;

    /// The currently bound list.
    fn bound(&self) -> Self::Handle;

    /// Bind `handle` as the target of subsequent commands.
    fn bind(&mut self, handle: Self::Handle);

    /// Allocate a list with `buffer_size` bytes and `request_capacity`
    /// requests without binding it.
    fn create(&mut self, buffer_size: u32, request_capacity: u32)
        -> Result<Self::Handle, Self::Error>;

    /// Allocate a list with `buffer_size` bytes and `request_capacity`
    /// requests, bind it and start recording into it.
    fn begin_recording(
        &mut self,
        buffer_size: u32,
        request_capacity: u32,
    ) -> Result<Self::Handle, Self::Error>;

    /// Stop recording into the bound list and return the recorded bounds.
    fn end_recording(&mut self) -> Result<RecordedRegion, Self::Error>;

    /// Close the pending draw request of the bound list.
    fn split_draw(&mut self) -> Result<(), Self::Error>;

    /// Emit encoded commands into the bound list.
    fn push_commands(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Bytes used in the bound list.
    fn used_byte_count(&self) -> u32;

    /// Byte capacity of the bound list.
    fn max_byte_count(&self) -> u32;

    /// Requests used in the bound list.
    fn used_request_count(&self) -> u32;

    /// Request capacity of the bound list.
    fn max_request_count(&self) -> u32;

    /// The command buffer of `handle`, starting at its base address.
    fn buffer(&self, handle: Self::Handle) -> Option<&[u8]>;

    /// Mutable access to the command buffer of `handle`.
    fn buffer_mut(&mut self, handle: Self::Handle) -> Option<&mut [u8]>;

    /// Append `region` of the list `handle` to the bound list.
    fn append_recorded(
        &mut self,
        handle: Self::Handle,
        region: &RecordedRegion,
        state_mask: StateMask,
        mode: AppendMode,
    ) -> Result<(), Self::Error>;

    /// Release the list `handle`.
    fn delete(&mut self, handle: Self::Handle);
}

/// Abstracts submission of the bound list to the GPU.
///
/// May be implemented by the same type as [`CommandList`] or used
/// independently.
pub trait Execution {
    type Error: core::fmt::Debug;

    /// Start executing the bound list.
    fn run(&mut self) -> Result<(), Self::Error>;

    /// Stop executing after the current request.
    fn stop(&mut self);

    /// Block until the bound list has been fully consumed.
    fn wait_done(&mut self);

    /// Reset the bound list to empty.
    fn clear(&mut self);

    /// Whether the bound list is currently executing.
    fn is_running(&self) -> bool;
}
