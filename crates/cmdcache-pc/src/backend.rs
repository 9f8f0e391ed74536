//! In-memory command lists.
//!
//! Each list owns a fixed-size byte buffer and a request queue. Emitted bytes
//! accumulate until [`split_draw`](CommandList::split_draw) closes them into a
//! request; [`run`](Execution::run) replays the requests of the bound list
//! through a [`UniformFile`].

use cmdcache_hal::{AppendMode, CommandList, Execution, RecordedRegion, StateMask};

use crate::executor::UniformFile;

/// Handle of a [`SoftwareCommandLists`] list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(u32);

impl ListId {
    /// The list bound at construction. It has no storage.
    pub const DEFAULT: Self = Self(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Errors returned by [`SoftwareCommandLists`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SoftwareError {
    #[error("memory budget exhausted: 0x{requested:X} bytes requested, 0x{available:X} available")]
    BudgetExhausted { requested: usize, available: usize },

    #[error("list {list:?} is full: 0x{needed:X} bytes needed, capacity 0x{capacity:X}")]
    BufferFull {
        list: ListId,
        needed: usize,
        capacity: usize,
    },

    #[error("list {list:?} has no room for another request (capacity {capacity})")]
    RequestsFull { list: ListId, capacity: usize },

    #[error("list {0:?} is not recording")]
    NotRecording(ListId),

    #[error("list {0:?} is already recording")]
    AlreadyRecording(ListId),

    #[error("unknown list {0:?}")]
    UnknownList(ListId),

    #[error("region 0x{offset:X}+0x{size:X} is outside list {list:?}")]
    RegionOutOfBounds {
        list: ListId,
        offset: usize,
        size: usize,
    },
}

type Result<T> = core::result::Result<T, SoftwareError>;

/// A queued unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Bytes of the owning list.
    Commands { offset: usize, size: usize },
    /// Bytes of another list, executed in place.
    Reference {
        list: ListId,
        offset: usize,
        size: usize,
    },
}

#[derive(Debug)]
struct SoftwareList {
    buffer: Vec<u8>,
    used: usize,
    /// Start of the bytes not yet closed into a request.
    pending: usize,
    requests: Vec<Request>,
    max_requests: usize,
    /// Byte offset and first request id of an open recording.
    recording: Option<(usize, usize)>,
    /// Requests already executed.
    executed: usize,
}

impl SoftwareList {
    fn new(buffer_size: usize, max_requests: usize) -> Self {
        Self {
            buffer: vec![0; buffer_size],
            used: 0,
            pending: 0,
            requests: Vec::with_capacity(max_requests),
            max_requests,
            recording: None,
            executed: 0,
        }
    }

    fn push_request(&mut self, id: ListId, request: Request) -> Result<()> {
        if self.requests.len() >= self.max_requests {
            return Err(SoftwareError::RequestsFull {
                list: id,
                capacity: self.max_requests,
            });
        }

        self.requests.push(request);
        Ok(())
    }

    fn split(&mut self, id: ListId) -> Result<()> {
        if self.used == self.pending {
            return Ok(());
        }

        self.push_request(
            id,
            Request::Commands {
                offset: self.pending,
                size: self.used - self.pending,
            },
        )?;
        self.pending = self.used;
        Ok(())
    }

    fn push(&mut self, id: ListId, bytes: &[u8]) -> Result<()> {
        let end = self.used + bytes.len();
        if end > self.buffer.len() {
            return Err(SoftwareError::BufferFull {
                list: id,
                needed: end,
                capacity: self.buffer.len(),
            });
        }

        self.buffer[self.used..end].copy_from_slice(bytes);
        self.used = end;
        Ok(())
    }

    fn clear(&mut self) {
        self.used = 0;
        self.pending = 0;
        self.requests.clear();
        self.executed = 0;
    }
}

/// Command lists held in host memory under a fixed byte budget.
#[derive(Debug)]
pub struct SoftwareCommandLists {
    lists: Vec<Option<SoftwareList>>,
    bound: ListId,
    budget: usize,
    allocated: usize,
    running: bool,
    executor: UniformFile,
    /// Appends that asked for state groups to be restored.
    state_restores: usize,
    /// Union of every state mask seen by an append.
    restored_states: StateMask,
}

impl SoftwareCommandLists {
    /// Create a backend allowing `budget` bytes of list storage in total.
    pub fn new(budget: usize) -> Self {
        Self {
            lists: vec![Some(SoftwareList::new(0, 0))],
            bound: ListId::DEFAULT,
            budget,
            allocated: 0,
            running: false,
            executor: UniformFile::new(),
            state_restores: 0,
            restored_states: StateMask::NONE,
        }
    }

    pub fn with_executor(mut self, executor: UniformFile) -> Self {
        self.executor = executor;
        self
    }

    pub fn executor(&self) -> &UniformFile {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut UniformFile {
        &mut self.executor
    }

    /// Bytes of list storage currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Number of appends that carried a non-empty state mask.
    ///
    /// The software executor keeps no GPU state besides the uniform file, so
    /// restoring is only counted.
    pub fn state_restores(&self) -> usize {
        self.state_restores
    }

    /// Every state group an append asked to restore so far.
    pub fn restored_states(&self) -> StateMask {
        self.restored_states
    }

    /// Requests queued in `id`.
    pub fn requests(&self, id: ListId) -> Option<&[Request]> {
        self.get(id).ok().map(|list| list.requests.as_slice())
    }

    fn get(&self, id: ListId) -> Result<&SoftwareList> {
        self.lists
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SoftwareError::UnknownList(id))
    }

    fn get_mut(&mut self, id: ListId) -> Result<&mut SoftwareList> {
        self.lists
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SoftwareError::UnknownList(id))
    }

    fn bound_list(&self) -> Option<&SoftwareList> {
        self.get(self.bound).ok()
    }

    fn allocate(&mut self, buffer_size: u32, request_capacity: u32) -> Result<ListId> {
        let size = buffer_size as usize;
        let available = self.budget - self.allocated;
        if size > available {
            return Err(SoftwareError::BudgetExhausted {
                requested: size,
                available,
            });
        }

        let list = SoftwareList::new(size, request_capacity as usize);
        let id = match self.lists.iter().position(Option::is_none) {
            Some(index) => {
                self.lists[index] = Some(list);
                ListId(index as u32)
            }
            None => {
                self.lists.push(Some(list));
                ListId((self.lists.len() - 1) as u32)
            }
        };

        self.allocated += size;
        log::debug!("allocated list {id:?}: 0x{size:X} bytes, {request_capacity} requests");
        Ok(id)
    }

    /// Resolve the bytes executed by `request` of the list `owner`.
    fn request_bytes(&self, owner: ListId, request: Request) -> Result<&[u8]> {
        let (list, offset, size) = match request {
            Request::Commands { offset, size } => (owner, offset, size),
            Request::Reference { list, offset, size } => (list, offset, size),
        };

        self.get(list)?
            .buffer
            .get(offset..offset + size)
            .ok_or(SoftwareError::RegionOutOfBounds { list, offset, size })
    }

    /// Execute the requests of `id` not yet executed. Returns the new
    /// executed count.
    fn replay(&self, id: ListId, executor: &mut UniformFile) -> Result<usize> {
        let list = self.get(id)?;
        for &request in &list.requests[list.executed..] {
            executor.execute(self.request_bytes(id, request)?);
        }

        Ok(list.requests.len())
    }
}

impl CommandList for SoftwareCommandLists {
    type Error = SoftwareError;
    type Handle = ListId;

    fn bound(&self) -> ListId {
        self.bound
    }

    fn bind(&mut self, handle: ListId) {
        if self.get(handle).is_err() {
            log::warn!("binding unknown list {handle:?}");
        }
        self.bound = handle;
    }

    fn create(&mut self, buffer_size: u32, request_capacity: u32) -> Result<ListId> {
        self.allocate(buffer_size, request_capacity)
    }

    fn begin_recording(&mut self, buffer_size: u32, request_capacity: u32) -> Result<ListId> {
        if self.bound_list().is_some_and(|list| list.recording.is_some()) {
            return Err(SoftwareError::AlreadyRecording(self.bound));
        }

        let id = self.allocate(buffer_size, request_capacity)?;
        self.bound = id;

        let list = self.get_mut(id)?;
        list.recording = Some((list.used, list.requests.len()));
        Ok(id)
    }

    fn end_recording(&mut self) -> Result<RecordedRegion> {
        let id = self.bound;
        let list = self.get_mut(id)?;
        let (offset, request_begin) = list.recording.take().ok_or(SoftwareError::NotRecording(id))?;

        Ok(RecordedRegion {
            byte_offset: offset as u32,
            byte_size: (list.used - offset) as u32,
            request_begin_id: request_begin as u32,
            request_count: (list.requests.len() - request_begin) as u32,
        })
    }

    fn split_draw(&mut self) -> Result<()> {
        let id = self.bound;
        self.get_mut(id)?.split(id)
    }

    fn push_commands(&mut self, bytes: &[u8]) -> Result<()> {
        let id = self.bound;
        self.get_mut(id)?.push(id, bytes)
    }

    fn used_byte_count(&self) -> u32 {
        self.bound_list().map_or(0, |list| list.used as u32)
    }

    fn max_byte_count(&self) -> u32 {
        self.bound_list().map_or(0, |list| list.buffer.len() as u32)
    }

    fn used_request_count(&self) -> u32 {
        self.bound_list().map_or(0, |list| list.requests.len() as u32)
    }

    fn max_request_count(&self) -> u32 {
        self.bound_list().map_or(0, |list| list.max_requests as u32)
    }

    fn buffer(&self, handle: ListId) -> Option<&[u8]> {
        self.get(handle).ok().map(|list| list.buffer.as_slice())
    }

    fn buffer_mut(&mut self, handle: ListId) -> Option<&mut [u8]> {
        self.get_mut(handle).ok().map(|list| list.buffer.as_mut_slice())
    }

    fn append_recorded(
        &mut self,
        handle: ListId,
        region: &RecordedRegion,
        state_mask: StateMask,
        mode: AppendMode,
    ) -> Result<()> {
        let offset = region.byte_offset as usize;
        let size = region.byte_size as usize;
        let source = self
            .get(handle)?
            .buffer
            .get(offset..offset + size)
            .ok_or(SoftwareError::RegionOutOfBounds {
                list: handle,
                offset,
                size,
            })?;

        log::trace!(
            "append {handle:?} 0x{offset:X}+0x{size:X} to {:?} ({mode:?}, state mask 0x{:X})",
            self.bound,
            state_mask.bits()
        );

        let id = self.bound;
        match mode {
            AppendMode::Copy => {
                let bytes = source.to_vec();
                self.get_mut(id)?.push(id, &bytes)?;
            }
            AppendMode::Reference => {
                let list = self.get_mut(id)?;
                list.split(id)?;
                list.push_request(
                    id,
                    Request::Reference {
                        list: handle,
                        offset,
                        size,
                    },
                )?;
            }
        }

        if state_mask != StateMask::NONE {
            self.state_restores += 1;
            self.restored_states =
                StateMask::from_bits(self.restored_states.bits() | state_mask.bits());
        }
        Ok(())
    }

    fn delete(&mut self, handle: ListId) {
        if handle == ListId::DEFAULT {
            log::warn!("the default list cannot be deleted");
            return;
        }

        match self.lists.get_mut(handle.index()).and_then(Option::take) {
            Some(list) => {
                self.allocated -= list.buffer.len();
                if self.bound == handle {
                    log::warn!("deleted the bound list {handle:?}");
                }
                log::debug!("released list {handle:?}");
            }
            None => log::warn!("deleting unknown list {handle:?}"),
        }
    }
}

impl Execution for SoftwareCommandLists {
    type Error = SoftwareError;

    /// Close pending bytes and execute every request not yet executed.
    /// Execution completes before this returns.
    fn run(&mut self) -> Result<()> {
        let id = self.bound;
        self.get_mut(id)?.split(id)?;
        self.running = true;

        let mut executor = core::mem::take(&mut self.executor);
        let result = self.replay(id, &mut executor);
        self.executor = executor;

        let executed = result?;
        self.get_mut(id)?.executed = executed;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn wait_done(&mut self) {
        self.running = false;
    }

    fn clear(&mut self) {
        let id = self.bound;
        match self.get_mut(id) {
            Ok(list) => list.clear(),
            Err(err) => log::warn!("clear(): {err}"),
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
