//! Mock command list backend shared by the integration tests.
//!
//! Lists live in a `Vec` indexed by handle. Handle 0 is the list bound at
//! construction. Every trait call is captured so tests can assert on the
//! sequence the cache or frame list issued.

#![allow(dead_code)]

use cmdcache_core::{AppendMode, CommandList, Execution, RecordedRegion, StateMask};

/// Captured backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Bind(u32),
    Create(u32),
    BeginRecording(u32),
    EndRecording,
    SplitDraw,
    Append {
        handle: u32,
        region: RecordedRegion,
        state_mask: StateMask,
        mode: AppendMode,
    },
    Delete(u32),
    Run,
    Stop,
    Wait,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

impl core::fmt::Display for MockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "MockError")
    }
}

struct MockBuffer {
    bytes: Vec<u8>,
    used: usize,
    requests: u32,
}

pub struct MockLists {
    calls: Vec<Call>,
    lists: Vec<Option<MockBuffer>>,
    bound: u32,
    /// Byte offset and request id an open recording started at.
    recording: Option<(usize, u32)>,
    /// Bytes already used in a list when recording into it starts.
    pub recording_prefix: usize,
    /// Fail the next allocation.
    pub fail_alloc: bool,
    /// Report no buffer for any list.
    pub hide_buffers: bool,
    running: bool,
}

impl MockLists {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            lists: vec![Some(MockBuffer {
                bytes: vec![0; 0x1000],
                used: 0,
                requests: 0,
            })],
            bound: 0,
            recording: None,
            recording_prefix: 0,
            fail_alloc: false,
            hide_buffers: false,
            running: false,
        }
    }

    /// Get all captured calls.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn is_live(&self, handle: u32) -> bool {
        matches!(self.lists.get(handle as usize), Some(Some(_)))
    }

    fn current(&mut self) -> &mut MockBuffer {
        self.lists[self.bound as usize]
            .as_mut()
            .expect("bound list was deleted")
    }

    fn current_ref(&self) -> &MockBuffer {
        self.lists[self.bound as usize]
            .as_ref()
            .expect("bound list was deleted")
    }

    fn allocate(&mut self, buffer_size: u32) -> Result<u32, MockError> {
        if self.fail_alloc {
            self.fail_alloc = false;
            return Err(MockError);
        }

        self.lists.push(Some(MockBuffer {
            bytes: vec![0; buffer_size as usize],
            used: 0,
            requests: 0,
        }));
        Ok((self.lists.len() - 1) as u32)
    }
}

impl CommandList for MockLists {
    type Error = MockError;
    type Handle = u32;

    fn bound(&self) -> u32 {
        self.bound
    }

    fn bind(&mut self, handle: u32) {
        self.calls.push(Call::Bind(handle));
        self.bound = handle;
    }

    fn create(&mut self, buffer_size: u32, _request_capacity: u32) -> Result<u32, MockError> {
        let handle = self.allocate(buffer_size)?;
        self.calls.push(Call::Create(handle));
        Ok(handle)
    }

    fn begin_recording(
        &mut self,
        buffer_size: u32,
        _request_capacity: u32,
    ) -> Result<u32, MockError> {
        let handle = self.allocate(buffer_size)?;
        self.calls.push(Call::BeginRecording(handle));
        self.bound = handle;

        let prefix = self.recording_prefix;
        self.current().used = prefix;
        self.recording = Some((prefix, 0));
        Ok(handle)
    }

    fn end_recording(&mut self) -> Result<RecordedRegion, MockError> {
        self.calls.push(Call::EndRecording);
        let (start, request_begin) = self.recording.take().ok_or(MockError)?;
        let list = self.current_ref();

        Ok(RecordedRegion {
            byte_offset: start as u32,
            byte_size: (list.used - start) as u32,
            request_begin_id: request_begin,
            request_count: list.requests - request_begin,
        })
    }

    fn split_draw(&mut self) -> Result<(), MockError> {
        self.calls.push(Call::SplitDraw);
        self.current().requests += 1;
        Ok(())
    }

    fn push_commands(&mut self, bytes: &[u8]) -> Result<(), MockError> {
        let list = self.current();
        let end = list.used + bytes.len();
        if end > list.bytes.len() {
            return Err(MockError);
        }
        list.bytes[list.used..end].copy_from_slice(bytes);
        list.used = end;
        Ok(())
    }

    fn used_byte_count(&self) -> u32 {
        self.current_ref().used as u32
    }

    fn max_byte_count(&self) -> u32 {
        self.current_ref().bytes.len() as u32
    }

    fn used_request_count(&self) -> u32 {
        self.current_ref().requests
    }

    fn max_request_count(&self) -> u32 {
        64
    }

    fn buffer(&self, handle: u32) -> Option<&[u8]> {
        if self.hide_buffers {
            return None;
        }
        self.lists
            .get(handle as usize)?
            .as_ref()
            .map(|list| list.bytes.as_slice())
    }

    fn buffer_mut(&mut self, handle: u32) -> Option<&mut [u8]> {
        self.lists
            .get_mut(handle as usize)?
            .as_mut()
            .map(|list| list.bytes.as_mut_slice())
    }

    fn append_recorded(
        &mut self,
        handle: u32,
        region: &RecordedRegion,
        state_mask: StateMask,
        mode: AppendMode,
    ) -> Result<(), MockError> {
        self.calls.push(Call::Append {
            handle,
            region: *region,
            state_mask,
            mode,
        });
        Ok(())
    }

    fn delete(&mut self, handle: u32) {
        self.calls.push(Call::Delete(handle));
        if let Some(slot) = self.lists.get_mut(handle as usize) {
            *slot = None;
        }
    }
}

impl Execution for MockLists {
    type Error = MockError;

    fn run(&mut self) -> Result<(), MockError> {
        self.calls.push(Call::Run);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.push(Call::Stop);
        self.running = false;
    }

    fn wait_done(&mut self) {
        self.calls.push(Call::Wait);
        self.running = false;
    }

    fn clear(&mut self) {
        self.calls.push(Call::Clear);
        let list = self.current();
        list.used = 0;
        list.requests = 0;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
