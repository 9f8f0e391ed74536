//! Human-readable summaries of cache and command list state.

use core::fmt;

use cmdcache_hal::{AppendMode, CommandList, RecordedRegion};

use super::CacheState;

/// Snapshot of a [`CommandCache`](super::CommandCache), printed one field
/// per line.
#[derive(Debug, Clone, Copy)]
pub struct CacheReport<'a, H> {
    pub state: CacheState,
    pub list: Option<&'a H>,
    pub append_mode: AppendMode,
    pub region: RecordedRegion,
    pub model_cursor: usize,
    pub model_count: usize,
}

impl<H: fmt::Debug> CacheReport<'_, H> {
    /// Emit the report at info level.
    pub fn log(&self) {
        for line in self.to_string().lines() {
            log::info!("{line}");
        }
    }
}

impl<H: fmt::Debug> fmt::Display for CacheReport<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CommandCache : State = {}", self.state)?;
        match self.list {
            Some(list) => writeln!(f, "  commandList    = {list:?}")?,
            None => writeln!(f, "  commandList    = none")?,
        }
        match self.append_mode {
            AppendMode::Copy => writeln!(f, "  Copy command buffer")?,
            AppendMode::Reference => writeln!(f, "  Refer command buffer")?,
        }
        writeln!(
            f,
            "  bufferOffset   = {}, bufferSize  = {}",
            self.region.byte_offset, self.region.byte_size
        )?;
        writeln!(
            f,
            "  requestBeginId = {}, requestSize = {}",
            self.region.request_begin_id, self.region.request_count
        )?;
        write!(
            f,
            "  modelIndex = {}, totalModelNum = {}",
            self.model_cursor, self.model_count
        )
    }
}

/// Usage of the bound command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandListUsage {
    pub used_bytes: u32,
    pub max_bytes: u32,
    pub used_requests: u32,
    pub max_requests: u32,
}

impl CommandListUsage {
    /// Query the list bound in `ctx`.
    pub fn current<B: CommandList>(ctx: &B) -> Self {
        Self {
            used_bytes: ctx.used_byte_count(),
            max_bytes: ctx.max_byte_count(),
            used_requests: ctx.used_request_count(),
            max_requests: ctx.max_request_count(),
        }
    }

    pub fn log(&self) {
        log::info!("{self}");
    }
}

impl fmt::Display for CommandListUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command list: bufferSize = {}/{}, reqCount = {}/{}",
            self.used_bytes, self.max_bytes, self.used_requests, self.max_requests
        )
    }
}
