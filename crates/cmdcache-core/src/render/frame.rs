//! The command list a frame is built in and submitted from.
//!
//! Appended cache recordings land here. [`FrameCommandList::wait`] is the
//! point after which recordings appended in the previous frame may be
//! patched again.

use cmdcache_hal::{CommandList, Execution};

/// A backend providing both recording and submission.
pub trait FrameBackend: CommandList + Execution<Error = <Self as CommandList>::Error> {}

impl<T> FrameBackend for T where T: CommandList + Execution<Error = <T as CommandList>::Error> {}

type FrameResult<B> = Result<(), <B as CommandList>::Error>;

/// Frame command list, generic over the backend list handle `H`.
#[derive(Debug, Clone, Default)]
pub struct FrameCommandList<H> {
    list: Option<H>,
    buffer_size: u32,
    request_capacity: u32,
    /// Run requests as soon as they are split instead of on
    /// [`run`](Self::run).
    serial_run: bool,
}

impl<H: Copy + Eq + core::fmt::Debug> FrameCommandList<H> {
    pub fn new() -> Self {
        Self {
            list: None,
            buffer_size: 0,
            request_capacity: 0,
            serial_run: false,
        }
    }

    pub fn handle(&self) -> Option<H> {
        self.list
    }

    pub fn is_initialized(&self) -> bool {
        self.list.is_some()
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn request_capacity(&self) -> u32 {
        self.request_capacity
    }

    pub fn set_serial_run(&mut self, serial_run: bool) {
        self.serial_run = serial_run;
    }

    fn list(&self) -> H {
        match self.list {
            Some(list) => list,
            None => panic!("frame command list used before initialize()"),
        }
    }

    fn resume<B>(&self, ctx: &mut B) -> FrameResult<B>
    where
        B: FrameBackend<Handle = H>,
    {
        if self.serial_run {
            ctx.run()
        } else {
            ctx.stop();
            Ok(())
        }
    }

    /// Allocate and bind the frame list. Does nothing if already initialized.
    pub fn initialize<B>(
        &mut self,
        ctx: &mut B,
        buffer_size: u32,
        request_capacity: u32,
        serial_run: bool,
    ) -> FrameResult<B>
    where
        B: FrameBackend<Handle = H>,
    {
        if self.list.is_some() {
            return Ok(());
        }

        let list = ctx.create(buffer_size, request_capacity)?;
        ctx.bind(list);

        self.list = Some(list);
        self.buffer_size = buffer_size;
        self.request_capacity = request_capacity;
        self.serial_run = serial_run;

        log::debug!("frame list {list:?}: 0x{buffer_size:X} bytes, {request_capacity} requests");
        self.resume(ctx)
    }

    /// Submit the frame and block until the GPU has consumed it.
    pub fn run<B>(&self, ctx: &mut B) -> FrameResult<B>
    where
        B: FrameBackend<Handle = H>,
    {
        ctx.bind(self.list());
        ctx.split_draw()?;
        ctx.run()?;
        ctx.wait_done();
        Ok(())
    }

    /// Discard the submitted frame and start the next one.
    pub fn swap<B>(&self, ctx: &mut B) -> FrameResult<B>
    where
        B: FrameBackend<Handle = H>,
    {
        self.clear(ctx);
        self.resume(ctx)
    }

    /// Block until the frame has been consumed.
    pub fn wait<B>(&self, ctx: &mut B) -> FrameResult<B>
    where
        B: FrameBackend<Handle = H>,
    {
        ctx.bind(self.list());
        ctx.wait_done();
        self.resume(ctx)
    }

    pub fn clear<B>(&self, ctx: &mut B)
    where
        B: FrameBackend<Handle = H>,
    {
        ctx.bind(self.list());
        ctx.clear();
    }

    /// Release the frame list.
    pub fn finalize<B>(&mut self, ctx: &mut B)
    where
        B: FrameBackend<Handle = H>,
    {
        if let Some(list) = self.list.take() {
            ctx.bind(list);
            ctx.clear();
            ctx.delete(list);
        }
    }
}
