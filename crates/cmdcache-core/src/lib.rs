//! Command-stream patch-offset cache.
//!
//! Records a GPU command sequence once, locates the byte offsets of the
//! vertex-shader uniform matrices inside it, and replays it every frame with
//! only those words rewritten.

pub mod cache;
pub mod gpu;
pub mod render;

pub use cache::{CacheConfig, CacheError, CacheState, CommandCache};
pub use render::FrameCommandList;
pub use cmdcache_hal::{AppendMode, CommandList, Execution, RecordedRegion, StateMask};
