//! Per-frame command submission.

pub mod frame;

pub use frame::{FrameBackend, FrameCommandList};
