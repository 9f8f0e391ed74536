//! Host-side implementation of the command list traits.
//!
//! [`SoftwareCommandLists`](backend::SoftwareCommandLists) keeps command
//! lists in memory and replays them through a
//! [`UniformFile`](executor::UniformFile) that models the vertex shader float
//! uniform registers.

pub mod backend;
pub mod executor;

pub use backend::{ListId, SoftwareCommandLists, SoftwareError};
pub use executor::{DrawSnapshot, UniformFile};
