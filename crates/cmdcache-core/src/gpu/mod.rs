pub mod command;
pub mod encode;
pub mod registers;

pub use command::{CommandHeader, CommandIter, RawCommand, RegisterWrite};
pub use encode::CommandEncoder;
pub use registers::UniformWindow;
