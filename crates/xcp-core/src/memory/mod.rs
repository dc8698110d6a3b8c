//! Memory accessor module.

pub mod sim;
pub mod traits;

pub use sim::{RamMemory, SimFlash};
pub use traits::{FlashAccessor, FlashError, MemoryAccessor, MemoryError};
