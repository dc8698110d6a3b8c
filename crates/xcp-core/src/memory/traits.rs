//! Memory and flash accessor abstractions.
//!
//! The engine never touches hardware directly. Measurement and calibration
//! access goes through `MemoryAccessor`; the programming workflow goes
//! through `FlashAccessor`. Target builds provide their own implementations,
//! tests use the in-memory ones from `sim`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Access out of bounds: address=0x{address:08X} len={len}")]
    OutOfBounds { address: u32, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlashError {
    #[error("Flash access out of bounds: address=0x{address:08X} len={len}")]
    OutOfBounds { address: u32, len: usize },

    #[error("Erase failed at 0x{address:08X}")]
    EraseFailed { address: u32 },

    #[error("Write failed at 0x{address:08X}")]
    WriteFailed { address: u32 },

    #[error("Target not erased at 0x{address:08X}")]
    NotErased { address: u32 },
}

/// Byte-addressable access to the controller's memory map.
pub trait MemoryAccessor: Send {
    /// Fill `buf` from `address`.
    fn read(&self, address: u32, extension: u8, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Store `data` at `address`.
    fn write(&mut self, address: u32, extension: u8, data: &[u8]) -> Result<(), MemoryError>;
}

/// Block-oriented non-volatile storage.
pub trait FlashAccessor: Send {
    /// Erase `len` bytes starting at `address`.
    fn erase(&mut self, address: u32, len: u32) -> Result<(), FlashError>;

    /// Program `data` at `address`. The target must be erased.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Compare flash contents at `address` against `expected`.
    fn verify(&self, address: u32, expected: &[u8]) -> Result<bool, FlashError>;
}
