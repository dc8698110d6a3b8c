//! Memory Transfer Address engine.
//!
//! The MTA is the implicit cursor used by UPLOAD, DOWNLOAD and PROGRAM.
//! Every successful transfer advances it by the number of bytes moved.

use crate::memory::MemoryAccessor;
use crate::protocol::ErrorCode;
use crate::protocol::constants::MAX_CTO;

/// Largest UPLOAD: everything after the PID byte of the response.
pub const MAX_UPLOAD: usize = MAX_CTO - 1;
/// Largest DOWNLOAD: everything after opcode and count bytes.
pub const MAX_DOWNLOAD: usize = MAX_CTO - 2;
/// DOWNLOAD_MAX carries a full frame minus the opcode.
pub const DOWNLOAD_MAX_SIZE: usize = MAX_CTO - 1;

/// Address plus extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mta {
    pub address: u32,
    pub extension: u8,
}

impl Mta {
    pub fn new(address: u32, extension: u8) -> Self {
        Self { address, extension }
    }
}

/// Holds the MTA and moves bytes through a `MemoryAccessor`.
#[derive(Debug, Default)]
pub struct MemoryTransfer {
    mta: Mta,
}

impl MemoryTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mta(&self) -> Mta {
        self.mta
    }

    /// Unconditional; the memory map is trusted.
    pub fn set_mta(&mut self, address: u32, extension: u8) {
        self.mta = Mta::new(address, extension);
    }

    pub fn reset(&mut self) {
        self.mta = Mta::default();
    }

    pub fn advance(&mut self, count: usize) {
        self.mta.address = self.mta.address.wrapping_add(count as u32);
    }

    /// Read `count` bytes at the MTA and advance it.
    ///
    /// The MTA is left untouched if the read fails.
    pub fn upload<M: MemoryAccessor + ?Sized>(
        &mut self,
        memory: &M,
        count: usize,
    ) -> Result<Vec<u8>, ErrorCode> {
        if count > MAX_UPLOAD {
            return Err(ErrorCode::OutOfRange);
        }
        let mut buf = vec![0u8; count];
        if count > 0 {
            memory.read(self.mta.address, self.mta.extension, &mut buf)?;
        }
        self.advance(count);
        Ok(buf)
    }

    /// Read at an explicit address, then leave the MTA just past it.
    pub fn short_upload<M: MemoryAccessor + ?Sized>(
        &mut self,
        memory: &M,
        address: u32,
        extension: u8,
        count: usize,
    ) -> Result<Vec<u8>, ErrorCode> {
        if count > MAX_UPLOAD {
            return Err(ErrorCode::OutOfRange);
        }
        let mut buf = vec![0u8; count];
        if count > 0 {
            memory.read(address, extension, &mut buf)?;
        }
        self.mta = Mta::new(address.wrapping_add(count as u32), extension);
        Ok(buf)
    }

    /// Write `data` at the MTA and advance it.
    pub fn download<M: MemoryAccessor + ?Sized>(
        &mut self,
        memory: &mut M,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        if data.len() > MAX_DOWNLOAD {
            return Err(ErrorCode::OutOfRange);
        }
        self.write(memory, data)
    }

    /// DOWNLOAD_MAX variant: exactly `DOWNLOAD_MAX_SIZE` bytes.
    pub fn download_max<M: MemoryAccessor + ?Sized>(
        &mut self,
        memory: &mut M,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        if data.len() != DOWNLOAD_MAX_SIZE {
            return Err(ErrorCode::CmdSyntax);
        }
        self.write(memory, data)
    }

    fn write<M: MemoryAccessor + ?Sized>(
        &mut self,
        memory: &mut M,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        if !data.is_empty() {
            memory.write(self.mta.address, self.mta.extension, data)?;
        }
        self.advance(data.len());
        Ok(())
    }
}
