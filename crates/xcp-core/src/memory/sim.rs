//! In-memory accessor implementations.
//!
//! Used by the host runner and by tests.

use super::traits::{FlashAccessor, FlashError, MemoryAccessor, MemoryError};

const ERASED: u8 = 0xFF;

/// Flat RAM window `[base, base + size)`. The address extension is ignored.
#[derive(Debug, Clone)]
pub struct RamMemory {
    base: u32,
    data: Vec<u8>,
}

impl RamMemory {
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    /// RAM initialised from an image. The image is padded with zeros up to
    /// `size` or truncated to it.
    pub fn from_image(base: u32, size: usize, image: &[u8]) -> Self {
        let mut data = image.to_vec();
        data.resize(size, 0);
        Self { base, data }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, address: u32, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let oob = MemoryError::OutOfBounds { address, len };
        let offset = address.checked_sub(self.base).ok_or(oob.clone())? as usize;
        let end = offset.checked_add(len).ok_or(oob.clone())?;
        if end > self.data.len() {
            return Err(oob);
        }
        Ok(offset..end)
    }
}

impl MemoryAccessor for RamMemory {
    fn read(&self, address: u32, _extension: u8, buf: &mut [u8]) -> Result<(), MemoryError> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, address: u32, _extension: u8, data: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(address, data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}

/// Simulated NOR flash: erased cells read 0xFF and may only be programmed
/// once between erases.
#[derive(Debug, Clone)]
pub struct SimFlash {
    base: u32,
    data: Vec<u8>,
    fail_erase: bool,
    fail_write: bool,
}

impl SimFlash {
    /// Fully erased flash at `[base, base + size)`.
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![ERASED; size],
            fail_erase: false,
            fail_write: false,
        }
    }

    /// Make every subsequent erase fail.
    pub fn set_fail_erase(&mut self, fail: bool) {
        self.fail_erase = fail;
    }

    /// Make every subsequent write fail.
    pub fn set_fail_write(&mut self, fail: bool) {
        self.fail_write = fail;
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Bytes at `address`, if in range.
    pub fn slice(&self, address: u32, len: usize) -> Option<&[u8]> {
        let range = self.range(address, len).ok()?;
        Some(&self.data[range])
    }

    fn range(&self, address: u32, len: usize) -> Result<std::ops::Range<usize>, FlashError> {
        let oob = FlashError::OutOfBounds { address, len };
        let offset = address.checked_sub(self.base).ok_or(oob.clone())? as usize;
        let end = offset.checked_add(len).ok_or(oob.clone())?;
        if end > self.data.len() {
            return Err(oob);
        }
        Ok(offset..end)
    }
}

impl FlashAccessor for SimFlash {
    fn erase(&mut self, address: u32, len: u32) -> Result<(), FlashError> {
        if self.fail_erase {
            return Err(FlashError::EraseFailed { address });
        }
        let range = self.range(address, len as usize)?;
        self.data[range].fill(ERASED);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        if self.fail_write {
            return Err(FlashError::WriteFailed { address });
        }
        let range = self.range(address, data.len())?;
        if let Some(pos) = self.data[range.clone()].iter().position(|&b| b != ERASED) {
            return Err(FlashError::NotErased {
                address: address.wrapping_add(pos as u32),
            });
        }
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    fn verify(&self, address: u32, expected: &[u8]) -> Result<bool, FlashError> {
        let range = self.range(address, expected.len())?;
        Ok(&self.data[range] == expected)
    }
}
