//! Flash programming state machine.
//!
//! ```text
//! Idle --start--> Started --clear--> Cleared --program--> Programming
//!  ^                                                          |
//!  +---------------- program([]) / reset ---------------------+
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::memory::{FlashAccessor, MemoryAccessor};
use crate::mta::MemoryTransfer;
use crate::protocol::ErrorCode;
use crate::protocol::constants::{MAX_SECTORS, PGM_MAX_SIZE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PgmState {
    #[default]
    Idle,
    Started,
    Cleared,
    Programming,
}

impl fmt::Display for PgmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgmState::Idle => write!(f, "IDLE"),
            PgmState::Started => write!(f, "STARTED"),
            PgmState::Cleared => write!(f, "CLEARED"),
            PgmState::Programming => write!(f, "PROGRAMMING"),
        }
    }
}

/// Flash sector as reported by GET_SECTOR_INFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    pub start: u32,
    pub length: u32,
    #[serde(default)]
    pub clear_sequence: u8,
    #[serde(default)]
    pub program_sequence: u8,
    #[serde(default)]
    pub method: u8,
}

/// Two 16 KiB sectors at the bottom of the flash window.
pub fn default_sectors() -> Vec<Sector> {
    vec![
        Sector {
            start: 0x0000_0000,
            length: 0x4000,
            clear_sequence: 0,
            program_sequence: 0,
            method: 0,
        },
        Sector {
            start: 0x0000_4000,
            length: 0x4000,
            clear_sequence: 1,
            program_sequence: 1,
            method: 0,
        },
    ]
}

#[derive(Debug)]
pub struct ProgramSession {
    state: PgmState,
    sectors: Vec<Sector>,
}

impl ProgramSession {
    pub fn new(mut sectors: Vec<Sector>) -> Self {
        if sectors.len() > MAX_SECTORS {
            warn!(
                configured = sectors.len(),
                max = MAX_SECTORS,
                "Too many flash sectors, extra ones ignored"
            );
            sectors.truncate(MAX_SECTORS);
        }
        Self {
            state: PgmState::Idle,
            sectors,
        }
    }

    pub fn state(&self) -> PgmState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != PgmState::Idle
    }

    /// SEQUENCE unless a programming sequence is running.
    pub fn require_active(&self) -> Result<(), ErrorCode> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ErrorCode::Sequence)
        }
    }

    fn goto_state(&mut self, new_state: PgmState) {
        if self.state != new_state {
            info!(from = %self.state, to = %new_state, "Programming state transition");
        }
        self.state = new_state;
    }

    /// PROGRAM_START.
    pub fn start(&mut self) -> Result<(), ErrorCode> {
        if self.is_active() {
            return Err(ErrorCode::PgmActive);
        }
        self.goto_state(PgmState::Started);
        Ok(())
    }

    /// PROGRAM_CLEAR: erase `[address, address + span)`.
    ///
    /// A failed erase leaves the session in Started.
    pub fn clear<F: FlashAccessor + ?Sized>(
        &mut self,
        flash: &mut F,
        address: u32,
        span: u32,
    ) -> Result<(), ErrorCode> {
        if self.state != PgmState::Started {
            return Err(ErrorCode::Sequence);
        }
        if let Err(e) = flash.erase(address, span) {
            warn!(address = format!("0x{:08X}", address), span, error = %e, "Flash erase failed");
            return Err(e.into());
        }
        debug!(address = format!("0x{:08X}", address), span, "Flash cleared");
        self.goto_state(PgmState::Cleared);
        Ok(())
    }

    /// PROGRAM / PROGRAM_NEXT / PROGRAM_MAX.
    ///
    /// Writes `data` at the MTA, mirrors it into `memory` so an UPLOAD
    /// reads it back, and advances the MTA. Empty `data` ends the sequence.
    pub fn program<F, M>(
        &mut self,
        flash: &mut F,
        memory: &mut M,
        transfer: &mut MemoryTransfer,
        data: &[u8],
    ) -> Result<(), ErrorCode>
    where
        F: FlashAccessor + ?Sized,
        M: MemoryAccessor + ?Sized,
    {
        if !matches!(self.state, PgmState::Cleared | PgmState::Programming) {
            return Err(ErrorCode::Sequence);
        }
        if data.len() > PGM_MAX_SIZE {
            return Err(ErrorCode::OutOfRange);
        }
        if data.is_empty() {
            self.goto_state(PgmState::Idle);
            return Ok(());
        }

        let mta = transfer.mta();
        if let Err(e) = flash.write(mta.address, data) {
            warn!(address = format!("0x{:08X}", mta.address), error = %e, "Flash write failed");
            return Err(e.into());
        }
        // Flash regions outside the RAM map have nothing to mirror into.
        if let Err(e) = memory.write(mta.address, mta.extension, data) {
            debug!(error = %e, "Programmed bytes not mirrored to RAM");
        }
        transfer.advance(data.len());
        self.goto_state(PgmState::Programming);
        Ok(())
    }

    /// PROGRAM_VERIFY: compare `expected` against flash at `address`.
    pub fn verify<F: FlashAccessor + ?Sized>(
        &self,
        flash: &F,
        address: u32,
        expected: &[u8],
    ) -> Result<(), ErrorCode> {
        self.require_active()?;
        if flash.verify(address, expected)? {
            Ok(())
        } else {
            debug!(address = format!("0x{:08X}", address), "Flash verify mismatch");
            Err(ErrorCode::Verify)
        }
    }

    /// PROGRAM_RESET or abort.
    pub fn reset(&mut self) {
        self.goto_state(PgmState::Idle);
    }

    /// Sectors visible to GET_PGM_PROCESSOR_INFO; none while Idle.
    pub fn sector_count(&self) -> usize {
        if self.is_active() { self.sectors.len() } else { 0 }
    }

    pub fn sector(&self, index: usize) -> Result<&Sector, ErrorCode> {
        if index >= self.sector_count() {
            return Err(ErrorCode::OutOfRange);
        }
        Ok(&self.sectors[index])
    }
}

impl Default for ProgramSession {
    fn default() -> Self {
        Self::new(default_sectors())
    }
}
