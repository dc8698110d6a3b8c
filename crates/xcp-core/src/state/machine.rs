//! Session-scoped slave state.

use tracing::info;

use crate::daq::DaqEngine;
use crate::mta::MemoryTransfer;
use crate::program::{ProgramSession, Sector};
use crate::protocol::constants::SESSION_STATUS_DAQ_RUNNING;
use crate::security::{Security, SecurityConfig};

/// Everything the dispatcher owns between commands.
pub struct SlaveState {
    pub connected: bool,
    pub transfer: MemoryTransfer,
    pub daq: DaqEngine,
    pub program: ProgramSession,
    pub security: Security,
}

impl SlaveState {
    pub fn new(security: SecurityConfig, sectors: Vec<Sector>) -> Self {
        Self {
            connected: false,
            transfer: MemoryTransfer::new(),
            daq: DaqEngine::new(),
            program: ProgramSession::new(sectors),
            security: Security::new(security),
        }
    }

    /// Start a session (CONNECT). Programming always restarts from Idle.
    pub fn begin_session(&mut self) {
        self.connected = true;
        self.program.reset();
    }

    /// End the session: DISCONNECT, PROGRAM_RESET or transport loss.
    ///
    /// Running DAQ lists stop, security re-locks, programming returns to
    /// Idle and the MTA is cleared. The DAQ configuration itself survives.
    pub fn end_session(&mut self) {
        if self.connected {
            info!("XCP session ended");
        }
        self.connected = false;
        self.daq.stop_all();
        self.security.reset();
        self.program.reset();
        self.transfer.reset();
    }

    /// GET_STATUS session status byte.
    pub fn session_status(&self) -> u8 {
        if self.daq.any_running() {
            SESSION_STATUS_DAQ_RUNNING
        } else {
            0
        }
    }
}

impl Default for SlaveState {
    fn default() -> Self {
        Self::new(SecurityConfig::default(), crate::program::default_sectors())
    }
}
