//! Command handlers - dispatch logic for each XCP command.
//!
//! This module is split into submodules by functionality:
//! - `session`: CONNECT, DISCONNECT, status and identification
//! - `memory`: MTA, upload and download
//! - `daq`: DAQ list configuration and control
//! - `program`: flash programming
//! - `security`: GET_SEED / UNLOCK

mod daq;
mod memory;
mod program;
mod security;
mod session;

use tracing::trace;

use crate::clock::DaqClock;
use crate::events::{LogLevel, XcpEvent, XcpObserver};
use crate::memory::{FlashAccessor, MemoryAccessor};
use crate::protocol::constants::*;
use crate::protocol::{ErrorCode, Frame, Request};
use crate::scheduler::EventChannelConfig;
use crate::security::Resource;
use crate::state::machine::SlaveState;

/// Outcome of one handler: the positive frame, or the error to report.
pub type CommandResult = Result<Frame, ErrorCode>;

/// Handler context containing all resources.
pub struct HandlerContext<'a, M: MemoryAccessor, F: FlashAccessor, O: XcpObserver> {
    pub state: &'a mut SlaveState,
    pub memory: &'a mut M,
    pub flash: &'a mut F,
    pub clock: &'a dyn DaqClock,
    pub observer: &'a O,
    /// Configured DAQ event channels.
    pub events: &'a [EventChannelConfig],
}

impl<'a, M: MemoryAccessor, F: FlashAccessor, O: XcpObserver> HandlerContext<'a, M, F, O> {
    pub(crate) fn emit(&self, event: XcpEvent) {
        self.observer.on_event(&event);
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(XcpEvent::Log {
            level,
            message: message.into(),
        });
    }

    /// `AccessLocked` unless `resource` may be used.
    pub(crate) fn require(&self, resource: Resource) -> Result<(), ErrorCode> {
        if self.state.security.is_unlocked(resource) {
            Ok(())
        } else {
            Err(ErrorCode::AccessLocked)
        }
    }

    fn reject(&self, opcode: u8, error: ErrorCode) -> Frame {
        self.emit(XcpEvent::CommandRejected {
            opcode,
            command: command_name(opcode),
            error,
        });
        Frame::error(error)
    }
}

/// Process one command and produce exactly one response frame.
pub fn handle_command<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> Frame {
    let opcode = req.opcode();
    trace!(command = command_name(opcode), len = req.len(), "Dispatch");

    // Only CONNECT works without a session
    if opcode != CMD_CONNECT && !ctx.state.connected {
        return ctx.reject(opcode, ErrorCode::Sequence);
    }

    let pgm_before = ctx.state.program.state();

    let result = match opcode {
        CMD_CONNECT => session::handle_connect(req, ctx),
        CMD_DISCONNECT => session::handle_disconnect(ctx),
        CMD_GET_STATUS => session::handle_get_status(ctx),
        CMD_SYNCH => session::handle_synch(),
        CMD_GET_COMM_MODE_INFO => session::handle_get_comm_mode_info(),
        CMD_GET_ID => session::handle_get_id(req),

        CMD_GET_SEED => security::handle_get_seed(req, ctx),
        CMD_UNLOCK => security::handle_unlock(req, ctx),

        CMD_SET_MTA => memory::handle_set_mta(req, ctx),
        CMD_UPLOAD => memory::handle_upload(req, ctx),
        CMD_SHORT_UPLOAD => memory::handle_short_upload(req, ctx),
        CMD_DOWNLOAD => memory::handle_download(req, ctx),
        CMD_DOWNLOAD_MAX => memory::handle_download_max(req, ctx),
        CMD_SHORT_DOWNLOAD => memory::handle_short_download(),

        CMD_FREE_DAQ => daq::handle_free_daq(ctx),
        CMD_ALLOC_DAQ => daq::handle_alloc_daq(req, ctx),
        CMD_ALLOC_ODT => daq::handle_alloc_odt(req, ctx),
        CMD_ALLOC_ODT_ENTRY => daq::handle_alloc_odt_entry(req, ctx),
        CMD_SET_DAQ_PTR => daq::handle_set_daq_ptr(req, ctx),
        CMD_WRITE_DAQ => daq::handle_write_daq(req, ctx),
        CMD_READ_DAQ => daq::handle_read_daq(ctx),
        CMD_SET_DAQ_LIST_MODE => daq::handle_set_daq_list_mode(req, ctx),
        CMD_GET_DAQ_LIST_MODE => daq::handle_get_daq_list_mode(req, ctx),
        CMD_START_STOP_DAQ_LIST => daq::handle_start_stop_daq_list(req, ctx),
        CMD_START_STOP_SYNCH => daq::handle_start_stop_synch(req, ctx),
        CMD_GET_DAQ_CLOCK => daq::handle_get_daq_clock(ctx),
        CMD_GET_DAQ_PROCESSOR_INFO => daq::handle_get_daq_processor_info(ctx),
        CMD_GET_DAQ_RESOLUTION_INFO => daq::handle_get_daq_resolution_info(),
        CMD_GET_DAQ_LIST_INFO => daq::handle_get_daq_list_info(req, ctx),
        CMD_GET_DAQ_EVENT_INFO => daq::handle_get_daq_event_info(req, ctx),

        CMD_PROGRAM_START => program::handle_program_start(ctx),
        CMD_PROGRAM_CLEAR => program::handle_program_clear(req, ctx),
        CMD_PROGRAM | CMD_PROGRAM_NEXT => program::handle_program(req, ctx),
        CMD_PROGRAM_MAX => program::handle_program_max(req, ctx),
        CMD_PROGRAM_RESET => program::handle_program_reset(ctx),
        CMD_GET_PGM_PROCESSOR_INFO => program::handle_get_pgm_processor_info(ctx),
        CMD_GET_SECTOR_INFO => program::handle_get_sector_info(req, ctx),
        CMD_PROGRAM_PREPARE => program::handle_program_prepare(req, ctx),
        CMD_PROGRAM_FORMAT => program::handle_program_format(req, ctx),
        CMD_PROGRAM_VERIFY => program::handle_program_verify(req, ctx),

        _ => Err(ErrorCode::CmdUnknown),
    };

    let pgm_after = ctx.state.program.state();
    if pgm_after != pgm_before {
        ctx.emit(XcpEvent::ProgramStateChanged {
            from: pgm_before,
            to: pgm_after,
        });
    }

    match result {
        Ok(frame) => frame,
        Err(error) => ctx.reject(opcode, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::events::RecordingObserver;
    use crate::memory::{RamMemory, SimFlash};
    use crate::program::PgmState;
    use crate::scheduler::default_event_channels;
    use crate::security::{SecurityConfig, compute_key};

    pub(super) struct Harness {
        pub state: SlaveState,
        pub ram: RamMemory,
        pub flash: SimFlash,
        pub clock: FixedClock,
        pub observer: RecordingObserver,
        pub events: Vec<EventChannelConfig>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_security(SecurityConfig {
                rng_seed: Some(3),
                ..Default::default()
            })
        }

        pub fn with_security(security: SecurityConfig) -> Self {
            Self {
                state: SlaveState::new(security, crate::program::default_sectors()),
                ram: RamMemory::new(0, 0x1_0000),
                flash: SimFlash::new(0, 0x1_0000),
                clock: FixedClock::new(0x0102_0304),
                observer: RecordingObserver::new(),
                events: default_event_channels(),
            }
        }

        pub fn send(&mut self, bytes: &[u8]) -> Vec<u8> {
            let req = Request::new(bytes).unwrap();
            let mut ctx = HandlerContext {
                state: &mut self.state,
                memory: &mut self.ram,
                flash: &mut self.flash,
                clock: &self.clock,
                observer: &self.observer,
                events: &self.events,
            };
            handle_command(&req, &mut ctx).as_bytes().to_vec()
        }

        pub fn connected() -> Self {
            let mut h = Self::new();
            assert_eq!(h.send(&[CMD_CONNECT, 0])[0], PID_RES);
            h
        }
    }

    #[test]
    fn test_sequence_before_connect() {
        let mut h = Harness::new();
        assert_eq!(h.send(&[CMD_GET_STATUS]), vec![PID_ERR, ERR_SEQUENCE]);
        assert_eq!(h.send(&[CMD_UPLOAD, 1]), vec![PID_ERR, ERR_SEQUENCE]);
        assert!(matches!(
            h.observer.events()[0],
            XcpEvent::CommandRejected {
                error: ErrorCode::Sequence,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_command() {
        let mut h = Harness::connected();
        assert_eq!(h.send(&[0x42]), vec![PID_ERR, ERR_CMD_UNKNOWN]);
        assert_eq!(h.send(&[CMD_BUILD_CHECKSUM]), vec![PID_ERR, ERR_CMD_UNKNOWN]);
    }

    #[test]
    fn test_short_frame_is_syntax_error() {
        let mut h = Harness::connected();
        assert_eq!(h.send(&[CMD_SET_MTA, 0, 0]), vec![PID_ERR, ERR_CMD_SYNTAX]);
        assert_eq!(h.state.transfer.mta().address, 0);
    }

    #[test]
    fn test_program_state_event() {
        let mut h = Harness::connected();
        h.send(&[CMD_PROGRAM_START]);
        assert!(h.observer.events().contains(&XcpEvent::ProgramStateChanged {
            from: PgmState::Idle,
            to: PgmState::Started,
        }));
    }

    #[test]
    fn test_locked_resources_are_gated() {
        let mut h = Harness::with_security(SecurityConfig {
            enabled: true,
            protect_cal: true,
            protect_daq: true,
            protect_stim: false,
            protect_pgm: true,
            secret_key: 0x0BAD_CAFE,
            rng_seed: Some(9),
        });
        h.send(&[CMD_CONNECT, 0]);

        assert_eq!(h.send(&[CMD_DOWNLOAD, 1, 0xAA]), vec![PID_ERR, ERR_ACCESS_LOCKED]);
        assert_eq!(h.send(&[CMD_ALLOC_DAQ, 0, 0, 1]), vec![PID_ERR, ERR_ACCESS_LOCKED]);
        assert_eq!(h.send(&[CMD_PROGRAM_START]), vec![PID_ERR, ERR_ACCESS_LOCKED]);
        // Malformed frames are rejected before the lock is consulted.
        assert_eq!(h.send(&[CMD_PROGRAM_VERIFY, 1, 0]), vec![PID_ERR, ERR_CMD_SYNTAX]);
        assert_eq!(h.send(&[CMD_PROGRAM_VERIFY, 0]), vec![PID_ERR, ERR_ACCESS_LOCKED]);
        // Reads are never gated.
        assert_eq!(h.send(&[CMD_UPLOAD, 1]), vec![PID_RES, 0x00]);

        let seed = h.send(&[CMD_GET_SEED, 0, 0]);
        assert_eq!(seed[1], 4);
        let key = compute_key(&seed[2..6], 0x0BAD_CAFE);
        let mut unlock = vec![CMD_UNLOCK, 4];
        unlock.extend_from_slice(&key);
        assert_eq!(h.send(&unlock), vec![PID_RES]);

        assert_eq!(h.send(&[CMD_DOWNLOAD, 1, 0xAA]), vec![PID_RES]);
        assert_eq!(h.send(&[CMD_PROGRAM_START])[0], PID_ERR);
    }
}
