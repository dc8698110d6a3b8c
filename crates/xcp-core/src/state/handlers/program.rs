//! Flash programming handlers (PROGRAM_* and sector queries).

use crate::events::{LogLevel, XcpEvent, XcpObserver};
use crate::memory::{FlashAccessor, MemoryAccessor};
use crate::protocol::constants::*;
use crate::protocol::{ErrorCode, Frame, Request};
use crate::security::Resource;

use super::{CommandResult, HandlerContext};

/// COMM_MODE_PGM: master block mode.
const COMM_MODE_PGM: u8 = 0x01;
/// PGM_PROPERTIES: absolute and functional clear, no compression or encryption.
const PGM_PROPERTIES: u8 = 0x07;
const CLEAR_MODE_ABSOLUTE: u8 = 0x00;
const CLEAR_MODE_FUNCTIONAL: u8 = 0x01;
const VERIFY_MODE_INTERNAL: u8 = 0x00;
const VERIFY_MODE_VALUE: u8 = 0x01;
const SECTOR_INFO_LENGTH: u8 = 0x00;
const SECTOR_INFO_START: u8 = 0x01;

/// PROGRAM_START.
pub fn handle_program_start<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    ctx.require(Resource::Pgm)?;
    ctx.state.program.start()?;

    let mut frame = Frame::positive();
    frame
        .push(0x00)
        .push(COMM_MODE_PGM)
        .push(PGM_MAX_SIZE as u8) // MAX_CTO_PGM
        .push(0x00) // MAX_BS_PGM
        .push(0x01) // MIN_ST_PGM
        .push(0x00) // QUEUE_SIZE_PGM
        .push(0x00);
    Ok(frame)
}

/// PROGRAM_CLEAR - `[op, mode, rsvd, rsvd, span(4)]`, erases from the MTA.
pub fn handle_program_clear<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mode = req.byte(1)?;
    let span = req.u32_be(4)?;
    if !matches!(mode, CLEAR_MODE_ABSOLUTE | CLEAR_MODE_FUNCTIONAL) {
        return Err(ErrorCode::ModeNotValid);
    }
    ctx.require(Resource::Pgm)?;

    let address = ctx.state.transfer.mta().address;
    ctx.state.program.clear(&mut *ctx.flash, address, span)?;
    Ok(Frame::positive())
}

/// PROGRAM / PROGRAM_NEXT - `[op, len, data(len)]`. `len == 0` ends the
/// sequence.
pub fn handle_program<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let len = req.byte(1)? as usize;
    if len > PGM_MAX_SIZE {
        return Err(ErrorCode::OutOfRange);
    }
    let data = req.payload(2, len)?;
    ctx.require(Resource::Pgm)?;
    program_at_mta(ctx, data)
}

/// PROGRAM_MAX - `[op, data(PGM_MAX_SIZE)]`.
pub fn handle_program_max<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let data = req.payload(1, PGM_MAX_SIZE)?;
    ctx.require(Resource::Pgm)?;
    program_at_mta(ctx, data)
}

fn program_at_mta<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
    data: &[u8],
) -> CommandResult {
    let state = &mut *ctx.state;
    state
        .program
        .program(&mut *ctx.flash, &mut *ctx.memory, &mut state.transfer, data)?;
    Ok(Frame::positive())
}

/// PROGRAM_RESET - back to Idle and end the session.
pub fn handle_program_reset<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    ctx.require(Resource::Pgm)?;
    let was_running = ctx.state.daq.any_running();
    ctx.state.end_session();
    ctx.log(LogLevel::Info, "Programming reset, session closed");
    if was_running {
        ctx.emit(XcpEvent::DaqStopped { list: None });
    }
    ctx.emit(XcpEvent::Disconnected);
    Ok(Frame::positive())
}

/// GET_PGM_PROCESSOR_INFO.
pub fn handle_get_pgm_processor_info<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mut frame = Frame::positive();
    frame
        .push(PGM_PROPERTIES)
        .push(ctx.state.program.sector_count() as u8);
    frame.extend_from_slice(&[0u8; 5]);
    Ok(frame)
}

/// GET_SECTOR_INFO - `[op, mode, sector]`.
pub fn handle_get_sector_info<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mode = req.byte(1)?;
    let index = req.byte(2)?;
    let sector = ctx.state.program.sector(index as usize)?;

    let value = match mode {
        SECTOR_INFO_LENGTH => sector.length,
        SECTOR_INFO_START => sector.start,
        _ => return Err(ErrorCode::ModeNotValid),
    };

    let mut frame = Frame::positive();
    frame
        .push(sector.clear_sequence)
        .push(sector.program_sequence)
        .push(sector.method)
        .push_u32(value);
    Ok(frame)
}

/// PROGRAM_PREPARE - `[op, rsvd, codeSize(2)]`. Nothing to download.
pub fn handle_program_prepare<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let code_size = req.u16_be(2)?;
    ctx.require(Resource::Pgm)?;
    ctx.log(
        LogLevel::Debug,
        format!("PROGRAM_PREPARE code size {}", code_size),
    );
    Ok(Frame::positive())
}

/// PROGRAM_FORMAT - `[op, compression, encryption, programming, access]`.
pub fn handle_program_format<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let compression = req.byte(1)?;
    let encryption = req.byte(2)?;
    ctx.require(Resource::Pgm)?;
    if compression != 0 || encryption != 0 {
        return Err(ErrorCode::ModeNotValid);
    }
    Ok(Frame::positive())
}

/// PROGRAM_VERIFY - `[op, mode, rsvd, rsvd, value(4)]`.
pub fn handle_program_verify<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mode = req.byte(1)?;
    let value = match mode {
        VERIFY_MODE_VALUE => Some(req.u32_be(4)?),
        _ => None,
    };
    ctx.require(Resource::Pgm)?;
    ctx.state.program.require_active()?;
    match (mode, value) {
        (VERIFY_MODE_INTERNAL, _) => Ok(Frame::positive()),
        (VERIFY_MODE_VALUE, Some(value)) => {
            let address = ctx.state.transfer.mta().address;
            ctx.state
                .program
                .verify(&*ctx.flash, address, &value.to_be_bytes())?;
            Ok(Frame::positive())
        }
        _ => Err(ErrorCode::ModeNotValid),
    }
}
