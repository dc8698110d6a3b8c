//! Session handlers (CONNECT, DISCONNECT, status, identification).

use crate::events::{XcpEvent, XcpObserver};
use crate::memory::{FlashAccessor, MemoryAccessor};
use crate::protocol::constants::*;
use crate::protocol::{ErrorCode, Frame, Request};

use super::{CommandResult, HandlerContext};

/// Resources this slave implements (CONNECT byte 1).
const AVAILABLE_RESOURCES: u8 = RESOURCE_CAL_PAG | RESOURCE_DAQ | RESOURCE_PGM;
/// COMM_MODE_BASIC: no optional modes advertised.
const COMM_MODE_BASIC: u8 = 0x00;
const DRIVER_VERSION: u8 = 0x01;

/// CONNECT - start a session and report capabilities.
pub fn handle_connect<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mode = req.byte(1)?;

    ctx.state.begin_session();
    ctx.emit(XcpEvent::Connected { mode });

    let mut frame = Frame::positive();
    frame
        .push(AVAILABLE_RESOURCES)
        .push(COMM_MODE_BASIC)
        .push(MAX_CTO as u8)
        .push_u16(MAX_DTO as u16)
        .push(PROTOCOL_VERSION)
        .push(TRANSPORT_VERSION);
    Ok(frame)
}

/// DISCONNECT - end the session and stop DAQ.
pub fn handle_disconnect<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let was_running = ctx.state.daq.any_running();
    ctx.state.end_session();
    if was_running {
        ctx.emit(XcpEvent::DaqStopped { list: None });
    }
    ctx.emit(XcpEvent::Disconnected);
    Ok(Frame::positive())
}

/// GET_STATUS - session status and locked resources.
pub fn handle_get_status<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mut frame = Frame::positive();
    frame
        .push(ctx.state.session_status())
        .push(ctx.state.security.protection().bits())
        .push(0x00)
        .push_u16(0x0000);
    Ok(frame)
}

/// SYNCH - the defined reply is ERR_CMD_SYNCH.
pub fn handle_synch() -> CommandResult {
    Ok(Frame::error(ErrorCode::CmdSynch))
}

/// GET_COMM_MODE_INFO.
pub fn handle_get_comm_mode_info() -> CommandResult {
    let mut frame = Frame::positive();
    frame
        .push(0x00)
        .push(0x00) // COMM_MODE_OPTIONAL
        .push(0x00)
        .push((MAX_CTO - 1) as u8) // MAX_BS
        .push(0x00) // MIN_ST
        .push(0x01) // QUEUE_SIZE
        .push(DRIVER_VERSION);
    Ok(frame)
}

/// GET_ID - no identification strings are published.
pub fn handle_get_id(req: &Request<'_>) -> CommandResult {
    let _id_type = req.byte(1)?;
    let mut frame = Frame::positive();
    frame.push(0x00).push(0x00).push(0x00).push_u32(0);
    Ok(frame)
}
