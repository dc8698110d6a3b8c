//! DAQ handlers - list configuration, start/stop and processor queries.

use crate::daq::{DaqList, NO_BIT_OFFSET, StartStopMode, SynchMode};
use crate::events::{XcpEvent, XcpObserver};
use crate::memory::{FlashAccessor, MemoryAccessor};
use crate::protocol::constants::*;
use crate::protocol::{ErrorCode, Frame, Request};
use crate::security::Resource;

use super::{CommandResult, HandlerContext};

/// DAQ_CONFIG_TYPE: dynamic configuration.
const DAQ_PROPERTIES: u8 = 0x01;
/// DAQ_EVENT_PROPERTIES: event channel carries DAQ lists.
const EVENT_PROPERTIES_DAQ: u8 = 0x04;
/// Event cycle time unit: 1 ms.
const EVENT_TIME_UNIT_1MS: u8 = 0x06;
/// Timestamp ticks per unit.
const TIMESTAMP_TICKS: u16 = 1;

// ============================================================================
// Configuration
// ============================================================================

pub fn handle_free_daq<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    ctx.require(Resource::Daq)?;
    let was_running = ctx.state.daq.any_running();
    ctx.state.daq.free();
    if was_running {
        ctx.emit(XcpEvent::DaqStopped { list: None });
    }
    Ok(Frame::positive())
}

/// ALLOC_DAQ - `[op, rsvd, count(2)]`.
pub fn handle_alloc_daq<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let count = req.u16_be(2)?;
    ctx.require(Resource::Daq)?;
    ctx.state.daq.alloc_lists(count as usize)?;
    Ok(Frame::positive())
}

/// ALLOC_ODT - `[op, rsvd, list(2), count]`.
pub fn handle_alloc_odt<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let list = req.u16_be(2)?;
    let count = req.byte(4)?;
    ctx.require(Resource::Daq)?;
    ctx.state.daq.alloc_odts(list as usize, count as usize)?;
    Ok(Frame::positive())
}

/// ALLOC_ODT_ENTRY - `[op, rsvd, list(2), odt, count]`.
pub fn handle_alloc_odt_entry<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let list = req.u16_be(2)?;
    let odt = req.byte(4)?;
    let count = req.byte(5)?;
    ctx.require(Resource::Daq)?;
    ctx.state
        .daq
        .alloc_entries(list as usize, odt as usize, count as usize)?;
    Ok(Frame::positive())
}

/// SET_DAQ_PTR - `[op, rsvd, list(2), odt, entry]`.
pub fn handle_set_daq_ptr<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let list = req.u16_be(2)?;
    let odt = req.byte(4)?;
    let entry = req.byte(5)?;
    ctx.require(Resource::Daq)?;
    ctx.state
        .daq
        .set_pointer(list as usize, odt as usize, entry as usize)?;
    Ok(Frame::positive())
}

/// WRITE_DAQ - `[op, bitOffset, size, ext, addr(4)]`. Bit offsets are
/// accepted but ignored.
pub fn handle_write_daq<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let _bit_offset = req.byte(1)?;
    let size = req.byte(2)?;
    let extension = req.byte(3)?;
    let address = req.u32_be(4)?;
    ctx.require(Resource::Daq)?;
    ctx.state.daq.write_entry(address, size, extension)?;
    Ok(Frame::positive())
}

/// READ_DAQ - entry at the pointer: `[POS, bitOffset, size, ext, addr(4)]`.
pub fn handle_read_daq<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let entry = ctx.state.daq.read_entry()?;
    let mut frame = Frame::positive();
    frame
        .push(NO_BIT_OFFSET)
        .push(entry.size)
        .push(entry.extension)
        .push_u32(entry.address);
    Ok(frame)
}

/// SET_DAQ_LIST_MODE - `[op, mode, list(2), event(2), prescaler, priority]`.
pub fn handle_set_daq_list_mode<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mode = req.byte(1)?;
    let list = req.u16_be(2)?;
    let event = req.u16_be(4)?;
    let prescaler = req.byte(6)?;
    let priority = req.byte(7)?;
    ctx.require(Resource::Daq)?;
    ctx.state
        .daq
        .set_list_mode(list as usize, mode, event, prescaler, priority)?;
    Ok(Frame::positive())
}

/// GET_DAQ_LIST_MODE - `[op, rsvd, list(2)]`.
pub fn handle_get_daq_list_mode<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let list = req.u16_be(2)?;
    let daq = ctx.state.daq.list_mode(list as usize)?;
    let mut frame = Frame::positive();
    frame
        .push(daq.current_mode())
        .push(0x00)
        .push(0x00)
        .push_u16(daq.event_channel)
        .push(daq.prescaler)
        .push(daq.priority);
    Ok(frame)
}

// ============================================================================
// Start / stop
// ============================================================================

/// START_STOP_DAQ_LIST - `[op, mode, list(2)]`, answers the first PID.
pub fn handle_start_stop_daq_list<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mode = req.byte(1)?;
    let list = req.u16_be(2)?;
    let mode = StartStopMode::from_byte(mode).ok_or(ErrorCode::ModeNotValid)?;
    ctx.require(Resource::Daq)?;

    let first_pid = ctx.state.daq.start_stop(list as usize, mode)?;
    match mode {
        StartStopMode::Start => ctx.emit(XcpEvent::DaqStarted { list }),
        StartStopMode::Stop => ctx.emit(XcpEvent::DaqStopped { list: Some(list) }),
        StartStopMode::Select => {}
    }

    let mut frame = Frame::positive();
    frame.push(first_pid);
    Ok(frame)
}

/// START_STOP_SYNCH - `[op, mode]`.
pub fn handle_start_stop_synch<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mode = req.byte(1)?;
    let mode = SynchMode::from_byte(mode).ok_or(ErrorCode::ModeNotValid)?;
    ctx.require(Resource::Daq)?;

    let was_running = ctx.state.daq.any_running();
    ctx.state.daq.start_stop_synch(mode);
    match mode {
        SynchMode::StopAll if was_running => ctx.emit(XcpEvent::DaqStopped { list: None }),
        SynchMode::StartSelected => {
            let started: Vec<u16> = (0..ctx.state.daq.list_count())
                .filter(|&i| ctx.state.daq.list(i).is_some_and(|l| l.running))
                .map(|i| i as u16)
                .collect();
            for list in started {
                ctx.emit(XcpEvent::DaqStarted { list });
            }
        }
        _ => {}
    }
    Ok(Frame::positive())
}

// ============================================================================
// Queries
// ============================================================================

/// GET_DAQ_CLOCK - `[POS, rsvd(3), timestamp(4)]`.
pub fn handle_get_daq_clock<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mut frame = Frame::positive();
    frame
        .push(0x00)
        .push(0x00)
        .push(0x00)
        .push_u32(ctx.clock.timestamp());
    Ok(frame)
}

/// GET_DAQ_PROCESSOR_INFO.
pub fn handle_get_daq_processor_info<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let max_event = ctx.events.len().min(u16::MAX as usize) as u16;
    let mut frame = Frame::positive();
    frame
        .push(DAQ_PROPERTIES)
        .push_u16(MAX_DAQ_LISTS as u16)
        .push_u16(max_event)
        .push(0x00) // MIN_DAQ
        .push(0x00); // DAQ_KEY_BYTE
    Ok(frame)
}

/// GET_DAQ_RESOLUTION_INFO.
pub fn handle_get_daq_resolution_info() -> CommandResult {
    let mut frame = Frame::positive();
    frame
        .push(0x01) // granularity ODT entry DAQ
        .push(MAX_ENTRIES_PER_ODT as u8)
        .push(0x01) // granularity ODT entry STIM
        .push(MAX_ENTRIES_PER_ODT as u8)
        .push(0x00) // timestamp mode
        .push_u16(TIMESTAMP_TICKS);
    Ok(frame)
}

/// GET_DAQ_LIST_INFO - `[op, rsvd, list(2)]`.
pub fn handle_get_daq_list_info<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let list = req.u16_be(2)? as usize;
    if list >= MAX_DAQ_LISTS {
        return Err(ErrorCode::OutOfRange);
    }
    let odt_count = ctx.state.daq.list(list).map_or(0, DaqList::odt_count);

    let mut frame = Frame::positive();
    frame
        .push(0x00) // properties
        .push(odt_count as u8)
        .push(MAX_ENTRIES_PER_ODT as u8)
        .push_u16(0x0000); // fixed event
    Ok(frame)
}

/// GET_DAQ_EVENT_INFO - `[op, rsvd, event(2)]`.
pub fn handle_get_daq_event_info<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let event = req.u16_be(2)?;
    let channel = ctx
        .events
        .iter()
        .find(|c| c.channel == event)
        .ok_or(ErrorCode::OutOfRange)?;
    let cycle = channel.period_ms.min(u8::MAX as u64) as u8;

    let mut frame = Frame::positive();
    frame
        .push(EVENT_PROPERTIES_DAQ)
        .push(MAX_DAQ_LISTS as u8)
        .push(0x00) // name length
        .push(cycle)
        .push(EVENT_TIME_UNIT_1MS)
        .push(0x00); // priority
    Ok(frame)
}
