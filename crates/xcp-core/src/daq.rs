//! DAQ engine: list/ODT/entry configuration and packet emission.
//!
//! Storage is fixed-capacity. Allocation commands only move the "used"
//! counts, and every index is checked against those counts before any
//! mutation.

use std::fmt;

use tracing::{debug, warn};

use crate::memory::MemoryAccessor;
use crate::protocol::constants::*;
use crate::protocol::{ErrorCode, Frame};

/// GET_DAQ_LIST_MODE bit: list is running.
pub const DAQ_MODE_RUNNING: u8 = 0x40;
/// Marker returned by READ_DAQ for "no bit mask".
pub const NO_BIT_OFFSET: u8 = 0xFF;

/// One measurement location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OdtEntry {
    pub address: u32,
    pub size: u8,
    pub extension: u8,
}

/// Object descriptor table: entries sent together in one DAQ packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Odt {
    entries: [OdtEntry; MAX_ENTRIES_PER_ODT],
    entry_count: usize,
}

impl Odt {
    pub fn entries(&self) -> &[OdtEntry] {
        &self.entries[..self.entry_count]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DaqList {
    odts: [Odt; MAX_ODT_PER_LIST],
    odt_count: usize,
    pub mode: u8,
    pub event_channel: u16,
    pub prescaler: u8,
    pub priority: u8,
    pub running: bool,
}

impl DaqList {
    pub fn odts(&self) -> &[Odt] {
        &self.odts[..self.odt_count]
    }

    pub fn odt_count(&self) -> usize {
        self.odt_count
    }

    pub fn is_configured(&self) -> bool {
        self.odt_count > 0
    }

    /// Mode byte as reported by GET_DAQ_LIST_MODE.
    pub fn current_mode(&self) -> u8 {
        if self.running {
            self.mode | DAQ_MODE_RUNNING
        } else {
            self.mode & !DAQ_MODE_RUNNING
        }
    }

    /// PID of this list's first ODT in DAQ packets.
    pub fn first_pid(index: usize) -> u8 {
        (index * MAX_ODT_PER_LIST) as u8
    }
}

/// Write pointer used by WRITE_DAQ and READ_DAQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqPointer {
    pub list: usize,
    pub odt: usize,
    pub entry: usize,
}

/// START_STOP_DAQ_LIST mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStopMode {
    Stop,
    Start,
    Select,
}

impl StartStopMode {
    pub fn from_byte(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::Stop),
            1 => Some(Self::Start),
            2 => Some(Self::Select),
            _ => None,
        }
    }
}

/// START_STOP_SYNCH mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchMode {
    StopAll,
    StartSelected,
    StopSelected,
}

impl SynchMode {
    pub fn from_byte(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::StopAll),
            1 => Some(Self::StartSelected),
            2 => Some(Self::StopSelected),
            _ => None,
        }
    }
}

impl fmt::Display for StartStopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartStopMode::Stop => write!(f, "STOP"),
            StartStopMode::Start => write!(f, "START"),
            StartStopMode::Select => write!(f, "SELECT"),
        }
    }
}

#[derive(Debug, Default)]
pub struct DaqEngine {
    lists: [DaqList; MAX_DAQ_LISTS],
    list_count: usize,
    pointer: Option<DaqPointer>,
}

impl DaqEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// FREE_DAQ: drop every list, ODT and entry.
    pub fn free(&mut self) {
        *self = Self::default();
    }

    pub fn list_count(&self) -> usize {
        self.list_count
    }

    pub fn list(&self, index: usize) -> Option<&DaqList> {
        self.lists[..self.list_count].get(index)
    }

    pub fn pointer(&self) -> Option<DaqPointer> {
        self.pointer
    }

    pub fn alloc_lists(&mut self, count: usize) -> Result<(), ErrorCode> {
        if count > MAX_DAQ_LISTS {
            return Err(ErrorCode::MemoryOverflow);
        }
        self.lists = Default::default();
        self.list_count = count;
        self.pointer = None;
        debug!(count, "DAQ lists allocated");
        Ok(())
    }

    pub fn alloc_odts(&mut self, list: usize, count: usize) -> Result<(), ErrorCode> {
        if list >= self.list_count {
            return Err(ErrorCode::OutOfRange);
        }
        if count > MAX_ODT_PER_LIST {
            return Err(ErrorCode::MemoryOverflow);
        }
        let daq = &mut self.lists[list];
        daq.odts = Default::default();
        daq.odt_count = count;
        self.pointer = None;
        debug!(list, count, "ODTs allocated");
        Ok(())
    }

    pub fn alloc_entries(&mut self, list: usize, odt: usize, count: usize) -> Result<(), ErrorCode> {
        if list >= self.list_count || odt >= self.lists[list].odt_count {
            return Err(ErrorCode::OutOfRange);
        }
        if count > MAX_ENTRIES_PER_ODT {
            return Err(ErrorCode::MemoryOverflow);
        }
        let table = &mut self.lists[list].odts[odt];
        table.entries = Default::default();
        table.entry_count = count;
        self.pointer = None;
        debug!(list, odt, count, "ODT entries allocated");
        Ok(())
    }

    /// SET_DAQ_PTR. All three indices must refer to allocated slots.
    pub fn set_pointer(&mut self, list: usize, odt: usize, entry: usize) -> Result<(), ErrorCode> {
        let valid = list < self.list_count
            && odt < self.lists[list].odt_count
            && entry < self.lists[list].odts[odt].entry_count;
        if !valid {
            return Err(ErrorCode::OutOfRange);
        }
        self.pointer = Some(DaqPointer { list, odt, entry });
        Ok(())
    }

    /// WRITE_DAQ: store at the pointer, then advance it.
    pub fn write_entry(&mut self, address: u32, size: u8, extension: u8) -> Result<(), ErrorCode> {
        let ptr = self.pointer.ok_or(ErrorCode::Sequence)?;
        if size as usize > MAX_DTO - 1 {
            return Err(ErrorCode::OutOfRange);
        }
        self.lists[ptr.list].odts[ptr.odt].entries[ptr.entry] = OdtEntry {
            address,
            size,
            extension,
        };
        self.advance_pointer(ptr);
        Ok(())
    }

    /// READ_DAQ: return the entry at the pointer, then advance it.
    pub fn read_entry(&mut self) -> Result<OdtEntry, ErrorCode> {
        let ptr = self.pointer.ok_or(ErrorCode::Sequence)?;
        let entry = self.lists[ptr.list].odts[ptr.odt].entries[ptr.entry];
        self.advance_pointer(ptr);
        Ok(entry)
    }

    /// Next entry; past the last entry go to the next ODT, past the last
    /// ODT wrap to ODT 0 of the same list. ODTs without entries are
    /// skipped.
    fn advance_pointer(&mut self, mut ptr: DaqPointer) {
        let list = &self.lists[ptr.list];
        ptr.entry += 1;
        if ptr.entry >= list.odts[ptr.odt].entry_count {
            ptr.entry = 0;
            // The current ODT has entries, so this terminates.
            loop {
                ptr.odt = (ptr.odt + 1) % list.odt_count;
                if list.odts[ptr.odt].entry_count > 0 {
                    break;
                }
            }
        }
        self.pointer = Some(ptr);
    }

    pub fn set_list_mode(
        &mut self,
        list: usize,
        mode: u8,
        event_channel: u16,
        prescaler: u8,
        priority: u8,
    ) -> Result<(), ErrorCode> {
        let daq = self.lists[..self.list_count]
            .get_mut(list)
            .ok_or(ErrorCode::OutOfRange)?;
        daq.mode = mode;
        daq.event_channel = event_channel;
        daq.prescaler = prescaler;
        daq.priority = priority;
        Ok(())
    }

    /// Allocated list by index, for GET_DAQ_LIST_MODE.
    pub fn list_mode(&self, list: usize) -> Result<&DaqList, ErrorCode> {
        self.list(list).ok_or(ErrorCode::OutOfRange)
    }

    /// START_STOP_DAQ_LIST. Returns the list's first PID.
    pub fn start_stop(&mut self, list: usize, mode: StartStopMode) -> Result<u8, ErrorCode> {
        let daq = self.lists[..self.list_count]
            .get_mut(list)
            .ok_or(ErrorCode::OutOfRange)?;
        match mode {
            StartStopMode::Stop => daq.running = false,
            StartStopMode::Start => daq.running = true,
            StartStopMode::Select => {}
        }
        debug!(list, mode = %mode, "DAQ list start/stop");
        Ok(DaqList::first_pid(list))
    }

    /// START_STOP_SYNCH.
    pub fn start_stop_synch(&mut self, mode: SynchMode) {
        match mode {
            SynchMode::StopAll => self.stop_all(),
            SynchMode::StartSelected => {
                for daq in self.lists[..self.list_count].iter_mut() {
                    if daq.is_configured() {
                        daq.running = true;
                    }
                }
            }
            SynchMode::StopSelected => {}
        }
    }

    pub fn stop_all(&mut self) {
        for daq in self.lists.iter_mut() {
            daq.running = false;
        }
    }

    pub fn any_running(&self) -> bool {
        self.lists.iter().any(|l| l.running)
    }

    /// Build the DAQ packets for one event channel tick.
    ///
    /// One packet per ODT of every running list bound to `event_channel`:
    /// `[pid, data...]` with `pid = list * MAX_ODT_PER_LIST + odt`. Data
    /// beyond `MAX_DTO` is cut off. A packet whose memory read fails is
    /// dropped.
    pub fn emit<M: MemoryAccessor + ?Sized>(&self, event_channel: u16, memory: &M) -> Vec<Frame> {
        let mut packets = Vec::new();
        for (list_idx, daq) in self.lists[..self.list_count].iter().enumerate() {
            if !daq.running || daq.event_channel != event_channel {
                continue;
            }
            for (odt_idx, odt) in daq.odts().iter().enumerate() {
                let pid = DaqList::first_pid(list_idx) + odt_idx as u8;
                match Self::sample_odt(pid, odt, memory) {
                    Ok(frame) => packets.push(frame),
                    Err(e) => warn!(list = list_idx, odt = odt_idx, error = %e, "DAQ sample failed"),
                }
            }
        }
        packets
    }

    fn sample_odt<M: MemoryAccessor + ?Sized>(
        pid: u8,
        odt: &Odt,
        memory: &M,
    ) -> Result<Frame, crate::memory::MemoryError> {
        let mut frame = Frame::with_pid(pid);
        for entry in odt.entries() {
            let take = (entry.size as usize).min(frame.remaining());
            if take == 0 {
                break;
            }
            let mut buf = [0u8; MAX_DTO];
            memory.read(entry.address, entry.extension, &mut buf[..take])?;
            frame.extend_from_slice(&buf[..take]);
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RamMemory;

    fn configured() -> DaqEngine {
        let mut daq = DaqEngine::new();
        daq.alloc_lists(2).unwrap();
        daq.alloc_odts(0, 2).unwrap();
        daq.alloc_entries(0, 0, 2).unwrap();
        daq.alloc_entries(0, 1, 1).unwrap();
        daq
    }

    #[test]
    fn test_allocation_limits() {
        let mut daq = DaqEngine::new();
        assert_eq!(daq.alloc_lists(MAX_DAQ_LISTS + 1), Err(ErrorCode::MemoryOverflow));
        daq.alloc_lists(2).unwrap();
        assert_eq!(daq.alloc_odts(2, 1), Err(ErrorCode::OutOfRange));
        assert_eq!(daq.alloc_odts(0, MAX_ODT_PER_LIST + 1), Err(ErrorCode::MemoryOverflow));
        daq.alloc_odts(0, 3).unwrap();
        assert_eq!(daq.alloc_entries(0, 3, 1), Err(ErrorCode::OutOfRange));
        assert_eq!(
            daq.alloc_entries(0, 0, MAX_ENTRIES_PER_ODT + 1),
            Err(ErrorCode::MemoryOverflow)
        );
        daq.alloc_entries(0, 0, MAX_ENTRIES_PER_ODT).unwrap();
    }

    #[test]
    fn test_failed_alloc_does_not_mutate() {
        let mut daq = configured();
        assert!(daq.alloc_odts(0, MAX_ODT_PER_LIST + 1).is_err());
        assert_eq!(daq.list(0).unwrap().odt_count(), 2);
    }

    #[test]
    fn test_pointer_validation() {
        let mut daq = configured();
        assert!(daq.set_pointer(0, 0, 1).is_ok());
        assert_eq!(daq.set_pointer(0, 1, 1), Err(ErrorCode::OutOfRange));
        assert_eq!(daq.set_pointer(1, 0, 0), Err(ErrorCode::OutOfRange));
        assert_eq!(daq.set_pointer(4, 0, 0), Err(ErrorCode::OutOfRange));
        // Rejected pointer leaves the previous one in place.
        assert_eq!(daq.pointer(), Some(DaqPointer { list: 0, odt: 0, entry: 1 }));
    }

    #[test]
    fn test_write_without_pointer() {
        let mut daq = configured();
        assert_eq!(daq.write_entry(0, 1, 0), Err(ErrorCode::Sequence));
    }

    #[test]
    fn test_write_advances_and_wraps() {
        let mut daq = configured();
        daq.set_pointer(0, 0, 0).unwrap();
        daq.write_entry(0x10, 1, 0).unwrap();
        daq.write_entry(0x20, 2, 0).unwrap();
        assert_eq!(daq.pointer(), Some(DaqPointer { list: 0, odt: 1, entry: 0 }));
        daq.write_entry(0x30, 4, 0).unwrap();
        // Three entries allocated in total; the pointer is back at 0/0.
        assert_eq!(daq.pointer(), Some(DaqPointer { list: 0, odt: 0, entry: 0 }));
        daq.write_entry(0x40, 1, 0).unwrap();

        let list = daq.list(0).unwrap();
        assert_eq!(list.odts()[0].entries()[0].address, 0x40);
        assert_eq!(list.odts()[0].entries()[1].address, 0x20);
        assert_eq!(list.odts()[1].entries()[0].address, 0x30);
    }

    #[test]
    fn test_pointer_skips_empty_odt() {
        let mut daq = DaqEngine::new();
        daq.alloc_lists(1).unwrap();
        daq.alloc_odts(0, 3).unwrap();
        daq.alloc_entries(0, 0, 1).unwrap();
        daq.alloc_entries(0, 2, 1).unwrap();
        daq.set_pointer(0, 0, 0).unwrap();
        daq.write_entry(0x10, 1, 0).unwrap();
        assert_eq!(daq.pointer(), Some(DaqPointer { list: 0, odt: 2, entry: 0 }));
        daq.write_entry(0x20, 1, 0).unwrap();
        assert_eq!(daq.pointer(), Some(DaqPointer { list: 0, odt: 0, entry: 0 }));
    }

    #[test]
    fn test_write_rejects_oversized_entry() {
        let mut daq = configured();
        daq.set_pointer(0, 0, 0).unwrap();
        assert_eq!(daq.write_entry(0, 8, 0), Err(ErrorCode::OutOfRange));
        assert_eq!(daq.pointer(), Some(DaqPointer { list: 0, odt: 0, entry: 0 }));
    }

    #[test]
    fn test_read_entry() {
        let mut daq = configured();
        daq.set_pointer(0, 0, 0).unwrap();
        daq.write_entry(0x1234, 2, 1).unwrap();
        daq.set_pointer(0, 0, 0).unwrap();
        assert_eq!(
            daq.read_entry().unwrap(),
            OdtEntry { address: 0x1234, size: 2, extension: 1 }
        );
        assert_eq!(daq.pointer(), Some(DaqPointer { list: 0, odt: 0, entry: 1 }));
    }

    #[test]
    fn test_start_stop() {
        let mut daq = configured();
        assert_eq!(daq.start_stop(1, StartStopMode::Start), Ok(8));
        assert!(daq.list(1).unwrap().running);
        assert_eq!(daq.start_stop(1, StartStopMode::Stop), Ok(8));
        assert!(!daq.any_running());
        daq.start_stop(0, StartStopMode::Select).unwrap();
        assert!(!daq.any_running());
        assert_eq!(daq.start_stop(2, StartStopMode::Start), Err(ErrorCode::OutOfRange));
    }

    #[test]
    fn test_synch_starts_only_configured() {
        let mut daq = configured();
        daq.start_stop_synch(SynchMode::StartSelected);
        assert!(daq.list(0).unwrap().running);
        assert!(!daq.list(1).unwrap().running);
        daq.start_stop_synch(SynchMode::StopAll);
        assert!(!daq.any_running());
    }

    #[test]
    fn test_emit_packets() {
        let ram = RamMemory::from_image(0, 0x100, &(0u8..0x40).collect::<Vec<_>>());
        let mut daq = configured();
        daq.set_list_mode(0, 0, 3, 1, 0).unwrap();
        daq.set_pointer(0, 0, 0).unwrap();
        daq.write_entry(0x10, 2, 0).unwrap();
        daq.write_entry(0x20, 1, 0).unwrap();
        daq.write_entry(0x30, 4, 0).unwrap();

        // Not running yet.
        assert!(daq.emit(3, &ram).is_empty());

        daq.start_stop(0, StartStopMode::Start).unwrap();
        let packets = daq.emit(3, &ram);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].as_bytes(), &[0x00, 0x10, 0x11, 0x20]);
        assert_eq!(packets[1].as_bytes(), &[0x01, 0x30, 0x31, 0x32, 0x33]);

        // Other channel: nothing.
        assert!(daq.emit(0, &ram).is_empty());
    }

    #[test]
    fn test_emit_truncates_to_dto() {
        let ram = RamMemory::from_image(0, 0x100, &[0xAB; 0x100]);
        let mut daq = DaqEngine::new();
        daq.alloc_lists(1).unwrap();
        daq.alloc_odts(0, 1).unwrap();
        daq.alloc_entries(0, 0, 3).unwrap();
        daq.set_pointer(0, 0, 0).unwrap();
        for _ in 0..3 {
            daq.write_entry(0, 4, 0).unwrap();
        }
        daq.start_stop(0, StartStopMode::Start).unwrap();
        let packets = daq.emit(0, &ram);
        assert_eq!(packets[0].len(), MAX_DTO);
    }

    #[test]
    fn test_emit_drops_unreadable_odt() {
        let ram = RamMemory::new(0, 0x10);
        let mut daq = DaqEngine::new();
        daq.alloc_lists(1).unwrap();
        daq.alloc_odts(0, 2).unwrap();
        daq.alloc_entries(0, 0, 1).unwrap();
        daq.alloc_entries(0, 1, 1).unwrap();
        daq.set_pointer(0, 0, 0).unwrap();
        daq.write_entry(0x1000, 1, 0).unwrap();
        daq.write_entry(0x0, 1, 0).unwrap();
        daq.start_stop(0, StartStopMode::Start).unwrap();
        let packets = daq.emit(0, &ram);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].pid(), 0x01);
    }

    #[test]
    fn test_free_resets_everything() {
        let mut daq = configured();
        daq.set_pointer(0, 0, 0).unwrap();
        daq.start_stop(0, StartStopMode::Start).unwrap();
        daq.free();
        assert_eq!(daq.list_count(), 0);
        assert_eq!(daq.pointer(), None);
        assert!(!daq.any_running());
    }
}
