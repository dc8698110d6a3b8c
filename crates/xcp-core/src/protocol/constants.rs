//! Protocol constants for XCP on CAN.
//!
//! Numeric values are fixed by ASAM MCD-1 XCP and must match what
//! calibration tools (INCA, CANape, Vision) send and expect.

// ============================================================================
// Packet Identifiers (slave -> master)
// ============================================================================

/// Positive response.
pub const PID_RES: u8 = 0xFF;
/// Error response.
pub const PID_ERR: u8 = 0xFE;
/// Event packet.
pub const PID_EV: u8 = 0xFD;
/// Service request packet.
pub const PID_SERV: u8 = 0xFC;

// ============================================================================
// Standard Commands
// ============================================================================

pub const CMD_CONNECT: u8 = 0xFF;
pub const CMD_DISCONNECT: u8 = 0xFE;
pub const CMD_GET_STATUS: u8 = 0xFD;
pub const CMD_SYNCH: u8 = 0xFC;
pub const CMD_GET_COMM_MODE_INFO: u8 = 0xFB;
pub const CMD_GET_ID: u8 = 0xFA;
pub const CMD_SET_REQUEST: u8 = 0xF9;
pub const CMD_GET_SEED: u8 = 0xF8;
pub const CMD_UNLOCK: u8 = 0xF7;
pub const CMD_SET_MTA: u8 = 0xF6;
pub const CMD_UPLOAD: u8 = 0xF5;
pub const CMD_SHORT_UPLOAD: u8 = 0xF4;
pub const CMD_BUILD_CHECKSUM: u8 = 0xF3;

// ============================================================================
// Calibration Commands
// ============================================================================

pub const CMD_DOWNLOAD: u8 = 0xF0;
pub const CMD_DOWNLOAD_NEXT: u8 = 0xEF;
pub const CMD_DOWNLOAD_MAX: u8 = 0xEE;
pub const CMD_SHORT_DOWNLOAD: u8 = 0xED;
pub const CMD_MODIFY_BITS: u8 = 0xEC;

// ============================================================================
// DAQ Commands
// ============================================================================

pub const CMD_SET_DAQ_PTR: u8 = 0xE2;
pub const CMD_WRITE_DAQ: u8 = 0xE1;
pub const CMD_SET_DAQ_LIST_MODE: u8 = 0xE0;
pub const CMD_GET_DAQ_LIST_MODE: u8 = 0xDF;
pub const CMD_START_STOP_DAQ_LIST: u8 = 0xDE;
pub const CMD_START_STOP_SYNCH: u8 = 0xDD;
pub const CMD_GET_DAQ_CLOCK: u8 = 0xDC;
pub const CMD_READ_DAQ: u8 = 0xDB;
pub const CMD_GET_DAQ_PROCESSOR_INFO: u8 = 0xDA;
pub const CMD_GET_DAQ_RESOLUTION_INFO: u8 = 0xD9;
pub const CMD_GET_DAQ_LIST_INFO: u8 = 0xD8;
pub const CMD_GET_DAQ_EVENT_INFO: u8 = 0xD7;
pub const CMD_FREE_DAQ: u8 = 0xD6;
pub const CMD_ALLOC_DAQ: u8 = 0xD5;
pub const CMD_ALLOC_ODT: u8 = 0xD4;
pub const CMD_ALLOC_ODT_ENTRY: u8 = 0xD3;

// ============================================================================
// Flash Programming Commands
// ============================================================================

pub const CMD_PROGRAM_START: u8 = 0xD2;
pub const CMD_PROGRAM_CLEAR: u8 = 0xD1;
pub const CMD_PROGRAM: u8 = 0xD0;
pub const CMD_PROGRAM_RESET: u8 = 0xCF;
pub const CMD_GET_PGM_PROCESSOR_INFO: u8 = 0xCE;
pub const CMD_GET_SECTOR_INFO: u8 = 0xCD;
pub const CMD_PROGRAM_PREPARE: u8 = 0xCC;
pub const CMD_PROGRAM_FORMAT: u8 = 0xCB;
pub const CMD_PROGRAM_NEXT: u8 = 0xCA;
pub const CMD_PROGRAM_MAX: u8 = 0xC9;
pub const CMD_PROGRAM_VERIFY: u8 = 0xC8;

// ============================================================================
// Error Codes
// ============================================================================

pub const ERR_CMD_SYNCH: u8 = 0x00;
pub const ERR_CMD_BUSY: u8 = 0x10;
pub const ERR_DAQ_ACTIVE: u8 = 0x11;
pub const ERR_PGM_ACTIVE: u8 = 0x12;
pub const ERR_CMD_UNKNOWN: u8 = 0x20;
pub const ERR_CMD_SYNTAX: u8 = 0x21;
pub const ERR_OUT_OF_RANGE: u8 = 0x22;
pub const ERR_WRITE_PROTECTED: u8 = 0x23;
pub const ERR_ACCESS_DENIED: u8 = 0x24;
pub const ERR_ACCESS_LOCKED: u8 = 0x25;
pub const ERR_PAGE_NOT_VALID: u8 = 0x26;
pub const ERR_MODE_NOT_VALID: u8 = 0x27;
pub const ERR_SEGMENT_NOT_VALID: u8 = 0x28;
pub const ERR_SEQUENCE: u8 = 0x29;
pub const ERR_DAQ_CONFIG: u8 = 0x2A;
pub const ERR_MEMORY_OVERFLOW: u8 = 0x30;
pub const ERR_GENERIC: u8 = 0x31;
pub const ERR_VERIFY: u8 = 0x32;

// ============================================================================
// Resource Masks
// ============================================================================

pub const RESOURCE_CAL_PAG: u8 = 0x01;
pub const RESOURCE_DAQ: u8 = 0x04;
pub const RESOURCE_STIM: u8 = 0x08;
pub const RESOURCE_PGM: u8 = 0x10;

/// Session status bit: at least one DAQ list is running.
pub const SESSION_STATUS_DAQ_RUNNING: u8 = 0x40;

// ============================================================================
// Frame and Capacity Limits
// ============================================================================

/// Max command/response packet size (classic CAN payload).
pub const MAX_CTO: usize = 8;
/// Max DAQ packet size.
pub const MAX_DTO: usize = 8;

pub const MAX_DAQ_LISTS: usize = 4;
pub const MAX_ODT_PER_LIST: usize = 8;
pub const MAX_ENTRIES_PER_ODT: usize = 7;

pub const MAX_SECTORS: usize = 8;
/// Max bytes carried by one PROGRAM command (MAX_BS_PGM).
pub const PGM_MAX_SIZE: usize = 6;

pub const SEED_LENGTH: usize = 4;
pub const KEY_LENGTH: usize = 4;

pub const PROTOCOL_VERSION: u8 = 0x01;
pub const TRANSPORT_VERSION: u8 = 0x01;

// ============================================================================
// Default CAN Identifiers
// ============================================================================

/// Master -> slave (CRO).
pub const DEFAULT_REQUEST_ID: u32 = 0x554;
/// Slave -> master (DTO/RES).
pub const DEFAULT_RESPONSE_ID: u32 = 0x555;

/// Human-readable command name for logs and events.
pub fn command_name(opcode: u8) -> &'static str {
    match opcode {
        CMD_CONNECT => "CONNECT",
        CMD_DISCONNECT => "DISCONNECT",
        CMD_GET_STATUS => "GET_STATUS",
        CMD_SYNCH => "SYNCH",
        CMD_GET_COMM_MODE_INFO => "GET_COMM_MODE_INFO",
        CMD_GET_ID => "GET_ID",
        CMD_SET_REQUEST => "SET_REQUEST",
        CMD_GET_SEED => "GET_SEED",
        CMD_UNLOCK => "UNLOCK",
        CMD_SET_MTA => "SET_MTA",
        CMD_UPLOAD => "UPLOAD",
        CMD_SHORT_UPLOAD => "SHORT_UPLOAD",
        CMD_BUILD_CHECKSUM => "BUILD_CHECKSUM",
        CMD_DOWNLOAD => "DOWNLOAD",
        CMD_DOWNLOAD_NEXT => "DOWNLOAD_NEXT",
        CMD_DOWNLOAD_MAX => "DOWNLOAD_MAX",
        CMD_SHORT_DOWNLOAD => "SHORT_DOWNLOAD",
        CMD_MODIFY_BITS => "MODIFY_BITS",
        CMD_SET_DAQ_PTR => "SET_DAQ_PTR",
        CMD_WRITE_DAQ => "WRITE_DAQ",
        CMD_SET_DAQ_LIST_MODE => "SET_DAQ_LIST_MODE",
        CMD_GET_DAQ_LIST_MODE => "GET_DAQ_LIST_MODE",
        CMD_START_STOP_DAQ_LIST => "START_STOP_DAQ_LIST",
        CMD_START_STOP_SYNCH => "START_STOP_SYNCH",
        CMD_GET_DAQ_CLOCK => "GET_DAQ_CLOCK",
        CMD_READ_DAQ => "READ_DAQ",
        CMD_GET_DAQ_PROCESSOR_INFO => "GET_DAQ_PROCESSOR_INFO",
        CMD_GET_DAQ_RESOLUTION_INFO => "GET_DAQ_RESOLUTION_INFO",
        CMD_GET_DAQ_LIST_INFO => "GET_DAQ_LIST_INFO",
        CMD_GET_DAQ_EVENT_INFO => "GET_DAQ_EVENT_INFO",
        CMD_FREE_DAQ => "FREE_DAQ",
        CMD_ALLOC_DAQ => "ALLOC_DAQ",
        CMD_ALLOC_ODT => "ALLOC_ODT",
        CMD_ALLOC_ODT_ENTRY => "ALLOC_ODT_ENTRY",
        CMD_PROGRAM_START => "PROGRAM_START",
        CMD_PROGRAM_CLEAR => "PROGRAM_CLEAR",
        CMD_PROGRAM => "PROGRAM",
        CMD_PROGRAM_RESET => "PROGRAM_RESET",
        CMD_GET_PGM_PROCESSOR_INFO => "GET_PGM_PROCESSOR_INFO",
        CMD_GET_SECTOR_INFO => "GET_SECTOR_INFO",
        CMD_PROGRAM_PREPARE => "PROGRAM_PREPARE",
        CMD_PROGRAM_FORMAT => "PROGRAM_FORMAT",
        CMD_PROGRAM_NEXT => "PROGRAM_NEXT",
        CMD_PROGRAM_MAX => "PROGRAM_MAX",
        CMD_PROGRAM_VERIFY => "PROGRAM_VERIFY",
        _ => "UNKNOWN",
    }
}
