//! Protocol error taxonomy.
//!
//! Each variant maps to the one-byte code carried after `PID_ERR`.

use thiserror::Error;

use super::constants::*;

/// Error returned to the master as `[PID_ERR, code]`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    #[error("command synchronisation")]
    CmdSynch = ERR_CMD_SYNCH,

    #[error("command busy")]
    CmdBusy = ERR_CMD_BUSY,

    #[error("DAQ active")]
    DaqActive = ERR_DAQ_ACTIVE,

    #[error("programming active")]
    PgmActive = ERR_PGM_ACTIVE,

    #[error("unknown command")]
    CmdUnknown = ERR_CMD_UNKNOWN,

    #[error("command syntax invalid")]
    CmdSyntax = ERR_CMD_SYNTAX,

    #[error("parameter out of range")]
    OutOfRange = ERR_OUT_OF_RANGE,

    #[error("write protected")]
    WriteProtected = ERR_WRITE_PROTECTED,

    #[error("access denied")]
    AccessDenied = ERR_ACCESS_DENIED,

    #[error("access locked")]
    AccessLocked = ERR_ACCESS_LOCKED,

    #[error("page not valid")]
    PageNotValid = ERR_PAGE_NOT_VALID,

    #[error("mode not valid")]
    ModeNotValid = ERR_MODE_NOT_VALID,

    #[error("segment not valid")]
    SegmentNotValid = ERR_SEGMENT_NOT_VALID,

    #[error("sequence error")]
    Sequence = ERR_SEQUENCE,

    #[error("DAQ configuration invalid")]
    DaqConfig = ERR_DAQ_CONFIG,

    #[error("memory overflow")]
    MemoryOverflow = ERR_MEMORY_OVERFLOW,

    #[error("generic error")]
    Generic = ERR_GENERIC,

    #[error("verify failed")]
    Verify = ERR_VERIFY,
}

impl ErrorCode {
    /// Wire value of this error.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire value. Unknown codes return `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        let err = match code {
            ERR_CMD_SYNCH => Self::CmdSynch,
            ERR_CMD_BUSY => Self::CmdBusy,
            ERR_DAQ_ACTIVE => Self::DaqActive,
            ERR_PGM_ACTIVE => Self::PgmActive,
            ERR_CMD_UNKNOWN => Self::CmdUnknown,
            ERR_CMD_SYNTAX => Self::CmdSyntax,
            ERR_OUT_OF_RANGE => Self::OutOfRange,
            ERR_WRITE_PROTECTED => Self::WriteProtected,
            ERR_ACCESS_DENIED => Self::AccessDenied,
            ERR_ACCESS_LOCKED => Self::AccessLocked,
            ERR_PAGE_NOT_VALID => Self::PageNotValid,
            ERR_MODE_NOT_VALID => Self::ModeNotValid,
            ERR_SEGMENT_NOT_VALID => Self::SegmentNotValid,
            ERR_SEQUENCE => Self::Sequence,
            ERR_DAQ_CONFIG => Self::DaqConfig,
            ERR_MEMORY_OVERFLOW => Self::MemoryOverflow,
            ERR_GENERIC => Self::Generic,
            ERR_VERIFY => Self::Verify,
            _ => return None,
        };
        Some(err)
    }
}

impl From<crate::memory::MemoryError> for ErrorCode {
    fn from(_: crate::memory::MemoryError) -> Self {
        ErrorCode::OutOfRange
    }
}

impl From<crate::memory::FlashError> for ErrorCode {
    fn from(_: crate::memory::FlashError) -> Self {
        ErrorCode::Generic
    }
}
