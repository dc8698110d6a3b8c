//! Request parsing and response framing.
//!
//! Every XCP-on-CAN packet fits in one classic CAN frame, so responses and
//! DAQ packets are built in a fixed 8-byte buffer without allocation.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use super::constants::{MAX_CTO, PID_ERR, PID_RES};
use super::error::ErrorCode;

/// Outbound packet (response, error or DAQ packet).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    buf: [u8; MAX_CTO],
    len: u8,
}

impl Frame {
    /// Frame whose first byte is `pid`.
    pub fn with_pid(pid: u8) -> Self {
        let mut buf = [0u8; MAX_CTO];
        buf[0] = pid;
        Self { buf, len: 1 }
    }

    /// Bare positive response `[PID_RES]`.
    pub fn positive() -> Self {
        Self::with_pid(PID_RES)
    }

    /// Error response `[PID_ERR, code]`.
    pub fn error(code: ErrorCode) -> Self {
        let mut frame = Self::with_pid(PID_ERR);
        frame.push(code.code());
        frame
    }

    /// Append one byte. Bytes past the frame capacity are dropped.
    pub fn push(&mut self, byte: u8) -> &mut Self {
        let len = self.len as usize;
        if len < MAX_CTO {
            self.buf[len] = byte;
            self.len += 1;
        }
        self
    }

    pub fn push_u16(&mut self, value: u16) -> &mut Self {
        let mut tmp = [0u8; 2];
        BigEndian::write_u16(&mut tmp, value);
        self.extend_from_slice(&tmp)
    }

    pub fn push_u32(&mut self, value: u32) -> &mut Self {
        let mut tmp = [0u8; 4];
        BigEndian::write_u32(&mut tmp, value);
        self.extend_from_slice(&tmp)
    }

    /// Append as many bytes of `data` as still fit.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> &mut Self {
        let take = data.len().min(self.remaining());
        let start = self.len as usize;
        self.buf[start..start + take].copy_from_slice(&data[..take]);
        self.len += take as u8;
        self
    }

    /// Free bytes left in the frame.
    pub fn remaining(&self) -> usize {
        MAX_CTO - self.len as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn pid(&self) -> u8 {
        self.buf[0]
    }

    pub fn is_positive(&self) -> bool {
        self.pid() == PID_RES
    }

    /// Error code if this is an error response.
    pub fn error_code(&self) -> Option<ErrorCode> {
        if self.pid() == PID_ERR && self.len >= 2 {
            ErrorCode::from_code(self.buf[1])
        } else {
            None
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[")?;
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        write!(f, "]")
    }
}

/// Inbound command packet.
///
/// Field accessors return `CmdSyntax` when the frame is too short, so a
/// handler that reads all of its fields up front rejects malformed frames
/// before touching any state.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    bytes: &'a [u8],
}

impl<'a> Request<'a> {
    /// Wrap raw bytes. Empty input has no opcode and yields `None`.
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        if bytes.is_empty() {
            None
        } else {
            Some(Self { bytes })
        }
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn byte(&self, offset: usize) -> Result<u8, ErrorCode> {
        self.bytes.get(offset).copied().ok_or(ErrorCode::CmdSyntax)
    }

    pub fn u16_be(&self, offset: usize) -> Result<u16, ErrorCode> {
        self.payload(offset, 2).map(BigEndian::read_u16)
    }

    pub fn u32_be(&self, offset: usize) -> Result<u32, ErrorCode> {
        self.payload(offset, 4).map(BigEndian::read_u32)
    }

    /// `len` bytes starting at `offset`.
    pub fn payload(&self, offset: usize, len: usize) -> Result<&'a [u8], ErrorCode> {
        let end = offset.checked_add(len).ok_or(ErrorCode::CmdSyntax)?;
        self.bytes.get(offset..end).ok_or(ErrorCode::CmdSyntax)
    }
}
