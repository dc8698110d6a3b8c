//! CAN transport layer abstraction.
//!
//! Defines the `CanTransport` trait for frame exchange with the master,
//! allowing different implementations (SocketCAN, mock, etc.).

use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open interface {interface}: {message}")]
    OpenFailed { interface: String, message: String },

    #[error("Invalid CAN identifier: 0x{0:X}")]
    InvalidId(u32),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Bus disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract CAN transport interface.
///
/// One call carries one CAN frame payload (at most 8 bytes). Addressing is
/// owned by the transport: `recv` only yields frames sent to
/// `request_id`, and `send` always transmits on `response_id`.
pub trait CanTransport: Send + Sync {
    /// Transmit one frame payload on the response identifier.
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame payload addressed to the request identifier.
    fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if the bus is still usable.
    fn is_connected(&self) -> bool;

    /// Master -> slave identifier.
    fn request_id(&self) -> u32;

    /// Slave -> master identifier.
    fn response_id(&self) -> u32;
}

impl<T: CanTransport + ?Sized> CanTransport for Arc<T> {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn recv(&self) -> Result<Vec<u8>, TransportError> {
        (**self).recv()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn request_id(&self) -> u32 {
        (**self).request_id()
    }

    fn response_id(&self) -> u32 {
        (**self).response_id()
    }
}
