//! SocketCAN transport (Linux).

use std::io;
use std::time::Duration;

use ::socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Id, Socket, StandardId};
use tracing::{debug, info, trace};

use super::traits::{CanTransport, TransportError};

/// Raw CAN socket bound to one interface and one request/response id pair.
pub struct SocketCanTransport {
    socket: CanSocket,
    interface: String,
    request_id: u32,
    response_id: u32,
    tx_id: Id,
    extended: bool,
    read_timeout: Duration,
}

impl SocketCanTransport {
    /// Open `interface` (e.g. `can0`, `vcan0`).
    ///
    /// `extended` selects 29-bit identifiers; otherwise both ids must fit
    /// in 11 bits.
    pub fn open(
        interface: &str,
        request_id: u32,
        response_id: u32,
        extended: bool,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let tx_id = make_id(response_id, extended)?;
        make_id(request_id, extended)?;

        let socket = CanSocket::open(interface).map_err(|e| TransportError::OpenFailed {
            interface: interface.to_string(),
            message: e.to_string(),
        })?;
        socket.set_read_timeout(read_timeout)?;

        info!(
            interface = %interface,
            request_id = format!("0x{:X}", request_id),
            response_id = format!("0x{:X}", response_id),
            extended,
            "SocketCAN transport opened"
        );

        Ok(Self {
            socket,
            interface: interface.to_string(),
            request_id,
            response_id,
            tx_id,
            extended,
            read_timeout,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

fn make_id(raw: u32, extended: bool) -> Result<Id, TransportError> {
    if extended {
        ExtendedId::new(raw)
            .map(Id::Extended)
            .ok_or(TransportError::InvalidId(raw))
    } else {
        u16::try_from(raw)
            .ok()
            .and_then(StandardId::new)
            .map(Id::Standard)
            .ok_or(TransportError::InvalidId(raw))
    }
}

impl CanTransport for SocketCanTransport {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let frame = CanFrame::new(self.tx_id, data)
            .ok_or_else(|| TransportError::WriteFailed(format!("invalid payload length {}", data.len())))?;
        self.socket
            .write_frame(&frame)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        trace!(id = format!("0x{:X}", self.response_id), len = data.len(), "CAN TX");
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>, TransportError> {
        loop {
            let frame = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Err(TransportError::Timeout {
                        timeout_ms: self.read_timeout.as_millis() as u64,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                    return Err(TransportError::Disconnected);
                }
                Err(e) => return Err(TransportError::ReadFailed(e.to_string())),
            };

            let CanFrame::Data(frame) = frame else {
                debug!("Ignoring non-data CAN frame");
                continue;
            };
            if frame.raw_id() != self.request_id || frame.is_extended() != self.extended {
                continue;
            }
            trace!(id = format!("0x{:X}", self.request_id), len = frame.data().len(), "CAN RX");
            return Ok(frame.data().to_vec());
        }
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn request_id(&self) -> u32 {
        self.request_id
    }

    fn response_id(&self) -> u32 {
        self.response_id
    }
}
