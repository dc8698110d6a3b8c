//! Event system for front-end decoupling.
//!
//! Lets a runner or test subscribe to protocol events without
//! tight coupling to the core logic.

use std::fmt;
use std::sync::Mutex;

use crate::program::PgmState;
use crate::protocol::ErrorCode;
use crate::security::Resource;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Events emitted by the XCP slave.
#[derive(Debug, Clone, PartialEq)]
pub enum XcpEvent {
    /// Master connected.
    Connected { mode: u8 },
    /// Session ended (DISCONNECT, PROGRAM_RESET or transport loss).
    Disconnected,
    /// Command answered with an error.
    CommandRejected {
        opcode: u8,
        command: &'static str,
        error: ErrorCode,
    },
    /// Programming state changed.
    ProgramStateChanged { from: PgmState, to: PgmState },
    /// Seed issued for a resource.
    SeedIssued { resource: Resource },
    /// Resource unlocked.
    Unlocked { resource: Resource },
    /// UNLOCK rejected.
    UnlockFailed { resource: Option<Resource> },
    /// DAQ list started.
    DaqStarted { list: u16 },
    /// DAQ list stopped (or all lists when `None`).
    DaqStopped { list: Option<u16> },
    /// CAN frame sent/received.
    Frame {
        direction: PacketDirection,
        data: Vec<u8>,
    },
    /// Log message.
    Log { level: LogLevel, message: String },
}

/// Frame direction, from the slave's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Transmit (slave -> master)
    Rx, // Receive (master -> slave)
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Observer trait for receiving XCP events.
pub trait XcpObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &XcpEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl XcpObserver for NullObserver {
    fn on_event(&self, _event: &XcpEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl XcpObserver for TracingObserver {
    fn on_event(&self, event: &XcpEvent) {
        match event {
            XcpEvent::Connected { mode } => {
                tracing::info!(mode, "Master connected");
            }
            XcpEvent::Disconnected => {
                tracing::info!("Session ended");
            }
            XcpEvent::CommandRejected {
                opcode,
                command,
                error,
            } => {
                tracing::debug!(
                    opcode = %format!("0x{:02X}", opcode),
                    command = %command,
                    error = %error,
                    code = %format!("0x{:02X}", error.code()),
                    "Command rejected"
                );
            }
            XcpEvent::ProgramStateChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "Programming state changed");
            }
            XcpEvent::SeedIssued { resource } => {
                tracing::debug!(resource = %resource, "Seed issued");
            }
            XcpEvent::Unlocked { resource } => {
                tracing::info!(resource = %resource, "Unlocked");
            }
            XcpEvent::UnlockFailed { resource } => {
                tracing::warn!(resource = ?resource, "Unlock failed");
            }
            XcpEvent::DaqStarted { list } => {
                tracing::info!(list, "DAQ list started");
            }
            XcpEvent::DaqStopped { list } => {
                tracing::info!(list = ?list, "DAQ stopped");
            }
            XcpEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            XcpEvent::Frame { direction, data } => {
                tracing::trace!(
                    dir = %direction,
                    len = data.len(),
                    data = %hex(data),
                    "CAN frame"
                );
            }
        }
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Observer that keeps every event, for tests.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<XcpEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<XcpEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl XcpObserver for RecordingObserver {
    fn on_event(&self, event: &XcpEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl<O: XcpObserver + ?Sized> XcpObserver for std::sync::Arc<O> {
    fn on_event(&self, event: &XcpEvent) {
        (**self).on_event(event)
    }
}
