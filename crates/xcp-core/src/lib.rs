//! XCP-Core: XCP-on-CAN slave (calibration and measurement) in Rust.
//!
//! This crate implements the slave side of the ASAM XCP protocol over
//! classic CAN: session management, memory upload/download through the
//! Memory Transfer Address, dynamic DAQ lists, the flash programming
//! sequence and seed/key resource protection.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Opcodes, error codes, request/response frames
//! - **Transport**: CAN communication abstraction (SocketCAN, mock)
//! - **Memory**: Memory and flash accessor traits plus in-memory fakes
//! - **MTA / DAQ / Program / Security**: the protocol engines
//! - **State**: Slave state and command handlers
//! - **Events**: Observer pattern for logging and tests
//! - **Session**: `XcpSlave`, the transport-facing orchestrator
//!
//! # Example
//!
//! ```no_run
//! use xcp_core::{MockTransport, SlaveConfig, XcpSlave};
//!
//! let config = SlaveConfig::default();
//! let mut slave = XcpSlave::new(
//!     MockTransport::new(),
//!     config.build_memory().expect("memory"),
//!     config.build_flash(),
//!     &config,
//! );
//! slave.process(&[0xFF, 0x00]).expect("CONNECT");
//! ```

pub mod clock;
pub mod config;
pub mod daq;
pub mod events;
pub mod memory;
pub mod mta;
pub mod program;
pub mod protocol;
pub mod scheduler;
pub mod security;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use clock::{DaqClock, FixedClock, SystemClock};
pub use config::SlaveConfig;
pub use events::{LogLevel, NullObserver, RecordingObserver, TracingObserver, XcpEvent, XcpObserver};
pub use memory::{FlashAccessor, MemoryAccessor, RamMemory, SimFlash};
pub use program::{PgmState, Sector};
pub use protocol::{ErrorCode, Frame};
pub use scheduler::{EventChannelConfig, EventScheduler};
pub use security::{Resource, SecurityConfig, compute_key};
pub use session::XcpSlave;
pub use transport::{CanTransport, MockTransport, TransportError};
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use transport::SocketCanTransport;
