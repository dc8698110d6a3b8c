//! Transport layer module.

pub mod mock;
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;
pub mod traits;

pub use mock::MockTransport;
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use self::socketcan::SocketCanTransport;
pub use traits::{CanTransport, TransportError};
