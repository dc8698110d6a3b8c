//! DAQ timestamp source for GET_DAQ_CLOCK.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Free-running 32-bit timestamp, one tick per microsecond.
pub trait DaqClock: Send + Sync {
    fn timestamp(&self) -> u32;
}

/// Microseconds since construction, wrapping at 2^32.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DaqClock for SystemClock {
    fn timestamp(&self) -> u32 {
        self.epoch.elapsed().as_micros() as u32
    }
}

/// Settable clock for tests.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU32);

impl FixedClock {
    pub fn new(value: u32) -> Self {
        Self(AtomicU32::new(value))
    }

    pub fn set(&self, value: u32) {
        self.0.store(value, Ordering::Relaxed);
    }
}

impl DaqClock for FixedClock {
    fn timestamp(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl<C: DaqClock + ?Sized> DaqClock for std::sync::Arc<C> {
    fn timestamp(&self) -> u32 {
        (**self).timestamp()
    }
}
