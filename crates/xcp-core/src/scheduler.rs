//! Event channel scheduler.
//!
//! The DAQ engine never keeps time. Whoever owns the slave must call
//! `XcpSlave::emit_daq(channel)` once per channel period; this type works
//! out which channels are due.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// One DAQ event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChannelConfig {
    pub channel: u16,
    #[serde(default)]
    pub name: String,
    pub period_ms: u64,
}

/// Channels 0 (10 ms) and 1 (100 ms).
pub fn default_event_channels() -> Vec<EventChannelConfig> {
    vec![
        EventChannelConfig {
            channel: 0,
            name: "10ms".to_string(),
            period_ms: 10,
        },
        EventChannelConfig {
            channel: 1,
            name: "100ms".to_string(),
            period_ms: 100,
        },
    ]
}

#[derive(Debug)]
struct Slot {
    channel: u16,
    period: Duration,
    next: Instant,
}

#[derive(Debug)]
pub struct EventScheduler {
    slots: Vec<Slot>,
}

impl EventScheduler {
    /// Channels with a zero period are ignored.
    pub fn new(channels: &[EventChannelConfig], start: Instant) -> Self {
        let slots = channels
            .iter()
            .filter(|c| c.period_ms > 0)
            .map(|c| {
                let period = Duration::from_millis(c.period_ms);
                Slot {
                    channel: c.channel,
                    period,
                    next: start + period,
                }
            })
            .collect();
        Self { slots }
    }

    /// Channels whose deadline has passed at `now`.
    ///
    /// Each due channel is reported once even if several periods were
    /// missed; its next deadline is moved past `now`.
    pub fn due(&mut self, now: Instant) -> Vec<u16> {
        let mut due = Vec::new();
        for slot in self.slots.iter_mut() {
            if now < slot.next {
                continue;
            }
            due.push(slot.channel);
            let missed = (now - slot.next).as_nanos() / slot.period.as_nanos() + 1;
            let skip = u32::try_from(missed).unwrap_or(u32::MAX);
            slot.next += slot.period.saturating_mul(skip);
        }
        due
    }

    /// Earliest upcoming deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().map(|s| s.next).min()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
