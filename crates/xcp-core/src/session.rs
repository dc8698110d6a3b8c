//! XCP slave - ties transport, memory, flash and the command dispatcher
//! together.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::clock::{DaqClock, SystemClock};
use crate::config::SlaveConfig;
use crate::events::{PacketDirection, TracingObserver, XcpEvent, XcpObserver};
use crate::memory::{FlashAccessor, MemoryAccessor};
use crate::protocol::Request;
use crate::scheduler::EventChannelConfig;
use crate::security::Security;
use crate::state::{HandlerContext, SlaveState, handle_command};
use crate::transport::{CanTransport, TransportError};

/// One XCP slave instance.
///
/// Everything is `&mut self`; a caller that drives `process` and
/// `emit_daq` from different threads must wrap the slave in a mutex.
pub struct XcpSlave<T, M, F, O = TracingObserver>
where
    T: CanTransport,
    M: MemoryAccessor,
    F: FlashAccessor,
    O: XcpObserver,
{
    transport: T,
    memory: M,
    flash: F,
    observer: Arc<O>,
    clock: Box<dyn DaqClock>,
    events: Vec<EventChannelConfig>,
    state: SlaveState,
}

impl<T: CanTransport, M: MemoryAccessor, F: FlashAccessor> XcpSlave<T, M, F, TracingObserver> {
    /// Create a slave with the default tracing observer.
    pub fn new(transport: T, memory: M, flash: F, config: &SlaveConfig) -> Self {
        Self::with_observer(transport, memory, flash, config, Arc::new(TracingObserver))
    }
}

impl<T, M, F, O> XcpSlave<T, M, F, O>
where
    T: CanTransport,
    M: MemoryAccessor,
    F: FlashAccessor,
    O: XcpObserver,
{
    /// Create a slave with a custom observer.
    pub fn with_observer(
        transport: T,
        memory: M,
        flash: F,
        config: &SlaveConfig,
        observer: Arc<O>,
    ) -> Self {
        info!(
            request_id = format!("0x{:X}", transport.request_id()),
            response_id = format!("0x{:X}", transport.response_id()),
            security = config.security.enabled,
            "XCP slave ready"
        );
        Self {
            transport,
            memory,
            flash,
            observer,
            clock: Box::new(SystemClock::new()),
            events: config.daq.events.clone(),
            state: SlaveState::new(config.security.clone(), config.program.sectors.clone()),
        }
    }

    /// Replace the GET_DAQ_CLOCK source.
    pub fn with_clock<C: DaqClock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Handle one inbound frame and send exactly one reply.
    ///
    /// Empty frames carry no opcode and are dropped without a reply.
    #[instrument(level = "trace", skip_all, fields(len = bytes.len()))]
    pub fn process(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let Some(req) = Request::new(bytes) else {
            debug!("Ignoring empty frame");
            return Ok(());
        };
        self.emit(XcpEvent::Frame {
            direction: PacketDirection::Rx,
            data: bytes.to_vec(),
        });

        let mut ctx = HandlerContext {
            state: &mut self.state,
            memory: &mut self.memory,
            flash: &mut self.flash,
            clock: self.clock.as_ref(),
            observer: self.observer.as_ref(),
            events: &self.events,
        };
        let response = handle_command(&req, &mut ctx);

        self.transport.send(response.as_bytes())?;
        self.emit(XcpEvent::Frame {
            direction: PacketDirection::Tx,
            data: response.as_bytes().to_vec(),
        });
        Ok(())
    }

    /// Receive one frame from the transport and process it.
    ///
    /// Returns `Ok(false)` when the read timed out.
    pub fn poll(&mut self) -> Result<bool, TransportError> {
        match self.transport.recv() {
            Ok(frame) => {
                self.process(&frame)?;
                Ok(true)
            }
            Err(TransportError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Sample and transmit every running DAQ list bound to `channel`.
    ///
    /// Must be called once per period of that event channel. Returns the
    /// number of packets sent.
    pub fn emit_daq(&mut self, channel: u16) -> Result<usize, TransportError> {
        if !self.state.connected {
            return Ok(0);
        }
        let packets = self.state.daq.emit(channel, &self.memory);
        for packet in &packets {
            self.transport.send(packet.as_bytes())?;
            self.emit(XcpEvent::Frame {
                direction: PacketDirection::Tx,
                data: packet.as_bytes().to_vec(),
            });
        }
        Ok(packets.len())
    }

    /// End the session after the bus went away. No reply is sent.
    pub fn on_transport_lost(&mut self) {
        if !self.state.connected {
            return;
        }
        warn!("Transport lost, closing XCP session");
        let was_running = self.state.daq.any_running();
        self.state.end_session();
        if was_running {
            self.emit(XcpEvent::DaqStopped { list: None });
        }
        self.emit(XcpEvent::Disconnected);
    }

    fn emit(&self, event: XcpEvent) {
        self.observer.on_event(&event);
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn state(&self) -> &SlaveState {
        &self.state
    }

    pub fn security(&self) -> &Security {
        &self.state.security
    }

    pub fn event_channels(&self) -> &[EventChannelConfig] {
        &self.events
    }
}
