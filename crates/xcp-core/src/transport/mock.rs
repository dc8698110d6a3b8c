//! Mock CAN transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{CanTransport, TransportError};
use crate::protocol::constants::{DEFAULT_REQUEST_ID, DEFAULT_RESPONSE_ID, MAX_CTO};

/// Mock transport for unit testing the slave without a bus.
///
/// Clones share the same queues, so a test can keep a handle while the
/// slave owns another.
#[derive(Clone)]
pub struct MockTransport {
    /// Queued frames to return on recv.
    rx_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Captured sends.
    tx_log: Arc<Mutex<Vec<Vec<u8>>>>,
    request_id: u32,
    response_id: u32,
    /// Whether the bus is "up".
    connected: Arc<Mutex<bool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_ids(DEFAULT_REQUEST_ID, DEFAULT_RESPONSE_ID)
    }

    pub fn with_ids(request_id: u32, response_id: u32) -> Self {
        Self {
            rx_queue: Arc::new(Mutex::new(VecDeque::new())),
            tx_log: Arc::new(Mutex::new(Vec::new())),
            request_id,
            response_id,
            connected: Arc::new(Mutex::new(true)),
        }
    }

    /// Queue a frame to be returned on the next recv.
    pub fn queue_frame(&self, data: &[u8]) {
        self.rx_queue.lock().unwrap().push_back(data.to_vec());
    }

    /// Get all captured sends.
    pub fn get_sent(&self) -> Vec<Vec<u8>> {
        self.tx_log.lock().unwrap().clone()
    }

    /// Most recent send, if any.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.tx_log.lock().unwrap().last().cloned()
    }

    /// Clear captured sends.
    pub fn clear_sent(&self) {
        self.tx_log.lock().unwrap().clear();
    }

    /// Simulate bus loss.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    /// Simulate bus recovery.
    pub fn reconnect(&self) {
        *self.connected.lock().unwrap() = true;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl CanTransport for MockTransport {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        if data.len() > MAX_CTO {
            return Err(TransportError::WriteFailed(format!(
                "frame too long: {} bytes",
                data.len()
            )));
        }
        self.tx_log.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        self.rx_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(TransportError::Timeout { timeout_ms: 100 })
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }

    fn request_id(&self) -> u32 {
        self.request_id
    }

    fn response_id(&self) -> u32 {
        self.response_id
    }
}
