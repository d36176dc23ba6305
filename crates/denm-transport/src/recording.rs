//! In-memory transport that records every request

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use denm_core::{DenmError, DenmResult};
use parking_lot::Mutex;

use crate::{TransmitRequest, Transport};

/// Transport that keeps what it is asked to send
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<TransmitRequest>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<TransmitRequest> {
        self.sent.lock().clone()
    }

    pub fn payloads(&self) -> Vec<Bytes> {
        self.sent.lock().iter().map(|r| r.payload.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn last(&self) -> Option<TransmitRequest> {
        self.sent.lock().last().cloned()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<TransmitRequest> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: TransmitRequest) -> DenmResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DenmError::TransportError("link down".into()));
        }
        self.sent.lock().push(request);
        Ok(())
    }
}
