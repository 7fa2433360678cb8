//! Test utilities for radio collaborators
//!
//! Provides a modem slot that records every push, and helpers for reading a
//! [`ChannelTransport`](crate::ChannelTransport) outgoing queue.

use std::sync::{Mutex, MutexGuard, PoisonError};

use devmon_core::SessionId;
use tokio::sync::mpsc;

use crate::slot::ModemSlot;
use crate::transport::OutgoingRequest;

/// One call made on a [`RecordingSlot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCall {
    SetInterval { owner: SessionId, ms: u32 },
    DropRequests { owner: SessionId },
}

/// Modem slot that records every call without aggregating
#[derive(Debug, Default)]
pub struct RecordingSlot {
    calls: Mutex<Vec<SlotCall>>,
}

impl RecordingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call in arrival order
    pub fn calls(&self) -> Vec<SlotCall> {
        self.lock().clone()
    }

    /// Interval values pushed, in arrival order
    pub fn pushes(&self) -> Vec<u32> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                SlotCall::SetInterval { ms, .. } => Some(*ms),
                SlotCall::DropRequests { .. } => None,
            })
            .collect()
    }

    pub fn push_count(&self) -> usize {
        self.pushes().len()
    }

    pub fn last_interval(&self) -> Option<u32> {
        self.pushes().last().copied()
    }

    /// Whether `owner` dropped its requests
    pub fn dropped(&self, owner: SessionId) -> bool {
        self.lock()
            .iter()
            .any(|call| *call == SlotCall::DropRequests { owner })
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SlotCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModemSlot for RecordingSlot {
    fn set_cell_info_update_interval(&self, owner: SessionId, ms: u32) {
        self.lock().push(SlotCall::SetInterval { owner, ms });
    }

    fn drop_cell_info_requests(&self, owner: SessionId) {
        self.lock().push(SlotCall::DropRequests { owner });
    }
}

/// Take everything currently queued on a transport's outgoing channel
pub fn drain_outgoing(rx: &mut mpsc::UnboundedReceiver<OutgoingRequest>) -> Vec<OutgoingRequest> {
    let mut out = Vec::new();
    while let Ok(request) = rx.try_recv() {
        out.push(request);
    }
    out
}
