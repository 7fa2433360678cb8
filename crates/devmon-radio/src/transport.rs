//! Request submission and completion tracking
//!
//! This module provides:
//! - The [`RadioTransport`] trait sessions submit requests through
//! - [`ChannelTransport`], a transport that queues requests on a channel and
//!   matches responses by serial

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use devmon_core::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::protocol::{RadioError, RadioInterface, RadioResp, TxStatus};
use crate::request::RadioRequest;

/// Result of a submitted request, as delivered to its completion callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Whether the request reached the remote side and got an answer
    pub status: TxStatus,
    /// Echoed response code; absent when delivery failed
    pub resp: Option<RadioResp>,
    #[serde(default)]
    pub error: RadioError,
}

impl Completion {
    /// Delivered, answered without error
    pub fn ok(resp: RadioResp) -> Self {
        Self {
            status: TxStatus::Ok,
            resp: Some(resp),
            error: RadioError::None,
        }
    }

    /// Delivered, answered with `error`
    pub fn error(resp: RadioResp, error: RadioError) -> Self {
        Self {
            status: TxStatus::Ok,
            resp: Some(resp),
            error,
        }
    }

    /// Not delivered
    pub fn failed(status: TxStatus) -> Self {
        Self {
            status,
            resp: None,
            error: RadioError::None,
        }
    }
}

/// Transport-assigned handle of an in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn new(serial: u64) -> Self {
        Self(serial)
    }

    pub fn serial(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback invoked once when a request completes
pub type CompletionFn = Box<dyn FnOnce(Completion) + Send>;

/// Transport used to submit requests to the modem
///
/// Implementations may invoke the completion from any thread, including
/// synchronously from inside `submit`.
pub trait RadioTransport: Send + Sync {
    /// Slot name, used as log prefix
    fn slot(&self) -> &str;

    /// Interface version of the remote side
    fn interface(&self) -> RadioInterface;

    /// Submit a request. Returns `None` if it could not be submitted at all,
    /// in which case `on_complete` is never called.
    fn submit(&self, request: RadioRequest, on_complete: CompletionFn) -> Option<RequestToken>;

    /// Drop an in-flight request. Its completion must not be delivered
    /// afterwards. Unknown tokens are ignored.
    fn cancel(&self, token: RequestToken);
}

/// A request waiting to be written to the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutgoingRequest {
    pub serial: u64,
    pub request: RadioRequest,
}

/// Channel-backed transport with serial-based response matching.
///
/// Requests are queued on an unbounded channel for a writer task; the reader
/// side feeds answers back through [`ChannelTransport::handle_response`].
pub struct ChannelTransport {
    slot: String,
    interface: RadioInterface,
    next_serial: AtomicU64,
    outgoing: mpsc::UnboundedSender<OutgoingRequest>,
    pending: Mutex<HashMap<u64, CompletionFn>>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its requests are queued on
    pub fn new(
        slot: impl Into<String>,
        interface: RadioInterface,
    ) -> (Self, mpsc::UnboundedReceiver<OutgoingRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            slot: slot.into(),
            interface,
            next_serial: AtomicU64::new(1),
            outgoing: tx,
            pending: Mutex::new(HashMap::new()),
        };
        (transport, rx)
    }

    /// Handle an incoming response.
    /// Returns true if the response was matched to a pending request.
    pub fn handle_response(&self, serial: u64, completion: Completion) -> bool {
        let callback = self.lock().remove(&serial);
        match callback {
            Some(on_complete) => {
                on_complete(completion);
                true
            }
            None => {
                debug!("{}: response for unknown serial {}", self.slot, serial);
                false
            }
        }
    }

    /// Complete every pending request with `status` (e.g. the modem went away).
    /// Returns the number of requests failed.
    pub fn fail_all(&self, status: TxStatus) -> usize {
        let drained: Vec<CompletionFn> = self.lock().drain().map(|(_, cb)| cb).collect();
        let count = drained.len();
        for on_complete in drained {
            on_complete(Completion::failed(status));
        }
        count
    }

    /// Number of requests awaiting a response
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_pending(&self, serial: u64) -> bool {
        self.lock().contains_key(&serial)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, CompletionFn>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RadioTransport for ChannelTransport {
    fn slot(&self) -> &str {
        &self.slot
    }

    fn interface(&self) -> RadioInterface {
        self.interface
    }

    fn submit(&self, request: RadioRequest, on_complete: CompletionFn) -> Option<RequestToken> {
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(serial, on_complete);

        if self
            .outgoing
            .send(OutgoingRequest { serial, request })
            .is_err()
        {
            self.lock().remove(&serial);
            warn!("{}: failed to submit {}: channel closed", self.slot, request);
            return None;
        }

        Some(RequestToken::new(serial))
    }

    fn cancel(&self, token: RequestToken) {
        if self.lock().remove(&token.serial()).is_some() {
            debug!("{}: dropped request {}", self.slot, token);
        }
    }
}

impl fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("slot", &self.slot)
            .field("interface", &self.interface)
            .field("pending", &self.pending_count())
            .finish()
    }
}
