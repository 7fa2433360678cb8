//! Outbound request dispatcher
//!
//! Holds at most one in-flight request per [`RequestClass`]. Sending a new
//! value for a class drops the pending one first; a completion is only acted
//! on if its ticket still matches the pending request of its class.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use devmon_core::prelude::*;
use devmon_radio::{
    Completion, RadioError, RadioTransport, RequestClass, RequestToken, TxStatus,
};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::capability::CapabilityLatch;
use crate::message::Message;

/// Dispatcher-local identity of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket-{}", self.0)
    }
}

/// Result of [`Dispatcher::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(Ticket),
    /// The class was declared unsupported earlier; nothing was sent
    Unsupported,
    /// The transport refused the request outright
    Failed,
}

/// Result of [`Dispatcher::complete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Superseded or dropped request; ignored
    Stale,
    /// Answered by the expected operation
    Delivered,
    /// Not delivered; no state change
    TransportFailed(TxStatus),
    /// Answered with "request not supported"; the class is now disabled
    NotSupported,
    /// Answered by a different operation than the one asked
    Anomaly,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    ticket: Ticket,
    token: RequestToken,
}

pub struct Dispatcher {
    transport: Arc<dyn RadioTransport>,
    msg_tx: mpsc::UnboundedSender<Message>,
    pending: BTreeMap<RequestClass, Pending>,
    capabilities: CapabilityLatch,
    next_ticket: u64,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn RadioTransport>, msg_tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            transport,
            msg_tx,
            pending: BTreeMap::new(),
            capabilities: CapabilityLatch::new(),
            next_ticket: 1,
        }
    }

    fn slot(&self) -> &str {
        self.transport.slot()
    }

    /// Submit `value` for `class`, replacing any pending request of that class
    pub fn send(&mut self, class: RequestClass, value: bool) -> SubmitOutcome {
        if !self.capabilities.is_supported(class) {
            debug!(slot = %self.slot(), "{} not supported, not sending {}", class, value);
            return SubmitOutcome::Unsupported;
        }

        self.cancel(class);

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        let request = class.build(value, self.transport.interface());
        let tx = self.msg_tx.clone();
        let on_complete = Box::new(move |completion: Completion| {
            // The session may already be gone
            let _ = tx.send(Message::RequestCompleted {
                class,
                ticket,
                completion,
            });
        });

        debug!(slot = %self.slot(), "{} {}", request, ticket);
        match self.transport.submit(request, on_complete) {
            Some(token) => {
                self.pending.insert(class, Pending { ticket, token });
                SubmitOutcome::Submitted(ticket)
            }
            None => {
                warn!(slot = %self.slot(), "failed to submit {}", request);
                SubmitOutcome::Failed
            }
        }
    }

    /// Handle a completion posted by a request callback
    pub fn complete(
        &mut self,
        class: RequestClass,
        ticket: Ticket,
        completion: Completion,
    ) -> CompletionOutcome {
        match self.pending.get(&class) {
            Some(pending) if pending.ticket == ticket => {
                self.pending.remove(&class);
            }
            _ => {
                debug!(slot = %self.slot(), "ignoring stale {} completion {}", class, ticket);
                return CompletionOutcome::Stale;
            }
        }

        if completion.status != TxStatus::Ok {
            debug!(
                slot = %self.slot(),
                "{} request not delivered: {:?}", class, completion.status
            );
            return CompletionOutcome::TransportFailed(completion.status);
        }

        let expected = class.expected_response();
        if completion.resp != Some(expected) {
            match completion.resp {
                Some(resp) => error!(slot = %self.slot(), "unexpected {} response {}", class, resp),
                None => error!(slot = %self.slot(), "{} response without operation", class),
            }
            return CompletionOutcome::Anomaly;
        }

        match completion.error {
            RadioError::RequestNotSupported => {
                if self.capabilities.revoke(class) {
                    info!(slot = %self.slot(), "{} is not supported", class);
                }
                CompletionOutcome::NotSupported
            }
            RadioError::None => CompletionOutcome::Delivered,
            other => {
                debug!(slot = %self.slot(), "{} failed with error {}", class, other.code());
                CompletionOutcome::Delivered
            }
        }
    }

    /// Drop the pending request of `class`, if any
    pub fn cancel(&mut self, class: RequestClass) {
        if let Some(pending) = self.pending.remove(&class) {
            self.transport.cancel(pending.token);
        }
    }

    /// Drop every pending request
    pub fn drop_all(&mut self) {
        let classes: Vec<RequestClass> = self.pending.keys().copied().collect();
        for class in classes {
            self.cancel(class);
        }
    }

    pub fn is_supported(&self, class: RequestClass) -> bool {
        self.capabilities.is_supported(class)
    }

    pub fn is_pending(&self, class: RequestClass) -> bool {
        self.pending.contains_key(&class)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("slot", &self.slot())
            .field("pending", &self.pending)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
