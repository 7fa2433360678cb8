//! Message types for the session loop
//!
//! Everything that can change a session's state arrives as a [`Message`] on
//! the session's queue: signal callbacks, request completions and poll watch
//! events all post here and are handled one at a time.

use devmon_core::{BatteryStatus, ChargerState, DisplayState, SignalKind, Update};
use devmon_radio::{Completion, RequestClass};

use crate::dispatcher::Ticket;

/// A change reported by one primary signal source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalUpdate {
    Display(Update<DisplayState>),
    Battery(Update<BatteryStatus>),
    Charger(Update<ChargerState>),
    Tethering(Update<bool>),
}

impl SignalUpdate {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalUpdate::Display(_) => SignalKind::Display,
            SignalUpdate::Battery(_) => SignalKind::Battery,
            SignalUpdate::Charger(_) => SignalKind::Charger,
            SignalUpdate::Tethering(_) => SignalKind::Tethering,
        }
    }
}

/// All events a session reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A signal source reported a validity or state change
    Signal(SignalUpdate),

    /// A submitted request completed
    RequestCompleted {
        class: RequestClass,
        ticket: Ticket,
        completion: Completion,
    },

    /// The screen state file was modified or closed after writing
    ScreenStateChanged,

    /// The screen state watch died; no more poll ticks will follow
    PollWatchFailed { reason: String },
}
