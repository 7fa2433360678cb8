//! Observable device signals
//!
//! A [`Signal`] mirrors one external watcher (display, battery, charger,
//! tethering): a validity flag plus a typed state. Watchers write into it,
//! sessions subscribe to it. Validity and state changes are separate events;
//! "invalid" is a legitimate value, not an error.
//!
//! Handlers run synchronously on the thread that performs the update. They
//! are expected to do nothing but post a message to their owner's queue.
//! Updates to one signal are applied and dispatched one at a time, so every
//! subscriber sees them in the order they were applied. A handler must not
//! write to the signal it observes.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Which external signal a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Display,
    Battery,
    Charger,
    Tethering,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Display => write!(f, "display"),
            SignalKind::Battery => write!(f, "battery"),
            SignalKind::Charger => write!(f, "charger"),
            SignalKind::Tethering => write!(f, "tethering"),
        }
    }
}

/// Event kinds a subscriber can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalEvent {
    ValidChanged,
    StateChanged,
}

impl SignalEvent {
    pub const ALL: [SignalEvent; 2] = [SignalEvent::ValidChanged, SignalEvent::StateChanged];
}

/// The field that changed, with its new value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update<S> {
    Valid(bool),
    State(S),
}

impl<S> Update<S> {
    pub fn event(&self) -> SignalEvent {
        match self {
            Update::Valid(_) => SignalEvent::ValidChanged,
            Update::State(_) => SignalEvent::StateChanged,
        }
    }
}

/// Last known value of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalSnapshot<S> {
    pub valid: bool,
    pub state: S,
}

impl<S: Copy> SignalSnapshot<S> {
    pub fn new(valid: bool, state: S) -> Self {
        Self { valid, state }
    }

    /// Apply a single-field update
    pub fn apply(&mut self, update: &Update<S>) {
        match update {
            Update::Valid(valid) => self.valid = *valid,
            Update::State(state) => self.state = *state,
        }
    }
}

/// Handle returned by [`Signal::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<S> = Arc<dyn Fn(&Update<S>) + Send + Sync>;

struct Inner<S> {
    snapshot: SignalSnapshot<S>,
    next_id: u64,
    handlers: Vec<(HandlerId, SignalEvent, Handler<S>)>,
}

/// An observable signal with validity and typed state
pub struct Signal<S> {
    kind: SignalKind,
    inner: Mutex<Inner<S>>,
    // Held across apply + dispatch
    dispatch: Mutex<()>,
}

impl<S> Signal<S>
where
    S: Copy + PartialEq + Send + 'static,
{
    /// Create an invalid signal holding `initial` as its state
    pub fn new(kind: SignalKind, initial: S) -> Self {
        Self {
            kind,
            inner: Mutex::new(Inner {
                snapshot: SignalSnapshot::new(false, initial),
                next_id: 1,
                handlers: Vec::new(),
            }),
            dispatch: Mutex::new(()),
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn valid(&self) -> bool {
        self.lock().snapshot.valid
    }

    pub fn state(&self) -> S {
        self.lock().snapshot.state
    }

    pub fn snapshot(&self) -> SignalSnapshot<S> {
        self.lock().snapshot
    }

    /// Update validity, notifying `ValidChanged` subscribers if it changed
    pub fn set_valid(&self, valid: bool) {
        self.update(Update::Valid(valid));
    }

    /// Update state, notifying `StateChanged` subscribers if it changed
    pub fn set_state(&self, state: S) {
        self.update(Update::State(state));
    }

    /// Register a handler for one event kind
    pub fn subscribe<F>(&self, event: SignalEvent, handler: F) -> HandlerId
    where
        F: Fn(&Update<S>) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = HandlerId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.push((id, event, Arc::new(handler)));
        id
    }

    /// Remove a handler. Unknown handles are ignored.
    pub fn unsubscribe(&self, id: HandlerId) {
        self.lock().handlers.retain(|(hid, _, _)| *hid != id);
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.lock().handlers.len()
    }

    fn update(&self, update: Update<S>) {
        let event = update.event();
        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let targets: Vec<Handler<S>> = {
            let mut inner = self.lock();
            let before = inner.snapshot;
            inner.snapshot.apply(&update);
            if inner.snapshot == before {
                return;
            }
            inner
                .handlers
                .iter()
                .filter(|(_, ev, _)| *ev == event)
                .map(|(_, _, handler)| Arc::clone(handler))
                .collect()
        };

        // Handlers run outside the state lock so they may query the signal
        for handler in targets {
            handler(&update);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: fmt::Debug> fmt::Debug for Signal<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Signal")
            .field("kind", &self.kind)
            .field("snapshot", &inner.snapshot)
            .field("handlers", &inner.handlers.len())
            .finish()
    }
}
