//! Session engine for one modem session

use std::path::PathBuf;
use std::sync::Arc;

use devmon_core::prelude::*;
use devmon_core::{SessionId, SignalKind};
use devmon_radio::{ModemSlot, RadioTransport, RequestClass};
use tokio::sync::{mpsc, watch};

use crate::battery::BatteryProbe;
use crate::bridge::PollBridge;
use crate::decision::{self, DecisionSet, Intervals, Snapshot};
use crate::dispatcher::Dispatcher;
use crate::message::{Message, SignalUpdate};
use crate::sources::{SignalSources, Subscription};
use crate::variant::VariantProfile;
use crate::watcher::ChangeNotifier;

/// Screen state file and battery probe for the poll bridge
#[derive(Clone)]
pub struct PollSetup {
    pub screen_path: PathBuf,
    pub probe: Arc<dyn BatteryProbe>,
    pub notifier: Arc<dyn ChangeNotifier>,
}

impl std::fmt::Debug for PollSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollSetup")
            .field("screen_path", &self.screen_path)
            .finish_non_exhaustive()
    }
}

/// Everything a session needs besides its transport and slot
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub profile: &'static VariantProfile,
    pub intervals: Intervals,
    pub sources: Arc<SignalSources>,
    pub poll: Option<PollSetup>,
}

/// Device state tracking for one modem session.
///
/// All state changes happen inside [`DevmonIo::handle`], one message at a
/// time. Signal handlers, request completions and watch events only post to
/// the session queue; [`DevmonIo::run`] or [`DevmonIo::process_pending`]
/// drain it.
pub struct DevmonIo {
    id: SessionId,
    slot: String,
    profile: &'static VariantProfile,
    intervals: Intervals,
    sources: Arc<SignalSources>,
    subscriptions: Vec<Subscription>,
    snapshot: Snapshot,
    decisions: DecisionSet,
    dispatcher: Dispatcher,
    modem: Arc<dyn ModemSlot>,
    bridge: Option<PollBridge>,
    msg_tx: mpsc::UnboundedSender<Message>,
    msg_rx: mpsc::UnboundedReceiver<Message>,
    closed: bool,
}

impl DevmonIo {
    /// Subscribe to the signals, send the initial state and start the poll
    /// bridge
    pub fn start(
        params: SessionParams,
        transport: Arc<dyn RadioTransport>,
        modem: Arc<dyn ModemSlot>,
    ) -> Self {
        let SessionParams {
            profile,
            intervals,
            sources,
            poll,
        } = params;

        let id = SessionId::next();
        let slot = transport.slot().to_string();
        let interface = transport.interface();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();

        // Subscribe before taking the snapshot so no change is missed
        let subscriptions = profile
            .signals
            .iter()
            .flat_map(|&kind| sources.subscribe(kind, &msg_tx))
            .collect();
        let snapshot = sources.snapshot();

        let mut decisions = DecisionSet::new();
        for rule in profile.rules {
            if let Some(initial) = rule.initial {
                decisions.assume(rule.class, initial);
            }
        }

        let dispatcher = Dispatcher::new(transport, msg_tx.clone());

        let mut io = Self {
            id,
            slot,
            profile,
            intervals,
            sources,
            subscriptions,
            snapshot,
            decisions,
            dispatcher,
            modem,
            bridge: None,
            msg_tx,
            msg_rx,
            closed: false,
        };

        info!(
            slot = %io.slot,
            "{} started ({}, radio {})",
            io.id,
            io.profile.name(),
            interface
        );

        io.evaluate(None);

        if let Some(poll) = poll {
            io.start_bridge(poll);
        }

        io
    }

    fn start_bridge(&mut self, poll: PollSetup) {
        let mut bridge = PollBridge::new(poll.screen_path, poll.probe, self.profile.bridge_rules);
        match bridge.start(poll.notifier.as_ref(), self.msg_tx.clone()) {
            Ok(()) => {
                debug!(slot = %self.slot, "watching {:?}", bridge.screen_path());
                self.bridge = Some(bridge);
                self.poll_tick();
            }
            Err(e) => {
                warn!(slot = %self.slot, "screen state polling disabled: {}", e);
            }
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn profile(&self) -> &'static VariantProfile {
        self.profile
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Last value the primary path computed for `class`
    pub fn decision(&self, class: RequestClass) -> Option<bool> {
        self.decisions.get(class)
    }

    /// Last value the poll bridge computed for `class`
    pub fn bridge_decision(&self, class: RequestClass) -> Option<bool> {
        self.bridge.as_ref().and_then(|b| b.decisions().get(class))
    }

    pub fn is_supported(&self, class: RequestClass) -> bool {
        self.dispatcher.is_supported(class)
    }

    pub fn is_pending(&self, class: RequestClass) -> bool {
        self.dispatcher.is_pending(class)
    }

    /// The poll bridge is watching and has not failed
    pub fn is_polling(&self) -> bool {
        self.bridge.as_ref().is_some_and(PollBridge::is_alive)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Handle one message
    pub fn handle(&mut self, msg: Message) {
        if self.closed {
            return;
        }
        match msg {
            Message::Signal(update) => self.on_signal(update),
            Message::RequestCompleted {
                class,
                ticket,
                completion,
            } => {
                let outcome = self.dispatcher.complete(class, ticket, completion);
                trace!(slot = %self.slot, "{} {}: {:?}", class, ticket, outcome);
            }
            Message::ScreenStateChanged => self.poll_tick(),
            Message::PollWatchFailed { reason } => {
                warn!(slot = %self.slot, "screen state watch failed: {}", reason);
                if let Some(bridge) = self.bridge.as_mut() {
                    bridge.close();
                }
            }
        }
    }

    /// Handle every queued message without waiting. Returns how many there were.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.handle(msg);
            count += 1;
        }
        count
    }

    /// Run the session loop until `shutdown` turns true or its sender is gone
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                Some(msg) = self.msg_rx.recv() => self.handle(msg),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.shutdown();
    }

    fn on_signal(&mut self, update: SignalUpdate) {
        let kind = update.kind();
        match update {
            SignalUpdate::Display(u) => self.snapshot.display.apply(&u),
            SignalUpdate::Battery(u) => self.snapshot.battery.apply(&u),
            SignalUpdate::Charger(u) => self.snapshot.charger.apply(&u),
            SignalUpdate::Tethering(u) => self.snapshot.tethering.apply(&u),
        }
        self.evaluate(Some(kind));
    }

    /// Recompute decisions affected by `changed` (all of them if `None`),
    /// send what changed and push the cell info interval
    fn evaluate(&mut self, changed: Option<SignalKind>) {
        for rule in self.profile.rules {
            if changed.is_some_and(|kind| !rule.depends_on(kind)) {
                continue;
            }
            let value = (rule.compute)(&self.snapshot);
            if self.decisions.update(rule.class, value) {
                debug!(slot = %self.slot, "{}: {}", rule.class, value);
                self.dispatcher.send(rule.class, value);
            }
        }

        let ms = decision::cell_info_interval(&self.snapshot, &self.intervals);
        self.push_interval(ms);
    }

    /// Re-read the poll sources and feed the bridge decisions
    fn poll_tick(&mut self) {
        let Some(bridge) = self.bridge.as_mut() else {
            return;
        };
        if !bridge.is_alive() {
            return;
        }

        let sample = bridge.sample();
        debug!(
            slot = %self.slot,
            "screen {}, battery {}",
            if sample.screen_on { "on" } else { "off" },
            sample.battery
        );

        for rule in self.profile.bridge_rules {
            let value = (rule.compute)(&sample);
            if bridge.decisions_mut().update(rule.class, value) {
                debug!(slot = %self.slot, "{}: {} (polled)", rule.class, value);
                self.dispatcher.send(rule.class, value);
            }
        }

        let ms = decision::poll_cell_info_interval(&sample, &self.intervals);
        self.push_interval(ms);
    }

    fn push_interval(&self, ms: u32) {
        trace!(slot = %self.slot, "cell info interval {} ms", ms);
        self.modem.set_cell_info_update_interval(self.id, ms);
    }

    /// Tear the session down. Safe to call more than once.
    ///
    /// After this returns no handler, completion or watch event of this
    /// session has any effect.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for sub in self.subscriptions.drain(..) {
            self.sources.unsubscribe(sub);
        }
        self.dispatcher.drop_all();
        self.modem.drop_cell_info_requests(self.id);
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.close();
        }

        self.msg_rx.close();
        let dropped = std::iter::from_fn(|| self.msg_rx.try_recv().ok()).count();
        if dropped > 0 {
            debug!(slot = %self.slot, "dropped {} queued messages", dropped);
        }

        info!(slot = %self.slot, "{} stopped", self.id);
    }
}

impl Drop for DevmonIo {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DevmonIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevmonIo")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("variant", &self.profile.variant)
            .field("decisions", &self.decisions)
            .field("dispatcher", &self.dispatcher)
            .field("bridge", &self.bridge)
            .field("closed", &self.closed)
            .finish()
    }
}
