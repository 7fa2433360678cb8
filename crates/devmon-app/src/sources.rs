//! Shared primary signal sources
//!
//! One [`SignalSources`] set is created by whoever owns the watchers and is
//! shared by every monitor and session. Sessions only hold subscriptions.

use std::sync::Arc;

use devmon_core::{
    BatteryStatus, ChargerState, DisplayState, HandlerId, Signal, SignalEvent, SignalKind,
};
use tokio::sync::mpsc;

use crate::decision::Snapshot;
use crate::message::{Message, SignalUpdate};

/// Display, battery, charger and tethering signals
#[derive(Debug)]
pub struct SignalSources {
    pub display: Signal<DisplayState>,
    pub battery: Signal<BatteryStatus>,
    pub charger: Signal<ChargerState>,
    pub tethering: Signal<bool>,
}

/// One registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub kind: SignalKind,
    pub id: HandlerId,
}

impl SignalSources {
    /// All signals start invalid
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            display: Signal::new(SignalKind::Display, DisplayState::default()),
            battery: Signal::new(SignalKind::Battery, BatteryStatus::default()),
            charger: Signal::new(SignalKind::Charger, ChargerState::default()),
            tethering: Signal::new(SignalKind::Tethering, false),
        })
    }

    /// Current value of every signal
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            display: self.display.snapshot(),
            battery: self.battery.snapshot(),
            charger: self.charger.snapshot(),
            tethering: self.tethering.snapshot(),
        }
    }

    /// Forward validity and state changes of `kind` to `tx`
    pub fn subscribe(
        &self,
        kind: SignalKind,
        tx: &mpsc::UnboundedSender<Message>,
    ) -> Vec<Subscription> {
        SignalEvent::ALL
            .iter()
            .map(|&event| {
                let tx = tx.clone();
                let id = match kind {
                    SignalKind::Display => self.display.subscribe(event, move |u| {
                        let _ = tx.send(Message::Signal(SignalUpdate::Display(*u)));
                    }),
                    SignalKind::Battery => self.battery.subscribe(event, move |u| {
                        let _ = tx.send(Message::Signal(SignalUpdate::Battery(*u)));
                    }),
                    SignalKind::Charger => self.charger.subscribe(event, move |u| {
                        let _ = tx.send(Message::Signal(SignalUpdate::Charger(*u)));
                    }),
                    SignalKind::Tethering => self.tethering.subscribe(event, move |u| {
                        let _ = tx.send(Message::Signal(SignalUpdate::Tethering(*u)));
                    }),
                };
                Subscription { kind, id }
            })
            .collect()
    }

    pub fn unsubscribe(&self, sub: Subscription) {
        match sub.kind {
            SignalKind::Display => self.display.unsubscribe(sub.id),
            SignalKind::Battery => self.battery.unsubscribe(sub.id),
            SignalKind::Charger => self.charger.unsubscribe(sub.id),
            SignalKind::Tethering => self.tethering.unsubscribe(sub.id),
        }
    }

    /// Total handlers across all signals
    pub fn handler_count(&self) -> usize {
        self.display.handler_count()
            + self.battery.handler_count()
            + self.charger.handler_count()
            + self.tethering.handler_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmon_core::Update;

    #[test]
    fn test_subscribe_forwards_both_events() {
        let sources = SignalSources::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subs = sources.subscribe(SignalKind::Charger, &tx);
        assert_eq!(subs.len(), 2);

        sources.charger.set_valid(true);
        sources.charger.set_state(ChargerState::On);

        assert_eq!(
            rx.try_recv().unwrap(),
            Message::Signal(SignalUpdate::Charger(Update::Valid(true)))
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::Signal(SignalUpdate::Charger(Update::State(ChargerState::On)))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_stops_forwarding() {
        let sources = SignalSources::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for sub in sources.subscribe(SignalKind::Tethering, &tx) {
            sources.unsubscribe(sub);
        }
        assert_eq!(sources.handler_count(), 0);

        sources.tethering.set_valid(true);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_snapshot_mirrors_sources() {
        let sources = SignalSources::new();
        sources.display.set_valid(true);
        sources.display.set_state(DisplayState::On);

        let snapshot = sources.snapshot();
        assert!(snapshot.display.valid);
        assert_eq!(snapshot.display.state, DisplayState::On);
        assert!(!snapshot.battery.valid);
    }
}
