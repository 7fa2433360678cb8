//! Tests for the session engine.

use std::sync::Arc;
use std::time::Duration;

use devmon_core::{BatteryState, BatteryStatus, ChargerState, DisplayState};
use devmon_radio::test_utils::{drain_outgoing, RecordingSlot};
use devmon_radio::{
    ChannelTransport, Completion, DeviceStateType, IndicationFilter, OutgoingRequest, Payload,
    RadioError, RadioInterface, RadioReq, RadioResp, RequestClass, TxStatus,
};
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

use crate::battery::ManualProbe;
use crate::config::Variant;
use crate::decision::Intervals;
use crate::session::{DevmonIo, PollSetup, SessionParams};
use crate::sources::SignalSources;
use crate::variant::VariantProfile;
use crate::watcher::{ManualNotifier, WatchEvent};

const SHORT: u32 = 2000;
const LONG: u32 = 30000;

struct Harness {
    sources: Arc<SignalSources>,
    transport: Arc<ChannelTransport>,
    outgoing: mpsc::UnboundedReceiver<OutgoingRequest>,
    slot: Arc<RecordingSlot>,
    notifier: ManualNotifier,
    probe: Arc<ManualProbe>,
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_interface(RadioInterface::V1_4)
    }

    fn with_interface(interface: RadioInterface) -> Self {
        let (transport, outgoing) = ChannelTransport::new("slot1", interface);
        Self {
            sources: SignalSources::new(),
            transport: Arc::new(transport),
            outgoing,
            slot: Arc::new(RecordingSlot::new()),
            notifier: ManualNotifier::new(),
            probe: Arc::new(ManualProbe::new(BatteryState::Unknown)),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn screen_path(&self) -> std::path::PathBuf {
        self.dir.path().join("screen")
    }

    fn write_screen(&self, contents: &str) {
        std::fs::write(self.screen_path(), contents).unwrap();
    }

    fn params(&self, variant: Variant, poll: bool) -> SessionParams {
        SessionParams {
            profile: VariantProfile::for_variant(variant),
            intervals: Intervals::new(SHORT, LONG),
            sources: Arc::clone(&self.sources),
            poll: poll.then(|| PollSetup {
                screen_path: self.screen_path(),
                probe: self.probe.clone(),
                notifier: Arc::new(self.notifier.clone()),
            }),
        }
    }

    fn start(&self, variant: Variant, poll: bool) -> DevmonIo {
        DevmonIo::start(
            self.params(variant, poll),
            self.transport.clone(),
            self.slot.clone(),
        )
    }

    /// Every valid, screen on, charger off, battery fine, no tethering
    fn activate(&self) {
        let s = &self.sources;
        s.display.set_valid(true);
        s.display.set_state(DisplayState::On);
        s.battery.set_valid(true);
        s.battery.set_state(BatteryStatus::Ok);
        s.charger.set_valid(true);
        s.charger.set_state(ChargerState::Off);
        s.tethering.set_valid(true);
        s.tethering.set_state(false);
    }

    fn sent(&mut self) -> Vec<OutgoingRequest> {
        drain_outgoing(&mut self.outgoing)
    }

    fn respond(&self, io: &mut DevmonIo, serial: u64, completion: Completion) {
        assert!(self.transport.handle_response(serial, completion));
        io.process_pending();
    }
}

fn device_states(out: &[OutgoingRequest]) -> Vec<(DeviceStateType, bool)> {
    out.iter()
        .filter_map(|o| match o.request.payload {
            Payload::DeviceState { kind, state } => Some((kind, state)),
            Payload::IndicationFilter(_) => None,
        })
        .collect()
}

fn filters(out: &[OutgoingRequest]) -> Vec<(RadioReq, IndicationFilter)> {
    out.iter()
        .filter_map(|o| match o.request.payload {
            Payload::IndicationFilter(filter) => Some((o.request.code, filter)),
            Payload::DeviceState { .. } => None,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────
// Startup
// ─────────────────────────────────────────────────────────

#[test]
fn test_ds_start_with_invalid_signals_sends_low_data() {
    let mut h = Harness::new();
    let io = h.start(Variant::DeviceState, false);

    // Nothing is valid, so nothing signals activity
    assert_eq!(
        device_states(&h.sent()),
        vec![(DeviceStateType::LowDataExpected, true)]
    );
    assert_eq!(io.decision(RequestClass::ChargingState), Some(false));
    assert_eq!(h.slot.pushes(), vec![LONG]);
}

#[test]
fn test_ds_start_only_sends_true_values() {
    let mut h = Harness::new();
    h.activate();
    let _io = h.start(Variant::DeviceState, false);

    assert!(h.sent().is_empty());
    assert_eq!(h.slot.pushes(), vec![SHORT]);
}

#[test]
fn test_ds_start_while_charging() {
    let mut h = Harness::new();
    h.activate();
    h.sources.charger.set_state(ChargerState::On);
    let _io = h.start(Variant::DeviceState, false);

    assert_eq!(
        device_states(&h.sent()),
        vec![(DeviceStateType::ChargingState, true)]
    );
}

#[test]
fn test_if_start_always_sends_filter() {
    let mut h = Harness::new();
    h.activate();
    let _io = h.start(Variant::IndicationFilter, false);

    assert_eq!(
        filters(&h.sent()),
        vec![(RadioReq::SetIndicationFilter1_2, IndicationFilter::ALL_1_2)]
    );
}

#[test]
fn test_if_filter_follows_interface_version() {
    let mut h = Harness::with_interface(RadioInterface::V1_0);
    h.activate();
    let _io = h.start(Variant::IndicationFilter, false);
    assert_eq!(
        filters(&h.sent()),
        vec![(RadioReq::SetIndicationFilter, IndicationFilter::ALL)]
    );

    let mut h = Harness::with_interface(RadioInterface::V1_5);
    let _io = h.start(Variant::IndicationFilter, false);
    assert_eq!(
        filters(&h.sent()),
        vec![(
            RadioReq::SetIndicationFilter1_5,
            IndicationFilter::DATA_CALL_DORMANCY_CHANGED
        )]
    );
}

#[test]
fn test_if_does_not_observe_tethering() {
    let h = Harness::new();
    let _io = h.start(Variant::IndicationFilter, false);

    assert_eq!(h.sources.tethering.handler_count(), 0);
    assert_eq!(h.sources.display.handler_count(), 2);
}

// ─────────────────────────────────────────────────────────
// Decisions and debouncing
// ─────────────────────────────────────────────────────────

#[test]
fn test_display_off_sends_low_data_exactly_once() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, false);
    assert!(h.sent().is_empty());

    h.sources.display.set_state(DisplayState::Off);
    io.process_pending();

    assert_eq!(
        device_states(&h.sent()),
        vec![(DeviceStateType::LowDataExpected, true)]
    );
    assert_eq!(io.decision(RequestClass::LowDataExpected), Some(true));
}

#[test]
fn test_unchanged_decisions_send_nothing() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, false);

    // Dim still counts as on; battery changes feed no ds decision
    h.sources.display.set_state(DisplayState::Dim);
    h.sources.battery.set_state(BatteryStatus::Full);
    h.sources.battery.set_state(BatteryStatus::Low);
    io.process_pending();

    assert!(h.sent().is_empty());
}

#[test]
fn test_interval_pushed_on_every_pass() {
    let h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, false);
    h.slot.clear();

    h.sources.tethering.set_state(true);
    h.sources.tethering.set_state(false);
    h.sources.battery.set_state(BatteryStatus::Full);
    io.process_pending();

    assert_eq!(h.slot.pushes(), vec![SHORT, SHORT, SHORT]);

    // Screen on but battery low and not charging
    h.sources.battery.set_state(BatteryStatus::Low);
    io.process_pending();
    assert_eq!(h.slot.last_interval(), Some(LONG));

    // Charging makes up for the low battery
    h.sources.charger.set_state(ChargerState::On);
    io.process_pending();
    assert_eq!(h.slot.last_interval(), Some(SHORT));

    // Screen off always polls slowly
    h.sources.display.set_state(DisplayState::Off);
    io.process_pending();
    assert_eq!(h.slot.last_interval(), Some(LONG));
}

#[test]
fn test_validity_change_is_a_decision_input() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, false);

    h.sources.display.set_valid(false);
    io.process_pending();

    assert_eq!(
        device_states(&h.sent()),
        vec![(DeviceStateType::LowDataExpected, true)]
    );
}

// ─────────────────────────────────────────────────────────
// Dispatch and completion
// ─────────────────────────────────────────────────────────

#[test]
fn test_newer_decision_supersedes_pending_request() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, false);

    h.sources.display.set_state(DisplayState::Off);
    io.process_pending();
    h.sources.display.set_state(DisplayState::On);
    io.process_pending();

    let sent = h.sent();
    assert_eq!(
        device_states(&sent),
        vec![
            (DeviceStateType::LowDataExpected, true),
            (DeviceStateType::LowDataExpected, false)
        ]
    );
    // The first one was dropped and can no longer complete
    assert!(!h.transport.is_pending(sent[0].serial));
    assert!(!h
        .transport
        .handle_response(sent[0].serial, Completion::ok(RadioResp::SendDeviceState)));

    h.respond(&mut io, sent[1].serial, Completion::ok(RadioResp::SendDeviceState));
    assert!(!io.is_pending(RequestClass::LowDataExpected));
}

#[test]
fn test_not_supported_disables_class_for_good() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, false);

    h.sources.charger.set_state(ChargerState::On);
    io.process_pending();
    let sent = h.sent();
    assert_eq!(
        device_states(&sent),
        vec![(DeviceStateType::ChargingState, true)]
    );

    h.respond(
        &mut io,
        sent[0].serial,
        Completion::error(RadioResp::SendDeviceState, RadioError::RequestNotSupported),
    );
    assert!(!io.is_supported(RequestClass::ChargingState));

    for _ in 0..3 {
        h.sources.charger.set_state(ChargerState::Off);
        h.sources.charger.set_state(ChargerState::On);
    }
    h.sources.charger.set_state(ChargerState::Off);
    io.process_pending();

    // Decisions keep tracking, nothing is sent
    assert_eq!(io.decision(RequestClass::ChargingState), Some(false));
    assert!(h.sent().is_empty());
    assert!(io.is_supported(RequestClass::LowDataExpected));
}

#[test]
fn test_transport_failure_is_not_retried() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, false);

    h.sources.charger.set_state(ChargerState::On);
    io.process_pending();
    let sent = h.sent();

    h.respond(&mut io, sent[0].serial, Completion::failed(TxStatus::Failed));

    assert!(!io.is_pending(RequestClass::ChargingState));
    assert!(io.is_supported(RequestClass::ChargingState));
    assert!(h.sent().is_empty());
}

#[test]
fn test_wrong_response_is_tolerated() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::IndicationFilter, false);
    let sent = h.sent();

    h.respond(
        &mut io,
        sent[0].serial,
        Completion::error(RadioResp::Other(99), RadioError::RequestNotSupported),
    );

    assert!(io.is_supported(RequestClass::IndicationFilter));
    assert!(!io.is_pending(RequestClass::IndicationFilter));

    h.sources.display.set_state(DisplayState::Off);
    io.process_pending();
    assert_eq!(
        filters(&h.sent()),
        vec![(
            RadioReq::SetIndicationFilter1_2,
            IndicationFilter::DATA_CALL_DORMANCY_CHANGED
        )]
    );
}

#[test]
fn test_transport_refusal_keeps_session_alive() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, false);
    h.outgoing.close();

    h.sources.charger.set_state(ChargerState::On);
    io.process_pending();

    assert!(!io.is_pending(RequestClass::ChargingState));
    assert_eq!(io.decision(RequestClass::ChargingState), Some(true));
}

// ─────────────────────────────────────────────────────────
// Poll bridge
// ─────────────────────────────────────────────────────────

#[test]
fn test_bridge_unreadable_screen_while_discharging() {
    let mut h = Harness::new();
    h.activate();
    h.probe.set(BatteryState::Discharging);
    let io = h.start(Variant::DeviceState, true);

    assert!(io.is_polling());
    assert_eq!(io.bridge_decision(RequestClass::LowDataExpected), Some(true));
    assert_eq!(io.bridge_decision(RequestClass::ChargingState), Some(false));
    assert_eq!(
        device_states(&h.sent()),
        vec![(DeviceStateType::LowDataExpected, true)]
    );
    assert_eq!(h.slot.last_interval(), Some(LONG));
    // Primary decision is untouched
    assert_eq!(io.decision(RequestClass::LowDataExpected), Some(false));
}

#[test]
fn test_bridge_reacts_to_screen_changes() {
    let mut h = Harness::new();
    h.activate();
    h.probe.set(BatteryState::Discharging);
    h.write_screen("no\n");
    let mut io = h.start(Variant::DeviceState, true);
    h.sent();

    h.write_screen("yes\n");
    h.notifier.emit(WatchEvent::Changed);
    io.process_pending();

    assert_eq!(
        device_states(&h.sent()),
        vec![(DeviceStateType::LowDataExpected, false)]
    );
    assert_eq!(h.slot.last_interval(), Some(SHORT));

    // Same content again: interval pushed, nothing sent
    let pushes = h.slot.push_count();
    h.notifier.emit(WatchEvent::Changed);
    io.process_pending();
    assert!(h.sent().is_empty());
    assert_eq!(h.slot.push_count(), pushes + 1);
}

#[test]
fn test_bridge_charging_states() {
    let mut h = Harness::new();
    h.activate();
    h.probe.set(BatteryState::FullyCharged);
    let mut io = h.start(Variant::DeviceState, true);

    assert_eq!(
        device_states(&h.sent()),
        vec![(DeviceStateType::ChargingState, true)]
    );
    assert_eq!(h.slot.last_interval(), Some(SHORT));

    h.probe.set(BatteryState::Charging);
    h.notifier.emit(WatchEvent::Changed);
    io.process_pending();
    assert!(h.sent().is_empty());
}

#[test]
fn test_bridge_supersedes_primary_request() {
    let mut h = Harness::new();
    h.probe.set(BatteryState::Discharging);
    // All signals invalid: primary wants low data too
    let io = h.start(Variant::DeviceState, true);

    let sent = h.sent();
    assert_eq!(
        device_states(&sent),
        vec![
            (DeviceStateType::LowDataExpected, true),
            (DeviceStateType::LowDataExpected, true)
        ]
    );
    assert!(!h.transport.is_pending(sent[0].serial));
    assert!(h.transport.is_pending(sent[1].serial));
    assert!(io.is_pending(RequestClass::LowDataExpected));
}

#[test]
fn test_if_bridge_only_pushes_interval() {
    let mut h = Harness::new();
    h.activate();
    h.sources.display.set_state(DisplayState::Off);
    h.probe.set(BatteryState::Charging);
    let _io = h.start(Variant::IndicationFilter, true);

    assert_eq!(filters(&h.sent()).len(), 1);
    // Primary says long (screen off), bridge says short (charging), bridge ran last
    assert_eq!(h.slot.pushes(), vec![LONG, SHORT]);
}

#[test]
fn test_watch_failure_stops_polling_only() {
    let mut h = Harness::new();
    h.activate();
    h.probe.set(BatteryState::Discharging);
    h.write_screen("yes");
    let mut io = h.start(Variant::DeviceState, true);
    h.sent();

    h.notifier.emit(WatchEvent::Failed("IN_IGNORED".to_string()));
    io.process_pending();
    assert!(!io.is_polling());
    assert_eq!(h.notifier.watch_count(), 0);

    h.write_screen("no");
    h.notifier.emit(WatchEvent::Changed);
    io.process_pending();
    assert!(h.sent().is_empty());

    // Primary path still works
    h.sources.display.set_state(DisplayState::Off);
    io.process_pending();
    assert_eq!(
        device_states(&h.sent()),
        vec![(DeviceStateType::LowDataExpected, true)]
    );
}

#[test]
fn test_watch_setup_failure_skips_initial_tick() {
    let mut h = Harness::new();
    h.activate();
    h.probe.set(BatteryState::Discharging);
    h.notifier.fail_next_watch("no inotify");
    let io = h.start(Variant::DeviceState, true);

    assert!(!io.is_polling());
    assert_eq!(io.bridge_decision(RequestClass::LowDataExpected), None);
    assert!(h.sent().is_empty());
    assert_eq!(h.slot.pushes(), vec![SHORT]);
}

// ─────────────────────────────────────────────────────────
// Teardown
// ─────────────────────────────────────────────────────────

#[test]
fn test_shutdown_releases_everything() {
    let mut h = Harness::new();
    let mut io = h.start(Variant::DeviceState, true);
    assert!(io.is_pending(RequestClass::LowDataExpected));
    assert_eq!(h.notifier.watch_count(), 1);
    h.sent();

    io.shutdown();

    assert!(io.is_closed());
    assert_eq!(h.sources.handler_count(), 0);
    assert_eq!(h.transport.pending_count(), 0);
    assert_eq!(h.notifier.watch_count(), 0);
    assert!(h.slot.dropped(io.id()));

    // Second call is a no-op
    io.shutdown();
    assert_eq!(
        h.slot
            .calls()
            .iter()
            .filter(|c| matches!(c, devmon_radio::test_utils::SlotCall::DropRequests { .. }))
            .count(),
        1
    );
}

#[test]
fn test_queued_events_are_dropped_at_shutdown() {
    let mut h = Harness::new();
    h.activate();
    let mut io = h.start(Variant::DeviceState, true);
    h.sent();
    let pushes = h.slot.push_count();

    // Queued but not yet handled
    h.sources.display.set_state(DisplayState::Off);
    h.notifier.emit(WatchEvent::Changed);

    io.shutdown();
    assert_eq!(io.process_pending(), 0);

    h.sources.charger.set_state(ChargerState::On);
    assert_eq!(io.process_pending(), 0);

    assert!(h.sent().is_empty());
    assert_eq!(h.slot.push_count(), pushes);
}

#[test]
fn test_drop_shuts_down() {
    let h = Harness::new();
    let io = h.start(Variant::IndicationFilter, true);
    let id = io.id();

    drop(io);

    assert_eq!(h.sources.handler_count(), 0);
    assert_eq!(h.notifier.watch_count(), 0);
    assert!(h.slot.dropped(id));
}

#[tokio::test]
async fn test_run_loop_until_shutdown() {
    let mut h = Harness::new();
    h.activate();
    let io = h.start(Variant::DeviceState, false);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(io.run(shutdown_rx));

    h.sources.display.set_state(DisplayState::Off);
    let request = tokio::time::timeout(Duration::from_secs(5), h.outgoing.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        request.request.payload,
        Payload::DeviceState {
            kind: DeviceStateType::LowDataExpected,
            state: true
        }
    );

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(h.sources.handler_count(), 0);
    assert_eq!(h.transport.pending_count(), 0);
}

#[test]
fn test_run_returns_when_shutdown_sender_dropped() {
    let h = Harness::new();
    let io = h.start(Variant::DeviceState, true);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(shutdown_tx);

    tokio_test::block_on(io.run(shutdown_rx));

    assert_eq!(h.sources.handler_count(), 0);
    assert_eq!(h.notifier.watch_count(), 0);
}
