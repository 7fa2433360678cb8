//! Scenario replay
//!
//! Runs the configured device monitors against an in-process transport and
//! modem slot, driven by a TOML scenario. After every step the replay reports
//! the radio requests that went out and the effective cell info interval
//! changes, so a configuration can be checked without a modem.
//!
//! ```toml
//! interface = "1.4"
//!
//! [settings.devmon]
//! tracking = ["ds", "if"]
//!
//! [initial]
//! display = "on"
//! battery = "ok"
//!
//! [[steps]]
//! action = "display"
//! state = "off"
//!
//! [[steps]]
//! action = "respond"
//! reply = "not_supported"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use devmon_app::{
    build_monitors, start_all, DevmonIo, ManualNotifier, ManualProbe, Settings, SharedSources,
    SignalSources, WatchEvent,
};
use devmon_core::prelude::*;
use devmon_core::{BatteryState, BatteryStatus, ChargerState, DisplayState, Signal};
use devmon_radio::{
    CellInfoIntervals, ChannelTransport, Completion, OutgoingRequest, RadioError, RadioInterface,
    RadioRequest, RadioResp, TxStatus,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A replay scenario file
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Slot name used for logging and the modem slot
    #[serde(default = "default_slot")]
    pub slot: String,

    pub interface: RadioInterface,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub initial: InitialState,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_slot() -> String {
    "slot1".to_string()
}

/// Source state before any session starts. A signal given here starts valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitialState {
    pub display: Option<DisplayState>,
    pub battery: Option<BatteryStatus>,
    pub charger: Option<ChargerState>,
    pub tethering: Option<bool>,

    /// Contents of the screen state file
    #[serde(default)]
    pub screen_on: bool,

    /// What the battery probe returns
    #[serde(default)]
    pub battery_poll: BatteryState,
}

/// One scenario step
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Display {
        valid: Option<bool>,
        state: Option<DisplayState>,
    },
    Battery {
        valid: Option<bool>,
        state: Option<BatteryStatus>,
    },
    Charger {
        valid: Option<bool>,
        state: Option<ChargerState>,
    },
    Tethering {
        valid: Option<bool>,
        state: Option<bool>,
    },
    /// Rewrite the screen state file and report the change
    Screen { on: bool },
    /// Battery probe result seen by the next screen change
    BatteryPoll { state: BatteryState },
    /// The screen state watch breaks
    WatchFailed {
        #[serde(default)]
        reason: String,
    },
    /// Answer a request; the latest pending one if `serial` is omitted
    Respond { serial: Option<u64>, reply: Reply },
    /// Complete every pending request with a transport failure
    FailAll {
        #[serde(default = "default_fail_status")]
        status: TxStatus,
    },
    /// Tear all sessions down
    Shutdown,
}

fn default_fail_status() -> TxStatus {
    TxStatus::Failed
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Display { .. } => "display",
            Step::Battery { .. } => "battery",
            Step::Charger { .. } => "charger",
            Step::Tethering { .. } => "tethering",
            Step::Screen { .. } => "screen",
            Step::BatteryPoll { .. } => "battery_poll",
            Step::WatchFailed { .. } => "watch_failed",
            Step::Respond { .. } => "respond",
            Step::FailAll { .. } => "fail_all",
            Step::Shutdown => "shutdown",
        }
    }
}

/// How the remote side answers a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Ok,
    NotSupported,
    Failure,
    /// Answered with an operation code that does not match the request
    WrongResponse,
    TxFailed,
    Timeout,
}

impl Reply {
    pub fn completion(self, request: &RadioRequest) -> Completion {
        let resp = request.code.response();
        match self {
            Reply::Ok => Completion::ok(resp),
            Reply::NotSupported => Completion::error(resp, RadioError::RequestNotSupported),
            Reply::Failure => Completion::error(resp, RadioError::GenericFailure),
            Reply::WrongResponse => Completion::ok(RadioResp::Other(0)),
            Reply::TxFailed => Completion::failed(TxStatus::Failed),
            Reply::Timeout => Completion::failed(TxStatus::Timeout),
        }
    }
}

/// What one step produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub action: &'static str,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<OutgoingRequest>,

    /// Effective interval changes; `None` once no session holds a request
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intervals: Vec<Option<u32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered: Option<u64>,
}

/// Parse a scenario from TOML
pub fn parse_scenario(content: &str) -> Result<Scenario> {
    toml::from_str(content).map_err(|e| Error::config(format!("invalid scenario: {}", e)))
}

/// Load a scenario file
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    parse_scenario(&content)
}

/// Run a scenario to completion. The first report covers session startup.
pub fn run(scenario: &Scenario) -> Result<Vec<StepReport>> {
    let mut replay = Replay::start(scenario)?;
    let mut reports = vec![replay.report(0, "start", None)];
    for (i, step) in scenario.steps.iter().enumerate() {
        reports.push(replay.apply(i + 1, step)?);
    }
    Ok(reports)
}

/// A running scenario
pub struct Replay {
    signals: Arc<SignalSources>,
    probe: Arc<ManualProbe>,
    notifier: ManualNotifier,
    transport: Arc<ChannelTransport>,
    outgoing: mpsc::UnboundedReceiver<OutgoingRequest>,
    interval_log: Arc<Mutex<Vec<Option<u32>>>>,
    sent: BTreeMap<u64, RadioRequest>,
    sessions: Vec<DevmonIo>,
    screen_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl Replay {
    /// Set up the sources and start one session per tracked variant
    pub fn start(scenario: &Scenario) -> Result<Self> {
        scenario.settings.validate()?;

        let dir = tempfile::tempdir()?;
        let screen_path = dir.path().join("screen_on");
        write_screen(&screen_path, scenario.initial.screen_on)?;

        let mut settings = scenario.settings.clone();
        settings.poll.screen_state_path = screen_path.clone();

        let signals = SignalSources::new();
        let initial = &scenario.initial;
        set_signal(&signals.display, initial.display.map(|_| true), initial.display);
        set_signal(&signals.battery, initial.battery.map(|_| true), initial.battery);
        set_signal(&signals.charger, initial.charger.map(|_| true), initial.charger);
        set_signal(&signals.tethering, initial.tethering.map(|_| true), initial.tethering);

        let probe = Arc::new(ManualProbe::new(initial.battery_poll));
        let notifier = ManualNotifier::new();
        let shared = SharedSources {
            signals: Arc::clone(&signals),
            probe: probe.clone(),
            notifier: Arc::new(notifier.clone()),
        };

        let (transport, outgoing) = ChannelTransport::new(scenario.slot.clone(), scenario.interface);
        let transport = Arc::new(transport);

        let interval_log = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&interval_log);
        let slot = CellInfoIntervals::new(scenario.slot.clone()).with_listener(move |ms| {
            log.lock().unwrap_or_else(PoisonError::into_inner).push(ms);
        });

        let monitors = build_monitors(&settings, &shared);
        info!(
            "replaying {} steps on {} ({} sessions, radio {})",
            scenario.steps.len(),
            scenario.slot,
            monitors.len(),
            scenario.interface
        );
        let sessions = start_all(&monitors, transport.clone(), Arc::new(slot));

        Ok(Self {
            signals,
            probe,
            notifier,
            transport,
            outgoing,
            interval_log,
            sent: BTreeMap::new(),
            sessions,
            screen_path,
            _dir: dir,
        })
    }

    /// Apply one step and report its effects
    pub fn apply(&mut self, step_no: usize, step: &Step) -> Result<StepReport> {
        debug!("step {}: {:?}", step_no, step);
        let mut answered = None;

        match step {
            Step::Display { valid, state } => set_signal(&self.signals.display, *valid, *state),
            Step::Battery { valid, state } => set_signal(&self.signals.battery, *valid, *state),
            Step::Charger { valid, state } => set_signal(&self.signals.charger, *valid, *state),
            Step::Tethering { valid, state } => {
                set_signal(&self.signals.tethering, *valid, *state)
            }
            Step::Screen { on } => {
                write_screen(&self.screen_path, *on)?;
                self.notifier.emit(WatchEvent::Changed);
            }
            Step::BatteryPoll { state } => self.probe.set(*state),
            Step::WatchFailed { reason } => {
                self.notifier.emit(WatchEvent::Failed(reason.clone()));
            }
            Step::Respond { serial, reply } => {
                let serial = match serial {
                    Some(serial) => *serial,
                    None => self
                        .latest_pending()
                        .ok_or_else(|| Error::transport("no pending request to answer"))?,
                };
                let request = self
                    .sent
                    .get(&serial)
                    .copied()
                    .ok_or_else(|| Error::transport(format!("unknown request #{}", serial)))?;
                if !self.transport.handle_response(serial, reply.completion(&request)) {
                    debug!("request #{} is no longer pending", serial);
                }
                answered = Some(serial);
            }
            Step::FailAll { status } => {
                let failed = self.transport.fail_all(*status);
                debug!("failed {} pending requests", failed);
            }
            Step::Shutdown => {
                for io in self.sessions.iter_mut() {
                    io.shutdown();
                }
            }
        }

        Ok(self.report(step_no, step.name(), answered))
    }

    pub fn sessions(&self) -> &[DevmonIo] {
        &self.sessions
    }

    fn latest_pending(&self) -> Option<u64> {
        self.sent
            .keys()
            .rev()
            .copied()
            .find(|serial| self.transport.is_pending(*serial))
    }

    /// Let every session drain its queue, then collect what went out
    fn report(&mut self, step: usize, action: &'static str, answered: Option<u64>) -> StepReport {
        loop {
            let handled: usize = self.sessions.iter_mut().map(DevmonIo::process_pending).sum();
            if handled == 0 {
                break;
            }
        }

        let mut requests = Vec::new();
        while let Ok(out) = self.outgoing.try_recv() {
            self.sent.insert(out.serial, out.request);
            requests.push(out);
        }

        let intervals = std::mem::take(
            &mut *self
                .interval_log
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        StepReport {
            step,
            action,
            requests,
            intervals,
            answered,
        }
    }
}

impl std::fmt::Debug for Replay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replay")
            .field("sessions", &self.sessions)
            .field("sent", &self.sent.len())
            .field("screen_path", &self.screen_path)
            .finish_non_exhaustive()
    }
}

fn set_signal<S>(signal: &Signal<S>, valid: Option<bool>, state: Option<S>)
where
    S: Copy + PartialEq + Send + 'static,
{
    if let Some(valid) = valid {
        signal.set_valid(valid);
    }
    if let Some(state) = state {
        signal.set_state(state);
    }
}

fn write_screen(path: &Path, on: bool) -> Result<()> {
    std::fs::write(path, if on { "yes\n" } else { "no\n" })
        .with_context(|| format!("writing screen state {}", path.display()))
}
