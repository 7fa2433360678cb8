//! Decision functions
//!
//! Pure derivations from signal snapshots (primary path) or from a poll
//! sample (bridge path). Nothing here touches sessions or transports.

use std::collections::BTreeMap;

use devmon_core::{BatteryState, BatteryStatus, ChargerState, DisplayState, SignalSnapshot};
use devmon_radio::RequestClass;
use serde::{Deserialize, Serialize};

/// Lowest battery status still considered healthy
pub const BATTERY_OK_THRESHOLD: BatteryStatus = BatteryStatus::Ok;

/// Cached mirror of every primary signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub display: SignalSnapshot<DisplayState>,
    pub battery: SignalSnapshot<BatteryStatus>,
    pub charger: SignalSnapshot<ChargerState>,
    pub tethering: SignalSnapshot<bool>,
}

pub fn battery_ok(s: &Snapshot) -> bool {
    s.battery.valid && s.battery.state >= BATTERY_OK_THRESHOLD
}

pub fn charging(s: &Snapshot) -> bool {
    s.charger.valid && s.charger.state == ChargerState::On
}

pub fn display_on(s: &Snapshot) -> bool {
    s.display.valid && s.display.state != DisplayState::Off
}

pub fn tethering_on(s: &Snapshot) -> bool {
    s.tethering.valid && s.tethering.state
}

/// No sign of user activity: not tethering, not charging, screen off
pub fn low_data_expected(s: &Snapshot) -> bool {
    !tethering_on(s) && !charging(s) && !display_on(s)
}

/// Short/long cell info polling intervals, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervals {
    pub short_ms: u32,
    pub long_ms: u32,
}

impl Intervals {
    pub const DEFAULT_SHORT_MS: u32 = 2000;
    pub const DEFAULT_LONG_MS: u32 = 30000;

    pub fn new(short_ms: u32, long_ms: u32) -> Self {
        Self { short_ms, long_ms }
    }

    pub fn pick(&self, short: bool) -> u32 {
        if short {
            self.short_ms
        } else {
            self.long_ms
        }
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SHORT_MS, Self::DEFAULT_LONG_MS)
    }
}

/// Poll frequently only while the screen is on and power is not a concern
pub fn cell_info_interval(s: &Snapshot, intervals: &Intervals) -> u32 {
    intervals.pick(display_on(s) && (charging(s) || battery_ok(s)))
}

/// One reading of the out-of-band sources used by the poll bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSample {
    pub screen_on: bool,
    pub battery: BatteryState,
}

pub fn poll_low_data(p: &PollSample) -> bool {
    !p.screen_on && p.battery == BatteryState::Discharging
}

pub fn poll_charging(p: &PollSample) -> bool {
    p.battery.is_charging()
}

pub fn poll_cell_info_interval(p: &PollSample, intervals: &Intervals) -> u32 {
    intervals.pick(p.screen_on || poll_charging(p))
}

/// Last value recorded per request class.
///
/// A class with no entry has no assumed value, so its first update always
/// counts as a change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionSet {
    values: BTreeMap<RequestClass, bool>,
}

impl DecisionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an assumed value without counting it as a change
    pub fn assume(&mut self, class: RequestClass, value: bool) {
        self.values.insert(class, value);
    }

    pub fn get(&self, class: RequestClass) -> Option<bool> {
        self.values.get(&class).copied()
    }

    /// Record `value`. Returns true if it differs from the previous one.
    pub fn update(&mut self, class: RequestClass, value: bool) -> bool {
        self.values.insert(class, value) != Some(value)
    }
}
