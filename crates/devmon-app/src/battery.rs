//! Battery state polling helper
//!
//! The poll bridge asks a [`BatteryProbe`] for a coarse battery state on every
//! tick. There is no subscription model.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use devmon_core::prelude::*;
use devmon_core::BatteryState;

/// Synchronous battery state query
pub trait BatteryProbe: Send + Sync {
    fn query(&self) -> BatteryState;
}

/// Reads Linux sysfs power supply entries.
///
/// The first supply whose `type` is `Battery` is used. Without one the
/// device has no battery.
#[derive(Debug, Clone)]
pub struct PowerSupplyProbe {
    dir: PathBuf,
}

impl PowerSupplyProbe {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn battery_dirs(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| read_attr(path, "type").as_deref() == Some("Battery"))
            .collect();
        dirs.sort();
        dirs
    }
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Map a sysfs `status` value
pub fn parse_status(status: &str) -> BatteryState {
    match status.trim() {
        "Charging" => BatteryState::Charging,
        "Discharging" => BatteryState::Discharging,
        "Full" => BatteryState::FullyCharged,
        _ => BatteryState::Unknown,
    }
}

impl BatteryProbe for PowerSupplyProbe {
    fn query(&self) -> BatteryState {
        let Some(battery) = self.battery_dirs().into_iter().next() else {
            return BatteryState::NoBattery;
        };
        let state = read_attr(&battery, "status")
            .map(|status| parse_status(&status))
            .unwrap_or(BatteryState::Unknown);
        trace!("{}: {}", battery.display(), state);
        state
    }
}

/// Probe returning whatever was last set
#[derive(Debug, Default)]
pub struct ManualProbe {
    state: Mutex<BatteryState>,
}

impl ManualProbe {
    pub fn new(state: BatteryState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set(&self, state: BatteryState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl BatteryProbe for ManualProbe {
    fn query(&self) -> BatteryState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
