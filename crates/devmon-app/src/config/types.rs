//! Configuration types for devmon
//!
//! Defines:
//! - `Settings` - Top-level settings file
//! - `DevmonSettings` - Tracked variants and cell info intervals
//! - `PollSettings` - Secondary poll bridge sources
//! - `Variant` - Device monitor flavours

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use devmon_core::prelude::*;
use serde::{Deserialize, Serialize};

use crate::decision::Intervals;

/// Device monitor flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Variant {
    /// Reports low-data-expected and charging state via `sendDeviceState`
    #[serde(rename = "ds")]
    DeviceState,
    /// Narrows unsolicited indications while the screen is off
    #[serde(rename = "if")]
    IndicationFilter,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::DeviceState, Variant::IndicationFilter];

    pub fn name(&self) -> &'static str {
        match self {
            Variant::DeviceState => "ds",
            Variant::IndicationFilter => "if",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ds" => Ok(Variant::DeviceState),
            "if" => Ok(Variant::IndicationFilter),
            other => Err(Error::config(format!("unknown variant '{}'", other))),
        }
    }
}

/// Settings file (devmon.toml)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub devmon: DevmonSettings,

    #[serde(default)]
    pub poll: PollSettings,
}

impl Settings {
    /// Reject values no session could work with
    pub fn validate(&self) -> Result<()> {
        let d = &self.devmon;
        if d.cell_info_interval_short_ms == 0 || d.cell_info_interval_long_ms == 0 {
            return Err(Error::config_invalid("cell info intervals must be non-zero"));
        }
        if d.cell_info_interval_short_ms > d.cell_info_interval_long_ms {
            return Err(Error::config_invalid(format!(
                "short cell info interval ({} ms) exceeds long interval ({} ms)",
                d.cell_info_interval_short_ms, d.cell_info_interval_long_ms
            )));
        }
        Ok(())
    }
}

/// `[devmon]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DevmonSettings {
    /// Variants to run on every slot; empty disables tracking
    #[serde(default = "default_tracking")]
    pub tracking: Vec<Variant>,

    #[serde(default = "default_short_ms")]
    pub cell_info_interval_short_ms: u32,

    #[serde(default = "default_long_ms")]
    pub cell_info_interval_long_ms: u32,
}

impl DevmonSettings {
    pub fn intervals(&self) -> Intervals {
        Intervals::new(
            self.cell_info_interval_short_ms,
            self.cell_info_interval_long_ms,
        )
    }
}

impl Default for DevmonSettings {
    fn default() -> Self {
        Self {
            tracking: default_tracking(),
            cell_info_interval_short_ms: default_short_ms(),
            cell_info_interval_long_ms: default_long_ms(),
        }
    }
}

fn default_tracking() -> Vec<Variant> {
    vec![Variant::DeviceState]
}

fn default_short_ms() -> u32 {
    Intervals::DEFAULT_SHORT_MS
}

fn default_long_ms() -> u32 {
    Intervals::DEFAULT_LONG_MS
}

/// `[poll]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Single-line file holding "yes" while the screen is on
    #[serde(default = "default_screen_state_path")]
    pub screen_state_path: PathBuf,

    /// Linux power supply class directory
    #[serde(default = "default_power_supply_dir")]
    pub power_supply_dir: PathBuf,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            screen_state_path: default_screen_state_path(),
            power_supply_dir: default_power_supply_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_screen_state_path() -> PathBuf {
    PathBuf::from("/var/lib/batman/screen")
}

fn default_power_supply_dir() -> PathBuf {
    PathBuf::from("/sys/class/power_supply")
}
