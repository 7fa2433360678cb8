//! Domain types for device signals and sessions

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Global session ID counter
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of one running session.
///
/// Used as the owner key for per-session requests held by shared
/// collaborators (e.g. the requested cell info interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh, process-unique session ID
    pub fn next() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Display power state as reported by the display watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    #[default]
    Off,
    Dim,
    On,
}

/// Coarse battery charge level, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryStatus {
    #[default]
    Unknown,
    Empty,
    Low,
    Ok,
    Full,
}

/// Charger presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargerState {
    #[default]
    Unknown,
    Off,
    On,
}

/// Battery state as returned by the polling helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    NoBattery,
    Charging,
    Discharging,
    FullyCharged,
    #[default]
    Unknown,
}

impl BatteryState {
    /// Whether external power is feeding the battery
    pub fn is_charging(&self) -> bool {
        matches!(self, BatteryState::Charging | BatteryState::FullyCharged)
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryState::NoBattery => write!(f, "no battery"),
            BatteryState::Charging => write!(f, "charging"),
            BatteryState::Discharging => write!(f, "discharging"),
            BatteryState::FullyCharged => write!(f, "fully charged"),
            BatteryState::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_uniqueness() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_battery_status_ordering() {
        assert!(BatteryStatus::Ok >= BatteryStatus::Ok);
        assert!(BatteryStatus::Full > BatteryStatus::Ok);
        assert!(BatteryStatus::Low < BatteryStatus::Ok);
        assert!(BatteryStatus::Unknown < BatteryStatus::Empty);
    }

    #[test]
    fn test_battery_state_is_charging() {
        assert!(BatteryState::Charging.is_charging());
        assert!(BatteryState::FullyCharged.is_charging());
        assert!(!BatteryState::Discharging.is_charging());
        assert!(!BatteryState::NoBattery.is_charging());
        assert!(!BatteryState::Unknown.is_charging());
    }
}
