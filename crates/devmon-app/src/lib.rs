//! # devmon-app - Device State Reconciliation Engine
//!
//! Turns display, battery, charger and tethering signals into a small set of
//! idempotent radio requests plus a cell info polling interval, per modem
//! session.
//!
//! Depends on [`devmon_core`] for signals and errors and on [`devmon_radio`]
//! for the request vocabulary, transport and modem slot.
//!
//! ## Public API
//!
//! ### Factory (`monitor`)
//! - [`DeviceMonitor`] - Shared sources + settings for one variant
//! - [`build_monitors()`] - One monitor per configured variant
//!
//! ### Session (`session`)
//! - [`DevmonIo`] - Per-session engine: subscriptions, decisions, dispatch,
//!   poll bridge
//! - [`Message`] - Everything a session reacts to
//!
//! ### Building blocks
//! - [`decision`] - Pure decision functions
//! - [`VariantProfile`] - Decision tables for the "ds" and "if" variants
//! - [`Dispatcher`] - One in-flight request per class, capability latching
//! - [`PollBridge`] - Screen state file + battery probe decisions
//! - [`ChangeNotifier`], [`BatteryProbe`] - Out-of-band source seams
//!
//! ### Configuration (`config`)
//! - [`Settings`], [`load_settings()`], [`parse_settings()`]

pub mod battery;
pub mod bridge;
pub mod capability;
pub mod config;
pub mod decision;
pub mod dispatcher;
pub mod message;
pub mod monitor;
pub mod session;
pub mod sources;
pub mod variant;
pub mod watcher;

pub use battery::{BatteryProbe, ManualProbe, PowerSupplyProbe};
pub use bridge::{read_screen_state, PollBridge};
pub use capability::CapabilityLatch;
pub use config::{load_settings, load_settings_strict, parse_settings, Settings, Variant};
pub use decision::{Intervals, PollSample, Snapshot};
pub use dispatcher::{CompletionOutcome, Dispatcher, SubmitOutcome, Ticket};
pub use message::{Message, SignalUpdate};
pub use monitor::{build_monitors, start_all, DeviceMonitor, SharedSources};
pub use session::{DevmonIo, PollSetup, SessionParams};
pub use sources::SignalSources;
pub use variant::VariantProfile;
pub use watcher::{ChangeNotifier, InotifyNotifier, ManualNotifier, WatchEvent, WatchHandle};
