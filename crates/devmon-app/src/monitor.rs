//! Device monitor factory
//!
//! A [`DeviceMonitor`] holds the shared signal sources, the battery probe,
//! the change notifier and static settings for one variant. It owns nothing
//! session-specific; [`DeviceMonitor::start_io`] creates a session per modem.

use std::sync::Arc;

use devmon_core::prelude::*;
use devmon_radio::{ModemSlot, RadioTransport};

use crate::battery::{BatteryProbe, PowerSupplyProbe};
use crate::config::{Settings, Variant};
use crate::decision::Intervals;
use crate::session::{DevmonIo, PollSetup, SessionParams};
use crate::sources::SignalSources;
use crate::variant::VariantProfile;
use crate::watcher::{ChangeNotifier, InotifyNotifier};

/// Collaborators shared by every monitor
#[derive(Clone)]
pub struct SharedSources {
    pub signals: Arc<SignalSources>,
    pub probe: Arc<dyn BatteryProbe>,
    pub notifier: Arc<dyn ChangeNotifier>,
}

impl SharedSources {
    /// Sysfs battery probe and inotify-backed notifier
    pub fn system(settings: &Settings) -> Self {
        Self {
            signals: SignalSources::new(),
            probe: Arc::new(PowerSupplyProbe::new(settings.poll.power_supply_dir.clone())),
            notifier: Arc::new(InotifyNotifier::new()),
        }
    }
}

impl std::fmt::Debug for SharedSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSources")
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

pub struct DeviceMonitor {
    profile: &'static VariantProfile,
    intervals: Intervals,
    sources: SharedSources,
    poll: Option<std::path::PathBuf>,
}

impl DeviceMonitor {
    pub fn new(variant: Variant, settings: &Settings, sources: SharedSources) -> Self {
        Self {
            profile: VariantProfile::for_variant(variant),
            intervals: settings.devmon.intervals(),
            sources,
            poll: settings
                .poll
                .enabled
                .then(|| settings.poll.screen_state_path.clone()),
        }
    }

    pub fn variant(&self) -> Variant {
        self.profile.variant
    }

    pub fn intervals(&self) -> Intervals {
        self.intervals
    }

    /// Start tracking device state for one modem session
    pub fn start_io(
        &self,
        transport: Arc<dyn RadioTransport>,
        modem: Arc<dyn ModemSlot>,
    ) -> DevmonIo {
        let poll = self.poll.as_ref().map(|screen_path| PollSetup {
            screen_path: screen_path.clone(),
            probe: Arc::clone(&self.sources.probe),
            notifier: Arc::clone(&self.sources.notifier),
        });
        let params = SessionParams {
            profile: self.profile,
            intervals: self.intervals,
            sources: Arc::clone(&self.sources.signals),
            poll,
        };
        DevmonIo::start(params, transport, modem)
    }
}

impl std::fmt::Debug for DeviceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMonitor")
            .field("variant", &self.profile.variant)
            .field("intervals", &self.intervals)
            .field("poll", &self.poll)
            .finish()
    }
}

/// One monitor per tracked variant, all sharing `sources`.
///
/// Duplicate variants are ignored. An empty list yields no monitors.
pub fn build_monitors(settings: &Settings, sources: &SharedSources) -> Vec<DeviceMonitor> {
    let mut variants = settings.devmon.tracking.clone();
    variants.sort();
    variants.dedup();

    if variants.is_empty() {
        info!("Device state tracking disabled");
    }

    variants
        .into_iter()
        .map(|variant| {
            debug!("Tracking device state ({})", variant);
            DeviceMonitor::new(variant, settings, sources.clone())
        })
        .collect()
}

/// Start one session per monitor on the same modem
pub fn start_all(
    monitors: &[DeviceMonitor],
    transport: Arc<dyn RadioTransport>,
    modem: Arc<dyn ModemSlot>,
) -> Vec<DevmonIo> {
    monitors
        .iter()
        .map(|m| m.start_io(Arc::clone(&transport), Arc::clone(&modem)))
        .collect()
}
