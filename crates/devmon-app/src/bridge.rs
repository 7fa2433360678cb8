//! Secondary poll bridge
//!
//! Derives decisions from the screen state file and the battery probe,
//! independently of the primary signals. The bridge keeps its own decision
//! values; the session feeds whatever changed into the shared dispatcher.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use devmon_core::prelude::*;
use tokio::sync::mpsc;

use crate::battery::BatteryProbe;
use crate::decision::{DecisionSet, PollSample};
use crate::message::Message;
use crate::variant::BridgeRule;
use crate::watcher::{ChangeNotifier, WatchEvent, WatchHandle};

const SCREEN_ON: &[u8] = b"yes";

/// Whether the screen state file says the screen is on.
///
/// Only the first three bytes matter. A missing or unreadable file reads as
/// "off".
pub fn read_screen_state(path: &Path) -> bool {
    let mut buf = Vec::with_capacity(SCREEN_ON.len());
    let result = File::open(path)
        .and_then(|file| file.take(SCREEN_ON.len() as u64).read_to_end(&mut buf));
    match result {
        Ok(_) => buf == SCREEN_ON,
        Err(e) => {
            debug!("Failed to read {:?}: {}", path, e);
            false
        }
    }
}

pub struct PollBridge {
    screen_path: PathBuf,
    probe: Arc<dyn BatteryProbe>,
    watch: Option<WatchHandle>,
    decisions: DecisionSet,
}

impl PollBridge {
    pub fn new(screen_path: PathBuf, probe: Arc<dyn BatteryProbe>, rules: &[BridgeRule]) -> Self {
        let mut decisions = DecisionSet::new();
        for rule in rules {
            if let Some(initial) = rule.initial {
                decisions.assume(rule.class, initial);
            }
        }
        Self {
            screen_path,
            probe,
            watch: None,
            decisions,
        }
    }

    /// Start watching the screen state file, posting ticks to `tx`
    pub fn start(
        &mut self,
        notifier: &dyn ChangeNotifier,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Result<()> {
        let sink = Box::new(move |event: WatchEvent| {
            let msg = match event {
                WatchEvent::Changed => Message::ScreenStateChanged,
                WatchEvent::Failed(reason) => Message::PollWatchFailed { reason },
            };
            let _ = tx.send(msg);
        });
        self.watch = Some(notifier.watch(&self.screen_path, sink)?);
        Ok(())
    }

    /// The watch is set up and has not failed
    pub fn is_alive(&self) -> bool {
        self.watch.as_ref().is_some_and(WatchHandle::is_open)
    }

    /// Read both out-of-band sources
    pub fn sample(&self) -> PollSample {
        PollSample {
            screen_on: read_screen_state(&self.screen_path),
            battery: self.probe.query(),
        }
    }

    pub fn decisions_mut(&mut self) -> &mut DecisionSet {
        &mut self.decisions
    }

    pub fn decisions(&self) -> &DecisionSet {
        &self.decisions
    }

    pub fn screen_path(&self) -> &Path {
        &self.screen_path
    }

    /// Stop watching. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.close();
        }
    }
}

impl std::fmt::Debug for PollBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollBridge")
            .field("screen_path", &self.screen_path)
            .field("alive", &self.is_alive())
            .field("decisions", &self.decisions)
            .finish()
    }
}
