//! Filesystem change notification for the screen state file
//!
//! A [`ChangeNotifier`] watches one file and reports modifications through a
//! sink callback. The returned [`WatchHandle`] keeps the watch alive; closing
//! or dropping it stops delivery.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use devmon_core::prelude::*;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};

/// What a watch reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The file was modified or closed after writing
    Changed,
    /// The watch is broken and will not report again
    Failed(String),
}

pub type WatchSink = Box<dyn Fn(WatchEvent) + Send + Sync>;

/// Owns a live watch
pub struct WatchHandle {
    path: PathBuf,
    guard: Option<Box<dyn Send>>,
}

impl WatchHandle {
    pub fn new(path: impl Into<PathBuf>, guard: impl Send + 'static) -> Self {
        Self {
            path: path.into(),
            guard: Some(Box::new(guard)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.guard.is_some()
    }

    /// Stop watching. Safe to call more than once.
    pub fn close(&mut self) {
        if self.guard.take().is_some() {
            debug!("Stopped watching {:?}", self.path);
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Starts change watches on files
pub trait ChangeNotifier: Send + Sync {
    fn watch(&self, path: &Path, sink: WatchSink) -> Result<WatchHandle>;
}

/// Watches through the platform notifier (inotify on Linux).
///
/// The containing directory is watched non-recursively, so the file may be
/// replaced or created after the watch starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct InotifyNotifier;

impl InotifyNotifier {
    pub fn new() -> Self {
        Self
    }
}

/// Whether `event` is a write to `file_name`
fn is_write_to(event: &Event, file_name: &OsString) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write))
    );
    relevant_kind
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

impl ChangeNotifier for InotifyNotifier {
    fn watch(&self, path: &Path, sink: WatchSink) -> Result<WatchHandle> {
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| Error::watch(path, "not a file path"))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_write_to(&event, &file_name) {
                    sink(WatchEvent::Changed);
                }
            }
            Err(e) => sink(WatchEvent::Failed(e.to_string())),
        })
        .map_err(|e| Error::watch(path, e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watch(&dir, e.to_string()))?;

        debug!("Watching {:?} in {:?}", path, dir);
        Ok(WatchHandle::new(path, watcher))
    }
}

type SinkMap = BTreeMap<u64, Arc<WatchSink>>;

#[derive(Default)]
struct ManualState {
    next_id: u64,
    sinks: SinkMap,
    fail_next: Option<String>,
}

/// Notifier driven by hand, for replays and tests
#[derive(Clone, Default)]
pub struct ManualNotifier {
    state: Arc<Mutex<ManualState>>,
}

struct ManualGuard {
    id: u64,
    state: Arc<Mutex<ManualState>>,
}

impl Drop for ManualGuard {
    fn drop(&mut self) {
        lock(&self.state).sinks.remove(&self.id);
    }
}

fn lock(state: &Mutex<ManualState>) -> MutexGuard<'_, ManualState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ManualNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `watch` call fail with `reason`
    pub fn fail_next_watch(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next = Some(reason.into());
    }

    /// Deliver `event` to every open watch
    pub fn emit(&self, event: WatchEvent) {
        let sinks: Vec<Arc<WatchSink>> = lock(&self.state).sinks.values().cloned().collect();
        for sink in sinks {
            (**sink)(event.clone());
        }
    }

    /// Number of open watches
    pub fn watch_count(&self) -> usize {
        lock(&self.state).sinks.len()
    }
}

impl ChangeNotifier for ManualNotifier {
    fn watch(&self, path: &Path, sink: WatchSink) -> Result<WatchHandle> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_next.take() {
            return Err(Error::watch(path, reason));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.sinks.insert(id, Arc::new(sink));
        let guard = ManualGuard {
            id,
            state: Arc::clone(&self.state),
        };
        Ok(WatchHandle::new(path, guard))
    }
}

impl fmt::Debug for ManualNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualNotifier")
            .field("watches", &self.watch_count())
            .finish()
    }
}
