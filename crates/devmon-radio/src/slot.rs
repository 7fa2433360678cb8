//! Modem slot collaborator
//!
//! Sessions push a cell info polling interval to the slot they run on. Several
//! sessions (one per tracked variant) may share a slot, so the slot keeps one
//! requested value per owner and applies the most frequent one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use devmon_core::prelude::*;
use devmon_core::SessionId;

/// The part of a modem slot a session talks to.
///
/// Pushes are not deduplicated by the caller: the same value may arrive many
/// times in a row. Each owner holds exactly one requested value, and a push
/// replaces the previous one (last write wins per owner).
pub trait ModemSlot: Send + Sync {
    /// Request a cell info polling interval on behalf of `owner`
    fn set_cell_info_update_interval(&self, owner: SessionId, ms: u32);

    /// Forget everything `owner` requested (session teardown)
    fn drop_cell_info_requests(&self, owner: SessionId);
}

type IntervalListener = Box<dyn Fn(Option<u32>) + Send + Sync>;

#[derive(Default)]
struct IntervalState {
    requested: BTreeMap<SessionId, u32>,
    applied: Option<u32>,
}

impl IntervalState {
    fn effective(&self) -> Option<u32> {
        self.requested.values().copied().min()
    }
}

/// Per-owner cell info interval aggregation for one slot.
///
/// The effective interval is the shortest one any owner asked for. The
/// optional listener is called only when the effective value changes.
pub struct CellInfoIntervals {
    name: String,
    state: Mutex<IntervalState>,
    listener: Option<IntervalListener>,
}

impl CellInfoIntervals {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(IntervalState::default()),
            listener: None,
        }
    }

    /// Call `listener` whenever the effective interval changes.
    /// `None` means no owner is left.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(Option<u32>) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interval currently applied to the modem
    pub fn effective_interval(&self) -> Option<u32> {
        self.lock().applied
    }

    /// Interval last requested by `owner`
    pub fn requested(&self, owner: SessionId) -> Option<u32> {
        self.lock().requested.get(&owner).copied()
    }

    pub fn owner_count(&self) -> usize {
        self.lock().requested.len()
    }

    fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut BTreeMap<SessionId, u32>),
    {
        let changed = {
            let mut state = self.lock();
            change(&mut state.requested);
            let effective = state.effective();
            if effective == state.applied {
                None
            } else {
                state.applied = effective;
                Some(effective)
            }
        };

        if let Some(effective) = changed {
            match effective {
                Some(ms) => debug!("{}: cell info interval {} ms", self.name, ms),
                None => debug!("{}: no cell info interval requested", self.name),
            }
            if let Some(listener) = &self.listener {
                listener(effective);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, IntervalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModemSlot for CellInfoIntervals {
    fn set_cell_info_update_interval(&self, owner: SessionId, ms: u32) {
        self.update(|requested| {
            requested.insert(owner, ms);
        });
    }

    fn drop_cell_info_requests(&self, owner: SessionId) {
        self.update(|requested| {
            requested.remove(&owner);
        });
    }
}

impl fmt::Debug for CellInfoIntervals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CellInfoIntervals")
            .field("name", &self.name)
            .field("requested", &state.requested)
            .field("applied", &state.applied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn observed() -> (Arc<Mutex<Vec<Option<u32>>>>, impl Fn(Option<u32>) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v| sink.lock().unwrap().push(v))
    }

    #[test]
    fn test_last_write_wins_per_owner() {
        let slot = CellInfoIntervals::new("slot1");
        let owner = SessionId::next();

        slot.set_cell_info_update_interval(owner, 2000);
        slot.set_cell_info_update_interval(owner, 30000);

        assert_eq!(slot.requested(owner), Some(30000));
        assert_eq!(slot.effective_interval(), Some(30000));
        assert_eq!(slot.owner_count(), 1);
    }

    #[test]
    fn test_effective_is_minimum_across_owners() {
        let slot = CellInfoIntervals::new("slot1");
        let a = SessionId::next();
        let b = SessionId::next();

        slot.set_cell_info_update_interval(a, 30000);
        slot.set_cell_info_update_interval(b, 2000);
        assert_eq!(slot.effective_interval(), Some(2000));

        slot.drop_cell_info_requests(b);
        assert_eq!(slot.effective_interval(), Some(30000));

        slot.drop_cell_info_requests(a);
        assert_eq!(slot.effective_interval(), None);
        assert_eq!(slot.owner_count(), 0);
    }

    #[test]
    fn test_listener_only_sees_changes() {
        let (seen, listener) = observed();
        let slot = CellInfoIntervals::new("slot1").with_listener(listener);
        let owner = SessionId::next();

        slot.set_cell_info_update_interval(owner, 2000);
        slot.set_cell_info_update_interval(owner, 2000);
        slot.set_cell_info_update_interval(owner, 2000);
        slot.set_cell_info_update_interval(owner, 30000);
        slot.drop_cell_info_requests(owner);

        assert_eq!(*seen.lock().unwrap(), vec![Some(2000), Some(30000), None]);
    }

    #[test]
    fn test_dropping_unknown_owner_is_noop() {
        let (seen, listener) = observed();
        let slot = CellInfoIntervals::new("slot1").with_listener(listener);

        slot.drop_cell_info_requests(SessionId::next());

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(slot.name(), "slot1");
    }
}
