//! Per-folder run exclusivity and quota suspension state
//!
//! Entries live only in memory; a fresh process starts with every folder
//! idle and unsuspended.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub running: bool,
    pub suspended_until: Option<DateTime<Utc>>,
}

/// Why a trigger firing did not start a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Running,
    Suspended { until: DateTime<Utc> },
}

#[derive(Debug, Default)]
pub struct RunStateStore {
    states: Mutex<HashMap<Uuid, RunState>>,
}

impl RunStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the map itself consistent
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, RunState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the run lock for a folder
    ///
    /// Fails if a run is in flight or a suspension is still active at `now`.
    /// An expired suspension is cleared on the way.
    pub fn try_begin(self: &Arc<Self>, folder_id: Uuid, now: DateTime<Utc>) -> Result<RunGuard, SkipReason> {
        let mut states = self.lock();
        let state = states.entry(folder_id).or_default();

        if state.running {
            return Err(SkipReason::Running);
        }
        if let Some(until) = state.suspended_until {
            if now < until {
                return Err(SkipReason::Suspended { until });
            }
            state.suspended_until = None;
        }

        state.running = true;
        Ok(RunGuard {
            store: Arc::clone(self),
            folder_id,
        })
    }

    pub fn suspend(&self, folder_id: Uuid, until: DateTime<Utc>) {
        self.lock().entry(folder_id).or_default().suspended_until = Some(until);
    }

    pub fn get(&self, folder_id: Uuid) -> RunState {
        self.lock().get(&folder_id).cloned().unwrap_or_default()
    }

    /// Drop all suspensions and idle entries; in-flight runs keep their lock
    pub fn clear_all(&self) {
        let mut states = self.lock();
        states.retain(|_, state| state.running);
        for state in states.values_mut() {
            state.suspended_until = None;
        }
    }

    pub fn running_folders(&self) -> Vec<Uuid> {
        self.lock()
            .iter()
            .filter(|(_, s)| s.running)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Suspensions still active at `now`
    pub fn suspensions(&self, now: DateTime<Utc>) -> Vec<(Uuid, DateTime<Utc>)> {
        self.lock()
            .iter()
            .filter_map(|(id, s)| s.suspended_until.filter(|until| *until > now).map(|u| (*id, u)))
            .collect()
    }

    fn release(&self, folder_id: Uuid) {
        if let Some(state) = self.lock().get_mut(&folder_id) {
            state.running = false;
        }
    }
}

/// Holds a folder's run lock; released on drop, including on panic
#[derive(Debug)]
pub struct RunGuard {
    store: Arc<RunStateStore>,
    folder_id: Uuid,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.store.release(self.folder_id);
    }
}
