//! Per-tour debounced autosave bookkeeping.
//!
//! Each tour has at most one pending save: a spawned task that sleeps
//! through the debounce window and then claims its slot. Scheduling again
//! for the same tour aborts the sleeping task and replaces it, so edits to
//! one tour never delay another. Once a task has claimed its slot it is no
//! longer abortable; a save already on the wire always completes.
//!
//! Every slot carries a generation number. A task whose generation no
//! longer matches has been superseded and exits without saving.

use crate::config::AutosaveConfig;
use pt_core::TourId;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Persistence state of one tour, for a "saving…" / "save failed" indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    /// Nothing to save since the store was hydrated.
    #[default]
    Idle,
    /// Edited; a save is scheduled.
    Pending,
    /// A save request is in flight.
    Saving,
    /// The latest save succeeded and nothing newer is pending.
    Saved,
    /// The last save failed after `attempts` tries. A retry may still be
    /// scheduled.
    Failed { attempts: u32 },
}

impl SaveStatus {
    pub fn is_dirty(self) -> bool {
        !matches!(self, Self::Idle | Self::Saved)
    }
}

struct PendingSave {
    handle: JoinHandle<()>,
    generation: u64,
}

#[derive(Default)]
struct AutosaveState {
    next_generation: u64,
    pending: HashMap<TourId, PendingSave>,
    /// Tours edited while no runtime was available to schedule on.
    dirty: HashSet<TourId>,
    status: HashMap<TourId, SaveStatus>,
    disposed: bool,
}

pub(crate) struct Autosave {
    config: AutosaveConfig,
    state: Mutex<AutosaveState>,
}

impl Autosave {
    pub(crate) fn new(config: AutosaveConfig) -> Self {
        Self {
            config,
            state: Mutex::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AutosaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    pub(crate) fn status(&self, id: TourId) -> SaveStatus {
        self.lock().status.get(&id).copied().unwrap_or_default()
    }

    /// Replace the pending save of `id` with `job`, run after `delay`.
    ///
    /// `job` receives the slot's generation and must call [`Self::claim`]
    /// with it before saving. A `retry` keeps the tour's `Failed` status
    /// visible while it waits.
    pub(crate) fn schedule<F>(
        &self,
        id: TourId,
        delay: Duration,
        retry: bool,
        job: impl FnOnce(u64) -> F,
    ) where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        if !retry {
            state.status.insert(id, SaveStatus::Pending);
        }
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("no async runtime; tour `{id}` stays unsaved until flushed");
            state.dirty.insert(id);
            return;
        };

        state.next_generation += 1;
        let generation = state.next_generation;
        let job = job(generation);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        });
        log::debug!("autosave of `{id}` scheduled in {delay:?}");
        if let Some(previous) = state.pending.insert(id, PendingSave { handle, generation }) {
            previous.handle.abort();
        }
    }

    /// Take the slot of `id` if it still belongs to `generation`.
    pub(crate) fn claim(&self, id: TourId, generation: u64) -> bool {
        let mut state = self.lock();
        match state.pending.get(&id) {
            Some(pending) if pending.generation == generation => {
                state.pending.remove(&id);
                state.dirty.remove(&id);
                state.status.insert(id, SaveStatus::Saving);
                true
            }
            _ => false,
        }
    }

    /// Abort any pending save of `id` and mark it as being saved now.
    pub(crate) fn take(&self, id: TourId) {
        let mut state = self.lock();
        if let Some(pending) = state.pending.remove(&id) {
            pending.handle.abort();
        }
        state.dirty.remove(&id);
        state.status.insert(id, SaveStatus::Saving);
    }

    /// Abort every pending save and return the tours that were waiting.
    pub(crate) fn take_all(&self) -> Vec<TourId> {
        let mut state = self.lock();
        let mut ids: Vec<TourId> = state.dirty.drain().collect();
        for (id, pending) in std::mem::take(&mut state.pending) {
            pending.handle.abort();
            ids.push(id);
        }
        ids.sort();
        ids.dedup();
        for id in &ids {
            state.status.insert(*id, SaveStatus::Saving);
        }
        ids
    }

    /// Record the result of save attempt number `attempt` (0 for the first
    /// try). Returns the delay before the next retry, if one is due.
    pub(crate) fn finish(&self, id: TourId, saved: bool, attempt: u32) -> Option<Duration> {
        let mut state = self.lock();
        if state.pending.contains_key(&id) || state.dirty.contains(&id) {
            // A newer edit is queued and will carry the latest snapshot.
            return None;
        }
        if saved {
            state.status.insert(id, SaveStatus::Saved);
            return None;
        }
        let attempts = attempt + 1;
        state.status.insert(id, SaveStatus::Failed { attempts });
        (attempts <= self.config.max_retries && !state.disposed)
            .then(|| self.config.backoff(attempts))
    }

    /// Drop the status of a tour that turned out to have nothing to save.
    pub(crate) fn forget(&self, id: TourId) {
        let mut state = self.lock();
        if !state.pending.contains_key(&id) && !state.dirty.contains(&id) {
            state.status.remove(&id);
        }
    }

    /// Stop scheduling. Returns the tours that still need saving.
    pub(crate) fn dispose(&self) -> Vec<TourId> {
        let ids = self.take_all();
        self.lock().disposed = true;
        ids
    }

    /// Forget all statuses, e.g. after the collection was replaced.
    pub(crate) fn reset_status(&self) {
        let mut state = self.lock();
        let AutosaveState {
            pending, status, ..
        } = &mut *state;
        status.retain(|id, _| pending.contains_key(id));
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        for (_, pending) in self.lock().pending.drain() {
            pending.handle.abort();
        }
    }
}
