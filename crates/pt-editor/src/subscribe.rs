//! Change notification for the tour collection.
//!
//! The registry holds listeners weakly; the [`Subscription`] guard handed to
//! the caller owns them. Fan-out snapshots the live listeners and releases
//! the registry lock before calling any of them, so a callback may
//! subscribe, unsubscribe or mutate the store while it runs.
//!
//! A listener unsubscribed mid fan-out is skipped for the rest of that
//! fan-out. A listener registered mid fan-out first hears the next one.
//! Each listener is handed the collection as it stands when its turn comes,
//! so a mutation made by an earlier listener is never hidden from a later
//! one.

use pt_core::TourMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback = dyn Fn(&TourMap) + Send + Sync;

struct Listener {
    callback: Box<Callback>,
    active: AtomicBool,
}

#[derive(Default)]
pub(crate) struct Subscribers {
    listeners: Mutex<Vec<Weak<Listener>>>,
}

impl Subscribers {
    fn lock(&self) -> MutexGuard<'_, Vec<Weak<Listener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn subscribe(
        &self,
        callback: impl Fn(&TourMap) + Send + Sync + 'static,
    ) -> Subscription {
        let listener = Arc::new(Listener {
            callback: Box::new(callback),
            active: AtomicBool::new(true),
        });
        self.lock().push(Arc::downgrade(&listener));
        Subscription { listener }
    }

    /// Call every live listener in registration order, each with a fresh
    /// read of `current`.
    pub(crate) fn notify(&self, current: impl Fn() -> TourMap) {
        let live: Vec<Arc<Listener>> = {
            let mut listeners = self.lock();
            listeners.retain(|w| w.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        log::trace!("notifying {} subscribers", live.len());
        for listener in &live {
            if listener.active.load(Ordering::Acquire) {
                (listener.callback)(&current());
            }
        }
    }

    /// Deactivate every listener; outstanding guards become inert.
    pub(crate) fn clear(&self) {
        for listener in self.lock().drain(..).filter_map(|w| w.upgrade()) {
            listener.active.store(false, Ordering::Release);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().iter().filter(|w| w.strong_count() > 0).count()
    }
}

/// Keeps a callback registered. Dropping it (or calling
/// [`Subscription::unsubscribe`]) deregisters the callback.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    listener: Arc<Listener>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    /// False once unsubscribed or after the store was disposed.
    pub fn is_active(&self) -> bool {
        self.listener.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.listener.active.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
