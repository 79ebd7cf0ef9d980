//! The tour store: one authoritative, copy-on-write tour collection per
//! editing session.
//!
//! Readers get `Arc` snapshots that never change under them. Writers go
//! through [`TourStore::update_tour`] and [`TourStore::update_location`],
//! which copy only the path from the collection root to the edited node,
//! notify subscribers before returning, and schedule a debounced save of
//! the edited tour.
//!
//! Mutators run while the store's lock is held. They must not call back
//! into the store.

use crate::autosave::{Autosave, SaveStatus};
use crate::config::EditorConfig;
use crate::depth::DepthCache;
use crate::subscribe::{Subscribers, Subscription};
use pt_client::{HttpBackend, PersistError, PersistenceClient, TourBackend};
use pt_core::{
    CompiledGraph, LocationId, TourDiagnostic, TourGraph, TourId, TourLocation, TourMap, compile,
    lint_tour,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// One entry of [`TourStore::tour_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TourSummary {
    pub id: TourId,
    pub title: String,
}

struct StoreInner<B: TourBackend> {
    tours: Mutex<TourMap>,
    client: Arc<PersistenceClient<B>>,
    subscribers: Subscribers,
    autosave: Autosave,
    config: EditorConfig,
    empty_tour: Arc<TourGraph>,
    empty_location: Arc<TourLocation>,
}

/// Cheap, cloneable handle to a tour store. Clones share one collection.
pub struct TourStore<B: TourBackend> {
    inner: Arc<StoreInner<B>>,
}

impl<B: TourBackend> Clone for TourStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl TourStore<HttpBackend> {
    /// Store backed by the HTTP tour server in `config.client`.
    pub fn connect(config: EditorConfig) -> Result<Self, PersistError> {
        let client = PersistenceClient::connect(config.client.clone())?;
        Ok(Self::new(client, config))
    }
}

impl<B: TourBackend> TourStore<B> {
    /// An empty store. Call [`Self::hydrate`] to load the server's tours.
    pub fn new(client: PersistenceClient<B>, config: EditorConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tours: Mutex::new(TourMap::new()),
                client: Arc::new(client),
                subscribers: Subscribers::default(),
                autosave: Autosave::new(config.autosave),
                config,
                empty_tour: Arc::new(TourGraph::placeholder()),
                empty_location: Arc::new(TourLocation::placeholder()),
            }),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &Arc<PersistenceClient<B>> {
        &self.inner.client
    }

    /// A depth-map cache sharing this store's client.
    pub fn depth_cache(&self) -> DepthCache<B> {
        DepthCache::new(Arc::clone(&self.inner.client))
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Replace the whole collection with the server's tours and notify.
    /// A failed fetch yields an empty collection.
    pub async fn hydrate(&self) {
        let tours = self.inner.client.list_tours().await;
        log::debug!("hydrated {} tours", tours.len());
        *self.inner.lock() = tours;
        self.inner.autosave.reset_status();
        self.notify();
    }

    /// Persist every pending edit, then stop autosaving and drop all
    /// subscribers. The store stays readable.
    pub async fn dispose(&self) {
        let pending = self.inner.autosave.dispose();
        self.inner.subscribers.clear();
        for id in pending {
            persist(&self.inner, id, 0).await;
        }
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    pub fn subscribe(&self, callback: impl Fn(&TourMap) + Send + Sync + 'static) -> Subscription {
        self.inner.subscribers.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// The whole collection as it is right now.
    pub fn snapshot(&self) -> TourMap {
        self.inner.lock().clone()
    }

    /// Id and title of every tour, ordered by id.
    pub fn tour_list(&self) -> Vec<TourSummary> {
        self.inner
            .lock()
            .iter()
            .map(|(id, tour)| TourSummary {
                id: *id,
                title: tour.title.clone(),
            })
            .collect()
    }

    /// The tour with `id`, or an empty placeholder if it is absent.
    pub fn tour(&self, id: Option<TourId>) -> Arc<TourGraph> {
        id.and_then(|id| self.inner.lock().get(&id).cloned())
            .unwrap_or_else(|| Arc::clone(&self.inner.empty_tour))
    }

    /// One location, or an empty placeholder if the tour or location is
    /// absent.
    pub fn location(&self, tour: Option<TourId>, location: Option<LocationId>) -> Arc<TourLocation> {
        let found = match (tour, location) {
            (Some(tour), Some(location)) => self
                .inner
                .lock()
                .get(&tour)
                .and_then(|t| t.locations.get(&location).cloned()),
            _ => None,
        };
        found.unwrap_or_else(|| Arc::clone(&self.inner.empty_location))
    }

    pub fn contains_tour(&self, id: TourId) -> bool {
        self.inner.lock().contains_key(&id)
    }

    pub fn find_tour_by_title(&self, title: &str) -> Option<TourId> {
        self.inner
            .lock()
            .iter()
            .find(|(_, tour)| tour.title == title)
            .map(|(id, _)| *id)
    }

    /// Display graph of a tour; empty for an absent tour.
    pub fn compile_tour(&self, id: TourId) -> CompiledGraph {
        compile(&self.tour(Some(id)))
    }

    pub fn diagnostics(&self, id: TourId) -> Vec<TourDiagnostic> {
        lint_tour(&self.tour(Some(id)))
    }

    pub fn save_status(&self, id: TourId) -> SaveStatus {
        self.inner.autosave.status(id)
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    /// Add a new tour, keyed by the slug of its title.
    pub fn create_tour(&self, title: &str, description: &str) -> TourId {
        let id = {
            let mut tours = self.inner.lock();
            let id = TourId::from_title(title, |c| tours.contains_key(&c));
            tours.insert(id, Arc::new(TourGraph::new(title, description)));
            id
        };
        self.notify();
        self.schedule_save(id);
        id
    }

    /// Apply `mutator` to a copy of tour `id`. Returns `None`, with no state
    /// change, notification or save, if the tour is absent.
    pub fn update_tour<R>(&self, id: TourId, mutator: impl FnOnce(&mut TourGraph) -> R) -> Option<R> {
        self.update_tour_if(id, |_| true, mutator)
    }

    /// Like [`Self::update_tour`], but only if `check` accepts the current
    /// tour. A rejected check changes nothing.
    pub fn update_tour_if<R>(
        &self,
        id: TourId,
        check: impl FnOnce(&TourGraph) -> bool,
        mutator: impl FnOnce(&mut TourGraph) -> R,
    ) -> Option<R> {
        let result = {
            let mut tours = self.inner.lock();
            let Some(current) = tours.get(&id) else {
                log::warn!("update of unknown tour `{id}` ignored");
                return None;
            };
            if !check(current) {
                return None;
            }
            // The stored tour is untouched until the mutator returns.
            let mut draft = TourGraph::clone(current);
            let result = mutator(&mut draft);
            tours.insert(id, Arc::new(draft));
            result
        };
        self.notify();
        self.schedule_save(id);
        Some(result)
    }

    /// Apply `mutator` to a copy of one location. Returns `None`, with no
    /// state change, if the tour or the location is absent.
    pub fn update_location<R>(
        &self,
        tour: TourId,
        location: LocationId,
        mutator: impl FnOnce(&mut TourLocation) -> R,
    ) -> Option<R> {
        self.update_location_if(tour, location, |_| true, mutator)
    }

    pub fn update_location_if<R>(
        &self,
        tour: TourId,
        location: LocationId,
        check: impl FnOnce(&TourLocation) -> bool,
        mutator: impl FnOnce(&mut TourLocation) -> R,
    ) -> Option<R> {
        self.update_tour_if(
            tour,
            |t| match t.location(location) {
                Some(current) => check(current),
                None => {
                    log::warn!("update of unknown location `{location}` in `{tour}` ignored");
                    false
                }
            },
            |t| t.location_mut(location).map(mutator),
        )
        .flatten()
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    fn notify(&self) {
        self.inner.subscribers.notify(|| self.inner.lock().clone());
    }

    fn schedule_save(&self, id: TourId) {
        schedule(&self.inner, id, self.inner.autosave.config().debounce(), false, 0);
    }

    /// Save tour `id` now, replacing any pending autosave. Returns whether
    /// the server accepted it.
    pub async fn save_now(&self, id: TourId) -> bool {
        self.inner.autosave.take(id);
        persist(&self.inner, id, 0).await
    }

    /// Save every tour with a pending or unscheduled edit.
    pub async fn flush(&self) {
        for id in self.inner.autosave.take_all() {
            persist(&self.inner, id, 0).await;
        }
    }
}

impl<B: TourBackend> StoreInner<B> {
    fn lock(&self) -> MutexGuard<'_, TourMap> {
        self.tours.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn schedule<B: TourBackend>(
    inner: &Arc<StoreInner<B>>,
    id: TourId,
    delay: Duration,
    retry: bool,
    attempt: u32,
) {
    let weak: Weak<StoreInner<B>> = Arc::downgrade(inner);
    inner.autosave.schedule(id, delay, retry, move |generation| async move {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if inner.autosave.claim(id, generation) {
            persist(&inner, id, attempt).await;
        }
    });
}

/// Send the current snapshot of `id`, then record the result and queue a
/// retry if one is due.
async fn persist<B: TourBackend>(inner: &Arc<StoreInner<B>>, id: TourId, attempt: u32) -> bool {
    let Some(tour) = inner.lock().get(&id).cloned() else {
        log::debug!("nothing to save for unknown tour `{id}`");
        inner.autosave.forget(id);
        return false;
    };
    let saved = inner.client.save_tour(id, tour).await.is_saved();
    if let Some(delay) = inner.autosave.finish(id, saved, attempt) {
        log::debug!("retrying save of `{id}` in {delay:?}");
        schedule(inner, id, delay, true, attempt + 1);
    }
    saved
}
