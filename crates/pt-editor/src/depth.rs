//! Depth maps for the panorama on screen.
//!
//! Maps are fetched once per panorama and kept while that panorama is in
//! focus. Focusing another panorama evicts the rest, and a fetch that
//! finishes after focus moved on is discarded.

use pt_client::{PersistenceClient, TourBackend};
use pt_core::{DepthMap, ResourceRef};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct DepthState {
    focus: Option<ResourceRef>,
    maps: HashMap<ResourceRef, Arc<DepthMap>>,
    loading: HashSet<ResourceRef>,
}

struct LoadingMark<'a> {
    state: &'a Mutex<DepthState>,
    panorama: &'a ResourceRef,
}

impl Drop for LoadingMark<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loading
            .remove(self.panorama);
    }
}

pub struct DepthCache<B> {
    client: Arc<PersistenceClient<B>>,
    state: Mutex<DepthState>,
}

impl<B: TourBackend> DepthCache<B> {
    pub fn new(client: Arc<PersistenceClient<B>>) -> Self {
        Self {
            client,
            state: Mutex::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DepthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached map for `panorama`, without fetching.
    pub fn get(&self, panorama: &ResourceRef) -> Option<Arc<DepthMap>> {
        self.lock().maps.get(panorama).cloned()
    }

    pub fn is_loading(&self, panorama: &ResourceRef) -> bool {
        self.lock().loading.contains(panorama)
    }

    /// Make `panorama` the displayed one, dropping maps of any other.
    pub fn focus(&self, panorama: &ResourceRef) {
        let mut state = self.lock();
        if state.focus.as_ref() == Some(panorama) {
            return;
        }
        state.maps.retain(|key, _| key == panorama);
        state.focus = Some(panorama.clone());
    }

    /// Fetch the map for `panorama` unless it is cached. `None` means "not
    /// available yet": the fetch failed, another load is in flight, or the
    /// panorama lost focus meanwhile.
    pub async fn load(&self, panorama: &ResourceRef) -> Option<Arc<DepthMap>> {
        if panorama.is_missing() {
            return None;
        }
        {
            let mut state = self.lock();
            if let Some(map) = state.maps.get(panorama) {
                return Some(Arc::clone(map));
            }
            if !state.loading.insert(panorama.clone()) {
                return None;
            }
        }
        // Clears the loading mark even if this future is dropped mid-fetch.
        let loading = LoadingMark {
            state: &self.state,
            panorama,
        };

        let fetched = self.client.query_depth(panorama).await;
        drop(loading);

        let mut state = self.lock();
        let map = Arc::new(fetched?);
        if let Some(focus) = &state.focus
            && focus != panorama
        {
            log::debug!("discarding depth for `{panorama}`: panorama changed");
            return None;
        }
        state.maps.insert(panorama.clone(), Arc::clone(&map));
        Some(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pt_client::MemoryBackend;
    use std::time::Duration;

    fn cache_with(entries: &[(&str, Vec<Vec<f64>>)]) -> DepthCache<MemoryBackend> {
        let backend = MemoryBackend::new();
        for (pano, rows) in entries {
            backend.set_depth(ResourceRef::new(*pano), DepthMap::from_rows(rows.clone()));
        }
        DepthCache::new(Arc::new(PersistenceClient::new(backend)))
    }

    #[tokio::test]
    async fn load_caches_per_panorama() {
        let cache = cache_with(&[("a.jpg", vec![vec![1.0]])]);
        let a = ResourceRef::new("a.jpg");
        assert!(cache.get(&a).is_none());
        let first = cache.load(&a).await.unwrap();
        let second = cache.load(&a).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!cache.is_loading(&a));
    }

    #[tokio::test]
    async fn missing_depth_is_not_cached() {
        let cache = cache_with(&[]);
        let a = ResourceRef::new("a.jpg");
        assert!(cache.load(&a).await.is_none());
        assert!(cache.load(&ResourceRef::default()).await.is_none());
        assert!(cache.get(&a).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_load_can_be_retried() {
        let cache = cache_with(&[("a.jpg", vec![vec![1.0]])]);
        cache.client.backend().set_depth_latency(Duration::from_millis(500));
        let a = ResourceRef::new("a.jpg");

        let abandoned = tokio::time::timeout(Duration::from_millis(10), cache.load(&a)).await;
        assert!(abandoned.is_err());
        assert!(!cache.is_loading(&a));

        let map = cache.load(&a).await.expect("second load fetches again");
        assert_eq!(map.get(0, 0), Some(1.0));
    }

    #[tokio::test]
    async fn focus_evicts_other_panoramas() {
        let cache = cache_with(&[("a.jpg", vec![vec![1.0]]), ("b.jpg", vec![vec![2.0]])]);
        let a = ResourceRef::new("a.jpg");
        let b = ResourceRef::new("b.jpg");
        cache.focus(&a);
        cache.load(&a).await.unwrap();

        cache.focus(&b);
        assert!(cache.get(&a).is_none());
        // A late load for the old panorama is dropped.
        assert!(cache.load(&a).await.is_none());
        assert_eq!(cache.load(&b).await.unwrap().get(0, 0), Some(2.0));
    }
}
