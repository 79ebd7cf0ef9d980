//! In-process [`TourBackend`] for tests and offline editing.
//!
//! Every accepted save is recorded with the (tokio) time it landed, so
//! debounce behavior can be asserted against a paused clock. Failures can be
//! injected per call or for a whole outage.

use crate::backend::{ResourceKind, TourBackend, Upload};
use crate::error::{PersistError, Result};
use crate::http::decode_tour_list;
use pt_core::{DepthMap, ResourceRef, TourGraph, TourId, TourMap};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// One save the backend accepted.
#[derive(Debug, Clone)]
pub struct SaveRecord {
    pub id: TourId,
    pub tour: Arc<TourGraph>,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct MemoryState {
    tours: TourMap,
    saves: Vec<SaveRecord>,
    save_attempts: usize,
    uploads: Vec<(String, ResourceKind)>,
    depth: HashMap<ResourceRef, DepthMap>,
    failing_saves: usize,
    offline: bool,
    save_latency: Duration,
    depth_latency: Duration,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tours(tours: TourMap) -> Self {
        let backend = Self::default();
        backend.lock().tours = tours;
        backend
    }

    /// Seed from a `GET /tour` response body, decoded like the HTTP
    /// backend decodes it.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(Self::with_tours(decode_tour_list(body)?))
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `depth` for `panorama` from now on.
    pub fn set_depth(&self, panorama: ResourceRef, depth: DepthMap) {
        self.lock().depth.insert(panorama, depth);
    }

    /// Reject the next `count` saves.
    pub fn fail_next_saves(&self, count: usize) {
        self.lock().failing_saves = count;
    }

    /// Reject every call while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delay each save by `latency` before it lands.
    pub fn set_save_latency(&self, latency: Duration) {
        self.lock().save_latency = latency;
    }

    /// Delay each depth query by `latency`.
    pub fn set_depth_latency(&self, latency: Duration) {
        self.lock().depth_latency = latency;
    }

    pub fn saves(&self) -> Vec<SaveRecord> {
        self.lock().saves.clone()
    }

    /// Saves attempted, including rejected ones.
    pub fn save_attempts(&self) -> usize {
        self.lock().save_attempts
    }

    pub fn stored_tour(&self, id: TourId) -> Option<Arc<TourGraph>> {
        self.lock().tours.get(&id).cloned()
    }

    pub fn uploads(&self) -> Vec<(String, ResourceKind)> {
        self.lock().uploads.clone()
    }

    fn check_online(&self, call: &str) -> Result<()> {
        if self.lock().offline {
            Err(PersistError::unavailable(format!("{call}: backend offline")))
        } else {
            Ok(())
        }
    }
}

impl TourBackend for MemoryBackend {
    async fn fetch_tours(&self) -> Result<TourMap> {
        self.check_online("fetch_tours")?;
        Ok(self.lock().tours.clone())
    }

    async fn put_tour(&self, id: TourId, tour: &TourGraph) -> Result<()> {
        let latency = {
            let mut state = self.lock();
            state.save_attempts += 1;
            state.save_latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.check_online("put_tour")?;

        let mut state = self.lock();
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(PersistError::unavailable(format!("put_tour `{id}`: injected failure")));
        }
        let tour = Arc::new(tour.clone());
        state.tours.insert(id, Arc::clone(&tour));
        state.saves.push(SaveRecord {
            id,
            tour,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn upload(&self, upload: Upload) -> Result<ResourceRef> {
        self.check_online("upload")?;
        let mut state = self.lock();
        let n = state.uploads.len();
        state.uploads.push((upload.file_name.clone(), upload.kind));
        Ok(ResourceRef::new(format!(
            "memory://{}/{n}/{}",
            upload.kind.as_str(),
            upload.file_name
        )))
    }

    async fn find_depth(&self, panorama: &ResourceRef) -> Result<DepthMap> {
        let latency = self.lock().depth_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.check_online("find_depth")?;
        self.lock()
            .depth
            .get(panorama)
            .cloned()
            .ok_or_else(|| PersistError::NotFound {
                what: format!("depth map for `{panorama}`"),
            })
    }
}
