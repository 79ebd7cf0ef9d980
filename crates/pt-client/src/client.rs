//! The editor-facing persistence facade.
//!
//! None of these calls fail from the caller's point of view. Transport and
//! server errors are logged and turned into a safe value: an empty tour
//! map, an empty resource reference, a missing depth map, or a save that
//! reports itself as not persisted.

use crate::backend::{TourBackend, Upload};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpBackend;
use pt_core::{DepthMap, ResourceRef, TourGraph, TourId, TourMap};
use std::sync::Arc;

/// Result of [`PersistenceClient::save_tour`].
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    Saved,
    /// The backend did not accept the document; it is handed back so the
    /// caller can retry without re-reading the store.
    Unsaved(Arc<TourGraph>),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

#[derive(Debug)]
pub struct PersistenceClient<B> {
    backend: B,
}

impl PersistenceClient<HttpBackend> {
    /// Client for the HTTP tour server described by `config`.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        Ok(Self::new(HttpBackend::new(config)?))
    }
}

impl<B: TourBackend> PersistenceClient<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Every tour the server knows, or an empty map when it cannot be read.
    pub async fn list_tours(&self) -> TourMap {
        match self.backend.fetch_tours().await {
            Ok(tours) => {
                log::debug!("listed {} tours", tours.len());
                tours
            }
            Err(err) => {
                log::warn!("failed to list tours: {err}");
                TourMap::new()
            }
        }
    }

    pub async fn save_tour(&self, id: TourId, tour: Arc<TourGraph>) -> SaveOutcome {
        match self.backend.put_tour(id, &tour).await {
            Ok(()) => {
                log::info!("saved tour `{id}`");
                SaveOutcome::Saved
            }
            Err(err) => {
                log::warn!("failed to save tour `{id}`: {err}");
                SaveOutcome::Unsaved(tour)
            }
        }
    }

    /// Upload a file. An empty reference means the upload failed.
    pub async fn upload_resource(&self, upload: Upload) -> ResourceRef {
        let file_name = upload.file_name.clone();
        match self.backend.upload(upload).await {
            Ok(resource) => resource,
            Err(err) => {
                log::warn!("failed to upload `{file_name}`: {err}");
                ResourceRef::default()
            }
        }
    }

    /// Depth grid for a panorama. `None` means "not available yet" and is
    /// distinct from an empty grid.
    pub async fn query_depth(&self, panorama: &ResourceRef) -> Option<DepthMap> {
        match self.backend.find_depth(panorama).await {
            Ok(depth) => Some(depth),
            Err(err) => {
                log::warn!("no depth for `{panorama}`: {err}");
                None
            }
        }
    }
}
