//! Fallible transport to the remote store.
//!
//! Implementations report every failure; the swallowing policy lives one
//! level up in [`crate::PersistenceClient`].

use crate::error::Result;
use pt_core::{DepthMap, ResourceRef, TourGraph, TourId, TourMap};
use std::future::Future;

/// What an uploaded file will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Video,
    Raw,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Raw => "raw",
        }
    }
}

/// A binary file to upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub kind: ResourceKind,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, kind: ResourceKind) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            kind,
        }
    }
}

pub trait TourBackend: Send + Sync + 'static {
    /// Every tour, keyed by id.
    fn fetch_tours(&self) -> impl Future<Output = Result<TourMap>> + Send;

    /// Create or replace one tour.
    fn put_tour(&self, id: TourId, tour: &TourGraph) -> impl Future<Output = Result<()>> + Send;

    /// Store a file and return a reference to it.
    fn upload(&self, upload: Upload) -> impl Future<Output = Result<ResourceRef>> + Send;

    /// Depth grid estimated for a panorama.
    fn find_depth(&self, panorama: &ResourceRef) -> impl Future<Output = Result<DepthMap>> + Send;
}
