//! Editor-side state for tour documents: the shared [`TourStore`], its
//! debounced autosave, route-scoped accessors, and overlay placement.

pub mod autosave;
pub mod config;
pub mod depth;
pub mod placement;
pub mod scope;
pub mod store;
pub mod subscribe;

pub use autosave::SaveStatus;
pub use config::{AutosaveConfig, ConfigError, EditorConfig, GeometryConfig};
pub use depth::DepthCache;
pub use placement::{OverlayPlacer, PlacementError};
pub use scope::{LocationScope, RouteParams, TourScope};
pub use store::{TourStore, TourSummary};
pub use subscribe::Subscription;
