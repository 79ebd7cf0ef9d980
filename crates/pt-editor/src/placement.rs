//! Creating and dragging overlays from pointer input.

use crate::config::GeometryConfig;
use crate::scope::LocationScope;
use pt_client::TourBackend;
use pt_core::{
    AnchorOffset, DepthMap, ElementBounds, GeometryError, Overlay, OverlayId, PanoramaSize,
    Position, ScreenPoint, from_screen, resolve_position, sample_depth,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    /// Shown to the user as a transient "loading" notice.
    #[error("depth map is still loading")]
    DepthUnavailable,
    #[error(transparent)]
    Geometry(GeometryError),
    #[error("the tour or location is not loaded")]
    UnknownLocation,
    #[error("overlay {0} does not exist")]
    UnknownOverlay(OverlayId),
}

impl From<GeometryError> for PlacementError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::DepthUnavailable => Self::DepthUnavailable,
            other => Self::Geometry(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverlayPlacer {
    anchor: AnchorOffset,
}

impl OverlayPlacer {
    pub fn new(anchor: AnchorOffset) -> Self {
        Self { anchor }
    }

    pub fn from_config(config: &GeometryConfig) -> Self {
        Self::new(config.anchor())
    }

    /// Add an empty overlay where the user clicked. Nothing is created until
    /// the panorama's depth map is available.
    pub fn place<B: TourBackend>(
        &self,
        scope: &LocationScope<B>,
        click: ScreenPoint,
        bounds: ElementBounds,
        panorama: PanoramaSize,
        depth: Option<&DepthMap>,
    ) -> Result<OverlayId, PlacementError> {
        let position = resolve_position(click, bounds, panorama, self.anchor, depth)?;
        scope
            .add_overlay(Overlay::new(position))
            .ok_or(PlacementError::UnknownLocation)
    }

    /// Move an overlay to `pixel`, its new offset inside the panorama.
    /// Depth is re-sampled when a map is available; otherwise the overlay
    /// keeps its previous depth.
    pub fn drag_to<B: TourBackend>(
        &self,
        scope: &LocationScope<B>,
        overlay: OverlayId,
        pixel: ScreenPoint,
        panorama: PanoramaSize,
        depth: Option<&DepthMap>,
    ) -> Result<Position, PlacementError> {
        let point = from_screen(pixel, panorama)?;
        let sampled = depth.and_then(|map| sample_depth(point, map, panorama));
        scope
            .update_overlay(overlay, |o| {
                let depth = sampled.unwrap_or(o.position.depth);
                o.position = Position::new(point.x, point.y, depth);
                o.position
            })
            .ok_or(PlacementError::UnknownOverlay(overlay))
    }
}
