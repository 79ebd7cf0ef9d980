//! Overlay geometry: pointer position → normalized panorama coordinates
//! plus a depth sample, and back to panorama pixels for rendering.
//!
//! The depth map is a grid of arbitrary resolution, independent of the
//! panorama's pixel size; samples are looked up by scaling the panorama
//! pixel into grid cells.

use crate::model::Position;
use serde::{Deserialize, Serialize};

/// Pointer position in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Bounding box of the rendered panorama element, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Pixel dimensions of the panorama as displayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanoramaSize {
    pub width: f64,
    pub height: f64,
}

impl PanoramaSize {
    fn check(self) -> Result<Self, GeometryError> {
        if self.width > 0.0 && self.height > 0.0 {
            Ok(self)
        } else {
            Err(GeometryError::DegeneratePanorama {
                width: self.width,
                height: self.height,
            })
        }
    }
}

/// Coordinates in `[0, 1]` relative to the panorama.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

/// Shift applied to a click before clamping, so an overlay card is
/// centered on the pointer instead of hanging off its corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorOffset {
    pub x: f64,
    pub y: f64,
}

impl AnchorOffset {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
}

impl Default for AnchorOffset {
    fn default() -> Self {
        Self { x: -150.0, y: -40.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// No depth map yet (still loading) or no sample at that point.
    #[error("depth is not available yet")]
    DepthUnavailable,
    #[error("panorama size {width}x{height} is degenerate")]
    DegeneratePanorama { width: f64, height: f64 },
}

// ─── Depth map ───────────────────────────────────────────────────────────

/// Row-major grid of scene-depth samples.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct DepthMap {
    width: usize,
    height: usize,
    samples: Vec<f64>,
}

impl DepthMap {
    /// Build from rows. Ragged rows are truncated to the shortest one.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let width = rows.iter().map(Vec::len).min().unwrap_or(0);
        if width == 0 {
            return Self::default();
        }
        let height = rows.len();
        let mut samples = Vec::with_capacity(width * height);
        for row in rows {
            samples.extend_from_slice(&row[..width]);
        }
        Self {
            width,
            height,
            samples,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples.get(y * self.width + x).copied()
    }
}

impl From<Vec<Vec<f64>>> for DepthMap {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Self::from_rows(rows)
    }
}

impl From<DepthMap> for Vec<Vec<f64>> {
    fn from(map: DepthMap) -> Self {
        if map.width == 0 {
            return Vec::new();
        }
        map.samples.chunks(map.width).map(<[f64]>::to_vec).collect()
    }
}

// ─── Transforms ──────────────────────────────────────────────────────────

/// Map a pointer position onto the panorama: shift by `anchor`, clamp into
/// the element, then scale by the panorama size.
pub fn to_normalized(
    click: ScreenPoint,
    bounds: ElementBounds,
    panorama: PanoramaSize,
    anchor: AnchorOffset,
) -> Result<NormalizedPoint, GeometryError> {
    let panorama = panorama.check()?;
    let x = (click.x - bounds.left + anchor.x).clamp(0.0, bounds.width.max(0.0));
    let y = (click.y - bounds.top + anchor.y).clamp(0.0, bounds.height.max(0.0));
    Ok(NormalizedPoint {
        x: x / panorama.width,
        y: y / panorama.height,
    })
}

/// Inverse of the scaling step: normalized point → panorama pixels.
pub fn to_screen(point: NormalizedPoint, panorama: PanoramaSize) -> ScreenPoint {
    ScreenPoint {
        x: point.x * panorama.width,
        y: point.y * panorama.height,
    }
}

/// Panorama pixels → normalized point. Used after a drag, where the widget
/// reports its new pixel offset inside the panorama.
pub fn from_screen(
    pixel: ScreenPoint,
    panorama: PanoramaSize,
) -> Result<NormalizedPoint, GeometryError> {
    let panorama = panorama.check()?;
    Ok(NormalizedPoint {
        x: (pixel.x / panorama.width).clamp(0.0, 1.0),
        y: (pixel.y / panorama.height).clamp(0.0, 1.0),
    })
}

/// Depth under a normalized point. `None` when the map is empty or the
/// point lies outside `[0, 1]`; the right and bottom edges map to the last
/// cell.
pub fn sample_depth(
    point: NormalizedPoint,
    depth: &DepthMap,
    panorama: PanoramaSize,
) -> Option<f64> {
    let panorama = panorama.check().ok()?;
    if depth.is_empty() || !(0.0..=1.0).contains(&point.x) || !(0.0..=1.0).contains(&point.y) {
        return None;
    }
    let pixel = to_screen(point, panorama);
    let map_x = (pixel.x * depth.width() as f64 / panorama.width).floor() as usize;
    let map_y = (pixel.y * depth.height() as f64 / panorama.height).floor() as usize;
    depth.get(
        map_x.min(depth.width() - 1),
        map_y.min(depth.height() - 1),
    )
}

/// Full placement: pointer → normalized position with depth. Fails with
/// [`GeometryError::DepthUnavailable`] rather than inventing a depth.
pub fn resolve_position(
    click: ScreenPoint,
    bounds: ElementBounds,
    panorama: PanoramaSize,
    anchor: AnchorOffset,
    depth: Option<&DepthMap>,
) -> Result<Position, GeometryError> {
    let point = to_normalized(click, bounds, panorama, anchor)?;
    let depth = depth
        .and_then(|map| sample_depth(point, map, panorama))
        .ok_or(GeometryError::DepthUnavailable)?;
    Ok(Position::new(point.x, point.y, depth))
}
