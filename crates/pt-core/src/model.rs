//! Core data model for tour documents.
//!
//! A tour owns its locations, a location owns an ordered list of overlays,
//! and an overlay owns its actions. Every level sits behind an `Arc` inside
//! persistent containers, so an edit copies only the path from the tour
//! down to the touched node while every sibling stays pointer-identical.
//! The serde shape of these types is also the wire format of the remote
//! tour store.

use crate::id::{IdError, LocationId, OverlayId, TourId};
use im::OrdMap;
use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// All tours known to the editor, keyed by tour id.
pub type TourMap = OrdMap<TourId, Arc<TourGraph>>;

// ─── Resources ───────────────────────────────────────────────────────────

/// Opaque handle (a URL) to an uploaded panorama, video, or file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty reference is what a failed upload hands back.
    pub fn is_missing(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ResourceRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Position ────────────────────────────────────────────────────────────

/// Overlay anchor: `x`/`y` normalized to the panorama, plus a depth sample.
/// Serialized as `[x, y, depth]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, depth: f64) -> Self {
        Self { x, y, depth }
    }
}

impl From<[f64; 3]> for Position {
    fn from([x, y, depth]: [f64; 3]) -> Self {
        Self { x, y, depth }
    }
}

impl From<Position> for [f64; 3] {
    fn from(p: Position) -> Self {
        [p.x, p.y, p.depth]
    }
}

// ─── Actions ─────────────────────────────────────────────────────────────

/// Behavior triggered from an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OverlayAction {
    /// Open an external URL.
    ExternalLink {
        #[serde(default)]
        title: String,
        link: String,
    },
    /// Play a transition video, then arrive at `destination`.
    Path {
        #[serde(default)]
        title: String,
        #[serde(default)]
        video: ResourceRef,
        #[serde(default = "missing_destination", deserialize_with = "lenient_destination")]
        destination: LocationId,
    },
    /// Teleport straight to `destination`.
    Portal {
        #[serde(default)]
        title: String,
        #[serde(default = "missing_destination", deserialize_with = "lenient_destination")]
        destination: LocationId,
    },
    /// Show an informational note.
    Info {
        #[serde(default)]
        title: String,
        #[serde(default)]
        information: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ExternalLink,
    Path,
    Portal,
    Info,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExternalLink => "external-link",
            Self::Path => "path",
            Self::Portal => "portal",
            Self::Info => "info",
        }
    }
}

impl OverlayAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::ExternalLink { .. } => ActionKind::ExternalLink,
            Self::Path { .. } => ActionKind::Path,
            Self::Portal { .. } => ActionKind::Portal,
            Self::Info { .. } => ActionKind::Info,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::ExternalLink { title, .. }
            | Self::Path { title, .. }
            | Self::Portal { title, .. }
            | Self::Info { title, .. } => title,
        }
    }

    /// The location this action leads to, for `path` and `portal` actions.
    pub fn destination(&self) -> Option<LocationId> {
        match self {
            Self::Path { destination, .. } | Self::Portal { destination, .. } => Some(*destination),
            Self::ExternalLink { .. } | Self::Info { .. } => None,
        }
    }
}

// ─── Overlays ────────────────────────────────────────────────────────────

/// A positioned hotspot on a panorama.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    /// Legacy documents carry no id; one is assigned on load.
    #[serde(default)]
    pub id: OverlayId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: Position,
    #[serde(default)]
    pub actions: SmallVec<[OverlayAction; 2]>,
}

impl Overlay {
    pub fn new(position: Position) -> Self {
        Self {
            id: OverlayId::new(),
            title: String::new(),
            description: String::new(),
            position,
            actions: SmallVec::new(),
        }
    }
}

// ─── Locations ───────────────────────────────────────────────────────────

/// One panorama plus its overlays, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TourLocation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub panorama: ResourceRef,
    #[serde(default)]
    pub overlays: Vec<Arc<Overlay>>,
}

impl TourLocation {
    pub fn new(title: impl Into<String>, panorama: ResourceRef) -> Self {
        Self {
            title: title.into(),
            panorama,
            ..Self::default()
        }
    }

    /// Empty stand-in handed out for a location that is not loaded.
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// Append an overlay and return its id.
    pub fn push_overlay(&mut self, overlay: Overlay) -> OverlayId {
        let id = overlay.id;
        self.overlays.push(Arc::new(overlay));
        id
    }

    pub fn overlay_index(&self, id: OverlayId) -> Option<usize> {
        self.overlays.iter().position(|o| o.id == id)
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays
            .iter()
            .find(|o| o.id == id)
            .map(Arc::as_ref)
    }

    /// Mutable access to one overlay; copies it if it is shared with an
    /// older snapshot, leaving its siblings untouched.
    pub fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.overlays
            .iter_mut()
            .find(|o| o.id == id)
            .map(Arc::make_mut)
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> Option<Arc<Overlay>> {
        let index = self.overlay_index(id)?;
        Some(self.overlays.remove(index))
    }

    /// Every action on this location, paired with the overlay that owns it.
    pub fn actions(&self) -> impl Iterator<Item = (&Overlay, &OverlayAction)> {
        self.overlays
            .iter()
            .flat_map(|o| o.actions.iter().map(move |a| (o.as_ref(), a)))
    }
}

// ─── Tours ───────────────────────────────────────────────────────────────

/// A titled collection of interconnected locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourGraph {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_location_id"
    )]
    pub starting_location: Option<LocationId>,
    #[serde(default)]
    pub locations: OrdMap<LocationId, Arc<TourLocation>>,
}

impl TourGraph {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Empty stand-in handed out for a tour that is not loaded.
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn location(&self, id: LocationId) -> Option<&TourLocation> {
        self.locations.get(&id).map(Arc::as_ref)
    }

    /// Mutable access to one location, copied on write.
    pub fn location_mut(&mut self, id: LocationId) -> Option<&mut TourLocation> {
        self.locations.get_mut(&id).map(Arc::make_mut)
    }

    /// Add a location whose id is the slug of its title, made unique within
    /// this tour. The first location added becomes the starting location.
    pub fn insert_location(&mut self, location: TourLocation) -> LocationId {
        let id = LocationId::from_title(&location.title, |c| self.locations.contains_key(&c));
        self.locations.insert(id, Arc::new(location));
        if self.starting_location.is_none() {
            self.starting_location = Some(id);
        }
        id
    }

    /// Remove a location and everything it owns. Actions elsewhere that lead
    /// to it are left dangling; `lint_tour` reports them.
    pub fn remove_location(&mut self, id: LocationId) -> Option<Arc<TourLocation>> {
        self.locations.remove(&id)
    }
}

/// Accept a missing, empty, or malformed starting location as "none".
fn lenient_location_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<LocationId>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match LocationId::new(&s) {
        Ok(id) => Some(id),
        Err(IdError::Empty) => None,
        Err(err) => {
            log::warn!("ignoring starting location: {err}");
            None
        }
    }))
}

fn missing_destination() -> LocationId {
    LocationId::unchecked("")
}

/// Keep an empty or malformed destination as written, so the rest of the
/// tour still loads and `lint_tour` can report it.
fn lenient_destination<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LocationId, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(LocationId::new(&raw).unwrap_or_else(|err| {
        log::warn!("keeping malformed destination: {err}");
        LocationId::unchecked(&raw)
    }))
}
