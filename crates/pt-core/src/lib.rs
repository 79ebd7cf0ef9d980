pub mod geometry;
pub mod graph;
pub mod id;
pub mod lint;
pub mod model;

pub use geometry::{
    AnchorOffset, DepthMap, ElementBounds, GeometryError, NormalizedPoint, PanoramaSize,
    ScreenPoint, from_screen, resolve_position, sample_depth, to_normalized, to_screen,
};
pub use graph::{CompiledGraph, GraphEdge, GraphMemo, GraphNode, compile, graph_key};
pub use id::{IdError, LocationId, OverlayId, TourId, slugify};
pub use lint::{LintSeverity, TourDiagnostic, lint_tour};
pub use model::*;

// Re-export im so downstream crates name the same persistent map type.
pub use im::OrdMap;
