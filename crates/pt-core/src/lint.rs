//! Lint diagnostics for tour documents.
//!
//! Reports data-quality issues without modifying the tour. Dangling
//! destinations are surfaced here instead of being repaired when a
//! location is deleted.

use crate::graph::traversal_graph;
use crate::id::{LocationId, OverlayId};
use crate::model::{OverlayAction, TourGraph};
use petgraph::visit::Bfs;
use std::collections::HashSet;

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// A visitor will hit a broken link or missing media.
    Warning,
    /// The tour works but is probably incomplete.
    Info,
}

/// A single lint diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct TourDiagnostic {
    /// The location the finding is about, if any.
    pub location: Option<LocationId>,
    /// The overlay the finding is about, if any.
    pub overlay: Option<OverlayId>,
    /// Human-readable message.
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-destination").
    pub rule: &'static str,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run all lint rules over a tour and return diagnostics.
#[must_use]
pub fn lint_tour(tour: &TourGraph) -> Vec<TourDiagnostic> {
    let mut diags = Vec::new();
    lint_dangling_destinations(tour, &mut diags);
    lint_starting_location(tour, &mut diags);
    lint_unreachable_locations(tour, &mut diags);
    lint_missing_resources(tour, &mut diags);
    lint_positions(tour, &mut diags);
    diags
}

// ─── Rules ────────────────────────────────────────────────────────────────

/// Warn on `path`/`portal` actions whose destination is not in the tour.
fn lint_dangling_destinations(tour: &TourGraph, diags: &mut Vec<TourDiagnostic>) {
    for (id, location) in tour.locations.iter() {
        for (overlay, action) in location.actions() {
            let Some(destination) = action.destination() else {
                continue;
            };
            if tour.locations.contains_key(&destination) {
                continue;
            }
            diags.push(TourDiagnostic {
                location: Some(*id),
                overlay: Some(overlay.id),
                message: if destination.as_str().is_empty() {
                    format!("{} action on `{id}` has no destination.", action.kind().as_str())
                } else {
                    format!(
                        "{} action on `{id}` leads to `{destination}`, which does not exist.",
                        action.kind().as_str()
                    )
                },
                severity: LintSeverity::Warning,
                rule: "dangling-destination",
            });
        }
    }
}

fn lint_starting_location(tour: &TourGraph, diags: &mut Vec<TourDiagnostic>) {
    match tour.starting_location {
        Some(start) if !tour.locations.contains_key(&start) => diags.push(TourDiagnostic {
            location: Some(start),
            overlay: None,
            message: format!("Starting location `{start}` does not exist."),
            severity: LintSeverity::Warning,
            rule: "unknown-starting-location",
        }),
        None if !tour.locations.is_empty() => diags.push(TourDiagnostic {
            location: None,
            overlay: None,
            message: "Tour has locations but no starting location.".to_string(),
            severity: LintSeverity::Info,
            rule: "missing-starting-location",
        }),
        _ => {}
    }
}

/// Info on locations a visitor cannot reach from the starting location.
fn lint_unreachable_locations(tour: &TourGraph, diags: &mut Vec<TourDiagnostic>) {
    let Some(start) = tour.starting_location else {
        return;
    };
    let traversal = traversal_graph(tour);
    let Some(&start_idx) = traversal.index.get(&start) else {
        return;
    };

    let mut reached = HashSet::new();
    let mut bfs = Bfs::new(&traversal.graph, start_idx);
    while let Some(idx) = bfs.next(&traversal.graph) {
        reached.insert(traversal.graph[idx]);
    }

    for id in tour.locations.keys() {
        if !reached.contains(id) {
            diags.push(TourDiagnostic {
                location: Some(*id),
                overlay: None,
                message: format!("Location `{id}` cannot be reached from `{start}`."),
                severity: LintSeverity::Info,
                rule: "unreachable-location",
            });
        }
    }
}

/// Warn on empty panorama or video references (a failed upload that was
/// persisted anyway).
fn lint_missing_resources(tour: &TourGraph, diags: &mut Vec<TourDiagnostic>) {
    for (id, location) in tour.locations.iter() {
        if location.panorama.is_missing() {
            diags.push(TourDiagnostic {
                location: Some(*id),
                overlay: None,
                message: format!("Location `{id}` has no panorama."),
                severity: LintSeverity::Warning,
                rule: "missing-resource",
            });
        }
        for (overlay, action) in location.actions() {
            if let OverlayAction::Path { video, .. } = action
                && video.is_missing()
            {
                diags.push(TourDiagnostic {
                    location: Some(*id),
                    overlay: Some(overlay.id),
                    message: format!("Path on `{id}` has no video."),
                    severity: LintSeverity::Warning,
                    rule: "missing-resource",
                });
            }
        }
    }
}

/// Warn on overlays placed outside the normalized panorama area.
fn lint_positions(tour: &TourGraph, diags: &mut Vec<TourDiagnostic>) {
    let in_range = |v: f64| (0.0..=1.0).contains(&v);
    for (id, location) in tour.locations.iter() {
        for overlay in &location.overlays {
            let p = overlay.position;
            if !in_range(p.x) || !in_range(p.y) {
                diags.push(TourDiagnostic {
                    location: Some(*id),
                    overlay: Some(overlay.id),
                    message: format!(
                        "Overlay at ({:.3}, {:.3}) on `{id}` is outside the panorama.",
                        p.x, p.y
                    ),
                    severity: LintSeverity::Warning,
                    rule: "position-out-of-range",
                });
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
