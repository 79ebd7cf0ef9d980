//! Graph compiler: tour document → directed display graph.
//!
//! One node per location, one edge per `path` action. Portals are
//! teleports and do not produce edges. Destinations are not validated:
//! an edge may point at a location that no longer exists.

use crate::id::LocationId;
use crate::model::{OverlayAction, TourGraph};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::Serialize;
use std::collections::HashMap;

/// A location as shown in the graph view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: LocationId,
    pub label: String,
    pub title: String,
}

/// A traversable path between two locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: LocationId,
    pub to: LocationId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompiledGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl CompiledGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Derive the display graph of a tour. Node and edge order follow the
/// location map's (lexical) order, then overlay and action order.
#[must_use]
pub fn compile(tour: &TourGraph) -> CompiledGraph {
    let nodes = tour
        .locations
        .iter()
        .map(|(id, location)| GraphNode {
            id: *id,
            label: location.title.clone(),
            title: location.title.clone(),
        })
        .collect();

    let edges = tour
        .locations
        .iter()
        .flat_map(|(from, location)| {
            location.actions().filter_map(move |(_, action)| match action {
                OverlayAction::Path { destination, .. } => Some(GraphEdge {
                    from: *from,
                    to: *destination,
                }),
                _ => None,
            })
        })
        .collect();

    CompiledGraph { nodes, edges }
}

/// Content key of a compiled graph. Equal keys mean no visible change.
#[must_use]
pub fn graph_key(graph: &CompiledGraph) -> String {
    let nodes = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.label.as_str(), n.title.as_str()));
    let edges = graph.edges.iter().map(|e| (e.from.as_str(), e.to.as_str()));

    // Tuples of strings always serialize.
    serde_json::to_string(&(nodes.collect::<Vec<_>>(), edges.collect::<Vec<_>>()))
        .unwrap_or_default()
}

// ─── Memo ────────────────────────────────────────────────────────────────

/// Remembers the last compiled graph so callers only rebuild their view
/// when the content key changes.
#[derive(Debug, Default)]
pub struct GraphMemo {
    key: Option<String>,
    graph: CompiledGraph,
}

impl GraphMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompile `tour`. Returns the new graph only if it differs from the
    /// previous one.
    pub fn refresh(&mut self, tour: &TourGraph) -> Option<&CompiledGraph> {
        let graph = compile(tour);
        let key = graph_key(&graph);
        if self.key.as_deref() == Some(key.as_str()) {
            return None;
        }
        self.key = Some(key);
        self.graph = graph;
        Some(&self.graph)
    }

    pub fn current(&self) -> &CompiledGraph {
        &self.graph
    }
}

// ─── Traversal graph ─────────────────────────────────────────────────────

/// Locations linked by every action a visitor can take to move, including
/// portals. Dangling destinations are skipped.
pub struct TraversalGraph {
    pub graph: StableDiGraph<LocationId, ()>,
    pub index: HashMap<LocationId, NodeIndex>,
}

#[must_use]
pub fn traversal_graph(tour: &TourGraph) -> TraversalGraph {
    let mut graph = StableDiGraph::new();
    let mut index = HashMap::with_capacity(tour.locations.len());
    for id in tour.locations.keys() {
        index.insert(*id, graph.add_node(*id));
    }
    for (from, location) in tour.locations.iter() {
        for (_, action) in location.actions() {
            if let Some(to) = action.destination()
                && let Some(&to_idx) = index.get(&to)
            {
                graph.add_edge(index[from], to_idx, ());
            }
        }
    }
    TraversalGraph { graph, index }
}
