//! Layered flow graph construction.
//!
//! Rows are walked in order and each one contributes
//! source → overlay → underlay(s) → next hops. Nodes are keyed by the entity
//! string and the first role to insert an identity keeps it.

use crate::schema::{FlowRow, Priority};
use indexmap::IndexMap;
use log::trace;
use serde::Serialize;

pub const OVERLAY_COLOR: &str = "#0074D9";
pub const SOURCE_COLOR: &str = "#2ECC40";
pub const NEXT_HOP_COLOR: &str = "#FF851B";
pub const DESTINATION_COLOR: &str = "#B10DC9";

/// Underlay slot colors, cycled when a schema has more slots
pub const UNDERLAY_COLORS: [&str; 6] = [
    "#1f77b4", "#ff7f0e", "#9467bd", "#8c564b", "#e377c2", "#17becf",
];

/// The semantic role a node was inserted under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NodeRole {
    Source,
    Overlay,
    Underlay { slot: usize },
    NextHop { priority: Priority },
    Destination,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub role: NodeRole,
    pub label: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// What to do with a row whose overlay cell is null
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MissingOverlay {
    /// The row contributes nothing
    #[default]
    Skip,
    /// Build the row with this string as the overlay identity
    Placeholder(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub missing_overlay: MissingOverlay,
    /// Drop an edge whose (from, to, label) was already added
    pub dedup_edges: bool,
    /// Draw the destination application as its own node
    pub destination_node: bool,
}

/// Node registry plus edge list for one query
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FlowGraph {
    nodes: IndexMap<String, Node>,
    edges: Vec<Edge>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the node unless its identity is already present
    ///
    /// Returns `true` when the node was inserted.
    pub fn insert_if_absent(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    pub fn add_edge(&mut self, edge: Edge, dedup: bool) {
        if dedup && self.edges.contains(&edge) {
            return;
        }
        self.edges.push(edge);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Builds the graph for the filtered rows of a table with `underlay_slots` slots
pub fn build_graph<'a>(
    rows: impl IntoIterator<Item = &'a FlowRow>,
    underlay_slots: usize,
    options: &BuildOptions,
) -> FlowGraph {
    let mut graph = FlowGraph::new();
    for row in rows {
        add_row(&mut graph, row, underlay_slots, options);
    }
    graph
}

/// Adds one row's nodes and edges to `graph`
pub fn add_row(graph: &mut FlowGraph, row: &FlowRow, underlay_slots: usize, options: &BuildOptions) {
    let overlay = match (&row.overlay, &options.missing_overlay) {
        (Some(overlay), _) => overlay.clone(),
        (None, MissingOverlay::Placeholder(placeholder)) => placeholder.clone(),
        (None, MissingOverlay::Skip) => {
            trace!("skipping row without overlay: {:?}", row.source);
            return;
        }
    };
    let dedup = options.dedup_edges;

    graph.insert_if_absent(Node {
        label: format!("Overlay: {}", overlay),
        id: overlay.clone(),
        role: NodeRole::Overlay,
        color: OVERLAY_COLOR.to_string(),
        tooltip: Some(overlay_details(row)),
    });

    if let Some(source) = &row.source {
        graph.insert_if_absent(Node {
            id: source.clone(),
            role: NodeRole::Source,
            label: format!("Source: {}", source),
            color: SOURCE_COLOR.to_string(),
            tooltip: None,
        });
        graph.add_edge(
            Edge {
                from: source.clone(),
                to: overlay.clone(),
                label: "Source to Overlay".to_string(),
                color: None,
            },
            dedup,
        );
    }

    let underlays: Vec<(usize, &str)> = row.present_underlays().collect();
    for &(slot, underlay) in &underlays {
        let name = underlay_name(slot, underlay_slots);
        graph.insert_if_absent(Node {
            id: underlay.to_string(),
            role: NodeRole::Underlay { slot },
            label: format!("{}: {}", name, underlay),
            color: underlay_color(slot).to_string(),
            tooltip: None,
        });
        graph.add_edge(
            Edge {
                from: overlay.clone(),
                to: underlay.to_string(),
                label: format!("Overlay to {}", name),
                color: None,
            },
            dedup,
        );
    }

    for priority in Priority::ALL {
        let Some(hop) = row.next_hop(priority) else {
            continue;
        };
        graph.insert_if_absent(Node {
            id: hop.to_string(),
            role: NodeRole::NextHop { priority },
            label: format!("Next Hop ({}): {}", priority.name(), hop),
            color: NEXT_HOP_COLOR.to_string(),
            tooltip: None,
        });
        for &(_, underlay) in &underlays {
            graph.add_edge(
                Edge {
                    from: underlay.to_string(),
                    to: hop.to_string(),
                    label: format!("To {}", priority.name()),
                    color: Some(NEXT_HOP_COLOR.to_string()),
                },
                dedup,
            );
        }
    }

    if options.destination_node {
        if let Some(destination) = &row.destination {
            graph.insert_if_absent(Node {
                id: destination.clone(),
                role: NodeRole::Destination,
                label: format!("Destination: {}", destination),
                color: DESTINATION_COLOR.to_string(),
                tooltip: None,
            });
            if let Some(&(_, last)) = underlays.last() {
                graph.add_edge(
                    Edge {
                        from: last.to_string(),
                        to: destination.clone(),
                        label: "Underlay to Destination".to_string(),
                        color: None,
                    },
                    dedup,
                );
            }
        }
    }
}

/// Overlay tooltip: policy, criteria and forwarding profile, one per line
pub fn overlay_details(row: &FlowRow) -> String {
    format!(
        "SD-WAN Policy: {}\nCriteria: {}\nForwarding Profile: {}",
        row.policy.as_deref().unwrap_or(""),
        row.criteria.as_deref().unwrap_or(""),
        row.forwarding_profile.as_deref().unwrap_or("")
    )
}

fn underlay_name(slot: usize, slots: usize) -> String {
    if slots > 1 {
        format!("Underlay-{}", slot)
    } else {
        "Underlay".to_string()
    }
}

fn underlay_color(slot: usize) -> &'static str {
    UNDERLAY_COLORS[(slot.max(1) - 1) % UNDERLAY_COLORS.len()]
}
