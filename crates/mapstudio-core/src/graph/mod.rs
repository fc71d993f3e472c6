//! The node/edge view derived from the record store.
//!
//! ```text
//!   records ──┐
//!   orphans ──┼──► project() ──► GraphProjection { nodes, edges }
//!   missing ──┘        ▲
//!                      │ positions by node id
//!               PositionCache
//! ```
//!
//! Nodes are identified by `role + canonical path`; source and target paths
//! never share an identity even when the strings collide. Edges are
//! identified by the id of the record that backs them.

pub mod layout;
pub mod orphans;
pub mod projection;

pub use layout::{LayoutConfig, PositionCache};
pub use orphans::OrphanSets;
pub use projection::{project, Projector, SideNotations};

use crate::record::{ConfidenceBand, RecordId, TransformType};
use serde::{Deserialize, Serialize};
use std::fmt;

const EDGE_PREFIX: &str = "e|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Source,
    Target,
}

impl NodeRole {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Source => "source",
            NodeRole::Target => "target",
        }
    }

    fn id_prefix(self) -> &'static str {
        match self {
            NodeRole::Source => "s:",
            NodeRole::Target => "t:",
        }
    }
}

/// Identity of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub role: NodeRole,
    pub path: String,
}

impl NodeKey {
    pub fn source(path: impl Into<String>) -> Self {
        Self {
            role: NodeRole::Source,
            path: path.into(),
        }
    }

    pub fn target(path: impl Into<String>) -> Self {
        Self {
            role: NodeRole::Target,
            path: path.into(),
        }
    }

    /// Stable id string handed to the rendering surface: `s:<path>` or `t:<path>`.
    pub fn id(&self) -> String {
        format!("{}{}", self.role.id_prefix(), self.path)
    }

    pub fn parse(id: &str) -> Option<Self> {
        if let Some(path) = id.strip_prefix(NodeRole::Source.id_prefix()) {
            Some(Self::source(path))
        } else {
            id.strip_prefix(NodeRole::Target.id_prefix())
                .map(Self::target)
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.role.id_prefix(), self.path)
    }
}

/// Id of the edge drawn for a record.
pub fn edge_id(record_id: RecordId) -> String {
    format!("{EDGE_PREFIX}{record_id}")
}

/// Record id behind an edge id.
pub fn edge_record_id(edge_id: &str) -> Option<RecordId> {
    edge_id
        .strip_prefix(EDGE_PREFIX)
        .and_then(|raw| RecordId::parse_str(raw).ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub key: NodeKey,
    /// Path in the side's external notation.
    pub display_path: String,
    pub leaf: String,
    /// Required target with no active record yet.
    pub missing: bool,
    /// Present only through an orphan set.
    pub orphan: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub record_id: RecordId,
    pub source: String,
    pub target: String,
    /// `"<percent>% <TRANSFORM>"`.
    pub label: String,
    pub band: ConfidenceBand,
    pub transform_type: TransformType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphProjection {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphProjection {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn has_edge(&self, id: &str) -> bool {
        self.edge(id).is_some()
    }

    pub fn nodes_with_role(&self, role: NodeRole) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.key.role == role)
    }

    /// Edges touching a node.
    pub fn edges_of<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == node_id || e.target == node_id)
    }

    /// Every edge endpoint is a node of this projection.
    pub fn is_closed(&self) -> bool {
        self.edges
            .iter()
            .all(|e| self.has_node(&e.source) && self.has_node(&e.target))
    }
}
