//! Deriving nodes and edges from records.

use crate::graph::{
    edge_id, GraphEdge, GraphNode, GraphProjection, LayoutConfig, NodeKey, NodeRole, OrphanSets,
    PositionCache,
};
use crate::paths::{leaf, normalize_external, PathNotation};
use crate::record::{ConfidenceBand, MappingRecord};
use crate::shape::{SourceType, TargetType};
use crate::signature::{fold_unordered, Fnv1a64, StoreSignature};
use crate::store::MappingStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Notation each side of the diagram is displayed in. The two are chosen independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideNotations {
    pub source: PathNotation,
    pub target: PathNotation,
}

impl Default for SideNotations {
    fn default() -> Self {
        Self::from_types(SourceType::default(), TargetType::default())
    }
}

impl SideNotations {
    pub fn from_types(source: SourceType, target: TargetType) -> Self {
        Self {
            source: source.notation(),
            target: target.notation(),
        }
    }

    fn for_role(&self, role: NodeRole) -> PathNotation {
        match role {
            NodeRole::Source => self.source,
            NodeRole::Target => self.target,
        }
    }
}

/// Ordered, de-duplicated, non-empty paths.
fn distinct<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for path in paths {
        if !path.is_empty() && seen.insert(path) {
            out.push(path.to_string());
        }
    }
    out
}

fn edge_label(record: &MappingRecord) -> String {
    let percent = (record.display_confidence() * 100.0).round() as i64;
    format!("{percent}% {}", record.transform_type)
}

/// Project records, orphans and the missing-target list into a graph.
///
/// Pure: positions are only read. Nodes come out sources first, each side in
/// first-seen order (records, then missing targets, then orphans).
pub fn project(
    records: &[MappingRecord],
    orphans: &OrphanSets,
    missing: &[String],
    notations: SideNotations,
    positions: &PositionCache,
    layout: &LayoutConfig,
) -> GraphProjection {
    let missing: Vec<String> = missing.iter().map(|p| normalize_external(p)).collect();

    let source_paths = distinct(
        records
            .iter()
            .map(|r| r.source_path.as_str())
            .chain(orphans.sources().iter().map(String::as_str)),
    );
    let target_paths = distinct(
        records
            .iter()
            .map(|r| r.target_path.as_str())
            .chain(missing.iter().map(String::as_str))
            .chain(orphans.targets().iter().map(String::as_str)),
    );

    let actively_targeted: HashSet<&str> = records
        .iter()
        .filter(|r| r.is_active())
        .map(|r| r.target_path.as_str())
        .collect();
    let missing_set: HashSet<&str> = missing.iter().map(String::as_str).collect();

    let mut nodes = Vec::with_capacity(source_paths.len() + target_paths.len());
    for (role, paths) in [
        (NodeRole::Source, source_paths),
        (NodeRole::Target, target_paths),
    ] {
        for (row, path) in paths.into_iter().enumerate() {
            let key = NodeKey { role, path };
            let id = key.id();
            let backed = records.iter().any(|r| match role {
                NodeRole::Source => r.source_path == key.path,
                NodeRole::Target => r.target_path == key.path,
            });
            let missing = role == NodeRole::Target
                && missing_set.contains(key.path.as_str())
                && !actively_targeted.contains(key.path.as_str());
            let position = positions
                .position_of(&id)
                .unwrap_or_else(|| layout.default_position(role, row));
            nodes.push(GraphNode {
                display_path: notations.for_role(role).format(&key.path),
                leaf: leaf(&key.path),
                orphan: !backed,
                missing,
                position,
                id,
                key,
            });
        }
    }

    let edges = records
        .iter()
        .filter(|r| r.is_active())
        .map(|r| GraphEdge {
            id: edge_id(r.id),
            record_id: r.id,
            source: NodeKey::source(r.source_path.as_str()).id(),
            target: NodeKey::target(r.target_path.as_str()).id(),
            label: edge_label(r),
            band: ConfidenceBand::classify(r.confidence),
            transform_type: r.transform_type,
        })
        .collect();

    GraphProjection { nodes, edges }
}

// ============================================================================
// Cached projector
// ============================================================================

/// Everything a projection depends on, reduced to digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProjectionKey {
    store: StoreSignature,
    orphans: u64,
    missing: u64,
    notations: SideNotations,
    positions: u64,
}

fn paths_digest<'a>(paths: impl Iterator<Item = &'a String>) -> u64 {
    fold_unordered(
        paths
            .map(|p| Fnv1a64::new().write_str(&normalize_external(p)).finish())
            .collect(),
    )
}

/// Projects a store, skipping the work when nothing it depends on changed,
/// and owns the position cache that keeps nodes where the user left them.
#[derive(Debug, Default)]
pub struct Projector {
    layout: LayoutConfig,
    positions: PositionCache,
    cache: Option<(ProjectionKey, GraphProjection)>,
    recomputes: u64,
}

impl Projector {
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn project(
        &mut self,
        store: &MappingStore,
        missing: &[String],
        notations: SideNotations,
    ) -> &GraphProjection {
        let orphans = store.orphans();
        let key = ProjectionKey {
            store: store.signature(),
            orphans: Fnv1a64::new()
                .write_u64(paths_digest(orphans.sources().iter()))
                .write_u64(paths_digest(orphans.targets().iter()))
                .finish(),
            missing: paths_digest(missing.iter()),
            notations,
            positions: self.positions.revision(),
        };

        let entry = match self.cache.take() {
            Some((cached_key, projection)) if cached_key == key => (cached_key, projection),
            _ => {
                let projection = project(
                    store.list(),
                    orphans,
                    missing,
                    notations,
                    &self.positions,
                    &self.layout,
                );
                for node in &projection.nodes {
                    self.positions.remember(&node.id, node.position);
                }
                let live: HashSet<&str> = projection.nodes.iter().map(|n| n.id.as_str()).collect();
                self.positions.retain_ids(&live);
                self.recomputes += 1;
                debug!(
                    nodes = projection.nodes.len(),
                    edges = projection.edges.len(),
                    "graph projection recomputed"
                );
                (key, projection)
            }
        };
        &self.cache.insert(entry).1
    }

    /// The projection most recently handed out, if any.
    pub fn last(&self) -> Option<&GraphProjection> {
        self.cache.as_ref().map(|(_, projection)| projection)
    }

    pub fn positions(&self) -> &PositionCache {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut PositionCache {
        &mut self.positions
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// How many times the graph was actually rebuilt.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }
}
