//! Diagram gestures written back into the record store.
//!
//! ```text
//!   rendering surface ──GraphGesture──► GraphEditController
//!                                          │  resolves ids against the
//!                                          │  last projection
//!                                          ▼
//!                                MappingStore / OrphanSets
//! ```
//!
//! Gestures name nodes and edges by the ids of the last projection handed to
//! the rendering surface. Ids that are no longer present are stale UI events:
//! the gesture is ignored and reported as such, never treated as an error.

use crate::graph::{edge_record_id, NodeKey, NodeRole, Position, Projector};
use crate::paths::{rename_leaf, sanitize_token, to_canonical};
use crate::record::{MappingRecord, DISCONNECT_NOTE, MANUAL_CONNECT_REASON};
use crate::store::MappingStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Prefix of paths synthesized for unattached source nodes.
pub const NEW_SOURCE_PREFIX: &str = "source.newField";

/// A user gesture reported by the diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "snake_case")]
pub enum GraphGesture {
    Connect { source: String, target: String },
    Disconnect { edge: String },
    Rename { node: String, new_leaf: String },
    AddUnattachedSource,
    RemoveOrphanSource { node: String },
    SelectNode { node: String },
    SelectEdge { edge: String },
    ClearSelection,
    DeleteSelected,
    MoveNode { node: String, x: f64, y: f64 },
}

impl GraphGesture {
    pub fn name(&self) -> &'static str {
        match self {
            GraphGesture::Connect { .. } => "connect",
            GraphGesture::Disconnect { .. } => "disconnect",
            GraphGesture::Rename { .. } => "rename",
            GraphGesture::AddUnattachedSource => "add_unattached_source",
            GraphGesture::RemoveOrphanSource { .. } => "remove_orphan_source",
            GraphGesture::SelectNode { .. } => "select_node",
            GraphGesture::SelectEdge { .. } => "select_edge",
            GraphGesture::ClearSelection => "clear_selection",
            GraphGesture::DeleteSelected => "delete_selected",
            GraphGesture::MoveNode { .. } => "move_node",
        }
    }
}

/// Result of applying a gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditOutcome {
    Applied { message: String },
    Ignored { reason: String },
}

impl EditOutcome {
    fn applied(message: impl Into<String>) -> Self {
        EditOutcome::Applied {
            message: message.into(),
        }
    }

    fn ignored(reason: impl Into<String>) -> Self {
        EditOutcome::Ignored {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied { .. })
    }
}

/// The single selection cursor: one node, one edge, or nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Node(String),
    Edge(String),
}

fn known_node(projector: &Projector, node_id: &str) -> Option<NodeKey> {
    projector
        .last()
        .and_then(|graph| graph.node(node_id))
        .map(|node| node.key.clone())
}

fn known_edge(projector: &Projector, edge_id: &str) -> bool {
    projector.last().is_some_and(|graph| graph.has_edge(edge_id))
}

fn path_on(record: &MappingRecord, role: NodeRole) -> &str {
    match role {
        NodeRole::Source => &record.source_path,
        NodeRole::Target => &record.target_path,
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphEditController {
    selection: Selection,
}

impl GraphEditController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn apply(
        &mut self,
        store: &mut MappingStore,
        projector: &mut Projector,
        gesture: GraphGesture,
    ) -> EditOutcome {
        let name = gesture.name();
        let outcome = match gesture {
            GraphGesture::Connect { source, target } => {
                self.connect(store, projector, &source, &target)
            }
            GraphGesture::Disconnect { edge } => self.disconnect(store, projector, &edge),
            GraphGesture::Rename { node, new_leaf } => {
                self.rename(store, projector, &node, &new_leaf)
            }
            GraphGesture::AddUnattachedSource => {
                let path = self.add_unattached_source(store);
                EditOutcome::applied(format!("added unattached source {path}"))
            }
            GraphGesture::RemoveOrphanSource { node } => {
                self.remove_orphan_source(store, projector, &node)
            }
            GraphGesture::SelectNode { node } => self.select_node(projector, &node),
            GraphGesture::SelectEdge { edge } => self.select_edge(projector, &edge),
            GraphGesture::ClearSelection => {
                self.clear_selection();
                EditOutcome::applied("selection cleared")
            }
            GraphGesture::DeleteSelected => self.delete_selected(store, projector),
            GraphGesture::MoveNode { node, x, y } => {
                if known_node(projector, &node).is_none() {
                    EditOutcome::ignored(format!("unknown node {node}"))
                } else {
                    projector.positions_mut().move_node(&node, Position::new(x, y));
                    EditOutcome::applied(format!("moved {node}"))
                }
            }
        };
        match &outcome {
            EditOutcome::Applied { message } => debug!(gesture = name, %message, "gesture applied"),
            EditOutcome::Ignored { reason } => debug!(gesture = name, %reason, "gesture ignored"),
        }
        outcome
    }

    // ========================================================================
    // Record-changing gestures
    // ========================================================================

    /// Connect two nodes. Endpoints given in target → source order are swapped.
    pub fn connect(
        &mut self,
        store: &mut MappingStore,
        projector: &Projector,
        from_id: &str,
        to_id: &str,
    ) -> EditOutcome {
        let (Some(from), Some(to)) = (known_node(projector, from_id), known_node(projector, to_id))
        else {
            return EditOutcome::ignored(format!("unknown endpoint {from_id} -> {to_id}"));
        };
        let (source, target) = match (from.role, to.role) {
            (NodeRole::Source, NodeRole::Target) => (from.path, to.path),
            (NodeRole::Target, NodeRole::Source) => (to.path, from.path),
            _ => return EditOutcome::ignored("both endpoints are on the same side"),
        };

        let existing = store
            .list()
            .iter()
            .find(|r| r.source_path == source && r.target_path == target)
            .map(|r| r.id);
        match existing {
            Some(id) => {
                store.edit_matching(
                    |r| r.id == id,
                    |r| {
                        r.selected = true;
                        r.reason = MANUAL_CONNECT_REASON.to_string();
                    },
                );
                EditOutcome::applied(format!("reactivated {source} -> {target}"))
            }
            None => {
                store.push_edited(MappingRecord::manual(&source, &target, MANUAL_CONNECT_REASON));
                EditOutcome::applied(format!("connected {source} -> {target}"))
            }
        }
    }

    /// Soft-delete every record drawing the same pair as `edge_id`; the target
    /// stays visible as an orphan. Rows without notes get [`DISCONNECT_NOTE`].
    pub fn disconnect(
        &mut self,
        store: &mut MappingStore,
        projector: &Projector,
        edge_id: &str,
    ) -> EditOutcome {
        if !known_edge(projector, edge_id) {
            return EditOutcome::ignored(format!("unknown edge {edge_id}"));
        }
        let Some(record) = edge_record_id(edge_id).and_then(|id| store.find(id)) else {
            return EditOutcome::ignored(format!("edge {edge_id} has no record"));
        };
        let source = record.source_path.clone();
        let target = record.target_path.clone();

        let count = store.edit_matching(
            |r| r.source_path == source && r.target_path == target,
            |r| {
                r.selected = false;
                if r.notes.trim().is_empty() {
                    r.notes = DISCONNECT_NOTE.to_string();
                }
            },
        );
        store.orphans_mut().insert(NodeRole::Target, &target);
        if self.selection == Selection::Edge(edge_id.to_string()) {
            self.selection = Selection::None;
        }
        EditOutcome::applied(format!("disconnected {count} record(s) {source} -> {target}"))
    }

    /// Rewrite the leaf of a node's path on every record and orphan entry that
    /// carries it.
    pub fn rename(
        &mut self,
        store: &mut MappingStore,
        projector: &mut Projector,
        node_id: &str,
        new_leaf: &str,
    ) -> EditOutcome {
        let Some(key) = known_node(projector, node_id) else {
            return EditOutcome::ignored(format!("unknown node {node_id}"));
        };
        let token = sanitize_token(new_leaf);
        if to_canonical(&token).is_empty() {
            return EditOutcome::ignored("new name is empty after sanitizing");
        }
        let renamed = rename_leaf(&key.path, &token);
        if renamed == key.path {
            return EditOutcome::ignored("name unchanged");
        }

        let role = key.role;
        let old = key.path.as_str();
        let records = store.edit_matching(
            |r| path_on(r, role) == old,
            |r| match role {
                NodeRole::Source => r.source_path = renamed.clone(),
                NodeRole::Target => r.target_path = renamed.clone(),
            },
        );
        let orphan = store.orphans_mut().rename(role, old, &renamed);
        if records == 0 && !orphan {
            return EditOutcome::ignored(format!("{node_id} has no record or orphan entry"));
        }
        store.prune_orphans();

        let new_key = NodeKey {
            role,
            path: renamed,
        };
        let new_id = new_key.id();
        projector.positions_mut().rekey(node_id, &new_id);
        if self.selection == Selection::Node(node_id.to_string()) {
            self.selection = Selection::Node(new_id.clone());
        }
        EditOutcome::applied(format!("renamed {node_id} to {new_id} on {records} record(s)"))
    }

    /// Add a fresh `source.newFieldN` orphan with the smallest free `N`.
    pub fn add_unattached_source(&mut self, store: &mut MappingStore) -> String {
        let taken = |path: &str| {
            store.list().iter().any(|r| r.source_path == path)
                || store.orphans().contains(NodeRole::Source, path)
        };
        let mut n: u64 = 1;
        let path = loop {
            let candidate = format!("{NEW_SOURCE_PREFIX}{n}");
            if !taken(&candidate) {
                break candidate;
            }
            n += 1;
        };
        store.orphans_mut().insert(NodeRole::Source, &path);
        path
    }

    /// Hard-delete a source node that draws no edge, along with any records
    /// at its path.
    pub fn remove_orphan_source(
        &mut self,
        store: &mut MappingStore,
        projector: &Projector,
        node_id: &str,
    ) -> EditOutcome {
        let Some(key) = known_node(projector, node_id) else {
            return EditOutcome::ignored(format!("unknown node {node_id}"));
        };
        if key.role != NodeRole::Source {
            return EditOutcome::ignored("only source nodes can be removed");
        }
        if store.active_records().any(|r| r.source_path == key.path) {
            return EditOutcome::ignored(format!("{} still has active mappings", key.path));
        }
        let removed = store.remove_matching(|r| r.source_path == key.path);
        store.orphans_mut().remove(NodeRole::Source, &key.path);
        if self.selection == Selection::Node(node_id.to_string()) {
            self.selection = Selection::None;
        }
        EditOutcome::applied(format!("removed source {} and {removed} record(s)", key.path))
    }

    // ========================================================================
    // Selection cursor
    // ========================================================================

    pub fn select_node(&mut self, projector: &Projector, node_id: &str) -> EditOutcome {
        if known_node(projector, node_id).is_none() {
            return EditOutcome::ignored(format!("unknown node {node_id}"));
        }
        self.selection = Selection::Node(node_id.to_string());
        EditOutcome::applied(format!("selected {node_id}"))
    }

    pub fn select_edge(&mut self, projector: &Projector, edge_id: &str) -> EditOutcome {
        if !known_edge(projector, edge_id) {
            return EditOutcome::ignored(format!("unknown edge {edge_id}"));
        }
        self.selection = Selection::Edge(edge_id.to_string());
        EditOutcome::applied(format!("selected {edge_id}"))
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    /// Delete key: disconnect a selected edge, or remove a selected source
    /// node that draws no edge.
    pub fn delete_selected(
        &mut self,
        store: &mut MappingStore,
        projector: &Projector,
    ) -> EditOutcome {
        match self.selection.clone() {
            Selection::Edge(edge) => self.disconnect(store, projector, &edge),
            Selection::Node(node) => match NodeKey::parse(&node) {
                Some(key) if key.role == NodeRole::Source => {
                    self.remove_orphan_source(store, projector, &node)
                }
                _ => EditOutcome::ignored("target nodes cannot be deleted"),
            },
            Selection::None => EditOutcome::ignored("nothing selected"),
        }
    }

    /// Drop a selection that the latest projection no longer contains.
    pub fn reconcile(&mut self, projector: &Projector) -> bool {
        let stale = match &self.selection {
            Selection::None => false,
            Selection::Node(id) => known_node(projector, id).is_none(),
            Selection::Edge(id) => !known_edge(projector, id),
        };
        if stale {
            debug!(selection = ?self.selection, "dropping stale selection");
            self.selection = Selection::None;
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SideNotations;
    use crate::record::{MappingOrigin, MappingSuggestion};

    fn setup(pairs: &[(&str, &str)]) -> (MappingStore, Projector) {
        let mut store = MappingStore::new();
        store.replace_all(
            pairs
                .iter()
                .map(|(s, t)| MappingSuggestion::new(s, t, 0.9))
                .collect::<Vec<_>>(),
        );
        let mut projector = Projector::default();
        projector.project(&store, &[], SideNotations::default());
        (store, projector)
    }

    fn reproject(store: &MappingStore, projector: &mut Projector) {
        projector.project(store, &[], SideNotations::default());
    }

    #[test]
    fn connect_accepts_reversed_endpoints() {
        let (mut store, mut projector) = setup(&[("a", "x"), ("b", "y")]);
        let mut controller = GraphEditController::new();
        let outcome = controller.connect(&mut store, &projector, "t:y", "s:a");
        assert!(outcome.is_applied());
        reproject(&store, &mut projector);
        let added = &store.list()[2];
        assert_eq!((added.source_path.as_str(), added.target_path.as_str()), ("a", "y"));
        assert_eq!(added.reason, MANUAL_CONNECT_REASON);
        assert_eq!(added.mapping_origin, MappingOrigin::Edited);
    }

    #[test]
    fn connect_on_same_side_is_ignored() {
        let (mut store, projector) = setup(&[("a", "x"), ("b", "y")]);
        let mut controller = GraphEditController::new();
        let outcome = controller.connect(&mut store, &projector, "s:a", "s:b");
        assert!(!outcome.is_applied());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn stale_ids_are_ignored() {
        let (mut store, mut projector) = setup(&[("a", "x")]);
        let mut controller = GraphEditController::new();
        let before = store.revision();
        for gesture in [
            GraphGesture::Disconnect { edge: "e|nope".into() },
            GraphGesture::Rename { node: "s:ghost".into(), new_leaf: "z".into() },
            GraphGesture::Connect { source: "s:ghost".into(), target: "t:x".into() },
            GraphGesture::RemoveOrphanSource { node: "s:ghost".into() },
            GraphGesture::SelectEdge { edge: "e|nope".into() },
        ] {
            assert!(!controller.apply(&mut store, &mut projector, gesture).is_applied());
        }
        assert_eq!(store.revision(), before);
        assert_eq!(controller.selection(), &Selection::None);
    }

    #[test]
    fn renaming_an_orphan_carries_its_position() {
        let (mut store, mut projector) = setup(&[("a", "x")]);
        let mut controller = GraphEditController::new();
        let path = controller.add_unattached_source(&mut store);
        reproject(&store, &mut projector);
        let old_id = NodeKey::source(path).id();
        projector.positions_mut().move_node(&old_id, Position::new(9.0, 9.0));
        controller.select_node(&projector, &old_id);

        let outcome = controller.rename(&mut store, &mut projector, &old_id, "customer id");
        assert!(outcome.is_applied());
        assert_eq!(store.orphans().sources(), ["source.customer_id".to_string()]);
        assert_eq!(controller.selection(), &Selection::Node("s:source.customer_id".into()));

        let graph = projector.project(&store, &[], SideNotations::default());
        let node = graph.node("s:source.customer_id").expect("renamed orphan");
        assert_eq!(node.position, Position::new(9.0, 9.0));
        assert!(node.orphan);
    }

    #[test]
    fn delete_selected_edge_disconnects() {
        let (mut store, mut projector) = setup(&[("a", "x")]);
        let mut controller = GraphEditController::new();
        let edge = projector.last().map(|g| g.edges[0].id.clone()).unwrap_or_default();
        assert!(controller.select_edge(&projector, &edge).is_applied());
        assert!(controller.delete_selected(&mut store, &projector).is_applied());
        assert!(!store.list()[0].selected);
        assert_eq!(controller.selection(), &Selection::None);
        reproject(&store, &mut projector);
        assert!(projector.last().is_some_and(|g| g.edges.is_empty()));
    }

    #[test]
    fn delete_selected_source_requires_no_active_edges() {
        let (mut store, mut projector) = setup(&[("a", "x")]);
        let mut controller = GraphEditController::new();
        controller.select_node(&projector, "s:a");
        assert!(!controller.delete_selected(&mut store, &projector).is_applied());

        let edge = projector.last().map(|g| g.edges[0].id.clone()).unwrap_or_default();
        controller.disconnect(&mut store, &projector, &edge);
        reproject(&store, &mut projector);
        controller.select_node(&projector, "s:a");
        assert!(controller.delete_selected(&mut store, &projector).is_applied());
        assert!(store.is_empty());
    }

    #[test]
    fn reconcile_drops_vanished_selection() {
        let (mut store, mut projector) = setup(&[("a", "x")]);
        let mut controller = GraphEditController::new();
        controller.select_node(&projector, "s:a");
        store.remove_at(0);
        reproject(&store, &mut projector);
        assert!(controller.reconcile(&projector));
        assert_eq!(controller.selection(), &Selection::None);
    }

    #[test]
    fn gestures_decode_from_tagged_json() {
        let gesture: GraphGesture =
            serde_json::from_str(r#"{"gesture":"rename","node":"t:a.b","new_leaf":"c"}"#).unwrap();
        assert_eq!(
            gesture,
            GraphGesture::Rename { node: "t:a.b".into(), new_leaf: "c".into() }
        );
        let add: GraphGesture = serde_json::from_str(r#"{"gesture":"add_unattached_source"}"#).unwrap();
        assert_eq!(add, GraphGesture::AddUnattachedSource);
    }
}
