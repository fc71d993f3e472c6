//! Single owner of the editing state.
//!
//! Every mutation runs to completion and is followed by a re-projection, so
//! the graph handed to the rendering surface always reflects the store and
//! the selection cursor never points at something that vanished.

use crate::controller::{EditOutcome, GraphEditController, GraphGesture, Selection};
use crate::graph::{GraphProjection, LayoutConfig, Projector, SideNotations};
use crate::paths::{normalize_external, rename_leaf, sanitize_token, PathNotation};
use crate::record::{MappingRecord, MappingSuggestion, RecordId, RecordPatch};
use crate::review::ExportBlocked;
use crate::shape::{SourceType, TargetType};
use crate::store::MappingStore;

#[derive(Debug, Default)]
pub struct MappingSession {
    store: MappingStore,
    projector: Projector,
    controller: GraphEditController,
    missing: Vec<String>,
    notations: SideNotations,
}

impl MappingSession {
    pub fn new(layout: LayoutConfig, source: SourceType, target: TargetType) -> Self {
        let mut session = Self {
            store: MappingStore::new(),
            projector: Projector::new(layout),
            controller: GraphEditController::new(),
            missing: Vec::new(),
            notations: SideNotations::from_types(source, target),
        };
        session.refresh();
        session
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    pub fn records(&self) -> &[MappingRecord] {
        self.store.list()
    }

    pub fn selection(&self) -> &Selection {
        self.controller.selection()
    }

    pub fn notations(&self) -> SideNotations {
        self.notations
    }

    pub fn missing_targets(&self) -> &[String] {
        &self.missing
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    /// Current graph.
    pub fn projection(&mut self) -> &GraphProjection {
        self.projector
            .project(&self.store, &self.missing, self.notations)
    }

    fn refresh(&mut self) {
        self.projector
            .project(&self.store, &self.missing, self.notations);
        self.controller.reconcile(&self.projector);
    }

    // ========================================================================
    // Inputs from collaborators
    // ========================================================================

    pub fn replace_all(&mut self, suggestions: Vec<MappingSuggestion>) {
        self.store.replace_all(suggestions);
        self.refresh();
    }

    /// Replace the externally reported missing required targets.
    pub fn set_missing_targets<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut missing: Vec<String> = Vec::new();
        for path in paths {
            let path = normalize_external(path.as_ref());
            if !path.is_empty() && !missing.contains(&path) {
                missing.push(path);
            }
        }
        self.missing = missing;
        self.refresh();
    }

    pub fn set_shapes(&mut self, source: SourceType, target: TargetType) {
        self.notations = SideNotations::from_types(source, target);
        self.refresh();
    }

    // ========================================================================
    // Diagram
    // ========================================================================

    pub fn apply(&mut self, gesture: GraphGesture) -> EditOutcome {
        self.projector
            .project(&self.store, &self.missing, self.notations);
        let outcome = self
            .controller
            .apply(&mut self.store, &mut self.projector, gesture);
        self.refresh();
        outcome
    }

    // ========================================================================
    // Tabular editor
    // ========================================================================

    pub fn upsert_by_index(&mut self, index: usize, patch: RecordPatch) -> RecordId {
        let id = self.store.upsert_by_index(index, patch);
        self.refresh();
        id
    }

    pub fn remove_at(&mut self, index: usize) -> Option<MappingRecord> {
        let removed = self.store.remove_at(index);
        self.refresh();
        removed
    }

    pub fn append_manual(&mut self, partial: RecordPatch) -> RecordId {
        let id = self.store.append_manual(partial);
        self.refresh();
        id
    }

    /// Edit the leaf of a row's source path. Blank tokens are ignored.
    pub fn edit_source_leaf(&mut self, index: usize, new_leaf: &str) -> Option<RecordId> {
        let current = self.store.get(index)?.source_path.clone();
        if sanitize_token(new_leaf).is_empty() {
            return None;
        }
        let renamed = rename_leaf(&current, new_leaf);
        Some(self.upsert_by_index(index, RecordPatch::default().source_path(&renamed)))
    }

    /// Edit a row's path as typed in the given notation.
    pub fn edit_path(
        &mut self,
        index: usize,
        source_side: bool,
        notation: PathNotation,
        raw: &str,
    ) -> Option<RecordId> {
        self.store.get(index)?;
        let canonical = notation.parse(raw);
        let patch = if source_side {
            RecordPatch::default().source_path(&canonical)
        } else {
            RecordPatch::default().target_path(&canonical)
        };
        Some(self.upsert_by_index(index, patch))
    }

    /// Set a row's target from a free-text token, sanitized first.
    pub fn edit_target_token(&mut self, index: usize, raw: &str) -> Option<RecordId> {
        self.store.get(index)?;
        let token = sanitize_token(raw);
        Some(self.upsert_by_index(index, RecordPatch::default().target_path(&token)))
    }

    // ========================================================================
    // Review
    // ========================================================================

    pub fn confirm(&mut self) {
        self.store.confirm();
    }

    pub fn is_confirmed(&self) -> bool {
        self.store.is_confirmed()
    }

    pub fn ensure_exportable(&self) -> Result<(), ExportBlocked> {
        self.store.ensure_exportable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MappingOrigin;

    fn session() -> MappingSession {
        let mut session =
            MappingSession::new(LayoutConfig::default(), SourceType::Xml, TargetType::Json);
        session.replace_all(vec![
            MappingSuggestion::new("order.id", "purchase.reference", 0.95),
            MappingSuggestion::new("order.customer", "purchase.buyer", 0.6),
        ]);
        session
    }

    #[test]
    fn tabular_edits_flow_into_the_graph() {
        let mut session = session();
        session.edit_source_leaf(0, "order number");
        assert_eq!(session.records()[0].source_path, "order.order_number");
        assert_eq!(session.records()[0].mapping_origin, MappingOrigin::Edited);

        session.edit_path(1, false, PathNotation::Json, "$.purchase.customer");
        let graph = session.projection();
        assert!(graph.has_node("s:order.order_number"));
        assert!(graph.has_node("t:purchase.customer"));
        assert!(!graph.has_node("t:purchase.buyer"));
        assert_eq!(
            graph.node("s:order.order_number").map(|n| n.display_path.as_str()),
            Some("/order/order_number")
        );
    }

    #[test]
    fn blank_leaf_edit_is_ignored() {
        let mut session = session();
        assert!(session.edit_source_leaf(0, "  ?? ").is_none());
        assert_eq!(session.records()[0].mapping_origin, MappingOrigin::LlmDerived);
        assert!(session.edit_source_leaf(7, "x").is_none());
    }

    #[test]
    fn missing_targets_are_deduplicated() {
        let mut session = session();
        session.set_missing_targets(["$.purchase.total", "purchase.total", " "]);
        assert_eq!(session.missing_targets(), ["purchase.total".to_string()]);
        let graph = session.projection();
        assert_eq!(graph.node("t:purchase.total").map(|n| n.missing), Some(true));
    }

    #[test]
    fn selection_is_dropped_when_the_node_goes_away() {
        let mut session = session();
        session.apply(GraphGesture::SelectNode { node: "s:order.id".into() });
        assert_eq!(session.selection(), &Selection::Node("s:order.id".into()));
        session.remove_at(0);
        assert_eq!(session.selection(), &Selection::None);
    }
}
