//! The ordered record list: the single source of truth every view derives from.

use crate::graph::OrphanSets;
use crate::record::{MappingRecord, MappingSuggestion, RecordId, RecordPatch, MANUAL_ROW_REASON};
use crate::review::{ensure_exportable, ExportBlocked, ReviewGate};
use crate::signature::StoreSignature;
use tracing::debug;

/// Records plus the state that lives and dies with them: orphan node sets
/// and the review gate.
///
/// Every mutation except [`MappingStore::replace_all`] marks the records it
/// touches as human-edited and closes the review gate.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    records: Vec<MappingRecord>,
    orphans: OrphanSets,
    gate: ReviewGate,
    signature: StoreSignature,
    revision: u64,
}

impl MappingStore {
    pub fn new() -> Self {
        let mut store = Self::default();
        store.signature = StoreSignature::of(&store.records);
        store
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn list(&self) -> &[MappingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MappingRecord> {
        self.records.get(index)
    }

    pub fn find(&self, id: RecordId) -> Option<&MappingRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Records that currently draw an edge.
    pub fn active_records(&self) -> impl Iterator<Item = &MappingRecord> {
        self.records.iter().filter(|r| r.is_active())
    }

    pub fn selected_count(&self) -> usize {
        self.records.iter().filter(|r| r.selected).count()
    }

    /// Structural signature, recomputed once per mutation.
    pub fn signature(&self) -> StoreSignature {
        self.signature
    }

    /// Bumped on every record mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn orphans(&self) -> &OrphanSets {
        &self.orphans
    }

    pub fn gate(&self) -> &ReviewGate {
        &self.gate
    }

    pub fn is_confirmed(&self) -> bool {
        self.gate.is_confirmed()
    }

    /// Explicit user confirmation of the current set.
    pub fn confirm(&mut self) {
        self.gate.confirm();
    }

    pub fn ensure_exportable(&self) -> Result<(), ExportBlocked> {
        ensure_exportable(&self.gate, self.records.len())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Replace every record with a fresh batch of suggestions.
    ///
    /// The only way machine-derived records enter the store. Clears orphans
    /// and closes the review gate.
    pub fn replace_all<I>(&mut self, suggestions: I)
    where
        I: IntoIterator<Item = MappingSuggestion>,
    {
        self.records = suggestions
            .into_iter()
            .map(MappingRecord::from_suggestion)
            .collect();
        self.orphans.clear();
        self.touch();
    }

    /// Patch the record at `index`, or append a new edited row when `index`
    /// is past the end. Returns the id of the affected record.
    pub fn upsert_by_index(&mut self, index: usize, patch: RecordPatch) -> RecordId {
        match self.records.get_mut(index) {
            Some(record) => {
                patch.apply_to(record);
                record.mark_edited();
                let id = record.id;
                self.touch();
                id
            }
            None => self.append_manual(patch),
        }
    }

    /// Hard-delete the row at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<MappingRecord> {
        if index >= self.records.len() {
            return None;
        }
        let mut removed = self.records.remove(index);
        removed.mark_edited();
        self.touch();
        Some(removed)
    }

    /// Append a human-authored row built from `partial`.
    pub fn append_manual(&mut self, partial: RecordPatch) -> RecordId {
        let mut record = MappingRecord::manual("", "", MANUAL_ROW_REASON);
        partial.apply_to(&mut record);
        self.push_edited(record)
    }

    pub(crate) fn push_edited(&mut self, mut record: MappingRecord) -> RecordId {
        record.mark_edited();
        let id = record.id;
        self.records.push(record);
        self.touch();
        id
    }

    /// Apply `edit` to every record matching `predicate`, marking each edited.
    /// Returns how many matched.
    pub(crate) fn edit_matching<P, F>(&mut self, predicate: P, mut edit: F) -> usize
    where
        P: Fn(&MappingRecord) -> bool,
        F: FnMut(&mut MappingRecord),
    {
        let mut count = 0;
        for record in self.records.iter_mut().filter(|r| predicate(r)) {
            edit(record);
            record.mark_edited();
            count += 1;
        }
        if count > 0 {
            self.touch();
        }
        count
    }

    /// Hard-delete every record matching `predicate`. Returns how many went.
    pub(crate) fn remove_matching<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&MappingRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|r| !predicate(r));
        let removed = before - self.records.len();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    /// Orphan-only changes leave the review gate alone.
    pub(crate) fn orphans_mut(&mut self) -> &mut OrphanSets {
        &mut self.orphans
    }

    pub(crate) fn prune_orphans(&mut self) -> bool {
        self.orphans.prune(&self.records)
    }

    fn touch(&mut self) {
        self.signature = StoreSignature::of(&self.records);
        self.revision += 1;
        self.gate.revoke();
        let pruned = self.orphans.prune(&self.records);
        debug!(
            revision = self.revision,
            records = self.records.len(),
            orphans_pruned = pruned,
            "record store changed"
        );
    }
}
