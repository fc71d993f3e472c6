//! Nodes that exist without a backing record.

use crate::graph::NodeRole;
use crate::paths::to_canonical;
use crate::record::MappingRecord;
use serde::{Deserialize, Serialize};

/// Orphan source and target paths, kept in insertion order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanSets {
    sources: Vec<String>,
    targets: Vec<String>,
}

impl OrphanSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.targets.is_empty()
    }

    fn side_mut(&mut self, role: NodeRole) -> &mut Vec<String> {
        match role {
            NodeRole::Source => &mut self.sources,
            NodeRole::Target => &mut self.targets,
        }
    }

    fn side(&self, role: NodeRole) -> &[String] {
        match role {
            NodeRole::Source => &self.sources,
            NodeRole::Target => &self.targets,
        }
    }

    pub fn contains(&self, role: NodeRole, path: &str) -> bool {
        self.side(role).iter().any(|p| p == path)
    }

    /// Returns false for empty or already-present paths.
    pub fn insert(&mut self, role: NodeRole, path: &str) -> bool {
        let path = to_canonical(path);
        if path.is_empty() || self.contains(role, &path) {
            return false;
        }
        self.side_mut(role).push(path);
        true
    }

    pub fn remove(&mut self, role: NodeRole, path: &str) -> bool {
        let side = self.side_mut(role);
        let before = side.len();
        side.retain(|p| p != path);
        side.len() != before
    }

    /// Rename an entry in place. A rename onto an existing entry merges the two.
    pub fn rename(&mut self, role: NodeRole, from: &str, to: &str) -> bool {
        if from == to {
            return self.contains(role, from);
        }
        let exists = self.contains(role, to);
        let side = self.side_mut(role);
        let Some(index) = side.iter().position(|p| p == from) else {
            return false;
        };
        if exists || to.is_empty() {
            side.remove(index);
        } else {
            side[index] = to.to_string();
        }
        true
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.targets.clear();
    }

    /// Drop entries a record now supplies.
    ///
    /// A source is supplied only by an active record with a target; a target
    /// is supplied by any record, active or not. Returns whether anything was dropped.
    pub fn prune(&mut self, records: &[MappingRecord]) -> bool {
        let before = self.sources.len() + self.targets.len();
        self.sources.retain(|path| {
            !records
                .iter()
                .any(|r| r.is_active() && r.source_path == *path)
        });
        self.targets
            .retain(|path| !records.iter().any(|r| r.target_path == *path));
        before != self.sources.len() + self.targets.len()
    }
}
