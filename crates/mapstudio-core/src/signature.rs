//! Structural signatures over the record list.
//!
//! Consumers compare signatures to skip re-deriving state when nothing that
//! the diagram shows has changed. Each signature is an FNV-1a 64-bit fold
//! over the *sorted* per-item digests, so reordering records or rebuilding
//! them with fresh allocations does not change the value.

use crate::graph::NodeRole;
use crate::record::MappingRecord;
use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

/// Incremental FNV-1a 64-bit hasher.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64(u64);

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self(FNV_OFFSET_BASIS)
    }
}

impl Fnv1a64 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) -> &mut Self {
        for b in bytes {
            self.0 ^= *b as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
        self
    }

    /// Write a length-delimited string so `("ab","c")` and `("a","bc")` differ.
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write(&(s.len() as u64).to_le_bytes());
        self.write(s.as_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.write(&v.to_le_bytes())
    }

    pub fn finish(&self) -> u64 {
        self.0
    }
}

/// Fold a multiset of item digests into one order-independent value.
pub fn fold_unordered(mut digests: Vec<u64>) -> u64 {
    digests.sort_unstable();
    let mut hasher = Fnv1a64::new();
    hasher.write_u64(digests.len() as u64);
    for d in digests {
        hasher.write_u64(d);
    }
    hasher.finish()
}

/// Digest of one node identity.
pub fn node_digest(role: NodeRole, path: &str) -> u64 {
    Fnv1a64::new()
        .write_str(role.as_str())
        .write_str(path)
        .finish()
}

/// Digest of the fields of a record that the diagram draws.
pub fn edge_digest(record: &MappingRecord) -> u64 {
    Fnv1a64::new()
        .write_str(&record.source_path)
        .write_str(&record.target_path)
        .write(&[record.selected as u8])
        .write_u64(record.confidence.to_bits())
        .write_str(record.transform_type.as_str())
        .finish()
}

/// Signature of a record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StoreSignature {
    /// Over the distinct `(role, path)` node identities the records imply.
    pub nodes: u64,
    /// Over `(sourcePath, targetPath, selected, confidence, transformType)` per record.
    pub edges: u64,
    /// Over record ids. Edge identities derive from these.
    pub identities: u64,
}

impl StoreSignature {
    pub fn of(records: &[MappingRecord]) -> Self {
        let mut nodes: Vec<u64> = Vec::with_capacity(records.len() * 2);
        for record in records {
            if !record.source_path.is_empty() {
                nodes.push(node_digest(NodeRole::Source, &record.source_path));
            }
            if !record.target_path.is_empty() {
                nodes.push(node_digest(NodeRole::Target, &record.target_path));
            }
        }
        nodes.sort_unstable();
        nodes.dedup();

        let edges = records.iter().map(edge_digest).collect();
        let identities = records
            .iter()
            .map(|r| Fnv1a64::new().write(r.id.as_bytes()).finish())
            .collect();

        Self {
            nodes: fold_unordered(nodes),
            edges: fold_unordered(edges),
            identities: fold_unordered(identities),
        }
    }

    /// Same nodes and same drawn edge content, ignoring record identity.
    pub fn same_content(&self, other: &StoreSignature) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }
}

/// Order-independent digest of a suggestion batch, used to recognize a
/// batch that was already applied.
pub fn suggestion_digest(suggestions: &[crate::record::MappingSuggestion]) -> u64 {
    let digests = suggestions
        .iter()
        .map(|s| {
            Fnv1a64::new()
                .write_str(&crate::paths::normalize_external(&s.source_path))
                .write_str(&crate::paths::normalize_external(&s.target_path))
                .write_u64(s.confidence.to_bits())
                .write_str(s.transform_type.as_str())
                .write_str(&s.reason)
                .write_str(s.target_artifact_name.as_deref().unwrap_or_default())
                .write_str(s.target_artifact_type.map(|t| t.as_str()).unwrap_or_default())
                .finish()
        })
        .collect();
    fold_unordered(digests)
}
