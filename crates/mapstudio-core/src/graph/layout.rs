//! Node positions that survive re-projection.

use crate::graph::{NodeRole, Position};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default placement: two columns, rows stacked in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub source_x: f64,
    pub target_x: f64,
    pub top: f64,
    pub row_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            source_x: 40.0,
            target_x: 500.0,
            top: 56.0,
            row_spacing: 104.0,
        }
    }
}

impl LayoutConfig {
    pub fn default_position(&self, role: NodeRole, row: usize) -> Position {
        let x = match role {
            NodeRole::Source => self.source_x,
            NodeRole::Target => self.target_x,
        };
        Position::new(x, self.top + row as f64 * self.row_spacing)
    }
}

/// Positions keyed by node id.
///
/// `revision` moves only when a visible position changes (a drag or a
/// rename carrying a position), not when defaults are recorded.
#[derive(Debug, Clone, Default)]
pub struct PositionCache {
    positions: HashMap<String, Position>,
    revision: u64,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_of(&self, node_id: &str) -> Option<Position> {
        self.positions.get(node_id).copied()
    }

    /// Record a position reported by the rendering surface.
    pub fn move_node(&mut self, node_id: &str, position: Position) {
        self.positions.insert(node_id.to_string(), position);
        self.revision += 1;
    }

    /// Carry a position over to a node's new identity.
    pub fn rekey(&mut self, from: &str, to: &str) {
        if let Some(position) = self.positions.remove(from) {
            if !self.positions.contains_key(to) {
                self.positions.insert(to.to_string(), position);
            }
            self.revision += 1;
        }
    }

    pub(crate) fn remember(&mut self, node_id: &str, position: Position) {
        self.positions
            .entry(node_id.to_string())
            .or_insert(position);
    }

    /// Forget nodes that are no longer projected.
    pub(crate) fn retain_ids(&mut self, live: &HashSet<&str>) {
        self.positions.retain(|id, _| live.contains(id.as_str()));
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
