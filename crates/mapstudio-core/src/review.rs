//! The document-level "manually confirmed" gate.
//!
//! Export and confirm actions are refused locally unless a human confirmed
//! the current mapping set. The gate closes again on any record mutation and
//! on every bulk replacement.

use serde::{Deserialize, Serialize};

/// Why an export may not proceed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportBlocked {
    #[error("there are no mappings to export")]
    NothingToExport,

    #[error("the mapping set has not been manually confirmed")]
    ConfirmationRequired,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewGate {
    confirmed: bool,
}

impl ReviewGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit user action.
    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    pub fn revoke(&mut self) {
        self.confirmed = false;
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }
}

/// Check the local export preconditions. Emptiness is reported first.
pub fn ensure_exportable(gate: &ReviewGate, record_count: usize) -> Result<(), ExportBlocked> {
    if record_count == 0 {
        return Err(ExportBlocked::NothingToExport);
    }
    if !gate.is_confirmed() {
        return Err(ExportBlocked::ConfirmationRequired);
    }
    Ok(())
}
