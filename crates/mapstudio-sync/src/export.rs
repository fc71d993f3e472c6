//! Export snapshots and the confirmation-gated persist pipeline.
//!
//! ```text
//!   MappingStore ──ensure_exportable──► build_export_request
//!                    (local refusal)            │
//!                                               ▼
//!                         save ──► confirm ──► export ──► ExportReceipt
//!                              PersistCollaborator
//! ```
//!
//! Preconditions are checked before the first collaborator call: a refused
//! export never reaches the network.

use crate::config::StudioConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mapstudio_core::paths::leaf;
use mapstudio_core::record::display_confidence;
use mapstudio_core::{
    ArtifactType, ExportBlocked, MappingOrigin, MappingRecord, MappingStore, PathType, SourceType,
    TargetType, TransformType,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingExportRow {
    pub source_path: String,
    pub target_path: String,
    pub transform_type: TransformType,
    pub confidence: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub mapping_origin: MappingOrigin,
    pub selected: bool,
    pub manual_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_artifact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_artifact_type: Option<ArtifactType>,
}

impl From<&MappingRecord> for MappingExportRow {
    fn from(record: &MappingRecord) -> Self {
        Self {
            source_path: record.source_path.clone(),
            target_path: record.target_path.clone(),
            transform_type: record.transform_type,
            confidence: if record.confidence.is_finite() {
                record.confidence
            } else {
                0.0
            },
            reason: record.reason.clone(),
            notes: (!record.notes.is_empty()).then(|| record.notes.clone()),
            mapping_origin: record.mapping_origin,
            selected: record.selected,
            manual_override: record.manual_override,
            target_artifact_name: record.target_artifact_name.clone(),
            target_artifact_type: record.target_artifact_type,
        }
    }
}

/// Full snapshot handed to the persist collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingExportRequest {
    pub project_code: String,
    pub mapping_version: String,
    pub source_type: SourceType,
    pub target_type: TargetType,
    pub path_type: PathType,
    pub mappings: Vec<MappingExportRow>,
}

impl MappingExportRequest {
    pub fn selected_count(&self) -> usize {
        self.mappings.iter().filter(|m| m.selected).count()
    }

    /// Download name of the exported workbook.
    pub fn file_name(&self) -> String {
        format!("{}_{}_mappings.xlsx", self.project_code, self.mapping_version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSaveResponse {
    pub project_code: String,
    pub mapping_version: String,
    pub saved_count: usize,
    pub selected_count: usize,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfirmResponse {
    pub project_code: String,
    pub mapping_version: String,
    pub confirmed: bool,
    pub selected_count: usize,
    pub confirmed_at: DateTime<Utc>,
}

/// Snapshot of the current store, faithful to every record.
pub fn build_export_request(records: &[MappingRecord], config: &StudioConfig) -> MappingExportRequest {
    MappingExportRequest {
        project_code: config.effective_project_code().to_string(),
        mapping_version: config.effective_mapping_version().to_string(),
        source_type: config.source_type,
        target_type: config.target_type,
        path_type: PathType::for_source(config.source_type),
        mappings: records.iter().map(MappingExportRow::from).collect(),
    }
}

// ============================================================================
// Summary
// ============================================================================

/// One row of the source/target overview of an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTargetRow {
    pub source_leaf: String,
    pub target_path: String,
    pub formatted_source_path: String,
    pub path_type: PathType,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub project_code: String,
    pub mapping_version: String,
    pub total: usize,
    pub selected: usize,
    pub edited: usize,
    pub rows: Vec<SourceTargetRow>,
}

impl ExportSummary {
    /// Selected rows only, source paths shown in the export's path type.
    pub fn of(request: &MappingExportRequest) -> Self {
        let notation = request.path_type.notation();
        let rows = request
            .mappings
            .iter()
            .filter(|m| m.selected)
            .map(|m| SourceTargetRow {
                source_leaf: leaf(&m.source_path),
                target_path: m.target_path.clone(),
                formatted_source_path: notation.format(&m.source_path),
                path_type: request.path_type,
                confidence: display_confidence(m.confidence),
            })
            .collect();
        Self {
            project_code: request.project_code.clone(),
            mapping_version: request.mapping_version.clone(),
            total: request.mappings.len(),
            selected: request.selected_count(),
            edited: request
                .mappings
                .iter()
                .filter(|m| m.mapping_origin == MappingOrigin::Edited)
                .count(),
            rows,
        }
    }
}

// ============================================================================
// Collaborator and errors
// ============================================================================

/// Remote save / confirm / export endpoints.
#[async_trait]
pub trait PersistCollaborator: Send + Sync {
    async fn save(&self, request: &MappingExportRequest) -> anyhow::Result<MappingSaveResponse>;

    async fn confirm(&self, request: &MappingExportRequest) -> anyhow::Result<MappingConfirmResponse>;

    /// Encoded workbook bytes.
    async fn export(&self, request: &MappingExportRequest) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Save,
    Confirm,
    Export,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportStage::Save => "save",
            ExportStage::Confirm => "confirm",
            ExportStage::Export => "export",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Blocked(#[from] ExportBlocked),

    #[error("at least one mapping must be selected")]
    NoSelectedRows,

    #[error("{stage} request failed: {source}")]
    Collaborator {
        stage: ExportStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("mapping set {project_code} v{mapping_version} was not confirmed")]
    NotConfirmed {
        project_code: String,
        mapping_version: String,
    },
}

impl ExportError {
    /// Refused locally, before any collaborator call.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ExportError::Blocked(_) | ExportError::NoSelectedRows)
    }

    pub fn stage(&self) -> Option<ExportStage> {
        match self {
            ExportError::Collaborator { stage, .. } => Some(*stage),
            ExportError::NotConfirmed { .. } => Some(ExportStage::Confirm),
            _ => None,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReceipt {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub saved: MappingSaveResponse,
    pub confirmed: MappingConfirmResponse,
    pub summary: ExportSummary,
}

pub struct ExportPipeline {
    collaborator: Arc<dyn PersistCollaborator>,
}

impl ExportPipeline {
    pub fn new(collaborator: Arc<dyn PersistCollaborator>) -> Self {
        Self { collaborator }
    }

    /// Save only. Requires a non-empty store, not confirmation.
    pub async fn run_save(
        &self,
        store: &MappingStore,
        config: &StudioConfig,
    ) -> Result<MappingSaveResponse, ExportError> {
        if store.is_empty() {
            return Err(ExportBlocked::NothingToExport.into());
        }
        let request = build_export_request(store.list(), config);
        self.collaborator
            .save(&request)
            .await
            .map_err(|source| ExportError::Collaborator {
                stage: ExportStage::Save,
                source,
            })
    }

    /// Save, confirm, then export the confirmed set.
    pub async fn run(
        &self,
        store: &MappingStore,
        config: &StudioConfig,
    ) -> Result<ExportReceipt, ExportError> {
        if let Err(blocked) = store.ensure_exportable() {
            warn!(reason = %blocked, "export refused");
            return Err(blocked.into());
        }
        let request = build_export_request(store.list(), config);
        if request.selected_count() == 0 {
            warn!("export refused: no selected mappings");
            return Err(ExportError::NoSelectedRows);
        }

        let saved = self
            .collaborator
            .save(&request)
            .await
            .map_err(|source| ExportError::Collaborator {
                stage: ExportStage::Save,
                source,
            })?;
        debug!(saved = saved.saved_count, "mappings saved");

        let confirmed = self
            .collaborator
            .confirm(&request)
            .await
            .map_err(|source| ExportError::Collaborator {
                stage: ExportStage::Confirm,
                source,
            })?;
        if !confirmed.confirmed {
            return Err(ExportError::NotConfirmed {
                project_code: request.project_code.clone(),
                mapping_version: request.mapping_version.clone(),
            });
        }

        let bytes = self
            .collaborator
            .export(&request)
            .await
            .map_err(|source| ExportError::Collaborator {
                stage: ExportStage::Export,
                source,
            })?;

        let file_name = request.file_name();
        debug!(file = %file_name, bytes = bytes.len(), "mappings exported");
        Ok(ExportReceipt {
            file_name,
            bytes,
            saved,
            confirmed,
            summary: ExportSummary::of(&request),
        })
    }
}
