//! Mapstudio sync: the collaborator boundary around the mapping core.
//!
//! ```text
//!   suggestion source ──StudioResponse──┐
//!   audit log ──AuditPoller──PollUpdate─┼──► StudioSession ──► MappingSession
//!                                       │         │
//!                                       │         └──► ExportPipeline ──► PersistCollaborator
//! ```
//!
//! - [`payload`]: suggestion and missing-field extraction from loosely shaped payloads.
//! - [`poller`]: cancellable, generation-tagged audit polling.
//! - [`export`]: export snapshots and the save → confirm → export pipeline.
//! - [`session`]: the orchestrating owner.
//! - [`config`]: studio settings.

pub mod config;
pub mod export;
pub mod payload;
pub mod poller;
pub mod session;

pub use config::{ConfigError, StudioConfig};
pub use export::{
    build_export_request, ExportError, ExportPipeline, ExportReceipt, ExportStage, ExportSummary,
    MappingConfirmResponse, MappingExportRequest, MappingExportRow, MappingSaveResponse,
    PersistCollaborator,
};
pub use payload::{
    extract_audit_suggestions, extract_context_suggestions, extract_missing_targets,
    resolve_suggestions, AuditEvent, StudioResponse, SuggestionBatch, SuggestionOrigin,
};
pub use poller::{AuditPoller, AuditSource, PollOutcome, PollScope, PollUpdate, SourceError};
pub use session::{StudioEvent, StudioEventHandler, StudioSession};
