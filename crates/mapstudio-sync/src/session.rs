//! Studio session: suggestion intake, audit polling and export around one
//! [`MappingSession`].
//!
//! The session is the single logical owner of the mapping state. Responses,
//! poll updates and gestures are applied one at a time through `&mut self`;
//! background work only ever hands results back as values.

use crate::config::StudioConfig;
use crate::export::{ExportError, ExportPipeline, ExportReceipt, PersistCollaborator};
use crate::payload::{
    extract_missing_targets, resolve_suggestions, AuditEvent, StudioResponse, SuggestionBatch,
    SuggestionOrigin,
};
use crate::poller::{AuditPoller, AuditSource, PollOutcome, PollScope, PollUpdate};
use mapstudio_core::MappingSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

// ============================================================================
// Events
// ============================================================================

/// Events emitted by a studio session for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StudioEvent {
    /// A new suggestion batch replaced every record.
    SuggestionsReplaced {
        origin: SuggestionOrigin,
        count: usize,
    },
    MissingTargetsUpdated {
        count: usize,
    },
    /// A poll response from a retired context was dropped.
    StalePollDiscarded {
        generation: u64,
    },
    AuditPollFailed {
        message: String,
    },
    ExportRefused {
        reason: String,
    },
    Exported {
        file_name: String,
        selected: usize,
    },
}

pub type StudioEventHandler = Box<dyn Fn(StudioEvent) + Send + Sync>;

// ============================================================================
// Session
// ============================================================================

pub struct StudioSession {
    config: StudioConfig,
    mapping: MappingSession,
    response: Option<StudioResponse>,
    audits: Vec<AuditEvent>,
    conversation_id: Option<String>,
    /// Signature of the last suggestion batch that replaced the store;
    /// `None` forces the next batch through.
    applied_signature: Option<u64>,
    scope: PollScope,
    event_handlers: Vec<StudioEventHandler>,
}

impl StudioSession {
    pub fn new(config: StudioConfig) -> Self {
        let mapping = MappingSession::new(config.layout, config.source_type, config.target_type);
        Self {
            config,
            mapping,
            response: None,
            audits: Vec::new(),
            conversation_id: None,
            applied_signature: Some(SuggestionBatch::empty().signature()),
            scope: PollScope::new(),
            event_handlers: Vec::new(),
        }
    }

    pub fn on_event(&mut self, handler: StudioEventHandler) {
        self.event_handlers.push(handler);
    }

    fn emit(&self, event: StudioEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn mapping(&self) -> &MappingSession {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut MappingSession {
        &mut self.mapping
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn audits(&self) -> &[AuditEvent] {
        &self.audits
    }

    pub fn scope(&self) -> &PollScope {
        &self.scope
    }

    /// Drop the conversation and all records; any running poll becomes stale.
    pub fn start_conversation(&mut self) {
        self.scope.invalidate();
        self.response = None;
        self.audits.clear();
        self.conversation_id = None;
        self.applied_signature = Some(SuggestionBatch::empty().signature());
        self.mapping = MappingSession::new(
            self.config.layout,
            self.config.source_type,
            self.config.target_type,
        );
    }

    /// Take in one studio turn.
    pub fn apply_response(&mut self, response: StudioResponse) {
        if self.conversation_id.as_deref() != Some(response.conversation_id.as_str()) {
            self.scope.invalidate();
            self.audits.clear();
            self.applied_signature = None;
        }
        self.conversation_id = Some(response.conversation_id.clone());

        let missing = extract_missing_targets(&response.context_json);
        let count = missing.len();
        self.mapping.set_missing_targets(missing);
        self.emit(StudioEvent::MissingTargetsUpdated { count });

        self.response = Some(response);
        self.refresh_suggestions();
    }

    /// Apply a poll result if it still belongs to the current context.
    /// Returns whether it was applied.
    pub fn apply_poll_update(&mut self, update: PollUpdate) -> bool {
        let current = self.scope.is_current(update.generation)
            && self.conversation_id.as_deref() == Some(update.conversation_id.as_str());
        if !current {
            warn!(generation = update.generation, "discarding stale audit poll response");
            self.emit(StudioEvent::StalePollDiscarded {
                generation: update.generation,
            });
            return false;
        }
        match update.outcome {
            PollOutcome::Events(events) => {
                self.audits = events;
                self.refresh_suggestions();
            }
            PollOutcome::Failed { message } => {
                self.emit(StudioEvent::AuditPollFailed { message });
            }
        }
        true
    }

    /// Apply audit rows fetched inline for the current conversation, as
    /// done right after a turn and before polling takes over.
    pub fn apply_audit_events(&mut self, events: Vec<AuditEvent>) {
        self.audits = events;
        self.refresh_suggestions();
    }

    /// Replace the store only when the resolved batch actually changed, so
    /// re-polls do not wipe human edits.
    fn refresh_suggestions(&mut self) -> bool {
        let batch = resolve_suggestions(self.response.as_ref(), &self.audits);
        let signature = batch.signature();
        if self.applied_signature == Some(signature) {
            debug!("suggestion batch unchanged");
            return false;
        }
        self.applied_signature = Some(signature);
        let count = batch.suggestions.len();
        self.mapping.replace_all(batch.suggestions);
        debug!(count, origin = ?batch.origin, "suggestions replaced");
        self.emit(StudioEvent::SuggestionsReplaced {
            origin: batch.origin,
            count,
        });
        true
    }

    /// Start polling the audit log of the current conversation.
    pub fn spawn_audit_poller(
        &self,
        source: Arc<dyn AuditSource>,
    ) -> Option<(AuditPoller, mpsc::UnboundedReceiver<PollUpdate>)> {
        let conversation_id = self.conversation_id.clone()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = AuditPoller::spawn(
            source,
            conversation_id,
            self.config.poll_interval(),
            &self.scope,
            tx,
        );
        Some((poller, rx))
    }

    /// Save, confirm and export through `collaborator`.
    pub async fn export(
        &self,
        collaborator: Arc<dyn PersistCollaborator>,
    ) -> Result<ExportReceipt, ExportError> {
        let result = ExportPipeline::new(collaborator)
            .run(self.mapping.store(), &self.config)
            .await;
        match &result {
            Ok(receipt) => self.emit(StudioEvent::Exported {
                file_name: receipt.file_name.clone(),
                selected: receipt.summary.selected,
            }),
            Err(err) if err.is_precondition() => self.emit(StudioEvent::ExportRefused {
                reason: err.to_string(),
            }),
            Err(err) => warn!(error = %err, "export failed"),
        }
        result
    }
}
