//! Mapping records and the suggestions they are created from.

use crate::paths::normalize_external;
use crate::shape::ArtifactType;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a mapping record.
pub type RecordId = Uuid;

/// Reason stamped on records created or reactivated by a diagram connect.
pub const MANUAL_CONNECT_REASON: &str = "Manually connected";

/// Reason stamped on rows added from the tabular editor.
pub const MANUAL_ROW_REASON: &str = "Manually added mapping";

/// Note left on rows soft-deleted from the diagram when they had none.
pub const DISCONNECT_NOTE: &str = "Disconnected in flow";

// ============================================================================
// Enumerations
// ============================================================================

/// How a source value is turned into the target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformType {
    #[default]
    Direct,
    Expression,
    EnumMap,
    Lookup,
    Conditional,
}

impl TransformType {
    pub const ALL: [TransformType; 5] = [
        TransformType::Direct,
        TransformType::Expression,
        TransformType::EnumMap,
        TransformType::Lookup,
        TransformType::Conditional,
    ];

    /// Unknown names fall back to `DIRECT`.
    pub fn parse_lenient(raw: &str) -> Self {
        let wanted = raw.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransformType::Direct => "DIRECT",
            TransformType::Expression => "EXPRESSION",
            TransformType::EnumMap => "ENUM_MAP",
            TransformType::Lookup => "LOOKUP",
            TransformType::Conditional => "CONDITIONAL",
        }
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a record still is what the suggestion source produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MappingOrigin {
    #[default]
    #[serde(rename = "LLM_DERIVED")]
    LlmDerived,
    #[serde(rename = "EDITED")]
    Edited,
}

impl MappingOrigin {
    /// A non-blank declared origin wins; otherwise the manual override flag decides.
    pub fn resolve(raw: Option<&str>, manual_override: bool) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("EDITED") => MappingOrigin::Edited,
            Some(v) if v.eq_ignore_ascii_case("LLM_DERIVED") => MappingOrigin::LlmDerived,
            _ if manual_override => MappingOrigin::Edited,
            _ => MappingOrigin::LlmDerived,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MappingOrigin::LlmDerived => "LLM_DERIVED",
            MappingOrigin::Edited => "EDITED",
        }
    }
}

impl fmt::Display for MappingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display classification of a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Mid,
    Low,
}

impl ConfidenceBand {
    pub fn classify(confidence: f64) -> Self {
        let value = display_confidence(confidence);
        if value >= 0.8 {
            ConfidenceBand::High
        } else if value >= 0.7 {
            ConfidenceBand::Mid
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Confidence as shown and classified: anything outside `[0, 1]` reads as 0.
pub fn display_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        confidence
    } else {
        0.0
    }
}

// ============================================================================
// Suggestions
// ============================================================================

fn lenient_transform<'de, D>(deserializer: D) -> Result<TransformType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(TransformType::parse_lenient)
        .unwrap_or_default())
}

fn lenient_artifact<'de, D>(deserializer: D) -> Result<Option<ArtifactType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(ArtifactType::parse))
}

fn lenient_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// One mapping suggestion as delivered by the suggestion source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSuggestion {
    #[serde(default, alias = "source_path")]
    pub source_path: String,
    #[serde(default, alias = "target_path")]
    pub target_path: String,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: f64,
    #[serde(default, alias = "transform_type", deserialize_with = "lenient_transform")]
    pub transform_type: TransformType,
    #[serde(default)]
    pub reason: String,
    #[serde(
        default,
        alias = "target_artifact_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_artifact_name: Option<String>,
    #[serde(
        default,
        alias = "target_artifact_type",
        deserialize_with = "lenient_artifact",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_artifact_type: Option<ArtifactType>,
}

impl MappingSuggestion {
    pub fn new(source_path: &str, target_path: &str, confidence: f64) -> Self {
        Self {
            source_path: source_path.to_string(),
            target_path: target_path.to_string(),
            confidence,
            transform_type: TransformType::Direct,
            reason: String::new(),
            target_artifact_name: None,
            target_artifact_type: None,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One candidate or confirmed correspondence between a source and a target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRecord {
    pub id: RecordId,
    /// Canonical dotted path; empty means unset.
    pub source_path: String,
    /// Canonical dotted path; empty means unset.
    pub target_path: String,
    /// Stored as received, clamped only for display.
    pub confidence: f64,
    pub transform_type: TransformType,
    pub reason: String,
    #[serde(default)]
    pub notes: String,
    /// Unselected records stay in the store but produce no edge and are not exported as selected.
    pub selected: bool,
    pub mapping_origin: MappingOrigin,
    #[serde(default)]
    pub manual_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_artifact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_artifact_type: Option<ArtifactType>,
}

impl MappingRecord {
    /// Convert a suggestion into a fresh, selected, machine-derived record.
    pub fn from_suggestion(suggestion: MappingSuggestion) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_path: normalize_external(&suggestion.source_path),
            target_path: normalize_external(&suggestion.target_path),
            confidence: suggestion.confidence,
            transform_type: suggestion.transform_type,
            reason: suggestion.reason,
            notes: String::new(),
            selected: true,
            mapping_origin: MappingOrigin::LlmDerived,
            manual_override: false,
            target_artifact_name: suggestion.target_artifact_name,
            target_artifact_type: suggestion.target_artifact_type,
        }
    }

    /// A human-created record: direct transform, full confidence, already edited.
    pub fn manual(source_path: &str, target_path: &str, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_path: normalize_external(source_path),
            target_path: normalize_external(target_path),
            confidence: 1.0,
            transform_type: TransformType::Direct,
            reason: reason.to_string(),
            notes: String::new(),
            selected: true,
            mapping_origin: MappingOrigin::Edited,
            manual_override: true,
            target_artifact_name: None,
            target_artifact_type: None,
        }
    }

    /// Selected with both endpoints set: the record draws an edge.
    pub fn is_active(&self) -> bool {
        self.selected && !self.source_path.is_empty() && !self.target_path.is_empty()
    }

    pub fn display_confidence(&self) -> f64 {
        display_confidence(self.confidence)
    }

    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::classify(self.confidence)
    }

    pub fn is_edited(&self) -> bool {
        self.mapping_origin == MappingOrigin::Edited
    }

    /// Flip provenance to human-edited. There is no inverse.
    pub(crate) fn mark_edited(&mut self) {
        self.mapping_origin = MappingOrigin::Edited;
        self.manual_override = true;
    }
}

/// Partial update of a record. `None` fields are left alone; paths are
/// canonicalized on application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordPatch {
    pub source_path: Option<String>,
    pub target_path: Option<String>,
    pub confidence: Option<f64>,
    pub transform_type: Option<TransformType>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub selected: Option<bool>,
    pub target_artifact_name: Option<String>,
    pub target_artifact_type: Option<ArtifactType>,
}

impl RecordPatch {
    pub fn source_path(mut self, path: &str) -> Self {
        self.source_path = Some(path.to_string());
        self
    }

    pub fn target_path(mut self, path: &str) -> Self {
        self.target_path = Some(path.to_string());
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = Some(selected);
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn transform_type(mut self, transform: TransformType) -> Self {
        self.transform_type = Some(transform);
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub(crate) fn apply_to(self, record: &mut MappingRecord) {
        if let Some(path) = self.source_path {
            record.source_path = normalize_external(&path);
        }
        if let Some(path) = self.target_path {
            record.target_path = normalize_external(&path);
        }
        if let Some(confidence) = self.confidence {
            record.confidence = confidence;
        }
        if let Some(transform) = self.transform_type {
            record.transform_type = transform;
        }
        if let Some(reason) = self.reason {
            record.reason = reason;
        }
        if let Some(notes) = self.notes {
            record.notes = notes;
        }
        if let Some(selected) = self.selected {
            record.selected = selected;
        }
        if let Some(name) = self.target_artifact_name {
            record.target_artifact_name = Some(name);
        }
        if let Some(kind) = self.target_artifact_type {
            record.target_artifact_type = Some(kind);
        }
    }
}
