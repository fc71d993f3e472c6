//! Pulling suggestions and missing-field lists out of suggestion-source payloads.
//!
//! The suggestion source nests its mapping array under different keys
//! depending on where the payload came from. Each place is a named
//! [`Extractor`]; extractors are tried in order and the first one that finds
//! an array wins. Nothing here fails: unparseable payloads and malformed rows
//! degrade to fewer suggestions.

use mapstudio_core::record::MappingSuggestion;
use mapstudio_core::signature::suggestion_digest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const SUGGESTIONS_KEY: &str = "mapping_suggestions";
const MISSING_KEY: &str = "missing_required_target_fields";

/// One studio turn as returned by the suggestion source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudioResponse {
    pub conversation_id: String,
    pub intent: String,
    pub state: String,
    pub payload_type: String,
    pub payload: Value,
    /// JSON document carrying suggestions and missing required fields.
    pub context_json: String,
}

impl StudioResponse {
    pub fn is_error(&self) -> bool {
        self.state.eq_ignore_ascii_case("ERROR")
    }
}

/// One audit-log row of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(alias = "payload_json", skip_serializing_if = "Option::is_none")]
    pub payload_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// ============================================================================
// Extractors
// ============================================================================

/// A named place a suggestion array may live in a payload.
#[derive(Clone, Copy)]
pub struct Extractor {
    pub name: &'static str,
    find: fn(&Value) -> Option<&Vec<Value>>,
}

impl Extractor {
    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a Vec<Value>> {
        (self.find)(payload)
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor").field("name", &self.name).finish()
    }
}

fn top_level(payload: &Value) -> Option<&Vec<Value>> {
    payload.get(SUGGESTIONS_KEY)?.as_array()
}

fn input_params_camel(payload: &Value) -> Option<&Vec<Value>> {
    payload.get("inputParams")?.get(SUGGESTIONS_KEY)?.as_array()
}

fn input_params_snake(payload: &Value) -> Option<&Vec<Value>> {
    payload.get("input_params")?.get(SUGGESTIONS_KEY)?.as_array()
}

/// Extractors applied to a response's context document.
pub const CONTEXT_EXTRACTORS: &[Extractor] = &[Extractor {
    name: "context.mapping_suggestions",
    find: top_level,
}];

/// Extractors applied to each audit payload, in priority order.
pub const AUDIT_EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "inputParams.mapping_suggestions",
        find: input_params_camel,
    },
    Extractor {
        name: "input_params.mapping_suggestions",
        find: input_params_snake,
    },
    Extractor {
        name: "mapping_suggestions",
        find: top_level,
    },
];

/// First extractor that finds an array, with its name.
pub fn first_match<'a>(
    extractors: &[Extractor],
    payload: &'a Value,
) -> Option<(&'static str, &'a Vec<Value>)> {
    extractors
        .iter()
        .find_map(|extractor| extractor.extract(payload).map(|rows| (extractor.name, rows)))
}

fn parse_document(raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(error = %err, "payload is not JSON");
            None
        }
    }
}

/// Decode array rows, dropping the ones that are not suggestion objects.
fn decode_rows(rows: &[Value]) -> Vec<MappingSuggestion> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| {
            if !row.is_object() {
                warn!(index, "skipping non-object suggestion row");
                return None;
            }
            match serde_json::from_value::<MappingSuggestion>(row.clone()) {
                Ok(suggestion) => Some(suggestion),
                Err(err) => {
                    warn!(index, error = %err, "skipping malformed suggestion row");
                    None
                }
            }
        })
        .collect()
}

// ============================================================================
// Suggestions
// ============================================================================

/// Where a suggestion batch was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionOrigin {
    Context,
    Audit {
        audit_id: Option<i64>,
        extractor: String,
    },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionBatch {
    pub origin: SuggestionOrigin,
    pub suggestions: Vec<MappingSuggestion>,
}

impl SuggestionBatch {
    pub fn empty() -> Self {
        Self {
            origin: SuggestionOrigin::None,
            suggestions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// Structural signature; equal batches mean nothing new arrived.
    pub fn signature(&self) -> u64 {
        suggestion_digest(&self.suggestions)
    }
}

/// Suggestions carried directly in a response's context document.
pub fn extract_context_suggestions(context_json: &str) -> Vec<MappingSuggestion> {
    parse_document(context_json)
        .as_ref()
        .and_then(|doc| first_match(CONTEXT_EXTRACTORS, doc))
        .map(|(_, rows)| decode_rows(rows))
        .unwrap_or_default()
}

/// Scan audit rows newest-first for the most recent payload carrying a
/// suggestion array. The first array found wins, even an empty one.
pub fn extract_audit_suggestions(events: &[AuditEvent]) -> SuggestionBatch {
    for event in events.iter().rev() {
        let Some(raw) = event.payload_json.as_deref() else {
            continue;
        };
        let Some(doc) = parse_document(raw) else {
            continue;
        };
        if let Some((name, rows)) = first_match(AUDIT_EXTRACTORS, &doc) {
            return SuggestionBatch {
                origin: SuggestionOrigin::Audit {
                    audit_id: event.audit_id,
                    extractor: name.to_string(),
                },
                suggestions: decode_rows(rows),
            };
        }
    }
    SuggestionBatch::empty()
}

/// The response's own suggestions when it has any, otherwise the audit log
/// as a best-effort fallback.
pub fn resolve_suggestions(response: Option<&StudioResponse>, audits: &[AuditEvent]) -> SuggestionBatch {
    let Some(response) = response else {
        return SuggestionBatch::empty();
    };
    let direct = extract_context_suggestions(&response.context_json);
    if !direct.is_empty() {
        return SuggestionBatch {
            origin: SuggestionOrigin::Context,
            suggestions: direct,
        };
    }
    extract_audit_suggestions(audits)
}

/// Required target fields the suggestion source reported as still unmapped.
pub fn extract_missing_targets(context_json: &str) -> Vec<String> {
    parse_document(context_json)
        .as_ref()
        .and_then(|doc| doc.get(MISSING_KEY))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn audit(id: i64, payload: Value) -> AuditEvent {
        AuditEvent {
            audit_id: Some(id),
            payload_json: Some(payload.to_string()),
            ..AuditEvent::default()
        }
    }

    #[test]
    fn context_suggestions_tolerate_garbage() {
        assert!(extract_context_suggestions("").is_empty());
        assert!(extract_context_suggestions("{not json").is_empty());
        assert!(extract_context_suggestions(r#"{"mapping_suggestions": "nope"}"#).is_empty());

        let ctx = json!({
            "mapping_suggestions": [
                {"sourcePath": "a", "targetPath": "b", "confidence": 0.9},
                42,
                {"sourcePath": ["bad"]}
            ]
        });
        let found = extract_context_suggestions(&ctx.to_string());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_path, "a");
    }

    #[test]
    fn audit_scan_prefers_newest_and_extractor_order() {
        let events = vec![
            audit(1, json!({"mapping_suggestions": [{"sourcePath": "old", "targetPath": "x"}]})),
            audit(
                2,
                json!({
                    "mapping_suggestions": [{"sourcePath": "top", "targetPath": "x"}],
                    "input_params": {"mapping_suggestions": [{"sourcePath": "snake", "targetPath": "x"}]}
                }),
            ),
            AuditEvent {
                payload_json: Some("garbage".into()),
                ..AuditEvent::default()
            },
        ];
        let batch = extract_audit_suggestions(&events);
        assert_eq!(batch.suggestions[0].source_path, "snake");
        assert_eq!(
            batch.origin,
            SuggestionOrigin::Audit {
                audit_id: Some(2),
                extractor: "input_params.mapping_suggestions".into()
            }
        );
    }

    #[test]
    fn an_empty_array_still_ends_the_scan() {
        let events = vec![
            audit(1, json!({"mapping_suggestions": [{"sourcePath": "a", "targetPath": "b"}]})),
            audit(2, json!({"inputParams": {"mapping_suggestions": []}})),
        ];
        let batch = extract_audit_suggestions(&events);
        assert!(batch.is_empty());
        assert!(matches!(batch.origin, SuggestionOrigin::Audit { audit_id: Some(2), .. }));
    }

    #[test]
    fn resolution_falls_back_to_audit() {
        let response = StudioResponse {
            context_json: json!({"mapping_suggestions": []}).to_string(),
            ..StudioResponse::default()
        };
        let events = vec![audit(5, json!({"mapping_suggestions": [{"sourcePath": "a", "targetPath": "b"}]}))];
        let batch = resolve_suggestions(Some(&response), &events);
        assert_eq!(batch.suggestions.len(), 1);

        assert_eq!(resolve_suggestions(None, &events), SuggestionBatch::empty());
    }

    #[test]
    fn missing_targets_keep_only_strings() {
        let ctx = json!({"missing_required_target_fields": ["customer.legalName", 3, "$.order.id"]});
        assert_eq!(
            extract_missing_targets(&ctx.to_string()),
            vec!["customer.legalName".to_string(), "$.order.id".to_string()]
        );
        assert!(extract_missing_targets("{}").is_empty());
    }

    #[test]
    fn audit_rows_accept_snake_case_payload_key() {
        let row: AuditEvent =
            serde_json::from_str(r#"{"auditId": 3, "payload_json": "{}"}"#).unwrap();
        assert_eq!(row.payload_json.as_deref(), Some("{}"));
    }
}
