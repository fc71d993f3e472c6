//! Path notation conversion.
//!
//! Every record stores its endpoints as **canonical dotted paths**: segments
//! joined by `.`, no leading or trailing separator, array indices as plain
//! numeric segments (`orders[0].id` → `orders.0.id`). The diagram and the
//! tabular editor show the same path in one of two external notations:
//!
//! ```text
//! canonical         XML notation        JSON notation
//! ---------         ------------        -------------
//! ""                "/"                 "$"
//! "customer.name"   "/customer/name"    "$.customer.name"
//! ```
//!
//! All functions here are total: malformed input is normalized on a best
//! effort basis and never fails.

use serde::{Deserialize, Serialize};

/// Separator of canonical paths.
pub const SEPARATOR: char = '.';

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '/' | '[' | ']')
}

fn clean_segment(segment: &str) -> &str {
    segment.trim_matches(|c: char| c.is_whitespace() || c == '\'' || c == '"')
}

/// Normalize any dotted, slashed or bracketed path into canonical form.
///
/// `/` and bracket pairs are treated as separators, runs of separators
/// collapse, and blank segments are dropped. Idempotent.
pub fn to_canonical(raw: &str) -> String {
    raw.split(is_separator)
        .map(clean_segment)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Canonicalize a path coming from an outside source that may use either
/// notation (`$.a.b`, `/a/b`, `a.b`).
pub fn normalize_external(raw: &str) -> String {
    to_canonical(strip_root_marker(raw.trim()))
}

/// Drop a leading `$` root marker. A `$` that starts a key (`$ref`) stays.
fn strip_root_marker(path: &str) -> &str {
    match path.strip_prefix('$') {
        Some(rest) if rest.is_empty() || rest.starts_with(['.', '[']) => rest,
        _ => path,
    }
}

/// Canonical → XML-style slash path.
pub fn to_xml_path(canonical: &str) -> String {
    let cleaned = to_canonical(canonical);
    if cleaned.is_empty() {
        return "/".to_string();
    }
    format!("/{}", cleaned.replace(SEPARATOR, "/"))
}

/// Canonical → JSON-style dollar path.
pub fn to_json_path(canonical: &str) -> String {
    let cleaned = to_canonical(canonical);
    if cleaned.is_empty() {
        return "$".to_string();
    }
    format!("$.{cleaned}")
}

/// XML-style path → canonical. The leading `/` is optional.
pub fn from_xml_path(raw: &str) -> String {
    to_canonical(raw)
}

/// JSON-style path → canonical. The leading `$` marker is optional and
/// bracketed indices become numeric segments.
pub fn from_json_path(raw: &str) -> String {
    to_canonical(strip_root_marker(raw.trim()))
}

/// Last segment of a path, or an empty string when the path is empty.
pub fn leaf(path: &str) -> String {
    to_canonical(path)
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Replace the final segment of `path` with a sanitized `new_leaf`.
///
/// An empty path becomes the token alone. A token that sanitizes to nothing
/// leaves the path unchanged.
pub fn rename_leaf(path: &str, new_leaf: &str) -> String {
    let token = to_canonical(&sanitize_token(new_leaf));
    let current = to_canonical(path);
    if current.is_empty() {
        return token;
    }
    if token.is_empty() {
        return current;
    }
    match current.rsplit_once(SEPARATOR) {
        Some((parent, _)) => format!("{parent}.{token}"),
        None => token,
    }
}

/// Sanitize a user-entered path token: trim, collapse inner whitespace to
/// `_`, drop anything outside `[A-Za-z0-9_.-]`.
pub fn sanitize_token(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect()
}

// ============================================================================
// Notations
// ============================================================================

/// External notation a side of the diagram is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathNotation {
    Xml,
    Json,
}

impl PathNotation {
    pub fn format(self, canonical: &str) -> String {
        match self {
            PathNotation::Xml => to_xml_path(canonical),
            PathNotation::Json => to_json_path(canonical),
        }
    }

    pub fn parse(self, raw: &str) -> String {
        match self {
            PathNotation::Xml => from_xml_path(raw),
            PathNotation::Json => from_json_path(raw),
        }
    }

    /// Placeholder shown in empty path inputs.
    pub fn placeholder(self) -> &'static str {
        match self {
            PathNotation::Xml => "/root/field",
            PathNotation::Json => "$.root.field",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_collapses_mixed_separators() {
        assert_eq!(to_canonical("/customer//address/"), "customer.address");
        assert_eq!(to_canonical("..a...b."), "a.b");
        assert_eq!(to_canonical("orders[0].id"), "orders.0.id");
        assert_eq!(to_canonical("a['b c']"), "a.b c");
        assert_eq!(to_canonical(""), "");
        assert_eq!(to_canonical("///"), "");
    }

    #[test]
    fn notation_formatting() {
        assert_eq!(to_xml_path(""), "/");
        assert_eq!(to_xml_path("customer.name"), "/customer/name");
        assert_eq!(to_json_path(""), "$");
        assert_eq!(to_json_path("customer.name"), "$.customer.name");
        assert_eq!(to_json_path("/customer/name"), "$.customer.name");
    }

    #[test]
    fn parsing_tolerates_missing_markers() {
        assert_eq!(from_xml_path("/a/b"), "a.b");
        assert_eq!(from_xml_path("a/b"), "a.b");
        assert_eq!(from_json_path("$.a.b"), "a.b");
        assert_eq!(from_json_path("a.b"), "a.b");
        assert_eq!(from_json_path("$.items[2].sku"), "items.2.sku");
        assert_eq!(from_json_path("$"), "");
    }

    #[test]
    fn external_paths_drop_the_dollar_marker() {
        assert_eq!(normalize_external("$.a.b"), "a.b");
        assert_eq!(normalize_external("/a/b"), "a.b");
        assert_eq!(normalize_external(" a.b "), "a.b");
        assert_eq!(normalize_external("$[0].id"), "0.id");
        assert_eq!(normalize_external("$"), "");
    }

    #[test]
    fn dollar_keys_are_not_root_markers() {
        assert_eq!(normalize_external("$ref.x"), "$ref.x");
        assert_eq!(from_json_path("$.$ref.x"), "$ref.x");
        assert_eq!(from_json_path("$ref"), "$ref");
    }

    #[test]
    fn leaf_and_rename() {
        assert_eq!(leaf("customer.legalName"), "legalName");
        assert_eq!(leaf(""), "");
        assert_eq!(rename_leaf("customer.legalName", "full name"), "customer.full_name");
        assert_eq!(rename_leaf("", "  name "), "name");
        assert_eq!(rename_leaf("single", "other"), "other");
        assert_eq!(rename_leaf("a.b", "%%%"), "a.b");
        assert_eq!(rename_leaf("a.b", "c.d"), "a.c.d");
    }

    #[test]
    fn sanitize_strips_illegal_characters() {
        assert_eq!(sanitize_token("  full   name "), "full_name");
        assert_eq!(sanitize_token("a/b*c"), "abc");
        assert_eq!(sanitize_token("x-1.y_2"), "x-1.y_2");
    }
}
