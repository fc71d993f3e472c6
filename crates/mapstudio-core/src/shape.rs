//! Source and target shape kinds, and the notation each one is shown in.

use crate::paths::PathNotation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared kind of the source data shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Xml,
    #[default]
    Json,
    Database,
}

impl SourceType {
    pub fn notation(self) -> PathNotation {
        match self {
            SourceType::Xml => PathNotation::Xml,
            SourceType::Json | SourceType::Database => PathNotation::Json,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Xml => "XML",
            SourceType::Json => "JSON",
            SourceType::Database => "DATABASE",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared kind of the target shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetType {
    #[default]
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "JSON_SCHEMA")]
    JsonSchema,
    #[serde(rename = "XML")]
    Xml,
    #[serde(rename = "XSD")]
    Xsd,
    #[serde(rename = "XSD+WSDL", alias = "XSD_WSDL")]
    XsdWsdl,
}

impl TargetType {
    pub fn notation(self) -> PathNotation {
        if self.is_json_type() {
            PathNotation::Json
        } else {
            PathNotation::Xml
        }
    }

    pub fn is_json_type(self) -> bool {
        matches!(self, TargetType::Json | TargetType::JsonSchema)
    }

    pub fn is_xml_type(self) -> bool {
        !self.is_json_type()
    }

    /// Several target artifacts (an XSD plus its WSDL) are mapped together.
    pub fn is_multi_artifact(self) -> bool {
        self == TargetType::XsdWsdl
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::Json => "JSON",
            TargetType::JsonSchema => "JSON_SCHEMA",
            TargetType::Xml => "XML",
            TargetType::Xsd => "XSD",
            TargetType::XsdWsdl => "XSD+WSDL",
        }
    }

    /// Resolve a declared type, falling back to sniffing the schema text when
    /// the declaration is blank or unknown.
    pub fn resolve(raw: Option<&str>, schema_text: &str) -> Self {
        let declared = raw.unwrap_or_default().trim().to_ascii_uppercase();
        match declared.as_str() {
            "XSD+WSDL" | "XSD_WSDL" => return TargetType::XsdWsdl,
            "XSD" => return TargetType::Xsd,
            "XML" => return TargetType::Xml,
            "JSON_SCHEMA" => return TargetType::JsonSchema,
            "JSON" => return TargetType::Json,
            _ => {}
        }

        let text = schema_text.to_ascii_lowercase();
        if text.contains("<wsdl:definitions")
            || (text.contains("<definitions") && text.contains("schemas.xmlsoap.org/wsdl"))
        {
            TargetType::XsdWsdl
        } else if text.contains("<xsd:schema") || text.contains("<xs:schema") {
            TargetType::Xsd
        } else if schema_text.trim_start().starts_with('<') {
            TargetType::Xml
        } else if text.contains("\"properties\"") || text.contains("\"$schema\"") {
            TargetType::JsonSchema
        } else {
            TargetType::Json
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path notation recorded on an exported mapping set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathType {
    XmlPath,
    #[default]
    JsonPath,
}

impl PathType {
    pub fn for_source(source: SourceType) -> Self {
        match source {
            SourceType::Xml => PathType::XmlPath,
            _ => PathType::JsonPath,
        }
    }

    /// Anything other than `XML_PATH` reads as `JSON_PATH`.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("XML_PATH") {
            PathType::XmlPath
        } else {
            PathType::JsonPath
        }
    }

    pub fn notation(self) -> PathNotation {
        match self {
            PathType::XmlPath => PathNotation::Xml,
            PathType::JsonPath => PathNotation::Json,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PathType::XmlPath => "XML_PATH",
            PathType::JsonPath => "JSON_PATH",
        }
    }
}

/// Kind of target artifact a record belongs to when the target spans files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactType {
    Xsd,
    Wsdl,
    JsonSchema,
    Json,
    Xml,
}

impl ArtifactType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "XSD" => Some(ArtifactType::Xsd),
            "WSDL" => Some(ArtifactType::Wsdl),
            "JSON_SCHEMA" => Some(ArtifactType::JsonSchema),
            "JSON" => Some(ArtifactType::Json),
            "XML" => Some(ArtifactType::Xml),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactType::Xsd => "XSD",
            ArtifactType::Wsdl => "WSDL",
            ArtifactType::JsonSchema => "JSON_SCHEMA",
            ArtifactType::Json => "JSON",
            ArtifactType::Xml => "XML",
        }
    }
}
