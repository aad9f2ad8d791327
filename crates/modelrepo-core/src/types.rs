//! Wire and domain types shared by the repository client and server.
//!
//! JSON bodies use camelCase names. Metadata for a single model travels in
//! response headers so that the body of a `GET` is the raw document.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response header carrying the model id.
pub const HEADER_MODEL_ID: &str = "x-ms-model-id";
/// Response header carrying the server-assigned resource id.
pub const HEADER_RESOURCE_ID: &str = "x-ms-model-resource-id";
/// Response header carrying `true` or `false`.
pub const HEADER_PUBLISHED: &str = "x-ms-model-published";
/// Response header carrying comma-separated tags.
pub const HEADER_TAGS: &str = "x-ms-model-tags";

/// The two document kinds stored in a model repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Interface,
    CapabilityModel,
}

impl ModelKind {
    /// Wire name used in `pnpModelType` and DTDL `@type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Interface => "Interface",
            ModelKind::CapabilityModel => "CapabilityModel",
        }
    }

    /// Reads the kind from a document's `@type`, which may be a string or an array.
    pub fn from_document(document: &serde_json::Value) -> Option<Self> {
        let from_name = |name: &str| match name {
            "Interface" => Some(ModelKind::Interface),
            "CapabilityModel" => Some(ModelKind::CapabilityModel),
            _ => None,
        };

        match document.get("@type")? {
            serde_json::Value::String(name) => from_name(name),
            serde_json::Value::Array(names) => names
                .iter()
                .filter_map(|n| n.as_str())
                .find_map(from_name),
            _ => None,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interface" => Ok(ModelKind::Interface),
            "capabilitymodel" | "capability-model" | "dcm" => Ok(ModelKind::CapabilityModel),
            _ => Err(format!(
                "unknown model kind '{}' (expected 'interface' or 'capability-model')",
                s
            )),
        }
    }
}

/// A model document together with its repository metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelContext {
    pub model_id: String,
    pub kind: ModelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Raw JSON document as stored by the repository
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Repository that served the document; `None` for the public repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
}

impl ModelContext {
    /// Whether the repository reports the document as published (immutable).
    pub fn is_published(&self) -> bool {
        self.published.unwrap_or(false)
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Opaque cursor for the next page; absent on the last page
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub results: Vec<ModelSummary>,
}

/// Body of `POST /Models/Search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub search_string: String,
    pub pnp_model_type: ModelKind,
    pub continuation_token: Option<String>,
    pub page_size: u32,
}

/// Body of `PUT /Models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub etag: Option<String>,
    pub contents: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Splits a comma-separated tags header value.
pub fn parse_tags(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
