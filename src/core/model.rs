//! Core data model: items, chunks, and the auxiliary entities that hang off them.
//!
//! Plain serde structs, no builder boilerplate, `#[serde(default)]` on every
//! field that may be absent from an older payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A JSON-serializable value for the free-form `metadata` maps: a tagged sum
/// rather than a typeless blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<MetadataValue>),
    Map(HashMap<String, MetadataValue>),
    Null,
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

impl From<usize> for MetadataValue {
    fn from(n: usize) -> Self {
        MetadataValue::Number(n as f64)
    }
}

pub type Metadata = HashMap<String, MetadataValue>;

/// The kind of content an item was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Document,
    Pdf,
    Code,
    Web,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Document => "document",
            SourceType::Pdf => "pdf",
            SourceType::Code => "code",
            SourceType::Web => "web",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(SourceType::Document),
            "pdf" => Some(SourceType::Pdf),
            "code" => Some(SourceType::Code),
            "web" => Some(SourceType::Web),
            _ => None,
        }
    }
}

/// The document unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(title: String, content: String, source_type: SourceType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            content,
            source_type,
            source_path: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The search unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub item_id: String,
    pub chunk_index: usize,
    pub content: String,
    #[serde(default)]
    pub heading: String,
    pub start_position: usize,
    pub end_position: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(
        item_id: String,
        chunk_index: usize,
        content: String,
        heading: String,
        start_position: usize,
        end_position: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item_id,
            chunk_index,
            content,
            heading,
            start_position,
            end_position,
            metadata: Metadata::new(),
        }
    }
}

/// A named auxiliary entity (category or tag); M:N to items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A directed edge between two items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Transport-facing error body for HTTP/JSON-RPC error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
