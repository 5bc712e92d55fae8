
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Free-form document metadata, persisted as JSON text
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub source_path: String,
    pub title: Option<String>,
    pub metadata: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub text: String,
    pub position: i64,
}

impl Document {
    /// Decode the stored metadata. Missing or unparsable text yields an empty map.
    #[inline]
    pub fn metadata_map(&self) -> Metadata {
        self.metadata
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok())
            .unwrap_or_default()
    }

    #[inline]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.source_path)
    }
}
