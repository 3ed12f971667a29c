//! TTLDocument and ingestion results (spec §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Api,
    Guide,
    Tutorial,
    Reference,
    Changelog,
    GettingStarted,
    Installation,
    Blog,
    News,
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityIndicators {
    pub has_code: bool,
    pub link_count: u32,
    pub word_count: u32,
    pub header_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TTLDocument {
    pub content_id: ContentId,
    pub content: String,
    pub source_url: String,
    pub technology: Option<String>,
    pub owner: Option<String>,
    pub version: Option<String>,
    pub document_type: DocumentType,
    pub ttl_days: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub source_provider: String,
    pub quality: QualityIndicators,
    pub status: String,
}

/// Whether ingestion ran inline within the request (spec §4.7 step 9) or was
/// merely enqueued for the external job runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionKind {
    Synchronous,
    Asynchronous,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionStatus {
    pub success: bool,
    pub ingested_count: u32,
    pub duration_ms: u64,
    pub source_tag: String,
    pub kind: IngestionKind,
    pub error: Option<String>,
}
