//! MCP tool/resource surface (spec §6); field shapes grounded in
//! `examples/original_source/src/api/v1/mcp/tools/{search,ingest,feedback}_tool.py`.
//! The wire protocol itself is an external collaborator (spec §1); these
//! are the logical argument/result contracts.

use serde::{Deserialize, Serialize};

use crate::types::{ContentId, SearchResponse, WorkspaceId};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchToolArgs {
    pub query: String,
    pub technology: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchToolResult {
    pub response: SearchResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestSourceType {
    Github,
    Web,
    Api,
}

/// A consent record must accompany every `ingest` call (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentRecord {
    pub granted_by: String,
    pub granted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestToolArgs {
    pub source_url: String,
    pub source_type: IngestSourceType,
    pub priority: Option<String>,
    pub workspace: Option<WorkspaceId>,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    pub consent: ConsentRecord,
}

fn default_max_depth() -> u32 {
    1
}

impl IngestToolArgs {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=10).contains(&self.max_depth) {
            return Err("max_depth must be in [1, 10]".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestToolResult {
    pub ingestion_id: String,
    pub queue_position: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackToolArgs {
    pub content_id: ContentId,
    pub rating: f64,
    pub comment: Option<String>,
}

impl FeedbackToolArgs {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.rating) {
            return Err("rating must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackToolResult {
    pub accepted: bool,
}

/// Resource URI scheme (spec §6): `collections://`, `docs://`, `status://`
/// with list/get/metadata/stats/search operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScheme {
    Collections,
    Docs,
    Status,
}

impl ResourceScheme {
    pub fn parse(uri: &str) -> Option<(Self, &str)> {
        for (prefix, scheme) in [
            ("collections://", ResourceScheme::Collections),
            ("docs://", ResourceScheme::Docs),
            ("status://", ResourceScheme::Status),
        ] {
            if let Some(rest) = uri.strip_prefix(prefix) {
                return Some((scheme, rest));
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOperation {
    List,
    Get,
    Metadata,
    Stats,
    Search,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResourceResult {
    List(Vec<String>),
    Document(SearchResponse),
    Metadata(serde_json::Value),
    Stats(serde_json::Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_scheme_parses_uri() {
        let (scheme, rest) = ResourceScheme::parse("docs://python/async-await").unwrap();
        assert_eq!(scheme, ResourceScheme::Docs);
        assert_eq!(rest, "python/async-await");
    }

    #[test]
    fn unknown_scheme_is_none() {
        assert!(ResourceScheme::parse("ftp://x").is_none());
    }

    #[test]
    fn ingest_args_reject_out_of_range_depth() {
        let args = IngestToolArgs {
            source_url: "https://example.com".into(),
            source_type: IngestSourceType::Web,
            priority: None,
            workspace: None,
            max_depth: 11,
            consent: ConsentRecord {
                granted_by: "user-1".into(),
                granted_at: chrono::Utc::now(),
            },
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn feedback_args_reject_out_of_range_rating() {
        let args = FeedbackToolArgs {
            content_id: "c1".into(),
            rating: 1.5,
            comment: None,
        };
        assert!(args.validate().is_err());
    }
}
