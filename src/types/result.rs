//! SearchResult, VectorSearchResults (spec §3).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ContentId, ProviderId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub content_id: ContentId,
    pub title: String,
    pub snippet: String,
    pub content: Option<String>,
    pub source_url: String,
    pub workspace_id: WorkspaceId,
    pub technology: Option<String>,
    pub content_type: ContentType,
    pub relevance_score: f64,
    pub recency_score: f64,
    pub quality_score: f64,
    pub metadata: HashMap<String, String>,
}

impl SearchResult {
    /// `source=external_search, provider=<id>` tagging applied by the
    /// provider pool (C7) on ingest of an external hit.
    pub fn tag_external(&mut self, provider_id: &ProviderId) {
        self.metadata
            .insert("source".to_string(), "external_search".to_string());
        self.metadata
            .insert("provider".to_string(), provider_id.clone());
    }

    pub fn provider_tag(&self) -> Option<&str> {
        self.metadata.get("provider").map(|s| s.as_str())
    }

    pub fn is_external(&self) -> bool {
        self.metadata.get("source").map(|s| s.as_str()) == Some("external_search")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchResults {
    pub hits: Vec<SearchResult>,
    pub total: usize,
    pub per_workspace_errors: HashMap<WorkspaceId, String>,
    pub workspaces_searched: Vec<WorkspaceId>,
    pub providers_consulted: Vec<ProviderId>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl VectorSearchResults {
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
            per_workspace_errors: HashMap::new(),
            workspaces_searched: Vec::new(),
            providers_consulted: Vec::new(),
            duration: Duration::from_millis(0),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
