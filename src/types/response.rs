//! SearchResponse, error envelope (spec §3, §6).

use serde::{Deserialize, Serialize};

use super::ai::{EvaluationResult, QueryRefinementDecision};
use super::ingestion::IngestionStatus;
use super::query::NormalizedQuery;
use super::request::ResponseType;
use super::result::SearchResult;

/// The cached unit (spec §3). Echoes the query, holds ranked results, and
/// carries every flag needed to reconstruct what the pipeline decided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: NormalizedQuery,
    pub results: Vec<SearchResult>,
    pub response_type: ResponseType,
    pub answer: Option<String>,
    pub execution_time_ms: u64,
    pub cache_hit: bool,
    pub external_search_used: bool,
    pub enrichment_triggered: bool,
    pub refinement_applied: bool,
    pub refined_query: Option<String>,
    pub refinement: Option<QueryRefinementDecision>,
    pub ingestion_status: Option<IngestionStatus>,
    pub evaluation: Option<EvaluationResult>,
}

impl SearchResponse {
    pub fn with_cache_hit(mut self, execution_time_ms: u64) -> Self {
        self.cache_hit = true;
        self.execution_time_ms = execution_time_ms;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    QueueOverflow,
    RateLimitExceeded,
    SearchTimeout,
    ProviderUnavailable,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub retry_after: Option<u64>,
}

impl From<&super::CacheError> for ErrorEnvelope {
    fn from(err: &super::CacheError) -> Self {
        ErrorEnvelope {
            error_code: err.error_code(),
            message: err.to_string(),
            details: None,
            retry_after: err.retry_after_secs(),
        }
    }
}
