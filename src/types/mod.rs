//! Core type definitions for the documentation cache.
//!
//! Entities are immutable value records unless noted; identifiers are stable
//! strings, never raw pointers or database-internal integers.

pub mod ai;
pub mod cache;
pub mod ingestion;
pub mod provider;
pub mod query;
pub mod queue;
pub mod request;
pub mod response;
pub mod result;

pub use ai::{
    ABTest, ABTestStatus, ContentExtractionDecision, DecisionType, EvaluationResult,
    ExternalSearchDecisionOutput, ExternalSearchQueryDecision, FailureAnalysisDecision,
    LearningGap, LearningOpportunitiesDecision, ProviderSelectionDecision, PromptTemplate,
    QueryRefinementDecision, QueryUnderstandingDecision, ResponseFormatDecision,
    SplitStrategy, StatisticalResult, TestMetrics, TestVariant,
};
pub use cache::CacheEntry;
pub use ingestion::{DocumentType, IngestionKind, IngestionStatus, QualityIndicators, TTLDocument};
pub use provider::{CircuitState, CostSpec, HealthState, ProviderRecord, RateLimitSpec};
pub use query::NormalizedQuery;
pub use queue::{Priority, QueueEntry, QueueStats};
pub use request::{ExternalSearchMode, ResponseType, SearchRequest, UserContext};
pub use response::{ErrorCode, ErrorEnvelope, SearchResponse};
pub use result::{ContentType, SearchResult, VectorSearchResults};

/// Request id, fingerprint, content id, workspace id, provider id, test id,
/// template id: all stable opaque strings.
pub type RequestId = String;
pub type Fingerprint = String;
pub type ContentId = String;
pub type WorkspaceId = String;
pub type ProviderId = String;
pub type UserId = String;
pub type SessionId = String;
pub type TestId = String;
pub type TemplateId = String;
pub type TraceId = String;

pub type CacheResult<T> = Result<T, CacheError>;

/// Surfaced error kinds (spec §7: Validation, Admission, Timeout, Fatal).
/// Degradation, decision-fallback, cache-fault, and ingestion-fault are
/// deliberately *not* variants here: they are modeled as typed data on
/// response/result structs and never raised as errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("queue overflow: depth at capacity")]
    QueueOverflow,

    #[error("rate limit exceeded on {bucket} bucket, retry after {retry_after_secs}s")]
    RateLimitExceeded {
        bucket: String,
        retry_after_secs: u64,
    },

    #[error("search timed out at stage {stage}")]
    SearchTimeout { stage: String },

    #[error("no external provider available: {0}")]
    ProviderUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Maps to the error envelope's `error_code` (spec §6).
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CacheError::Validation(_) => ErrorCode::ValidationError,
            CacheError::QueueOverflow => ErrorCode::QueueOverflow,
            CacheError::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            CacheError::SearchTimeout { .. } => ErrorCode::SearchTimeout,
            CacheError::ProviderUnavailable(_) => ErrorCode::ProviderUnavailable,
            CacheError::Config(_) | CacheError::Serialization(_) | CacheError::Io(_)
            | CacheError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            CacheError::RateLimitExceeded { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
