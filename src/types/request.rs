//! SearchRequest, UserContext (spec §3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::NormalizedQuery;
use super::{ProviderId, RequestId, SessionId, UserId, WorkspaceId};

/// `response_type` field (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Raw,
    Answer,
}

impl Default for ResponseType {
    fn default() -> Self {
        ResponseType::Raw
    }
}

/// `use_external_search` tri-state (spec §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSearchMode {
    ForceOn,
    ForceOff,
    Auto,
}

impl Default for ExternalSearchMode {
    fn default() -> Self {
        ExternalSearchMode::Auto
    }
}

/// Per-user identity and permission scope carried through the request. Only
/// the rate limiter (C2) may mutate `last_window_counters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: UserId,
    pub session_id: Option<SessionId>,
    pub workspace_ids: Vec<WorkspaceId>,
    pub rate_limit_tier: String,
    pub last_window_counters: HashMap<String, u32>,
}

impl UserContext {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            workspace_ids: Vec::new(),
            rate_limit_tier: "default".to_string(),
            last_window_counters: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub request_id: RequestId,
    pub query: NormalizedQuery,
    pub user_context: UserContext,
    /// Priority score in [0, 10]; higher admits first within admission
    /// ordering alongside the derived queue::Priority bucket.
    pub priority_score: f64,
    pub response_type: ResponseType,
    pub provider_overrides: Option<Vec<ProviderId>>,
    pub use_external_search: ExternalSearchMode,
    pub limit: u32,
    pub offset: u32,
    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
}
