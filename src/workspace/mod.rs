//! Workspace Fan-out (C5), spec §4.4.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;

use crate::observability::emit_event;
use crate::types::{SearchResult, VectorSearchResults, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    AiDriven,
    All,
    Manual,
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        SelectionStrategy::AiDriven
    }
}

/// A queryable vector index partition (spec §1 Non-goals: the vector
/// similarity algorithm itself is an external collaborator; this trait is
/// the seam).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, workspace_id: &WorkspaceId, text: &str, limit: u32) -> Result<Vec<SearchResult>, String>;
}

/// Inert `VectorIndex` for when no real backend is wired up yet: every
/// query returns no hits (spec §1 Non-goals: the vector similarity engine
/// itself is an external collaborator).
pub struct NullVectorIndex;

#[async_trait]
impl VectorIndex for NullVectorIndex {
    async fn query(&self, _workspace_id: &WorkspaceId, _text: &str, _limit: u32) -> Result<Vec<SearchResult>, String> {
        Ok(Vec::new())
    }
}

pub struct WorkspaceFanout<V: VectorIndex> {
    index: V,
    per_workspace_deadline: Duration,
    max_workspaces: usize,
}

impl<V: VectorIndex> WorkspaceFanout<V> {
    pub fn new(index: V) -> Self {
        Self {
            index,
            per_workspace_deadline: Duration::from_secs(2),
            max_workspaces: 5,
        }
    }

    pub fn with_limits(index: V, per_workspace_deadline: Duration, max_workspaces: usize) -> Self {
        Self {
            index,
            per_workspace_deadline,
            max_workspaces,
        }
    }

    /// Resolves the accessible/selected workspace set per selection
    /// strategy (spec §4.4): `ai_driven` honors the AI-suggested list
    /// (already intersected with permissions by the caller), `all` uses
    /// every accessible workspace capped at `max_workspaces_per_search`,
    /// `manual` intersects the caller-provided list with permissions.
    pub fn resolve_workspaces(
        strategy: SelectionStrategy,
        suggested: &[WorkspaceId],
        manual: &[WorkspaceId],
        accessible: &[WorkspaceId],
        max_workspaces: usize,
    ) -> Vec<WorkspaceId> {
        let selected: Vec<WorkspaceId> = match strategy {
            SelectionStrategy::AiDriven => suggested
                .iter()
                .filter(|w| accessible.contains(w))
                .cloned()
                .collect(),
            SelectionStrategy::All => accessible.to_vec(),
            SelectionStrategy::Manual => manual
                .iter()
                .filter(|w| accessible.contains(w))
                .cloned()
                .collect(),
        };
        selected.into_iter().take(max_workspaces).collect()
    }

    /// Issues parallel vector queries, one per workspace, each bounded by
    /// `per_workspace_deadline`. Per-workspace timeouts and errors are
    /// recorded in the error map and never cancel the other branches
    /// (spec §4.4).
    pub async fn search(
        &self,
        workspaces: &[WorkspaceId],
        text: &str,
        per_workspace_limit: u32,
        trace_id: &str,
    ) -> VectorSearchResults {
        let start = Instant::now();
        let capped: Vec<WorkspaceId> = workspaces.iter().take(self.max_workspaces).cloned().collect();

        let futures = capped.iter().map(|workspace_id| {
            let workspace_id = workspace_id.clone();
            async move {
                let outcome = tokio::time::timeout(
                    self.per_workspace_deadline,
                    self.index.query(&workspace_id, text, per_workspace_limit),
                )
                .await;
                (workspace_id, outcome)
            }
        });

        let outcomes = join_all(futures).await;

        let mut hits = Vec::new();
        let mut errors = HashMap::new();
        let mut searched = Vec::new();

        for (workspace_id, outcome) in outcomes {
            searched.push(workspace_id.clone());
            match outcome {
                Ok(Ok(results)) => hits.extend(results),
                Ok(Err(e)) => {
                    errors.insert(workspace_id, e);
                }
                Err(_) => {
                    errors.insert(workspace_id, "workspace query timed out".to_string());
                }
            }
        }

        let total = hits.len();
        emit_event(
            "vector_fanout",
            start.elapsed(),
            trace_id,
            &[
                ("workspaces", &searched.len().to_string()),
                ("errors", &errors.len().to_string()),
                ("hits", &total.to_string()),
            ],
        );

        VectorSearchResults {
            hits,
            total,
            per_workspace_errors: errors,
            workspaces_searched: searched,
            providers_consulted: Vec::new(),
            duration: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;
    use std::collections::HashMap as StdHashMap;

    struct MockIndex {
        slow_workspace: Option<String>,
    }

    #[async_trait]
    impl VectorIndex for MockIndex {
        async fn query(&self, workspace_id: &WorkspaceId, _text: &str, _limit: u32) -> Result<Vec<SearchResult>, String> {
            if Some(workspace_id) == self.slow_workspace.as_ref() {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            if workspace_id == "broken" {
                return Err("boom".to_string());
            }
            Ok(vec![SearchResult {
                content_id: format!("{}-doc", workspace_id),
                title: "t".into(),
                snippet: "s".into(),
                content: None,
                source_url: "https://example.com".into(),
                workspace_id: workspace_id.clone(),
                technology: None,
                content_type: ContentType::Guide,
                relevance_score: 0.8,
                recency_score: 0.5,
                quality_score: 0.5,
                metadata: StdHashMap::new(),
            }])
        }
    }

    #[tokio::test]
    async fn aggregates_hits_across_workspaces() {
        let fanout = WorkspaceFanout::with_limits(MockIndex { slow_workspace: None }, Duration::from_millis(100), 5);
        let workspaces = vec!["python-docs".to_string(), "python-tutorials".to_string()];
        let result = fanout.search(&workspaces, "async", 10, "trace-1").await;
        assert_eq!(result.total, 2);
        assert!(result.per_workspace_errors.is_empty());
    }

    #[tokio::test]
    async fn per_workspace_error_does_not_cancel_others() {
        let fanout = WorkspaceFanout::with_limits(MockIndex { slow_workspace: None }, Duration::from_millis(100), 5);
        let workspaces = vec!["broken".to_string(), "python-docs".to_string()];
        let result = fanout.search(&workspaces, "async", 10, "trace-1").await;
        assert_eq!(result.total, 1);
        assert_eq!(result.per_workspace_errors.len(), 1);
    }

    #[tokio::test]
    async fn timeout_is_recorded_not_fatal() {
        let fanout = WorkspaceFanout::with_limits(
            MockIndex { slow_workspace: Some("slow".to_string()) },
            Duration::from_millis(50),
            5,
        );
        let workspaces = vec!["slow".to_string(), "python-docs".to_string()];
        let result = fanout.search(&workspaces, "async", 10, "trace-1").await;
        assert_eq!(result.total, 1);
        assert!(result.per_workspace_errors.contains_key("slow"));
    }

    #[test]
    fn zero_configured_workspaces_yields_empty_selection() {
        let selected = WorkspaceFanout::<MockIndex>::resolve_workspaces(
            SelectionStrategy::Manual,
            &[],
            &[],
            &[],
            5,
        );
        assert!(selected.is_empty());
    }
}
