//! Orchestrator (C9), spec §4.7. The central coordinator: drives
//! normalize -> cache lookup -> workspace selection -> vector fan-out ->
//! AI evaluation -> conditional refinement -> external-search decision ->
//! answer extraction -> conditional ingestion -> cache store -> emit,
//! exactly as staged in `examples/original_source/src/search/orchestrator.py`
//! `SearchOrchestrator.execute_search`, generalized to the typed decision
//! service and admission queue this crate builds around it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::ai::AiDecisionService;
use crate::cache::ResultCache;
use crate::config::CacheConfig;
use crate::ingestion::{IngestionCandidate, IngestionPath};
use crate::observability::{emit_event, new_trace_id};
use crate::providers::ProviderPool;
use crate::ranker::{self, HybridWeights, RankingStrategy};
use crate::types::{
    CacheError, CacheResult, ContentId, DocumentType, ExternalSearchMode, IngestionKind,
    NormalizedQuery, ResponseType, SearchRequest, SearchResponse, SearchResult, UserContext,
    VectorSearchResults, WorkspaceId,
};
use crate::workspace::{SelectionStrategy, VectorIndex, WorkspaceFanout};

/// Stage labels used in both observability events and `SearchTimeout`
/// (spec §4.7, §7: "the envelope names the stage").
pub mod stage {
    pub const NORMALIZE: &str = "normalize";
    pub const CACHE_LOOKUP: &str = "cache_lookup";
    pub const WORKSPACE_SELECTION: &str = "workspace_selection";
    pub const VECTOR_FANOUT: &str = "vector_fanout";
    pub const AI_EVALUATION: &str = "ai_evaluation";
    pub const REFINEMENT: &str = "refinement";
    pub const EXTERNAL_SEARCH: &str = "external_search";
    pub const ANSWER_EXTRACTION: &str = "answer_extraction";
    pub const INGESTION: &str = "ingestion";
    pub const CACHE_STORE: &str = "cache_store";
}

/// Bounds for one orchestration run, resolved once from `CacheConfig` so a
/// single request never re-reads the shared config mid-flight (spec §5:
/// "readers see a consistent snapshot per request").
#[derive(Debug, Clone)]
pub struct OrchestratorLimits {
    pub total_search_timeout: Duration,
    pub per_workspace_timeout: Duration,
    pub sync_ingestion_timeout: Duration,
    pub max_workspaces_per_search: usize,
    pub max_results: u32,
    pub cache_ttl: Duration,
    pub external_search_trigger_quality: f64,
    pub refinement_lower: f64,
    pub refinement_upper: f64,
    pub external_search_enabled: bool,
    pub ai_evaluation_enabled: bool,
    pub query_refinement_enabled: bool,
    pub knowledge_ingestion_enabled: bool,
    pub result_caching_enabled: bool,
    pub sync_ingestion_enabled: bool,
    pub workspace_selection: SelectionStrategy,
    pub ranking: RankingStrategy,
    pub ranking_weights: HybridWeights,
}

impl From<&CacheConfig> for OrchestratorLimits {
    fn from(config: &CacheConfig) -> Self {
        let workspace_selection = match config.strategies.workspace_selection {
            crate::config::WorkspaceSelectionStrategy::AiDriven => SelectionStrategy::AiDriven,
            crate::config::WorkspaceSelectionStrategy::All => SelectionStrategy::All,
            crate::config::WorkspaceSelectionStrategy::Manual => SelectionStrategy::Manual,
        };
        let ranking = match config.strategies.ranking {
            crate::config::RankingStrategyOption::Relevance => RankingStrategy::Relevance,
            crate::config::RankingStrategyOption::Recency => RankingStrategy::Recency,
            crate::config::RankingStrategyOption::Hybrid => RankingStrategy::Hybrid,
        };
        Self {
            total_search_timeout: Duration::from_secs(config.timeouts.total_search_timeout_seconds),
            per_workspace_timeout: Duration::from_secs(config.timeouts.per_workspace_timeout_seconds),
            sync_ingestion_timeout: Duration::from_secs(config.timeouts.sync_ingestion_timeout_seconds),
            max_workspaces_per_search: config.resource_limits.max_workspaces_per_search,
            max_results: config.resource_limits.max_results,
            cache_ttl: Duration::from_secs(config.resource_limits.cache_ttl_seconds),
            external_search_trigger_quality: config.thresholds.external_search_trigger_quality,
            refinement_lower: 0.4,
            refinement_upper: 0.8,
            external_search_enabled: config.feature_toggles.external_search_enabled,
            ai_evaluation_enabled: config.feature_toggles.ai_evaluation_enabled,
            query_refinement_enabled: config.feature_toggles.query_refinement_enabled,
            knowledge_ingestion_enabled: config.feature_toggles.knowledge_ingestion_enabled,
            result_caching_enabled: config.feature_toggles.result_caching_enabled,
            sync_ingestion_enabled: config.feature_toggles.sync_ingestion_enabled,
            workspace_selection,
            ranking,
            ranking_weights: HybridWeights::default(),
        }
    }
}

/// Async enrichment job handoff (spec §4.7 step 9 "otherwise"): the core
/// only enqueues; the job runner itself is an external collaborator
/// (spec §1).
#[async_trait]
pub trait EnrichmentJobRunner: Send + Sync {
    async fn schedule(&self, candidates: Vec<IngestionCandidate>, trace_id: &str);
}

/// No-op runner used where async enrichment is wired up but no background
/// processor is attached yet.
pub struct NullEnrichmentJobRunner;

#[async_trait]
impl EnrichmentJobRunner for NullEnrichmentJobRunner {
    async fn schedule(&self, candidates: Vec<IngestionCandidate>, trace_id: &str) {
        emit_event(
            "async_enrichment_scheduled",
            Duration::from_millis(0),
            trace_id,
            &[("candidate_count", &candidates.len().to_string())],
        );
    }
}

/// `OrchestrationError` (spec §4.7 "Unhandled exception"): wraps the
/// offending query, stage, and elapsed time. Surfaced as `internal_error`.
#[derive(Debug, thiserror::Error)]
#[error("orchestration failed at stage {stage} after {elapsed_ms}ms: {source}")]
pub struct OrchestrationError {
    pub stage: String,
    pub elapsed_ms: u64,
    pub query: String,
    #[source]
    pub source: CacheError,
}

/// Drives the full pipeline (spec §4.7). Generic over the collaborator
/// traits so the caller can plug in real vector-index/LLM/provider
/// backends without this type depending on their concrete shapes.
pub struct Orchestrator<V: VectorIndex> {
    fanout: WorkspaceFanout<V>,
    cache: Arc<dyn ResultCache>,
    ai: Arc<dyn AiDecisionService>,
    providers: Arc<ProviderPool>,
    ingestion: Arc<IngestionPath>,
    async_runner: Arc<dyn EnrichmentJobRunner>,
    limits: OrchestratorLimits,
}

impl<V: VectorIndex> Orchestrator<V> {
    pub fn new(
        fanout: WorkspaceFanout<V>,
        cache: Arc<dyn ResultCache>,
        ai: Arc<dyn AiDecisionService>,
        providers: Arc<ProviderPool>,
        ingestion: Arc<IngestionPath>,
        async_runner: Arc<dyn EnrichmentJobRunner>,
        limits: OrchestratorLimits,
    ) -> Self {
        Self {
            fanout,
            cache,
            ai,
            providers,
            ingestion,
            async_runner,
            limits,
        }
    }

    /// Entry point for the whole pipeline. One `trace_id` is generated
    /// here and threaded through every stage event (spec §4.7: "Every
    /// stage operates under a single trace_id"). `total_search_timeout`
    /// itself only bounds the vector fan-out stage (see `run_pipeline`);
    /// every other stage reports its own real stage name on timeout.
    pub async fn search(
        &self,
        raw_query: &str,
        technology_hint: Option<&str>,
        ctx: &UserContext,
        request_shape: RequestShape,
    ) -> Result<SearchResponse, OrchestrationError> {
        let trace_id = new_trace_id();
        self.run_pipeline(raw_query, technology_hint, ctx, &request_shape, &trace_id)
            .await
    }

    async fn run_pipeline(
        &self,
        raw_query: &str,
        technology_hint: Option<&str>,
        ctx: &UserContext,
        request_shape: &RequestShape,
        trace_id: &str,
    ) -> Result<SearchResponse, OrchestrationError> {
        let pipeline_start = Instant::now();

        // Stage 1: Normalize.
        let query = self
            .stage_normalize(raw_query, technology_hint, trace_id)
            .map_err(|e| self.wrap(stage::NORMALIZE, pipeline_start, raw_query, e))?;

        // Stage 2: Cache lookup.
        if self.limits.result_caching_enabled {
            if let Some(mut cached) = self.cache.lookup(&query.fingerprint, trace_id).await {
                cached.cache_hit = true;
                cached.execution_time_ms = pipeline_start.elapsed().as_millis() as u64;
                emit_event(
                    stage::CACHE_LOOKUP,
                    pipeline_start.elapsed(),
                    trace_id,
                    &[("decision", "hit")],
                );
                return Ok(cached);
            }
        }

        // Stage 3: Workspace selection.
        let accessible = ctx.workspace_ids.clone();
        let workspaces = self
            .stage_workspace_selection(&query, ctx, &accessible, trace_id)
            .await;

        let mut external_forced_on = false;
        let mut vector_results = VectorSearchResults::empty();
        let mut evaluation = None;

        if matches!(request_shape.use_external_search, ExternalSearchMode::ForceOn) {
            // "skip stages 4-5 and go to 7" (spec §4.7 stage 3).
            external_forced_on = true;
            emit_event(
                stage::WORKSPACE_SELECTION,
                pipeline_start.elapsed(),
                trace_id,
                &[("decision", "skip_internal_force_on")],
            );
        } else {
            // Stage 4: Vector fan-out, bounded by total_search_timeout (spec
            // §4.7 stage 4: "a hard breach raises Timeout"), matching
            // `examples/original_source/src/search/orchestrator.py`'s
            // `asyncio.wait_for(self._execute_multi_workspace_search(...),
            // timeout=self.search_timeout)`. Only this call is bounded by
            // the total-search deadline, not the whole pipeline.
            vector_results = match tokio::time::timeout(
                self.limits.total_search_timeout,
                self.fanout
                    .search(&workspaces, &query.normalized_text, request_shape.limit.max(1), trace_id),
            )
            .await
            {
                Ok(results) => results,
                Err(_) => {
                    return Err(self.wrap(
                        stage::VECTOR_FANOUT,
                        pipeline_start,
                        raw_query,
                        CacheError::SearchTimeout {
                            stage: stage::VECTOR_FANOUT.to_string(),
                        },
                    ));
                }
            };

            // Stage 5: AI evaluation.
            if self.limits.ai_evaluation_enabled && !workspaces.is_empty() {
                evaluation = Some(self.ai.result_relevance(&query, &vector_results, &ctx.user_id, trace_id).await);
            }
        }

        // Stage 6: Conditional refinement (at most once).
        let mut refinement = None;
        let mut refined_query_text = None;
        if !external_forced_on && self.limits.query_refinement_enabled {
            if let Some(eval) = &evaluation {
                if eval.overall_quality >= self.limits.refinement_lower
                    && eval.overall_quality < self.limits.refinement_upper
                {
                    let decision = self.ai.query_refinement(&query, eval, &ctx.user_id, trace_id).await;
                    let retry_start = Instant::now();
                    let retried = self
                        .fanout
                        .search(&workspaces, &decision.refined_query, request_shape.limit.max(1), trace_id)
                        .await;
                    let re_eval = if self.limits.ai_evaluation_enabled {
                        Some(self.ai.result_relevance(&query, &retried, &ctx.user_id, trace_id).await)
                    } else {
                        None
                    };
                    emit_event(
                        stage::REFINEMENT,
                        retry_start.elapsed(),
                        trace_id,
                        &[("refined_query", &decision.refined_query)],
                    );
                    vector_results = retried;
                    refined_query_text = Some(decision.refined_query.clone());
                    if let Some(re) = re_eval {
                        evaluation = Some(re);
                    }
                    refinement = Some(decision);
                }
            }
        }

        // Stage 7: External-search decision + dispatch.
        let mut external_hits: Vec<SearchResult> = Vec::new();
        let mut external_search_used = false;
        if self.limits.external_search_enabled {
            let should_use_external = match request_shape.use_external_search {
                ExternalSearchMode::ForceOn => true,
                ExternalSearchMode::ForceOff => false,
                ExternalSearchMode::Auto => {
                    let decision = self
                        .ai
                        .external_search_decision(&query, evaluation.as_ref(), &ctx.user_id, trace_id)
                        .await;
                    decision.use_external
                }
            };

            if should_use_external {
                external_search_used = true;
                let ext_query = self.ai.external_search_query(&query, &ctx.user_id, trace_id).await;
                let selected = self
                    .ai
                    .provider_selection(&self.providers.records(), &ctx.user_id, trace_id)
                    .await;
                external_hits = self
                    .providers
                    .dispatch(
                        &ext_query.query,
                        request_shape.limit.max(1),
                        request_shape.provider_overrides.as_deref(),
                        Some(&selected.provider_id),
                        trace_id,
                    )
                    .await;
            }
            emit_event(
                stage::EXTERNAL_SEARCH,
                pipeline_start.elapsed(),
                trace_id,
                &[("used", &external_search_used.to_string()), ("hits", &external_hits.len().to_string())],
            );
        }

        let merged = ranker::rank_and_merge(
            vector_results.hits.clone(),
            external_hits.clone(),
            self.limits.ranking,
            self.limits.ranking_weights,
            request_shape.limit.min(self.limits.max_results),
            request_shape.offset,
        );

        // Stage 8: Answer extraction (response type "answer" only).
        let mut answer = None;
        if request_shape.response_type == ResponseType::Answer {
            let extraction_start = Instant::now();
            let top_k: Vec<SearchResult> = merged.iter().take(10).cloned().collect();
            let _extracted = self.ai.content_extraction(&top_k, &ctx.user_id, trace_id).await;
            let formatted = self
                .ai
                .response_format_selection(&query, &top_k, request_shape.response_type, &ctx.user_id, trace_id)
                .await;
            answer = formatted.synthesized_answer;
            emit_event(stage::ANSWER_EXTRACTION, extraction_start.elapsed(), trace_id, &[]);
        }

        // Stage 9: Conditional ingestion.
        let enrichment_triggered = evaluation
            .as_ref()
            .map(|e| e.needs_refinement || e.needs_external_search)
            .unwrap_or(false)
            && !external_hits.is_empty();

        let mut ingestion_status = None;
        if enrichment_triggered && self.limits.knowledge_ingestion_enabled {
            let documentation_candidates: Vec<IngestionCandidate> = external_hits
                .iter()
                .filter(|hit| hit.provider_tag() == Some("context7"))
                .map(result_to_candidate)
                .collect();

            if self.limits.sync_ingestion_enabled && !documentation_candidates.is_empty() {
                let ingest_fut = self.ingestion.ingest(
                    documentation_candidates,
                    IngestionKind::Synchronous,
                    "context7",
                    trace_id,
                );
                match tokio::time::timeout(self.limits.sync_ingestion_timeout, ingest_fut).await {
                    Ok(status) => ingestion_status = Some(status),
                    Err(_) => {
                        ingestion_status = Some(crate::types::IngestionStatus {
                            success: false,
                            ingested_count: 0,
                            duration_ms: self.limits.sync_ingestion_timeout.as_millis() as u64,
                            source_tag: "context7".to_string(),
                            kind: IngestionKind::Synchronous,
                            error: Some("sync ingestion timed out".to_string()),
                        });
                    }
                }
            } else {
                let all_external_candidates: Vec<IngestionCandidate> =
                    external_hits.iter().map(result_to_candidate).collect();
                self.async_runner.schedule(all_external_candidates, trace_id).await;
            }
        }

        // Stage 10 + 11: Cache store + emit response.
        let response = SearchResponse {
            query: query.clone(),
            results: merged,
            response_type: request_shape.response_type,
            answer,
            execution_time_ms: pipeline_start.elapsed().as_millis() as u64,
            cache_hit: false,
            external_search_used,
            enrichment_triggered,
            refinement_applied: refinement.is_some(),
            refined_query: refined_query_text,
            refinement,
            ingestion_status,
            evaluation,
        };

        if self.limits.result_caching_enabled {
            self.cache
                .store(query.fingerprint.clone(), response.clone(), self.limits.cache_ttl, trace_id)
                .await;
            emit_event(stage::CACHE_STORE, pipeline_start.elapsed(), trace_id, &[]);
        }

        Ok(response)
    }

    fn stage_normalize(
        &self,
        raw_query: &str,
        technology_hint: Option<&str>,
        trace_id: &str,
    ) -> CacheResult<NormalizedQuery> {
        let start = Instant::now();
        let result = crate::normalize::normalize(raw_query, technology_hint);
        emit_event(
            stage::NORMALIZE,
            start.elapsed(),
            trace_id,
            &[("ok", &result.is_ok().to_string())],
        );
        result
    }

    async fn stage_workspace_selection(
        &self,
        query: &NormalizedQuery,
        ctx: &UserContext,
        accessible: &[WorkspaceId],
        trace_id: &str,
    ) -> Vec<WorkspaceId> {
        let start = Instant::now();
        let suggested = if self.limits.workspace_selection == SelectionStrategy::AiDriven {
            self.ai
                .query_understanding(query, ctx, trace_id)
                .await
                .suggested_workspaces
        } else {
            Vec::new()
        };
        let selected = WorkspaceFanout::<V>::resolve_workspaces(
            self.limits.workspace_selection,
            &suggested,
            accessible,
            accessible,
            self.limits.max_workspaces_per_search,
        );
        emit_event(
            stage::WORKSPACE_SELECTION,
            start.elapsed(),
            trace_id,
            &[("count", &selected.len().to_string())],
        );
        selected
    }

    fn wrap(&self, stage: &str, start: Instant, query: &str, err: CacheError) -> OrchestrationError {
        OrchestrationError {
            stage: stage.to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            query: query.to_string(),
            source: err,
        }
    }
}

/// Per-request shape distilled from `SearchRequest` (spec §3); kept
/// separate from admission/queue concerns so the orchestrator itself
/// never depends on `QueueEntry`.
#[derive(Debug, Clone)]
pub struct RequestShape {
    pub response_type: ResponseType,
    pub limit: u32,
    pub offset: u32,
    pub use_external_search: ExternalSearchMode,
    pub provider_overrides: Option<Vec<String>>,
}

impl From<&SearchRequest> for RequestShape {
    fn from(request: &SearchRequest) -> Self {
        Self {
            response_type: request.response_type,
            limit: request.limit,
            offset: request.offset,
            use_external_search: request.use_external_search,
            provider_overrides: request.provider_overrides.clone(),
        }
    }
}

fn result_to_candidate(hit: &SearchResult) -> IngestionCandidate {
    IngestionCandidate {
        title: hit.title.clone(),
        content: hit.content.clone().unwrap_or_else(|| hit.snippet.clone()),
        source_url: hit.source_url.clone(),
        technology: hit.technology.clone(),
        version: None,
        source_tag: hit.provider_tag().unwrap_or("external_search").to_string(),
    }
}

/// Classifies an ingestion candidate's document type ahead of time, purely
/// for observability labeling (spec §4.8 step 1 is otherwise owned by
/// `ingestion::classify_document`).
pub fn preview_document_type(candidate: &IngestionCandidate) -> DocumentType {
    crate::ingestion::classify_document(&candidate.title, &candidate.content)
}

/// Used by admin/monitoring surfaces to look up a cached response's
/// content ids without re-running the pipeline.
pub fn response_content_ids(response: &SearchResponse) -> Vec<ContentId> {
    response.results.iter().map(|r| r.content_id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiDecisionService, LlmClient, LlmBackedDecisionService, DecisionRegistry};
    use crate::cache::InMemoryResultCache;
    use crate::ingestion::IngestionConfig;
    use crate::providers::ProviderPoolConfig;
    use crate::types::ContentType;

    struct EmptyVectorIndex;
    #[async_trait]
    impl VectorIndex for EmptyVectorIndex {
        async fn query(&self, _workspace_id: &WorkspaceId, _text: &str, _limit: u32) -> Result<Vec<SearchResult>, String> {
            Ok(vec![])
        }
    }

    struct OneHitVectorIndex;
    #[async_trait]
    impl VectorIndex for OneHitVectorIndex {
        async fn query(&self, workspace_id: &WorkspaceId, _text: &str, _limit: u32) -> Result<Vec<SearchResult>, String> {
            Ok(vec![SearchResult {
                content_id: "doc-1".into(),
                title: "Async Await".into(),
                snippet: "snippet".into(),
                content: None,
                source_url: "https://example.com/async".into(),
                workspace_id: workspace_id.clone(),
                technology: Some("python".into()),
                content_type: ContentType::Guide,
                relevance_score: 0.9,
                recency_score: 0.8,
                quality_score: 0.8,
                metadata: HashMap::new(),
            }])
        }
    }

    struct SlowVectorIndex;
    #[async_trait]
    impl VectorIndex for SlowVectorIndex {
        async fn query(&self, _workspace_id: &WorkspaceId, _text: &str, _limit: u32) -> Result<Vec<SearchResult>, String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(vec![])
        }
    }

    struct FailingLlm;
    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(&self, _prompt: &str, _temperature: f64, _max_tokens: u32) -> Result<String, String> {
            Err("no llm configured in test".to_string())
        }
    }

    fn ctx() -> UserContext {
        let mut c = UserContext::new("user-1");
        c.workspace_ids = vec!["python-docs".to_string(), "python-tutorials".to_string()];
        c
    }

    fn request_shape() -> RequestShape {
        RequestShape {
            response_type: ResponseType::Raw,
            limit: 10,
            offset: 0,
            use_external_search: ExternalSearchMode::Auto,
            provider_overrides: None,
        }
    }

    fn build_orchestrator<V: VectorIndex>(index: V) -> Orchestrator<V> {
        build_orchestrator_with_limits(index, |_| {})
    }

    fn build_orchestrator_with_limits<V: VectorIndex>(
        index: V,
        adjust: impl FnOnce(&mut OrchestratorLimits),
    ) -> Orchestrator<V> {
        let fanout = WorkspaceFanout::new(index);
        let cache: Arc<dyn ResultCache> = Arc::new(InMemoryResultCache::new());
        let ai: Arc<dyn AiDecisionService> =
            Arc::new(LlmBackedDecisionService::new(FailingLlm, DecisionRegistry::new()));
        let providers = Arc::new(ProviderPool::new(ProviderPoolConfig::default()));
        let ingestion = Arc::new(IngestionPath::new(IngestionConfig::default()));
        let mut config = CacheConfig::default();
        config.feature_toggles.query_refinement_enabled = true;
        let mut limits = OrchestratorLimits::from(&config);
        adjust(&mut limits);
        Orchestrator::new(
            fanout,
            cache,
            ai,
            providers,
            ingestion,
            Arc::new(NullEnrichmentJobRunner),
            limits,
        )
    }

    #[tokio::test]
    async fn zero_workspaces_yields_empty_results_and_runs_external_decision() {
        let orchestrator = build_orchestrator(EmptyVectorIndex);
        let mut context = ctx();
        context.workspace_ids.clear();
        let response = orchestrator
            .search("python asyncio tasks", None, &context, request_shape())
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert!(!response.cache_hit);
    }

    #[tokio::test]
    async fn internal_only_happy_path_ranks_and_caches() {
        let orchestrator = build_orchestrator(OneHitVectorIndex);
        let response = orchestrator
            .search("python async await", None, &ctx(), request_shape())
            .await
            .unwrap();
        assert!(!response.cache_hit);
        assert!(!response.results.is_empty());
    }

    #[tokio::test]
    async fn second_identical_request_is_a_cache_hit() {
        let orchestrator = build_orchestrator(OneHitVectorIndex);
        let first = orchestrator
            .search("python async await", None, &ctx(), request_shape())
            .await
            .unwrap();
        assert!(!first.cache_hit);
        let second = orchestrator
            .search("python async await", None, &ctx(), request_shape())
            .await
            .unwrap();
        assert!(second.cache_hit);
    }

    #[tokio::test]
    async fn invalid_query_fails_at_normalize_stage() {
        let orchestrator = build_orchestrator(EmptyVectorIndex);
        let err = orchestrator.search("a", None, &ctx(), request_shape()).await.unwrap_err();
        assert_eq!(err.stage, stage::NORMALIZE);
    }

    #[tokio::test]
    async fn vector_fanout_breach_reports_its_own_stage() {
        let orchestrator = build_orchestrator_with_limits(SlowVectorIndex, |limits| {
            limits.total_search_timeout = Duration::from_millis(10);
        });
        let err = orchestrator
            .search("python async await", None, &ctx(), request_shape())
            .await
            .unwrap_err();
        assert_eq!(err.stage, stage::VECTOR_FANOUT);
    }

    #[tokio::test]
    async fn force_on_external_search_skips_internal_stages() {
        let orchestrator = build_orchestrator(OneHitVectorIndex);
        let mut shape = request_shape();
        shape.use_external_search = ExternalSearchMode::ForceOn;
        let response = orchestrator
            .search("python async await", None, &ctx(), shape)
            .await
            .unwrap();
        assert!(response.external_search_used);
    }
}
