//! doccache-core: retrieval-augmented documentation cache.
//!
//! A pipeline engine sitting in front of a vector index and an external
//! search fan-out: normalizes incoming queries, checks a TTL-bounded result
//! cache, fans a query out across workspaces, asks an AI decision service
//! whether results are good enough, optionally reaches out to external
//! providers, ranks and merges everything, and feeds anything worth keeping
//! back into the TTL-aware ingestion path.
//!
//! # Architecture
//!
//! - Result Cache (C1): TTL-bounded lookup/store behind a circuit breaker
//! - Admission Queue (C2): priority-ordered intake with rate limiting
//! - Query Normalizer (C3): validation, canonicalization, fingerprinting
//! - AI Decision Service (C4): ten typed decisions, each with a fallback
//! - Workspace Fan-out (C5): parallel per-workspace vector queries
//! - Result Ranker/Merger (C6): dedup, scoring, pagination
//! - External Provider Pool (C7): hedged external search dispatch
//! - TTL-aware Ingestion Path (C8): classify, score, persist, expire
//! - Orchestrator (C9): the pipeline tying the above together
//! - Observability Spine (C10): single-line stage events per trace id
//!
//! # Core Principles
//!
//! - Normalize once, fingerprint everywhere
//! - Cache faults degrade to miss, never to error
//! - Every AI decision has a deterministic fallback
//! - One workspace's timeout never cancels another's query
//! - Admission enforces rate limits before depth, every time

pub mod admin;
pub mod ai;
pub mod cache;
pub mod config;
pub mod ingestion;
pub mod mcp;
pub mod normalize;
pub mod observability;
pub mod orchestrator;
pub mod providers;
pub mod queue;
pub mod ranker;
pub mod types;
pub mod workspace;

pub use config::CacheConfig;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use ai::{AiDecisionService, DecisionRegistry, LlmBackedDecisionService, LlmClient};
use cache::{InMemoryResultCache, ResultCache};
use ingestion::{IngestionConfig, IngestionPath};
use orchestrator::{EnrichmentJobRunner, Orchestrator, OrchestratorLimits, OrchestrationError, RequestShape};
use providers::{ProviderPool, ProviderPoolConfig};
use queue::ratelimit::RateLimitConfig;
use queue::{AdmissionQueue, InProcessQueue, QueueConfig, ReorderStrategy};
use types::{Priority, SearchRequest};
use workspace::{VectorIndex, WorkspaceFanout};

/// Bundles every collaborator the pipeline needs, wired from one
/// `CacheConfig` snapshot. Generic over the vector index backend so the
/// core never depends on a concrete similarity engine (spec §1 Non-goals).
pub struct CacheRuntime<V: VectorIndex> {
    pub config: Arc<RwLock<CacheConfig>>,
    pub queue: Arc<dyn AdmissionQueue>,
    pub cache: Arc<dyn ResultCache>,
    pub providers: Arc<ProviderPool>,
    pub ingestion: Arc<IngestionPath>,
    pub orchestrator: Arc<Orchestrator<V>>,
}

impl<V: VectorIndex + 'static> CacheRuntime<V> {
    /// Constructs every sub-component from `config`, then wraps them behind
    /// the pipeline the orchestrator drives.
    pub async fn new<L: LlmClient + Send + Sync + 'static>(
        config: CacheConfig,
        vector_index: V,
        llm: L,
        async_runner: Arc<dyn EnrichmentJobRunner>,
    ) -> CacheResult<Self> {
        tracing::info!("initializing doccache runtime v{}", env!("CARGO_PKG_VERSION"));

        let queue_config = QueueConfig {
            max_queue_depth: config.queue.max_queue_depth,
            max_concurrent_searches: config.queue.max_concurrent_searches,
            queue_timeout: Duration::from_secs(config.queue.queue_timeout_seconds),
            high_water_mark: 0.8,
            priority_queue_enabled: config.queue.priority_queue_enabled,
            reorder_strategy: ReorderStrategy::PriorityThenAge,
        };
        let rate_limit_config = RateLimitConfig {
            per_user_rpm: config.rate_limits.per_user_requests_per_minute,
            per_workspace_rpm: config.rate_limits.per_workspace_requests_per_minute,
            global_rpm: config.rate_limits.global_requests_per_minute,
            window: Duration::from_secs(config.rate_limits.window_seconds),
            burst_allowance: config.rate_limits.burst_allowance,
        };
        let queue: Arc<dyn AdmissionQueue> =
            Arc::new(InProcessQueue::new(queue_config, rate_limit_config));

        let cache: Arc<dyn ResultCache> = Arc::new(InMemoryResultCache::with_timeout(Duration::from_millis(
            config.timeouts.cache_operation_timeout_ms,
        )));

        let provider_pool_config = ProviderPoolConfig {
            hedged_delay: Duration::from_millis(200),
            external_timeout: Duration::from_secs(config.timeouts.external_search_timeout_seconds),
            max_concurrent_providers: 3,
            hedging_enabled: true,
        };
        let providers = Arc::new(ProviderPool::new(provider_pool_config));

        let ingestion = Arc::new(IngestionPath::new(IngestionConfig::default()));

        let ai: Arc<dyn AiDecisionService> =
            Arc::new(LlmBackedDecisionService::new(llm, DecisionRegistry::new()));

        let fanout = WorkspaceFanout::with_limits(
            vector_index,
            Duration::from_secs(config.timeouts.per_workspace_timeout_seconds),
            config.resource_limits.max_workspaces_per_search,
        );

        let limits = OrchestratorLimits::from(&config);
        let orchestrator = Arc::new(Orchestrator::new(
            fanout,
            cache.clone(),
            ai,
            providers.clone(),
            ingestion.clone(),
            async_runner,
            limits,
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            queue,
            cache,
            providers,
            ingestion,
            orchestrator,
        })
    }

    /// Re-reads config from disk and swaps the live snapshot (spec §6: "all
    /// options are hot-reloadable"). Values baked into sub-components at
    /// construction (queue depth, timeouts, rate-limit buckets) take effect
    /// on the next restart; feature toggles and thresholds read this
    /// snapshot live.
    pub async fn reload(&self, path: &std::path::Path) -> CacheResult<()> {
        let fresh = CacheConfig::load(path)?;
        *self.config.write().await = fresh;
        Ok(())
    }

    /// Runs one query through the full pipeline (spec §4.7), admitting it
    /// through the rate limiter and priority queue (C2) first. The
    /// component table (spec §2) drives the orchestrator as
    /// "C3 -> C2 -> C1 -> ...", i.e. admission gates every call before the
    /// orchestrator's own cache-lookup-onward stages run. Defaults the
    /// admission priority to `Priority::Normal`; use
    /// [`CacheRuntime::search_with_priority`] to submit at another priority.
    pub async fn search(
        &self,
        raw_query: &str,
        technology_hint: Option<&str>,
        ctx: &UserContext,
        request_shape: RequestShape,
    ) -> Result<SearchResponse, OrchestrationError> {
        self.search_with_priority(raw_query, technology_hint, ctx, request_shape, Priority::Normal)
            .await
    }

    /// Same as [`CacheRuntime::search`] but lets the caller pick the
    /// admission priority bucket directly (spec §3 `SearchRequest.priority_score`,
    /// spec §4.2 `Priority`).
    pub async fn search_with_priority(
        &self,
        raw_query: &str,
        technology_hint: Option<&str>,
        ctx: &UserContext,
        request_shape: RequestShape,
        priority: Priority,
    ) -> Result<SearchResponse, OrchestrationError> {
        if let Err(err) = self.admit(raw_query, technology_hint, ctx, &request_shape, priority).await {
            return Err(OrchestrationError {
                stage: "admission".to_string(),
                elapsed_ms: 0,
                query: raw_query.to_string(),
                source: err,
            });
        }
        self.orchestrator.search(raw_query, technology_hint, ctx, request_shape).await
    }

    /// Admission check (spec §4.2): normalizes just enough to build a
    /// `SearchRequest`, then runs it through the rate limiter and priority
    /// queue. The orchestrator repeats normalization as its own first stage
    /// (spec §8: normalization is idempotent, so re-running it is cheap and
    /// keeps per-stage error reporting inside the orchestrator's own
    /// `OrchestrationError` shape); this call only needs the fingerprint far
    /// enough to admit the request. On success the entry is dequeued
    /// immediately: this runtime processes search calls synchronously
    /// rather than deferring to a background worker pool, so the queue here
    /// only ever serves as admission control (rate limiting + depth/backlog
    /// bounds), not as a scheduling buffer.
    async fn admit(
        &self,
        raw_query: &str,
        technology_hint: Option<&str>,
        ctx: &UserContext,
        request_shape: &RequestShape,
        priority: Priority,
    ) -> CacheResult<()> {
        let query = crate::normalize::normalize(raw_query, technology_hint)?;
        let request = SearchRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            query,
            user_context: ctx.clone(),
            priority_score: priority.to_score(),
            response_type: request_shape.response_type,
            provider_overrides: request_shape.provider_overrides.clone(),
            use_external_search: request_shape.use_external_search,
            limit: request_shape.limit,
            offset: request_shape.offset,
            created_at: chrono::Utc::now(),
            queued_at: None,
        };
        self.queue.enqueue(request, priority).await?;
        self.queue.dequeue().await;
        Ok(())
    }
}

/// Initialize logging with default settings.
pub fn init_logging() {
    init_logging_with_level("info");
}

/// Initialize logging with the specified level, honoring `RUST_LOG` when
/// set (spec §10 "Logging").
pub fn init_logging_with_level(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("doccache_core={},hyper=warn,tower_http=warn", level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai::NullLlmClient;
    use orchestrator::NullEnrichmentJobRunner;
    use workspace::NullVectorIndex;

    fn shape() -> RequestShape {
        RequestShape {
            response_type: ResponseType::Raw,
            limit: 10,
            offset: 0,
            use_external_search: ExternalSearchMode::Auto,
            provider_overrides: None,
        }
    }

    #[tokio::test]
    async fn search_runs_end_to_end_with_inert_backends() {
        let runtime = CacheRuntime::new(
            CacheConfig::default(),
            NullVectorIndex,
            NullLlmClient,
            Arc::new(NullEnrichmentJobRunner),
        )
        .await
        .unwrap();

        let ctx = UserContext::new("user-1");
        let response = runtime
            .search("python async await", None, &ctx, shape())
            .await
            .unwrap();
        assert!(!response.cache_hit);
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn admission_rejects_once_queue_depth_is_exhausted() {
        let mut config = CacheConfig::default();
        config.queue.max_queue_depth = 0;
        let runtime = CacheRuntime::new(
            config,
            NullVectorIndex,
            NullLlmClient,
            Arc::new(NullEnrichmentJobRunner),
        )
        .await
        .unwrap();

        let ctx = UserContext::new("user-1");
        let err = runtime
            .search("python async await", None, &ctx, shape())
            .await
            .unwrap_err();
        assert_eq!(err.stage, "admission");
        assert!(matches!(err.source, CacheError::QueueOverflow));
    }

    #[tokio::test]
    async fn admission_rejects_once_rate_limit_is_exhausted() {
        let mut config = CacheConfig::default();
        config.rate_limits.per_user_requests_per_minute = 1;
        config.rate_limits.burst_allowance = 1.0;
        let runtime = CacheRuntime::new(
            config,
            NullVectorIndex,
            NullLlmClient,
            Arc::new(NullEnrichmentJobRunner),
        )
        .await
        .unwrap();

        let ctx = UserContext::new("user-1");
        runtime.search("first query", None, &ctx, shape()).await.unwrap();
        let err = runtime
            .search("second query", None, &ctx, shape())
            .await
            .unwrap_err();
        assert_eq!(err.stage, "admission");
        assert!(matches!(err.source, CacheError::RateLimitExceeded { .. }));
    }
}
