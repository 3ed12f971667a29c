//! External Provider Pool (C7), spec §4.6.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::circuit::CircuitBreaker;
use crate::observability::emit_event;
use crate::types::{CircuitState, ProviderId, ProviderRecord, SearchResult};

const DEFAULT_HEDGED_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_EXTERNAL_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_CONCURRENT_PROVIDERS: usize = 3;

/// One external search backend (spec §1 Non-goals: the HTTP client itself
/// is an external collaborator; this trait is the seam).
#[async_trait]
pub trait ExternalProvider: Send + Sync {
    fn provider_id(&self) -> &ProviderId;
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchResult>, String>;
}

pub struct ProviderPoolConfig {
    pub hedged_delay: Duration,
    pub external_timeout: Duration,
    pub max_concurrent_providers: usize,
    pub hedging_enabled: bool,
}

impl Default for ProviderPoolConfig {
    fn default() -> Self {
        Self {
            hedged_delay: DEFAULT_HEDGED_DELAY,
            external_timeout: DEFAULT_EXTERNAL_TIMEOUT,
            max_concurrent_providers: DEFAULT_MAX_CONCURRENT_PROVIDERS,
            hedging_enabled: true,
        }
    }
}

struct ProviderEntry {
    provider: Arc<dyn ExternalProvider>,
    record: ProviderRecord,
    breaker: CircuitBreaker,
}

/// Holds ProviderRecords ordered by priority, each with its own circuit
/// breaker and rolling health window (spec §4.6).
pub struct ProviderPool {
    config: ProviderPoolConfig,
    entries: std::sync::Mutex<Vec<ProviderEntry>>,
}

impl ProviderPool {
    pub fn new(config: ProviderPoolConfig) -> Self {
        Self {
            config,
            entries: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, provider: Arc<dyn ExternalProvider>, record: ProviderRecord) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(ProviderEntry {
            provider,
            record,
            breaker: CircuitBreaker::default(),
        });
        entries.sort_by_key(|e| e.record.priority);
    }

    fn priority_order(&self) -> Vec<usize> {
        let entries = self.entries.lock().unwrap();
        let mut idx: Vec<usize> = (0..entries.len()).collect();
        idx.sort_by_key(|&i| entries[i].record.priority);
        idx
    }

    fn breaker_allows(&self, index: usize) -> bool {
        let mut entries = self.entries.lock().unwrap();
        entries[index].record.enabled && entries[index].breaker.allow(Instant::now())
    }

    fn record_outcome(&self, index: usize, ok: bool) {
        let mut entries = self.entries.lock().unwrap();
        if ok {
            entries[index].breaker.on_success();
        } else {
            entries[index].breaker.on_failure(Instant::now());
        }
        entries[index].record.recent_outcomes.push(ok);
        if entries[index].record.recent_outcomes.len() > 100 {
            entries[index].record.recent_outcomes.remove(0);
        }
        entries[index].record.circuit_state = entries[index].breaker.state();
    }

    async fn dispatch_one(&self, index: usize, query: &str, limit: u32) -> Result<(ProviderId, Vec<SearchResult>), String> {
        if !self.breaker_allows(index) {
            let id = self.entries.lock().unwrap()[index].record.provider_id.clone();
            return Err(format!("provider {} circuit open", id));
        }

        let (provider_id, provider, fut_timeout) = {
            let entries = self.entries.lock().unwrap();
            (
                entries[index].record.provider_id.clone(),
                entries[index].provider.clone(),
                self.config.external_timeout,
            )
        };

        // Clone the Arc out of the lock so the HTTP call itself never holds
        // it across a suspension (spec §5: "no stage may hold a shared lock
        // across a suspension").
        let result = tokio::time::timeout(fut_timeout, provider.search(query, limit)).await;

        match result {
            Ok(Ok(hits)) => {
                self.record_outcome(index, true);
                Ok((provider_id, hits))
            }
            Ok(Err(e)) => {
                self.record_outcome(index, false);
                Err(e)
            }
            Err(_) => {
                self.record_outcome(index, false);
                Err(format!("provider {} timed out", provider_id))
            }
        }
    }

    /// Dispatches an external query: uses the explicit provider list if
    /// supplied, otherwise the given `selected` provider (from
    /// ProviderSelection or the pool's own priority order on fallback).
    /// Hedges after `hedged_delay` by firing the next-priority provider;
    /// first success wins (spec §4.6).
    pub async fn dispatch(
        &self,
        query: &str,
        limit: u32,
        explicit: Option<&[ProviderId]>,
        selected: Option<&ProviderId>,
        trace_id: &str,
    ) -> Vec<SearchResult> {
        let start = Instant::now();
        let order = self.resolve_order(explicit, selected);
        let order: Vec<usize> = order.into_iter().take(self.config.max_concurrent_providers).collect();

        if order.is_empty() {
            emit_event("provider_dispatch", start.elapsed(), trace_id, &[("outcome", "no_providers")]);
            return Vec::new();
        }

        let primary = order[0];
        let primary_fut = self.dispatch_one(primary, query, limit);

        let result = if self.config.hedging_enabled && order.len() > 1 {
            let hedge = order[1];
            tokio::select! {
                biased;
                primary_result = primary_fut => primary_result,
                _ = tokio::time::sleep(self.config.hedged_delay) => {
                    let hedge_fut = self.dispatch_one(hedge, query, limit);
                    tokio::select! {
                        r = hedge_fut => r,
                    }
                }
            }
        } else {
            primary_fut.await
        };

        match result {
            Ok((provider_id, mut hits)) => {
                for hit in &mut hits {
                    hit.tag_external(&provider_id);
                    if hit.relevance_score == 0.0 {
                        hit.relevance_score = 0.7;
                    }
                }
                emit_event(
                    "provider_dispatch",
                    start.elapsed(),
                    trace_id,
                    &[("outcome", "ok"), ("provider", &provider_id), ("hits", &hits.len().to_string())],
                );
                hits
            }
            Err(_) => {
                emit_event("provider_dispatch", start.elapsed(), trace_id, &[("outcome", "all_failed")]);
                Vec::new()
            }
        }
    }

    fn resolve_order(&self, explicit: Option<&[ProviderId]>, selected: Option<&ProviderId>) -> Vec<usize> {
        let entries = self.entries.lock().unwrap();
        if let Some(ids) = explicit {
            return ids
                .iter()
                .filter_map(|id| entries.iter().position(|e| &e.record.provider_id == id))
                .collect();
        }
        if let Some(id) = selected {
            if let Some(pos) = entries.iter().position(|e| &e.record.provider_id == id) {
                let mut order = vec![pos];
                order.extend((0..entries.len()).filter(|&i| i != pos));
                return order;
            }
        }
        drop(entries);
        self.priority_order()
    }

    pub fn records(&self) -> Vec<ProviderRecord> {
        self.entries.lock().unwrap().iter().map(|e| e.record.clone()).collect()
    }

    pub fn health_snapshot(&self) -> HashMap<ProviderId, CircuitState> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.record.provider_id.clone(), e.record.circuit_state))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CostSpec, HealthState, RateLimitSpec};

    struct AlwaysOk(ProviderId);
    #[async_trait]
    impl ExternalProvider for AlwaysOk {
        fn provider_id(&self) -> &ProviderId {
            &self.0
        }
        async fn search(&self, _query: &str, _limit: u32) -> Result<Vec<SearchResult>, String> {
            Ok(vec![crate::types::SearchResult {
                content_id: "ext-1".into(),
                title: "t".into(),
                snippet: "s".into(),
                content: None,
                source_url: "https://example.com".into(),
                workspace_id: "ws".into(),
                technology: None,
                content_type: crate::types::ContentType::Blog,
                relevance_score: 0.0,
                recency_score: 0.5,
                quality_score: 0.5,
                metadata: HashMap::new(),
            }])
        }
    }

    struct AlwaysFail(ProviderId);
    #[async_trait]
    impl ExternalProvider for AlwaysFail {
        fn provider_id(&self) -> &ProviderId {
            &self.0
        }
        async fn search(&self, _query: &str, _limit: u32) -> Result<Vec<SearchResult>, String> {
            Err("down".to_string())
        }
    }

    fn record(id: &str, priority: u32) -> ProviderRecord {
        ProviderRecord {
            provider_id: id.to_string(),
            type_tag: "web".into(),
            enabled: true,
            priority,
            config: HashMap::new(),
            rate_limit: RateLimitSpec {
                requests_per_minute: 60,
                burst_allowance: 1.2,
            },
            cost: CostSpec::default(),
            health: HealthState::Healthy,
            circuit_state: CircuitState::Closed,
            recent_outcomes: Vec::new(),
            rolling_latency_ms: Vec::new(),
        }
    }

    #[tokio::test]
    async fn dispatch_tags_external_results_with_default_relevance() {
        let pool = ProviderPool::new(ProviderPoolConfig::default());
        pool.register(Arc::new(AlwaysOk("brave".to_string())), record("brave", 1));
        let hits = pool.dispatch("python async", 10, None, None, "trace-1").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].provider_tag(), Some("brave"));
        assert_eq!(hits[0].relevance_score, 0.7);
    }

    #[tokio::test]
    async fn all_providers_failing_yields_empty() {
        let pool = ProviderPool::new(ProviderPoolConfig::default());
        pool.register(Arc::new(AlwaysFail("a".to_string())), record("a", 1));
        pool.register(Arc::new(AlwaysFail("b".to_string())), record("b", 2));
        let hits = pool.dispatch("q", 10, None, None, "trace-1").await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn explicit_provider_list_is_honored_in_order() {
        let pool = ProviderPool::new(ProviderPoolConfig::default());
        pool.register(Arc::new(AlwaysFail("a".to_string())), record("a", 1));
        pool.register(Arc::new(AlwaysOk("b".to_string())), record("b", 2));
        let hits = pool
            .dispatch("q", 10, Some(&["b".to_string()]), None, "trace-1")
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].provider_tag(), Some("b"));
    }
}
