//! Result Cache (C1), spec §4.1.

pub mod circuit;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::observability::emit_event;
use crate::types::{CacheEntry, Fingerprint, SearchResponse};
use circuit::CircuitBreaker;

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(500);

/// `lookup`/`store` never raise: cache faults degrade to miss/no-op per
/// spec §7 (Cache fault). The circuit breaker is reported via
/// observability events, not via `Result`.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn lookup(&self, fingerprint: &Fingerprint, trace_id: &str) -> Option<SearchResponse>;
    async fn store(&self, fingerprint: Fingerprint, response: SearchResponse, ttl: Duration, trace_id: &str);
}

pub struct InMemoryResultCache {
    entries: RwLock<HashMap<Fingerprint, CacheEntry>>,
    breaker: std::sync::Mutex<CircuitBreaker>,
    operation_timeout: Duration,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_OPERATION_TIMEOUT)
    }

    pub fn with_timeout(operation_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            breaker: std::sync::Mutex::new(CircuitBreaker::default()),
            operation_timeout,
        }
    }

    fn breaker_allows(&self) -> bool {
        self.breaker.lock().unwrap().allow(Instant::now())
    }

    fn record_success(&self) {
        self.breaker.lock().unwrap().on_success();
    }

    fn record_failure(&self) {
        self.breaker.lock().unwrap().on_failure(Instant::now());
    }
}

impl Default for InMemoryResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn lookup(&self, fingerprint: &Fingerprint, trace_id: &str) -> Option<SearchResponse> {
        let start = Instant::now();
        if !self.breaker_allows() {
            emit_event("cache_lookup", start.elapsed(), trace_id, &[("decision", "breaker_open")]);
            return None;
        }

        let op = async {
            let guard = self.entries.read().await;
            guard.get(fingerprint).cloned()
        };

        let outcome = tokio::time::timeout(self.operation_timeout, op).await;
        match outcome {
            Ok(Some(entry)) if !entry.is_expired(Utc::now()) => {
                self.record_success();
                emit_event("cache_lookup", start.elapsed(), trace_id, &[("decision", "hit")]);
                Some(entry.response)
            }
            Ok(_) => {
                self.record_success();
                emit_event("cache_lookup", start.elapsed(), trace_id, &[("decision", "miss")]);
                None
            }
            Err(_) => {
                self.record_failure();
                emit_event("cache_lookup", start.elapsed(), trace_id, &[("decision", "timeout")]);
                None
            }
        }
    }

    async fn store(&self, fingerprint: Fingerprint, response: SearchResponse, ttl: Duration, trace_id: &str) {
        let start = Instant::now();
        if !self.breaker_allows() {
            emit_event("cache_store", start.elapsed(), trace_id, &[("decision", "breaker_open")]);
            return;
        }
        if ttl.is_zero() {
            return;
        }

        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            response,
            expires_at,
        };

        let op = async {
            let mut guard = self.entries.write().await;
            guard.insert(fingerprint, entry);
        };

        match tokio::time::timeout(self.operation_timeout, op).await {
            Ok(()) => {
                self.record_success();
                emit_event("cache_store", start.elapsed(), trace_id, &[("decision", "stored")]);
            }
            Err(_) => {
                self.record_failure();
                emit_event("cache_store", start.elapsed(), trace_id, &[("decision", "timeout")]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NormalizedQuery, ResponseType};

    fn sample_response() -> SearchResponse {
        SearchResponse {
            query: NormalizedQuery {
                original_text: "react hooks".into(),
                normalized_text: "react hooks".into(),
                fingerprint: "fp".into(),
                technology_hint: Some("react".into()),
                tokens: vec!["react".into(), "hooks".into()],
            },
            results: vec![],
            response_type: ResponseType::Raw,
            answer: None,
            execution_time_ms: 10,
            cache_hit: false,
            external_search_used: false,
            enrichment_triggered: false,
            refinement_applied: false,
            refined_query: None,
            refinement: None,
            ingestion_status: None,
            evaluation: None,
        }
    }

    #[tokio::test]
    async fn round_trips_a_stored_response() {
        let cache = InMemoryResultCache::new();
        let fp = "fp".to_string();
        cache
            .store(fp.clone(), sample_response(), Duration::from_secs(60), "trace-1")
            .await;

        let hit = cache.lookup(&fp, "trace-1").await;
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().query.fingerprint, "fp");
    }

    #[tokio::test]
    async fn zero_ttl_never_stores() {
        let cache = InMemoryResultCache::new();
        let fp = "fp".to_string();
        cache
            .store(fp.clone(), sample_response(), Duration::from_secs(0), "trace-1")
            .await;
        assert!(cache.lookup(&fp, "trace-1").await.is_none());
    }

    #[tokio::test]
    async fn miss_on_unknown_fingerprint() {
        let cache = InMemoryResultCache::new();
        assert!(cache.lookup(&"nope".to_string(), "trace-1").await.is_none());
    }
}
