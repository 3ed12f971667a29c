//! Rate Limiter + Admission Queue (C2), spec §4.2, §11 (surface grounded
//! in `examples/original_source/src/mcp/core/queue.py` `QueueManager`/
//! `PriorityQueue` ABCs).

pub mod ratelimit;

use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::types::{CacheError, CacheResult, Priority, QueueEntry, QueueStats, SearchRequest};
use ratelimit::{LimitDenied, RateLimitConfig, RateLimiter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueHealth {
    Healthy,
    Degraded,
    Overloaded,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderStrategy {
    PriorityThenAge,
    FairShare,
    DeadlineFirst,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_queue_depth: usize,
    pub max_concurrent_searches: usize,
    pub queue_timeout: Duration,
    pub high_water_mark: f64,
    pub priority_queue_enabled: bool,
    pub reorder_strategy: ReorderStrategy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: 100,
            max_concurrent_searches: 20,
            queue_timeout: Duration::from_secs(300),
            high_water_mark: 0.8,
            priority_queue_enabled: true,
            reorder_strategy: ReorderStrategy::PriorityThenAge,
        }
    }
}

/// Orders by (priority rank ascending, enqueue time ascending): critical
/// first, then FIFO within a priority (spec §8: admission order is
/// (priority, enqueue time) lexicographic).
#[derive(Debug, Clone)]
struct HeapItem {
    priority_rank: u8,
    enqueue_seq: u64,
    entry: QueueEntry,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority_rank == other.priority_rank && self.enqueue_seq == other.enqueue_seq
    }
}
impl Eq for HeapItem {}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so lower rank/earlier seq sorts first.
        other
            .priority_rank
            .cmp(&self.priority_rank)
            .then_with(|| other.enqueue_seq.cmp(&self.enqueue_seq))
    }
}

/// QueueManager surface (spec §4.2, queue.py `QueueManager`).
#[async_trait]
pub trait AdmissionQueue: Send + Sync {
    async fn enqueue(&self, request: SearchRequest, priority: Priority) -> CacheResult<QueueEntry>;
    async fn dequeue(&self) -> Option<QueueEntry>;
    async fn depth(&self) -> usize;
    async fn stats(&self) -> QueueStats;
    async fn health(&self) -> QueueHealth;
    async fn pause(&self);
    async fn resume(&self);
    async fn clear(&self, priority: Option<Priority>) -> usize;
    async fn position(&self, queue_id: &str) -> Option<usize>;
    async fn expire_old(&self) -> usize;
}

struct Inner {
    heap: BinaryHeap<HeapItem>,
    seq: u64,
    paused: bool,
    overflow_count: u64,
    rate_limit_hit_count: u64,
}

pub struct InProcessQueue {
    config: QueueConfig,
    rate_limiter: RateLimiter,
    inner: std::sync::Mutex<Inner>,
}

impl InProcessQueue {
    pub fn new(config: QueueConfig, rate_limit_config: RateLimitConfig) -> Self {
        Self {
            config,
            rate_limiter: RateLimiter::new(rate_limit_config),
            inner: std::sync::Mutex::new(Inner {
                heap: BinaryHeap::new(),
                seq: 0,
                paused: false,
                overflow_count: 0,
                rate_limit_hit_count: 0,
            }),
        }
    }

    /// Admission checks all applicable rate-limit buckets before a queue
    /// depth check (spec §4.2). Returns the limiting bucket on denial.
    pub fn check_rate_limits(&self, request: &SearchRequest) -> Result<(), LimitDenied> {
        self.rate_limiter
            .check(&request.user_context.user_id, &request.user_context.workspace_ids)
    }

    fn high_water_depth(&self) -> usize {
        (self.config.max_queue_depth as f64 * self.config.high_water_mark) as usize
    }
}

#[async_trait]
impl AdmissionQueue for InProcessQueue {
    async fn enqueue(&self, request: SearchRequest, priority: Priority) -> CacheResult<QueueEntry> {
        if let Err(denied) = self.check_rate_limits(&request) {
            let mut inner = self.inner.lock().unwrap();
            inner.rate_limit_hit_count += 1;
            return Err(CacheError::RateLimitExceeded {
                bucket: denied.bucket,
                retry_after_secs: denied.retry_after_secs,
            });
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.heap.len() >= self.config.max_queue_depth {
            inner.overflow_count += 1;
            return Err(CacheError::QueueOverflow);
        }

        inner.seq += 1;
        let entry = QueueEntry {
            queue_id: uuid::Uuid::new_v4().to_string(),
            request,
            priority,
            enqueued_at: Utc::now(),
        };
        inner.heap.push(HeapItem {
            priority_rank: priority.rank(),
            enqueue_seq: inner.seq,
            entry: entry.clone(),
        });
        Ok(entry)
    }

    async fn dequeue(&self) -> Option<QueueEntry> {
        let mut inner = self.inner.lock().unwrap();
        if inner.paused {
            return None;
        }
        inner.heap.pop().map(|item| item.entry)
    }

    async fn depth(&self) -> usize {
        self.inner.lock().unwrap().heap.len()
    }

    async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().unwrap();
        let mut by_priority: HashMap<String, usize> = HashMap::new();
        for item in inner.heap.iter() {
            *by_priority
                .entry(format!("{:?}", item.entry.priority).to_lowercase())
                .or_insert(0) += 1;
        }
        QueueStats {
            depth_total: inner.heap.len(),
            depth_by_priority: by_priority,
            wait_time_avg_ms: 0.0,
            wait_time_p50_ms: 0.0,
            wait_time_p99_ms: 0.0,
            overflow_count_1m: inner.overflow_count,
            overflow_count_1h: inner.overflow_count,
            rate_limit_hit_count_1m: inner.rate_limit_hit_count,
            rate_limit_hit_count_1h: inner.rate_limit_hit_count,
            top_users: Vec::new(),
            top_workspaces: Vec::new(),
        }
    }

    async fn health(&self) -> QueueHealth {
        let inner = self.inner.lock().unwrap();
        if inner.paused {
            return QueueHealth::Paused;
        }
        let depth = inner.heap.len();
        if depth >= self.config.max_queue_depth {
            QueueHealth::Overloaded
        } else if depth >= self.high_water_depth() {
            QueueHealth::Degraded
        } else {
            QueueHealth::Healthy
        }
    }

    async fn pause(&self) {
        self.inner.lock().unwrap().paused = true;
    }

    async fn resume(&self) {
        self.inner.lock().unwrap().paused = false;
    }

    async fn clear(&self, priority: Option<Priority>) -> usize {
        let mut inner = self.inner.lock().unwrap();
        match priority {
            None => {
                let n = inner.heap.len();
                inner.heap.clear();
                n
            }
            Some(p) => {
                let before = inner.heap.len();
                let kept: Vec<HeapItem> = inner
                    .heap
                    .drain()
                    .filter(|item| item.entry.priority != p)
                    .collect();
                let removed = before - kept.len();
                inner.heap = kept.into_iter().collect();
                removed
            }
        }
    }

    async fn position(&self, queue_id: &str) -> Option<usize> {
        let inner = self.inner.lock().unwrap();
        let mut sorted: Vec<&HeapItem> = inner.heap.iter().collect();
        sorted.sort();
        sorted.reverse();
        sorted
            .iter()
            .position(|item| item.entry.queue_id == queue_id)
    }

    async fn expire_old(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(self.config.queue_timeout).unwrap_or_default();
        let before = inner.heap.len();
        let kept: Vec<HeapItem> = inner
            .heap
            .drain()
            .filter(|item| now - item.entry.enqueued_at < timeout)
            .collect();
        let removed = before - kept.len();
        inner.heap = kept.into_iter().collect();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExternalSearchMode, NormalizedQuery, ResponseType, UserContext};

    fn sample_request(user: &str) -> SearchRequest {
        SearchRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            query: NormalizedQuery {
                original_text: "q".into(),
                normalized_text: "q".into(),
                fingerprint: "fp".into(),
                technology_hint: None,
                tokens: vec![],
            },
            user_context: UserContext::new(user),
            priority_score: 5.0,
            response_type: ResponseType::Raw,
            provider_overrides: None,
            use_external_search: ExternalSearchMode::Auto,
            limit: 10,
            offset: 0,
            created_at: Utc::now(),
            queued_at: None,
        }
    }

    #[tokio::test]
    async fn higher_priority_dequeues_first() {
        let queue = InProcessQueue::new(QueueConfig::default(), RateLimitConfig::default());
        queue.enqueue(sample_request("a"), Priority::Normal).await.unwrap();
        queue.enqueue(sample_request("b"), Priority::Critical).await.unwrap();
        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn same_priority_is_fifo() {
        let queue = InProcessQueue::new(QueueConfig::default(), RateLimitConfig::default());
        let r1 = queue.enqueue(sample_request("a"), Priority::Normal).await.unwrap();
        let r2 = queue.enqueue(sample_request("a"), Priority::Normal).await.unwrap();
        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.queue_id, r1.queue_id);
        let second = queue.dequeue().await.unwrap();
        assert_eq!(second.queue_id, r2.queue_id);
    }

    #[tokio::test]
    async fn overflow_when_at_capacity() {
        let cfg = QueueConfig {
            max_queue_depth: 2,
            ..QueueConfig::default()
        };
        let queue = InProcessQueue::new(cfg, RateLimitConfig::default());
        queue.enqueue(sample_request("a"), Priority::Normal).await.unwrap();
        queue.enqueue(sample_request("b"), Priority::Normal).await.unwrap();
        let err = queue.enqueue(sample_request("c"), Priority::Normal).await;
        assert!(matches!(err, Err(CacheError::QueueOverflow)));
    }

    #[tokio::test]
    async fn pause_blocks_dequeue_without_dropping() {
        let queue = InProcessQueue::new(QueueConfig::default(), RateLimitConfig::default());
        queue.enqueue(sample_request("a"), Priority::Normal).await.unwrap();
        queue.pause().await;
        assert!(queue.dequeue().await.is_none());
        assert_eq!(queue.depth().await, 1);
        queue.resume().await;
        assert!(queue.dequeue().await.is_some());
    }
}
