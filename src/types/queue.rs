//! QueueEntry, Priority (spec §3, §4.2, §11; surface grounded in
//! `examples/original_source/src/mcp/core/queue.py` `QueuePriority`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::SearchRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Batch,
}

impl Priority {
    /// Lower rank dequeues first; matches `QueuePriority` ordinal values
    /// (CRITICAL=0 .. BATCH=4) from the Python original.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
            Priority::Batch => 4,
        }
    }

    /// Buckets a `SearchRequest::priority_score` (spec §3, [0, 10]) into the
    /// admission queue's priority enum (spec §4.2).
    pub fn from_score(score: f64) -> Priority {
        if score >= 8.0 {
            Priority::Critical
        } else if score >= 6.0 {
            Priority::High
        } else if score >= 3.0 {
            Priority::Normal
        } else if score >= 1.0 {
            Priority::Low
        } else {
            Priority::Batch
        }
    }

    /// Midpoint `priority_score` for this bucket, the inverse of
    /// [`Priority::from_score`], used when a caller submits at a priority
    /// bucket directly instead of a raw score.
    pub fn to_score(&self) -> f64 {
        match self {
            Priority::Critical => 9.0,
            Priority::High => 7.0,
            Priority::Normal => 4.5,
            Priority::Low => 2.0,
            Priority::Batch => 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub queue_id: String,
    pub request: SearchRequest,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
}

/// Observable stats consumed by admin and health endpoints (spec §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub depth_total: usize,
    pub depth_by_priority: std::collections::HashMap<String, usize>,
    pub wait_time_avg_ms: f64,
    pub wait_time_p50_ms: f64,
    pub wait_time_p99_ms: f64,
    pub overflow_count_1m: u64,
    pub overflow_count_1h: u64,
    pub rate_limit_hit_count_1m: u64,
    pub rate_limit_hit_count_1h: u64,
    pub top_users: Vec<(String, u64)>,
    pub top_workspaces: Vec<(String, u64)>,
}
