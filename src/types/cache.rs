//! CacheEntry (spec §3, §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{response::SearchResponse, Fingerprint};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub response: SearchResponse,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
