//! Admin/control surface (spec §6); record shapes grounded in
//! `examples/original_source/src/api/v1/admin/search/{config,providers,monitoring,vector}.py`.
//! HTTP/REST exposure of these contracts stays an external collaborator
//! (spec §1); only the data types and the trait are part of the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::types::{ABTest, CacheResult, ProviderId, ProviderRecord, PromptTemplate, TestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringRange {
    OneHour,
    SixHours,
    TwentyFourHours,
    SevenDays,
    ThirtyDays,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringAggregate {
    pub range: MonitoringRange,
    pub total_requests: u64,
    pub cache_hit_rate: f64,
    pub external_search_rate: f64,
    pub avg_execution_time_ms: f64,
    pub error_rate: f64,
}

/// Each config mutation records actor, timestamp, section, diff, prior
/// values, and a free-text comment (spec §6 "Persistent state layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChangeEntry {
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub section: String,
    pub diff: serde_json::Value,
    pub prior_values: serde_json::Value,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChangePage {
    pub entries: Vec<ConfigChangeEntry>,
    pub total: usize,
    pub offset: usize,
}

#[async_trait]
pub trait AdminControlPlane: Send + Sync {
    async fn get_config(&self) -> CacheConfig;
    async fn update_config(
        &self,
        section: &str,
        new_value: serde_json::Value,
        actor: &str,
        comment: &str,
    ) -> CacheResult<()>;
    async fn config_change_log(&self, section: Option<&str>, offset: usize, limit: usize) -> ConfigChangePage;

    async fn list_providers(&self) -> Vec<ProviderRecord>;
    async fn upsert_provider(&self, record: ProviderRecord) -> CacheResult<()>;
    async fn set_provider_enabled(&self, provider_id: &ProviderId, enabled: bool) -> CacheResult<()>;
    async fn reorder_providers(&self, ordered_ids: &[ProviderId]) -> CacheResult<()>;
    async fn test_provider_connection(&self, provider_id: &ProviderId) -> CacheResult<bool>;

    async fn list_templates(&self) -> Vec<PromptTemplate>;
    async fn upsert_template(&self, template: PromptTemplate) -> CacheResult<()>;
    async fn set_template_active(&self, template_id: &str, version: &str) -> CacheResult<()>;

    async fn list_ab_tests(&self) -> Vec<ABTest>;
    async fn create_ab_test(&self, test: ABTest) -> CacheResult<()>;
    async fn start_ab_test(&self, test_id: &TestId) -> CacheResult<()>;
    async fn pause_ab_test(&self, test_id: &TestId) -> CacheResult<()>;
    async fn conclude_ab_test(&self, test_id: &TestId) -> CacheResult<()>;
    async fn analyze_ab_test(&self, test_id: &TestId) -> CacheResult<crate::types::StatisticalResult>;

    async fn monitoring(&self, range: MonitoringRange) -> MonitoringAggregate;
}
