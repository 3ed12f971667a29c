//! Configuration for the documentation cache (spec §6 "Configuration").
//! All options are hot-reloadable via `CacheRuntime::reload`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::CacheError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub general: GeneralConfig,
    pub queue: QueueConfig,
    pub rate_limits: RateLimitConfig,
    pub timeouts: TimeoutConfig,
    pub thresholds: ThresholdConfig,
    pub resource_limits: ResourceLimitConfig,
    pub feature_toggles: FeatureToggleConfig,
    pub strategies: StrategyConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            queue: QueueConfig::default(),
            rate_limits: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            thresholds: ThresholdConfig::default(),
            resource_limits: ResourceLimitConfig::default(),
            feature_toggles: FeatureToggleConfig::default(),
            strategies: StrategyConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Reads config from a TOML file, creating a default one if it does
    /// not yet exist.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| CacheError::Config(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| CacheError::Config(format!("failed to parse config: {}", e)))
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CacheError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| CacheError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
    pub bind_address: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            bind_address: "127.0.0.1:8080".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub max_concurrent_searches: usize,
    pub max_queue_depth: usize,
    pub queue_overflow_response_code: u16,
    pub priority_queue_enabled: bool,
    pub queue_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 20,
            max_queue_depth: 100,
            queue_overflow_response_code: 503,
            priority_queue_enabled: true,
            queue_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub per_user_requests_per_minute: u32,
    pub per_workspace_requests_per_minute: u32,
    pub global_requests_per_minute: u32,
    pub window_seconds: u64,
    pub burst_allowance: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_user_requests_per_minute: 60,
            per_workspace_requests_per_minute: 600,
            global_requests_per_minute: 6000,
            window_seconds: 60,
            burst_allowance: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub total_search_timeout_seconds: u64,
    pub per_workspace_timeout_seconds: u64,
    pub external_search_timeout_seconds: u64,
    pub ai_decision_timeout_seconds: u64,
    pub cache_operation_timeout_ms: u64,
    pub sync_ingestion_timeout_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            total_search_timeout_seconds: 30,
            per_workspace_timeout_seconds: 2,
            external_search_timeout_seconds: 5,
            ai_decision_timeout_seconds: 10,
            cache_operation_timeout_ms: 500,
            sync_ingestion_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub cache_breaker_failure_count: u32,
    pub cache_breaker_recovery_seconds: u64,
    pub min_relevance: f64,
    pub external_search_trigger_quality: f64,
    pub workspace_health_check_interval_seconds: u64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cache_breaker_failure_count: 3,
            cache_breaker_recovery_seconds: 2,
            min_relevance: 0.4,
            external_search_trigger_quality: 0.6,
            workspace_health_check_interval_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimitConfig {
    pub max_results: u32,
    pub max_workspaces_per_search: usize,
    pub max_tokens_per_ai_call: u32,
    pub max_external_results: u32,
    pub cache_ttl_seconds: u64,
}

impl Default for ResourceLimitConfig {
    fn default() -> Self {
        Self {
            max_results: 200,
            max_workspaces_per_search: 5,
            max_tokens_per_ai_call: 2048,
            max_external_results: 20,
            cache_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureToggleConfig {
    pub external_search_enabled: bool,
    pub ai_evaluation_enabled: bool,
    pub query_refinement_enabled: bool,
    pub knowledge_ingestion_enabled: bool,
    pub result_caching_enabled: bool,
    pub sync_ingestion_enabled: bool,
}

impl Default for FeatureToggleConfig {
    fn default() -> Self {
        Self {
            external_search_enabled: true,
            ai_evaluation_enabled: true,
            query_refinement_enabled: true,
            knowledge_ingestion_enabled: true,
            result_caching_enabled: true,
            sync_ingestion_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceSelectionStrategy {
    AiDriven,
    All,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategyOption {
    Relevance,
    Recency,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub workspace_selection: WorkspaceSelectionStrategy,
    pub ranking: RankingStrategyOption,
    pub external_provider_priority: Vec<String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            workspace_selection: WorkspaceSelectionStrategy::AiDriven,
            ranking: RankingStrategyOption::Relevance,
            external_provider_priority: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = CacheConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let reparsed: CacheConfig = toml::from_str(&text).unwrap();
        assert_eq!(reparsed.queue.max_queue_depth, config.queue.max_queue_depth);
    }

    #[test]
    fn defaults_match_spec_values() {
        let config = CacheConfig::default();
        assert_eq!(config.queue.max_queue_depth, 100);
        assert_eq!(config.queue.max_concurrent_searches, 20);
        assert_eq!(config.thresholds.cache_breaker_failure_count, 3);
        assert_eq!(config.resource_limits.max_workspaces_per_search, 5);
    }
}
