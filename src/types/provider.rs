//! ProviderRecord (spec §3, §4.6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Circuit breaker state (GLOSSARY): closed -> open on failure threshold ->
/// half_open after recovery interval -> closed on first success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub requests_per_minute: u32,
    pub burst_allowance: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSpec {
    pub cost_per_call: f64,
    pub monthly_budget: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub provider_id: ProviderId,
    pub type_tag: String,
    pub enabled: bool,
    pub priority: u32,
    pub config: HashMap<String, String>,
    pub rate_limit: RateLimitSpec,
    pub cost: CostSpec,
    pub health: HealthState,
    pub circuit_state: CircuitState,
    /// Rolling window of recent outcomes, newest last; used for health
    /// classification (spec §4.6).
    pub recent_outcomes: Vec<bool>,
    pub rolling_latency_ms: Vec<f64>,
}

impl ProviderRecord {
    pub fn error_rate(&self, window: usize) -> f64 {
        if self.recent_outcomes.is_empty() {
            return 0.0;
        }
        let take = window.min(self.recent_outcomes.len());
        let slice = &self.recent_outcomes[self.recent_outcomes.len() - take..];
        let failures = slice.iter().filter(|ok| !**ok).count();
        failures as f64 / slice.len() as f64
    }
}
