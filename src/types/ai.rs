//! AI Decision Service types, spec §3, §4.3, §11. A/B statistics fields
//! grounded in `examples/original_source/src/mcp/text_ai/ab_testing.py`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentId, ProviderId, TemplateId, TestId, WorkspaceId};

/// The ten decision kinds a PromptTemplate can back (spec §4.3). Replaces
/// duck-typed decision outputs with one tagged variant per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    QueryUnderstanding,
    ResultRelevance,
    QueryRefinement,
    ExternalSearchDecision,
    ExternalSearchQuery,
    ContentExtraction,
    ResponseFormatSelection,
    LearningOpportunities,
    ProviderSelection,
    FailureAnalysis,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::QueryUnderstanding => "query_understanding",
            DecisionType::ResultRelevance => "result_relevance",
            DecisionType::QueryRefinement => "query_refinement",
            DecisionType::ExternalSearchDecision => "external_search_decision",
            DecisionType::ExternalSearchQuery => "external_search_query",
            DecisionType::ContentExtraction => "content_extraction",
            DecisionType::ResponseFormatSelection => "response_format_selection",
            DecisionType::LearningOpportunities => "learning_opportunities",
            DecisionType::ProviderSelection => "provider_selection",
            DecisionType::FailureAnalysis => "failure_analysis",
        }
    }
}

/// 1. QueryUnderstanding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryUnderstandingDecision {
    pub intent: String,
    pub domain: Option<String>,
    pub answer_type: String,
    pub entities: Vec<String>,
    pub suggested_workspaces: Vec<WorkspaceId>,
}

/// 2. ResultRelevance: EvaluationResult over current hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub overall_quality: f64,
    pub relevance: f64,
    pub completeness: f64,
    pub needs_refinement: bool,
    pub needs_external_search: bool,
    pub missing_information: Vec<String>,
    pub suggested_refinements: Vec<String>,
    pub recommended_providers: Vec<ProviderId>,
    pub confidence: f64,
    pub reasoning: String,
    pub knowledge_gaps: Vec<String>,
}

/// 3. QueryRefinement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRefinementDecision {
    pub refined_query: String,
    pub strategy: String,
    pub added_terms: Vec<String>,
    pub removed_terms: Vec<String>,
}

/// 4. ExternalSearchDecision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSearchDecisionOutput {
    pub use_external: bool,
    pub reasoning: String,
    pub recommended_providers: Vec<ProviderId>,
}

/// 5. ExternalSearchQuery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSearchQueryDecision {
    pub query: String,
    pub quoted_phrases: Vec<String>,
    pub required_terms: Vec<String>,
    pub excluded_terms: Vec<String>,
    pub site_restrictions: Vec<String>,
}

/// 6. ContentExtraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentExtractionDecision {
    pub distilled_markdown: String,
    pub code_blocks: Vec<String>,
}

/// 7. ResponseFormatSelection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormatDecision {
    pub response_type: super::ResponseType,
    pub synthesized_answer: Option<String>,
    pub citations: Vec<ContentId>,
}

/// 8. LearningOpportunities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningGap {
    pub description: String,
    pub priority: String,
    pub source_suggestions: Vec<String>,
    pub workspace: Option<WorkspaceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningOpportunitiesDecision {
    pub gaps: Vec<LearningGap>,
}

/// 9. ProviderSelection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSelectionDecision {
    pub provider_id: ProviderId,
    pub reasoning: String,
}

/// 10. FailureAnalysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureAnalysisDecision {
    pub reasons: Vec<String>,
    pub query_issues: Vec<String>,
    pub missing_domains: Vec<String>,
    pub technical_limitations: Vec<String>,
    pub user_facing_message: String,
}

/// A versioned, rendered prompt backing one decision type (spec §3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub template_id: TemplateId,
    pub decision_type: DecisionType,
    pub version: String,
    pub template_text: String,
    pub required_variables: Vec<String>,
    pub output_schema: OutputShape,
    pub recommended_temperature: f64,
    pub token_budget: u32,
    pub active: bool,
    pub performance: TemplateMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputShape {
    Json,
    Markdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateMetrics {
    pub invocations: u64,
    pub fallback_count: u64,
    pub avg_latency_ms: f64,
}

/// ABTest, spec §3. Field names grounded in
/// `ab_testing.py`'s `ABTest`/`TestVariant`/`TestMetrics`/`StatisticalResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ABTestStatus {
    Draft,
    Running,
    Paused,
    Concluded,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    Random,
    DeterministicByUserHash,
    Weighted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestMetrics {
    pub sample_count: u64,
    pub quality_scores: Vec<f64>,
    pub response_times_ms: Vec<f64>,
    pub token_counts: Vec<u64>,
    pub success_count: u64,
    pub error_count: u64,
    pub satisfaction_scores: Vec<f64>,
}

impl TestMetrics {
    pub fn mean_quality(&self) -> f64 {
        mean(&self.quality_scores)
    }

    pub fn mean_response_time_ms(&self) -> f64 {
        mean(&self.response_times_ms)
    }

    pub fn success_rate(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.sample_count as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVariant {
    pub template_id: TemplateId,
    pub version: String,
    pub traffic_percentage: f64,
    pub is_control: bool,
    pub metrics: TestMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalResult {
    pub winner: Option<String>,
    pub confidence_level: f64,
    pub p_value: f64,
    pub effect_size: f64,
    pub required_sample_size: u64,
    pub current_power: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ABTest {
    pub test_id: TestId,
    pub target_decision_type: DecisionType,
    pub variants: Vec<TestVariant>,
    pub status: ABTestStatus,
    pub split_strategy: SplitStrategy,
    pub min_sample_per_variant: u64,
    pub max_duration_days: u32,
    pub success_metric_key: String,
    pub statistical_result: Option<StatisticalResult>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionOutcome {
    pub quality_score: f64,
    pub latency_ms: f64,
    pub token_count: u64,
    pub user_satisfaction: Option<f64>,
    pub error: bool,
}
