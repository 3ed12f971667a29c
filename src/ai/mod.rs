//! AI Decision Service (C4), spec §4.3.
//!
//! A single typed interface over ten decisions, each backed by a versioned
//! `PromptTemplate` and subject to A/B testing. Every method returns its
//! typed decision directly (never `Result`): an LLM failure or unparseable
//! output is replaced by a deterministic fallback internally (spec §4.3
//! "Failure handling": fallback use is logged, never surfaced as an
//! error).

pub mod abtest;
pub mod templates;

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::observability::emit_event;
use crate::types::{
    ABTest, ContentExtractionDecision, DecisionType, EvaluationResult,
    ExternalSearchDecisionOutput, ExternalSearchQueryDecision, FailureAnalysisDecision,
    LearningOpportunitiesDecision, NormalizedQuery, ProviderId, ProviderRecord,
    ProviderSelectionDecision, PromptTemplate, QueryRefinementDecision,
    QueryUnderstandingDecision, ResponseFormatDecision, ResponseType, SearchResult,
    UserContext, VectorSearchResults,
};

/// The out-of-scope LLM HTTP client (spec §1: "the embedding/LLM HTTP
/// clients" are external collaborators). Anything implementing this can
/// back the decision service.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f64, max_tokens: u32) -> Result<String, String>;
}

/// Inert `LlmClient` for when no real backend is wired up yet: every call
/// fails, which drives every decision through its deterministic fallback
/// (spec §4.3 "Failure handling").
pub struct NullLlmClient;

#[async_trait]
impl LlmClient for NullLlmClient {
    async fn complete(&self, _prompt: &str, _temperature: f64, _max_tokens: u32) -> Result<String, String> {
        Err("no LLM backend configured".to_string())
    }
}

#[async_trait]
pub trait AiDecisionService: Send + Sync {
    async fn query_understanding(
        &self,
        query: &NormalizedQuery,
        ctx: &UserContext,
        trace_id: &str,
    ) -> QueryUnderstandingDecision;

    async fn result_relevance(
        &self,
        query: &NormalizedQuery,
        results: &VectorSearchResults,
        user_id: &str,
        trace_id: &str,
    ) -> EvaluationResult;

    async fn query_refinement(
        &self,
        query: &NormalizedQuery,
        evaluation: &EvaluationResult,
        user_id: &str,
        trace_id: &str,
    ) -> QueryRefinementDecision;

    async fn external_search_decision(
        &self,
        query: &NormalizedQuery,
        evaluation: Option<&EvaluationResult>,
        user_id: &str,
        trace_id: &str,
    ) -> ExternalSearchDecisionOutput;

    async fn external_search_query(
        &self,
        query: &NormalizedQuery,
        user_id: &str,
        trace_id: &str,
    ) -> ExternalSearchQueryDecision;

    async fn content_extraction(
        &self,
        hits: &[SearchResult],
        user_id: &str,
        trace_id: &str,
    ) -> ContentExtractionDecision;

    async fn response_format_selection(
        &self,
        query: &NormalizedQuery,
        hits: &[SearchResult],
        response_type: ResponseType,
        user_id: &str,
        trace_id: &str,
    ) -> ResponseFormatDecision;

    async fn learning_opportunities(
        &self,
        evaluation: &EvaluationResult,
        user_id: &str,
        trace_id: &str,
    ) -> LearningOpportunitiesDecision;

    async fn provider_selection(
        &self,
        providers: &[ProviderRecord],
        user_id: &str,
        trace_id: &str,
    ) -> ProviderSelectionDecision;

    async fn failure_analysis(
        &self,
        query: &NormalizedQuery,
        error: &str,
        user_id: &str,
        trace_id: &str,
    ) -> FailureAnalysisDecision;
}

/// Read-mostly template + A/B test registries (spec §5: "read-mostly,
/// writes serialized; readers see a consistent snapshot per request").
#[derive(Default)]
pub struct DecisionRegistry {
    templates: RwLock<HashMap<DecisionType, Vec<PromptTemplate>>>,
    ab_tests: RwLock<HashMap<DecisionType, ABTest>>,
}

impl DecisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_template(&self, template: PromptTemplate) {
        let mut guard = self.templates.write().await;
        guard.entry(template.decision_type).or_default().push(template);
    }

    pub async fn register_ab_test(&self, test: ABTest) {
        let mut guard = self.ab_tests.write().await;
        guard.insert(test.target_decision_type, test);
    }

    /// Exactly one version is "active" per decision type unless an A/B
    /// test overrides it (spec §4.3 "Template management").
    async fn select_template(&self, decision_type: DecisionType, user_id: &str) -> Option<PromptTemplate> {
        let ab_tests = self.ab_tests.read().await;
        if let Some(test) = ab_tests.get(&decision_type) {
            if let Some(variant) = abtest::assign_variant(test, user_id) {
                let templates = self.templates.read().await;
                if let Some(list) = templates.get(&decision_type) {
                    if let Some(found) = list
                        .iter()
                        .find(|t| t.template_id == variant.template_id && t.version == variant.version)
                    {
                        return Some(found.clone());
                    }
                }
            }
        }
        let templates = self.templates.read().await;
        templates
            .get(&decision_type)
            .and_then(|list| list.iter().find(|t| t.active).cloned())
    }
}

pub struct LlmBackedDecisionService<L: LlmClient> {
    llm: L,
    registry: DecisionRegistry,
}

impl<L: LlmClient> LlmBackedDecisionService<L> {
    pub fn new(llm: L, registry: DecisionRegistry) -> Self {
        Self { llm, registry }
    }

    /// Shared decide-or-fallback path for every decision kind: select the
    /// template (honoring any running A/B test), render it, call the LLM,
    /// parse JSON into `T`, and fall back deterministically on any failure.
    async fn decide<T: DeserializeOwned>(
        &self,
        decision_type: DecisionType,
        user_id: &str,
        vars: HashMap<String, Value>,
        fallback: T,
        trace_id: &str,
    ) -> T {
        let start = Instant::now();
        let template = match self.registry.select_template(decision_type, user_id).await {
            Some(t) => t,
            None => {
                emit_event(
                    "ai_decision",
                    start.elapsed(),
                    trace_id,
                    &[("decision_type", decision_type.as_str()), ("outcome", "no_template_fallback")],
                );
                return fallback;
            }
        };

        let rendered = match templates::render(&template, &vars) {
            Ok(text) => text,
            Err(_) => {
                emit_event(
                    "ai_decision",
                    start.elapsed(),
                    trace_id,
                    &[("decision_type", decision_type.as_str()), ("outcome", "render_fallback")],
                );
                return fallback;
            }
        };

        let completion = self
            .llm
            .complete(&rendered, template.recommended_temperature, template.token_budget)
            .await;

        match completion {
            Ok(text) => match serde_json::from_str::<T>(&text) {
                Ok(parsed) => {
                    emit_event(
                        "ai_decision",
                        start.elapsed(),
                        trace_id,
                        &[("decision_type", decision_type.as_str()), ("outcome", "ok")],
                    );
                    parsed
                }
                Err(_) => {
                    emit_event(
                        "ai_decision",
                        start.elapsed(),
                        trace_id,
                        &[("decision_type", decision_type.as_str()), ("outcome", "parse_fallback")],
                    );
                    fallback
                }
            },
            Err(_) => {
                emit_event(
                    "ai_decision",
                    start.elapsed(),
                    trace_id,
                    &[("decision_type", decision_type.as_str()), ("outcome", "llm_fallback")],
                );
                fallback
            }
        }
    }
}

#[async_trait]
impl<L: LlmClient + Send + Sync> AiDecisionService for LlmBackedDecisionService<L> {
    async fn query_understanding(
        &self,
        query: &NormalizedQuery,
        ctx: &UserContext,
        trace_id: &str,
    ) -> QueryUnderstandingDecision {
        let mut vars = HashMap::new();
        vars.insert("query".into(), Value::String(query.normalized_text.clone()));
        vars.insert(
            "hint".into(),
            query
                .technology_hint
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        // Default: information-seeking intent, no workspace suggestion
        // (spec §4.3 item 10 example fallback).
        let fallback = QueryUnderstandingDecision {
            intent: "information_seeking".to_string(),
            domain: None,
            answer_type: "raw".to_string(),
            entities: Vec::new(),
            suggested_workspaces: ctx.workspace_ids.clone(),
        };
        self.decide(DecisionType::QueryUnderstanding, &ctx.user_id, vars, fallback, trace_id)
            .await
    }

    async fn result_relevance(
        &self,
        query: &NormalizedQuery,
        results: &VectorSearchResults,
        user_id: &str,
        trace_id: &str,
    ) -> EvaluationResult {
        let mut vars = HashMap::new();
        vars.insert("query".into(), Value::String(query.normalized_text.clone()));
        vars.insert("hit_count".into(), Value::from(results.hits.len()));
        let fallback = EvaluationResult {
            overall_quality: if results.hits.is_empty() { 0.0 } else { 0.5 },
            relevance: 0.5,
            completeness: 0.5,
            needs_refinement: false,
            needs_external_search: results.hits.is_empty(),
            missing_information: Vec::new(),
            suggested_refinements: Vec::new(),
            recommended_providers: Vec::new(),
            confidence: 0.0,
            reasoning: "fallback evaluation: AI decision unavailable".to_string(),
            knowledge_gaps: Vec::new(),
        };
        self.decide(DecisionType::ResultRelevance, user_id, vars, fallback, trace_id)
            .await
    }

    async fn query_refinement(
        &self,
        query: &NormalizedQuery,
        evaluation: &EvaluationResult,
        user_id: &str,
        trace_id: &str,
    ) -> QueryRefinementDecision {
        let mut vars = HashMap::new();
        vars.insert("query".into(), Value::String(query.normalized_text.clone()));
        vars.insert(
            "missing_information".into(),
            serde_json::json!(evaluation.missing_information),
        );
        let fallback = QueryRefinementDecision {
            refined_query: query.normalized_text.clone(),
            strategy: "none".to_string(),
            added_terms: Vec::new(),
            removed_terms: Vec::new(),
        };
        self.decide(DecisionType::QueryRefinement, user_id, vars, fallback, trace_id)
            .await
    }

    async fn external_search_decision(
        &self,
        query: &NormalizedQuery,
        evaluation: Option<&EvaluationResult>,
        user_id: &str,
        trace_id: &str,
    ) -> ExternalSearchDecisionOutput {
        let mut vars = HashMap::new();
        vars.insert("query".into(), Value::String(query.normalized_text.clone()));
        let quality = evaluation.map(|e| e.overall_quality).unwrap_or(0.0);
        vars.insert("quality".into(), Value::from(quality));
        // "use external iff quality < 0.6 or no internal results" (spec §4.7
        // stage 7 fallback).
        let fallback = ExternalSearchDecisionOutput {
            use_external: quality < 0.6,
            reasoning: "fallback: quality below threshold".to_string(),
            recommended_providers: Vec::new(),
        };
        self.decide(DecisionType::ExternalSearchDecision, user_id, vars, fallback, trace_id)
            .await
    }

    async fn external_search_query(
        &self,
        query: &NormalizedQuery,
        user_id: &str,
        trace_id: &str,
    ) -> ExternalSearchQueryDecision {
        let mut vars = HashMap::new();
        vars.insert("query".into(), Value::String(query.normalized_text.clone()));
        let fallback = ExternalSearchQueryDecision {
            query: query.normalized_text.clone(),
            quoted_phrases: Vec::new(),
            required_terms: query.tokens.clone(),
            excluded_terms: Vec::new(),
            site_restrictions: Vec::new(),
        };
        self.decide(DecisionType::ExternalSearchQuery, user_id, vars, fallback, trace_id)
            .await
    }

    async fn content_extraction(
        &self,
        hits: &[SearchResult],
        user_id: &str,
        trace_id: &str,
    ) -> ContentExtractionDecision {
        let mut vars = HashMap::new();
        vars.insert(
            "content".into(),
            Value::String(
                hits.iter()
                    .filter_map(|h| h.content.clone())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            ),
        );
        let fallback = ContentExtractionDecision {
            distilled_markdown: hits
                .iter()
                .map(|h| format!("## {}\n{}", h.title, h.snippet))
                .collect::<Vec<_>>()
                .join("\n\n"),
            code_blocks: Vec::new(),
        };
        self.decide(DecisionType::ContentExtraction, user_id, vars, fallback, trace_id)
            .await
    }

    async fn response_format_selection(
        &self,
        query: &NormalizedQuery,
        hits: &[SearchResult],
        response_type: ResponseType,
        user_id: &str,
        trace_id: &str,
    ) -> ResponseFormatDecision {
        let mut vars = HashMap::new();
        vars.insert("query".into(), Value::String(query.normalized_text.clone()));
        vars.insert("hit_count".into(), Value::from(hits.len()));
        let fallback = ResponseFormatDecision {
            response_type,
            synthesized_answer: None,
            citations: hits.iter().take(5).map(|h| h.content_id.clone()).collect(),
        };
        self.decide(DecisionType::ResponseFormatSelection, user_id, vars, fallback, trace_id)
            .await
    }

    async fn learning_opportunities(
        &self,
        evaluation: &EvaluationResult,
        user_id: &str,
        trace_id: &str,
    ) -> LearningOpportunitiesDecision {
        let mut vars = HashMap::new();
        vars.insert(
            "knowledge_gaps".into(),
            serde_json::json!(evaluation.knowledge_gaps),
        );
        let fallback = LearningOpportunitiesDecision { gaps: Vec::new() };
        self.decide(DecisionType::LearningOpportunities, user_id, vars, fallback, trace_id)
            .await
    }

    async fn provider_selection(
        &self,
        providers: &[ProviderRecord],
        user_id: &str,
        trace_id: &str,
    ) -> ProviderSelectionDecision {
        let mut vars = HashMap::new();
        vars.insert(
            "providers".into(),
            serde_json::json!(providers.iter().map(|p| p.provider_id.clone()).collect::<Vec<_>>()),
        );
        // Fallback: pool walks its own priority list (spec §4.6).
        let fallback_id: ProviderId = providers
            .iter()
            .filter(|p| p.enabled)
            .min_by_key(|p| p.priority)
            .map(|p| p.provider_id.clone())
            .unwrap_or_default();
        let fallback = ProviderSelectionDecision {
            provider_id: fallback_id,
            reasoning: "fallback: highest-priority enabled provider".to_string(),
        };
        self.decide(DecisionType::ProviderSelection, user_id, vars, fallback, trace_id)
            .await
    }

    async fn failure_analysis(
        &self,
        query: &NormalizedQuery,
        error: &str,
        user_id: &str,
        trace_id: &str,
    ) -> FailureAnalysisDecision {
        let mut vars = HashMap::new();
        vars.insert("query".into(), Value::String(query.normalized_text.clone()));
        vars.insert("error".into(), Value::String(error.to_string()));
        let fallback = FailureAnalysisDecision {
            reasons: vec![error.to_string()],
            query_issues: Vec::new(),
            missing_domains: Vec::new(),
            technical_limitations: Vec::new(),
            user_facing_message: "We couldn't complete this search. Please try again.".to_string(),
        };
        self.decide(DecisionType::FailureAnalysis, user_id, vars, fallback, trace_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingLlm;
    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(&self, _prompt: &str, _temperature: f64, _max_tokens: u32) -> Result<String, String> {
            Err("upstream unavailable".to_string())
        }
    }

    fn sample_query() -> NormalizedQuery {
        NormalizedQuery {
            original_text: "python async".into(),
            normalized_text: "python async".into(),
            fingerprint: "fp".into(),
            technology_hint: Some("python".into()),
            tokens: vec!["python".into(), "async".into()],
        }
    }

    #[tokio::test]
    async fn missing_template_falls_back_without_error() {
        let service = LlmBackedDecisionService::new(FailingLlm, DecisionRegistry::new());
        let ctx = UserContext::new("user-1");
        let decision = service.query_understanding(&sample_query(), &ctx, "trace-1").await;
        assert_eq!(decision.intent, "information_seeking");
    }

    #[tokio::test]
    async fn external_search_fallback_uses_quality_threshold() {
        let service = LlmBackedDecisionService::new(FailingLlm, DecisionRegistry::new());
        let evaluation = EvaluationResult {
            overall_quality: 0.3,
            relevance: 0.3,
            completeness: 0.3,
            needs_refinement: false,
            needs_external_search: true,
            missing_information: vec![],
            suggested_refinements: vec![],
            recommended_providers: vec![],
            confidence: 0.0,
            reasoning: String::new(),
            knowledge_gaps: vec![],
        };
        let decision = service
            .external_search_decision(&sample_query(), Some(&evaluation), "user-1", "trace-1")
            .await;
        assert!(decision.use_external);
    }

    /// An `LlmClient` that echoes back its own template id so a test can see
    /// which template actually got rendered and sent to the model.
    struct EchoingLlm;
    #[async_trait]
    impl LlmClient for EchoingLlm {
        async fn complete(&self, prompt: &str, _temperature: f64, _max_tokens: u32) -> Result<String, String> {
            Ok(prompt.to_string())
        }
    }

    fn variant_template(template_id: &str) -> PromptTemplate {
        PromptTemplate {
            template_id: template_id.to_string(),
            decision_type: DecisionType::ExternalSearchDecision,
            version: "v1".to_string(),
            template_text: format!(
                r#"{{"use_external": {}, "reasoning": "{}", "recommended_providers": []}}"#,
                template_id == "tpl-true",
                template_id
            ),
            required_variables: Vec::new(),
            output_schema: crate::types::OutputShape::Json,
            recommended_temperature: 0.0,
            token_budget: 64,
            active: false,
            performance: crate::types::TemplateMetrics::default(),
        }
    }

    /// Spec §4.3/§8: "a deterministic hash of (test id, user id) selects the
    /// variant". This must be the *requesting user's* id, not a constant,
    /// or every user collapses onto the same variant for the nine decision
    /// kinds beyond `query_understanding`.
    #[tokio::test]
    async fn ab_assignment_is_driven_by_the_requesting_users_id() {
        let registry = DecisionRegistry::new();
        registry.register_template(variant_template("tpl-true")).await;
        registry.register_template(variant_template("tpl-false")).await;
        registry
            .register_ab_test(ABTest {
                test_id: "ext-search-test".into(),
                target_decision_type: DecisionType::ExternalSearchDecision,
                variants: vec![
                    crate::types::TestVariant {
                        template_id: "tpl-true".into(),
                        version: "v1".into(),
                        traffic_percentage: 50.0,
                        is_control: true,
                        metrics: crate::types::TestMetrics::default(),
                    },
                    crate::types::TestVariant {
                        template_id: "tpl-false".into(),
                        version: "v1".into(),
                        traffic_percentage: 50.0,
                        is_control: false,
                        metrics: crate::types::TestMetrics::default(),
                    },
                ],
                status: crate::types::ABTestStatus::Running,
                split_strategy: crate::types::SplitStrategy::DeterministicByUserHash,
                min_sample_per_variant: 1,
                max_duration_days: 30,
                success_metric_key: "quality".into(),
                statistical_result: None,
                started_at: None,
            })
            .await;
        let service = LlmBackedDecisionService::new(EchoingLlm, registry);

        // Two distinct users, same test: each must be routed according to
        // their own id, reproducing `abtest::assign_variant`'s own hash.
        let users = ["alice", "bob", "carol", "dave"];
        for user in users {
            let decision = service
                .external_search_decision(&sample_query(), None, user, "trace-1")
                .await;
            let expected_true = abtest::assignment_percentage("ext-search-test", user) <= 50;
            assert_eq!(decision.use_external, expected_true, "mismatched variant for {user}");
        }
    }
}
