//! Result Ranker/Merger (C6), spec §4.5.

use std::collections::HashMap;

use crate::types::SearchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingStrategy {
    Relevance,
    Recency,
    Hybrid,
}

impl Default for RankingStrategy {
    fn default() -> Self {
        RankingStrategy::Relevance
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HybridWeights {
    pub relevance: f64,
    pub recency: f64,
    pub quality: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            relevance: 0.6,
            recency: 0.2,
            quality: 0.2,
        }
    }
}

fn score(result: &SearchResult, strategy: RankingStrategy, weights: HybridWeights) -> f64 {
    match strategy {
        RankingStrategy::Relevance => result.relevance_score,
        RankingStrategy::Recency => result.recency_score,
        RankingStrategy::Hybrid => {
            result.relevance_score * weights.relevance
                + result.recency_score * weights.recency
                + result.quality_score * weights.quality
        }
    }
}

/// Deduplicates by `content_id` (ties broken by higher relevance then newer
/// recency, spec §4.5), merges vector and external hits under the same key
/// (external entries keep their provider tag), then orders by strategy and
/// applies limit/offset pagination. Dedup is idempotent (spec §8): merging
/// the same set twice yields the same merged set.
pub fn rank_and_merge(
    mut internal: Vec<SearchResult>,
    external: Vec<SearchResult>,
    strategy: RankingStrategy,
    weights: HybridWeights,
    limit: u32,
    offset: u32,
) -> Vec<SearchResult> {
    internal.extend(external);

    let mut best: HashMap<String, SearchResult> = HashMap::new();
    for result in internal {
        match best.get(&result.content_id) {
            Some(existing) if !prefers(&result, existing) => {}
            _ => {
                best.insert(result.content_id.clone(), result);
            }
        }
    }

    let mut merged: Vec<SearchResult> = best.into_values().collect();
    merged.sort_by(|a, b| {
        score(b, strategy, weights)
            .partial_cmp(&score(a, strategy, weights))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    merged
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

fn prefers(candidate: &SearchResult, existing: &SearchResult) -> bool {
    if candidate.relevance_score != existing.relevance_score {
        return candidate.relevance_score > existing.relevance_score;
    }
    candidate.recency_score > existing.recency_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;

    fn hit(id: &str, relevance: f64, recency: f64, quality: f64) -> SearchResult {
        SearchResult {
            content_id: id.to_string(),
            title: id.to_string(),
            snippet: String::new(),
            content: None,
            source_url: "https://example.com".into(),
            workspace_id: "ws".into(),
            technology: None,
            content_type: ContentType::Guide,
            relevance_score: relevance,
            recency_score: recency,
            quality_score: quality,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn dedups_by_content_id_keeping_higher_relevance() {
        let internal = vec![hit("a", 0.5, 0.5, 0.5)];
        let external = vec![hit("a", 0.9, 0.1, 0.1)];
        let merged = rank_and_merge(
            internal,
            external,
            RankingStrategy::Relevance,
            HybridWeights::default(),
            10,
            0,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].relevance_score, 0.9);
    }

    #[test]
    fn orders_by_relevance_descending() {
        let internal = vec![hit("a", 0.3, 0.0, 0.0), hit("b", 0.9, 0.0, 0.0)];
        let merged = rank_and_merge(internal, vec![], RankingStrategy::Relevance, HybridWeights::default(), 10, 0);
        assert_eq!(merged[0].content_id, "b");
    }

    #[test]
    fn pagination_applies_limit_and_offset() {
        let internal = (0..5).map(|i| hit(&i.to_string(), 1.0 - i as f64 * 0.1, 0.0, 0.0)).collect();
        let merged = rank_and_merge(internal, vec![], RankingStrategy::Relevance, HybridWeights::default(), 2, 1);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content_id, "1");
    }

    #[test]
    fn merge_is_idempotent() {
        let internal = vec![hit("a", 0.5, 0.5, 0.5)];
        let once = rank_and_merge(internal.clone(), vec![hit("a", 0.5, 0.5, 0.5)], RankingStrategy::Relevance, HybridWeights::default(), 10, 0);
        let twice = rank_and_merge(once.clone(), vec![hit("a", 0.5, 0.5, 0.5)], RankingStrategy::Relevance, HybridWeights::default(), 10, 0);
        assert_eq!(once.len(), twice.len());
    }
}
