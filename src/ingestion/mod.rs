//! TTL-aware Ingestion Path (C8), spec §4.8.

pub mod ttl;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::observability::emit_event;
use crate::types::{ContentId, DocumentType, IngestionKind, IngestionStatus, QualityIndicators, TTLDocument};

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub base_ttl_days: f64,
    pub min_ttl_days: f64,
    pub max_ttl_days: f64,
    pub side_store_retention: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            base_ttl_days: ttl::BASE_TTL_DAYS,
            min_ttl_days: ttl::MIN_TTL_DAYS,
            max_ttl_days: ttl::MAX_TTL_DAYS,
            side_store_retention: Duration::from_secs(3600),
        }
    }
}

/// A document selected for ingestion, pre-classification.
pub struct IngestionCandidate {
    pub title: String,
    pub content: String,
    pub source_url: String,
    pub technology: Option<String>,
    pub version: Option<String>,
    pub source_tag: String,
}

/// Classifies document type from title+content heuristics (spec §4.8 step
/// 1) into one of the enumerated kinds.
pub fn classify_document(title: &str, content: &str) -> DocumentType {
    let haystack = format!("{} {}", title, content).to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| haystack.contains(w));

    if has_any(&["getting started", "quick start", "quickstart"]) {
        DocumentType::GettingStarted
    } else if has_any(&["installation", "install guide", "how to install"]) {
        DocumentType::Installation
    } else if has_any(&["changelog", "release notes", "what's new"]) {
        DocumentType::Changelog
    } else if has_any(&["api reference", "api docs", "endpoint"]) {
        DocumentType::Api
    } else if has_any(&["tutorial", "walkthrough", "step by step", "step-by-step"]) {
        DocumentType::Tutorial
    } else if has_any(&["reference"]) {
        DocumentType::Reference
    } else if has_any(&["guide"]) {
        DocumentType::Guide
    } else if has_any(&["blog", "opinion"]) {
        DocumentType::Blog
    } else if has_any(&["breaking news", "announcement"]) {
        DocumentType::News
    } else {
        DocumentType::Other
    }
}

/// Scans title+content for the content-maturity words that drive
/// `ttl::content_multiplier` (spec §4.8 step 2).
fn extract_content_markers(title: &str, content: &str) -> Vec<String> {
    const MARKERS: &[&str] = &[
        "deprecated",
        "legacy",
        "stable",
        "production",
        "recommended",
        "alpha",
        "beta",
        "preview",
        "comprehensive",
        "detailed",
    ];
    let haystack = format!("{} {}", title, content).to_lowercase();
    MARKERS
        .iter()
        .filter(|marker| haystack.contains(*marker))
        .map(|marker| marker.to_string())
        .collect()
}

fn extract_version(content: &str) -> Option<String> {
    let re = Regex::new(r"\bv?(\d+\.\d+(?:\.\d+)?)\b").ok()?;
    re.captures(content).map(|c| c[1].to_string())
}

fn extract_owner(source_url: &str) -> Option<String> {
    let re = Regex::new(r"github\.com/([\w\-]+)/").ok()?;
    re.captures(source_url).map(|c| c[1].to_string())
}

fn quality_indicators(content: &str) -> QualityIndicators {
    let has_code = content.contains("```") || content.contains("<code>");
    let link_count = content.matches("http").count() as u32;
    let word_count = content.split_whitespace().count() as u32;
    let header_count = content.lines().filter(|l| l.trim_start().starts_with('#')).count() as u32;
    QualityIndicators {
        has_code,
        link_count,
        word_count,
        header_count,
    }
}

fn derive_content_id(source_url: &str) -> ContentId {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    hex::encode(hasher.finalize())
}

fn estimate_quality(indicators: &QualityIndicators) -> f64 {
    let mut score: f64 = 0.5;
    if indicators.has_code {
        score += 0.2;
    }
    if indicators.header_count >= 2 {
        score += 0.1;
    }
    if indicators.word_count > 300 {
        score += 0.1;
    }
    if indicators.link_count > 20 {
        score -= 0.1;
    }
    score.clamp(0.0, 1.0)
}

/// The short-lived side store holding full content keyed in parallel with
/// the metadata record, pending pickup by the external indexing pipeline
/// (spec §4.8 step 4).
pub struct SideStore {
    entries: RwLock<HashMap<ContentId, (String, Instant)>>,
    retention: Duration,
}

impl SideStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub async fn put(&self, content_id: ContentId, content: String) {
        self.entries.write().await.insert(content_id, (content, Instant::now()));
    }

    pub async fn get(&self, content_id: &ContentId) -> Option<String> {
        let guard = self.entries.read().await;
        guard.get(content_id).and_then(|(content, stored_at)| {
            if stored_at.elapsed() < self.retention {
                Some(content.clone())
            } else {
                None
            }
        })
    }
}

pub struct IngestionPath {
    config: IngestionConfig,
    side_store: SideStore,
    metadata: RwLock<HashMap<ContentId, TTLDocument>>,
}

impl IngestionPath {
    pub fn new(config: IngestionConfig) -> Self {
        let side_store = SideStore::new(config.side_store_retention);
        Self {
            config,
            side_store,
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// Runs steps 1-4 of spec §4.8 for one candidate: classify, compute
    /// TTL, extract metadata, persist metadata + side-store content.
    pub async fn ingest_one(&self, candidate: IngestionCandidate) -> TTLDocument {
        let doc_type = classify_document(&candidate.title, &candidate.content);
        let version = candidate.version.or_else(|| extract_version(&candidate.content));
        let owner = extract_owner(&candidate.source_url);
        let indicators = quality_indicators(&candidate.content);
        let quality = estimate_quality(&indicators);
        let content_markers = extract_content_markers(&candidate.title, &candidate.content);

        let ttl_days = ttl::compute_ttl_days(
            candidate.technology.as_deref(),
            doc_type,
            &content_markers,
            version.as_deref(),
            quality,
            self.config.base_ttl_days,
            self.config.min_ttl_days,
            self.config.max_ttl_days,
        );

        let content_id = derive_content_id(&candidate.source_url);
        let now = Utc::now();
        let document = TTLDocument {
            content_id: content_id.clone(),
            content: candidate.content.clone(),
            source_url: candidate.source_url,
            technology: candidate.technology,
            owner,
            version,
            document_type: doc_type,
            ttl_days,
            created_at: now,
            expires_at: now + chrono::Duration::days(ttl_days.ceil() as i64),
            source_provider: candidate.source_tag.clone(),
            quality: indicators,
            status: format!("pending_{}", candidate.source_tag),
        };

        self.metadata.write().await.insert(content_id.clone(), document.clone());
        self.side_store.put(content_id, candidate.content).await;
        document
    }

    /// Runs ingestion for a batch and returns the status record required
    /// by spec §4.8 step 5.
    pub async fn ingest(
        &self,
        candidates: Vec<IngestionCandidate>,
        kind: IngestionKind,
        source_tag: &str,
        trace_id: &str,
    ) -> IngestionStatus {
        let start = Instant::now();
        let mut ingested = 0u32;
        let mut first_error = None;

        for candidate in candidates {
            let label = candidate.source_tag.clone();
            match self.try_ingest_one(candidate).await {
                Ok(_) => ingested += 1,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(format!("{}: {}", label, e));
                    }
                }
            }
        }

        let status = IngestionStatus {
            success: first_error.is_none(),
            ingested_count: ingested,
            duration_ms: start.elapsed().as_millis() as u64,
            source_tag: source_tag.to_string(),
            kind,
            error: first_error,
        };

        emit_event(
            "ingestion",
            start.elapsed(),
            trace_id,
            &[
                ("ingested_count", &status.ingested_count.to_string()),
                ("success", &status.success.to_string()),
            ],
        );

        status
    }

    async fn try_ingest_one(&self, candidate: IngestionCandidate) -> Result<TTLDocument, String> {
        if candidate.content.trim().is_empty() {
            return Err("empty content".to_string());
        }
        Ok(self.ingest_one(candidate).await)
    }

    /// Query interface for the external cleanup job runner to enumerate
    /// expired documents (spec §4.8: "core exposes the query interface").
    pub async fn expired_documents(&self) -> Vec<ContentId> {
        let now = Utc::now();
        self.metadata
            .read()
            .await
            .values()
            .filter(|doc| doc.expires_at <= now)
            .map(|doc| doc.content_id.clone())
            .collect()
    }

    pub async fn get_content(&self, content_id: &ContentId) -> Option<String> {
        self.side_store.get(content_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, content: &str, source_tag: &str) -> IngestionCandidate {
        IngestionCandidate {
            title: title.to_string(),
            content: content.to_string(),
            source_url: format!("https://github.com/example/{}", title),
            technology: Some("rust".to_string()),
            version: None,
            source_tag: source_tag.to_string(),
        }
    }

    #[test]
    fn classifies_tutorial_by_title() {
        assert_eq!(
            classify_document("Step by step tutorial", "content"),
            DocumentType::Tutorial
        );
    }

    #[tokio::test]
    async fn ingest_persists_metadata_and_content() {
        let path = IngestionPath::new(IngestionConfig::default());
        let doc = path
            .ingest_one(candidate("API Reference", "## Endpoints\n```rust\nfn main() {}\n```", "context7"))
            .await;
        assert_eq!(doc.status, "pending_context7");
        let stored = path.get_content(&doc.content_id).await;
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn batch_ingest_reports_count_and_success() {
        let path = IngestionPath::new(IngestionConfig::default());
        let candidates = vec![
            candidate("Guide One", "some guide content here", "context7"),
            candidate("Guide Two", "more guide content here", "context7"),
        ];
        let status = path
            .ingest(candidates, IngestionKind::Synchronous, "context7", "trace-1")
            .await;
        assert!(status.success);
        assert_eq!(status.ingested_count, 2);
        assert_eq!(status.kind, IngestionKind::Synchronous);
    }

    #[tokio::test]
    async fn deprecated_content_marker_shortens_persisted_ttl() {
        let path = IngestionPath::new(IngestionConfig::default());
        let fresh = path
            .ingest_one(candidate("Guide", "some guide content here", "context7"))
            .await;
        let stale = path
            .ingest_one(candidate(
                "Guide (deprecated)",
                "this approach is deprecated, use the new one",
                "context7",
            ))
            .await;
        assert!(stale.ttl_days < fresh.ttl_days);
    }

    #[tokio::test]
    async fn every_persisted_document_respects_ttl_bounds() {
        let path = IngestionPath::new(IngestionConfig::default());
        let doc = path
            .ingest_one(candidate("Blog Post", "short opinion blog piece", "web"))
            .await;
        assert!(doc.ttl_days >= ttl::MIN_TTL_DAYS && doc.ttl_days <= ttl::MAX_TTL_DAYS);
    }
}
