//! TTL computation (spec §4.8 step 2); reference multiplier directions
//! confirmed against `examples/original_source/test_context7_ttl_final_verification.py`
//! `_calculate_mock_ttl` (fast-moving frameworks ×0.8, api/reference pulled
//! short, tutorial/guide pulled long, blog/news pulled very short).

use crate::types::DocumentType;

pub const BASE_TTL_DAYS: f64 = 30.0;
pub const MIN_TTL_DAYS: f64 = 1.0;
pub const MAX_TTL_DAYS: f64 = 90.0;

/// Fast-moving frameworks churn docs quickly and need a shorter TTL;
/// stable standards tolerate a longer one.
pub fn tech_multiplier(technology: Option<&str>) -> f64 {
    match technology.map(|t| t.to_lowercase()) {
        Some(t) if ["react", "next.js", "nextjs", "vue", "angular"].contains(&t.as_str()) => 0.8,
        Some(t) if ["html", "css", "http", "json", "sql"].contains(&t.as_str()) => 1.3,
        _ => 1.0,
    }
}

pub fn type_multiplier(doc_type: DocumentType) -> f64 {
    match doc_type {
        DocumentType::Reference | DocumentType::Api => 0.6,
        DocumentType::Guide => 1.0,
        DocumentType::Tutorial | DocumentType::GettingStarted | DocumentType::Installation => 1.4,
        DocumentType::Changelog => 0.5,
        DocumentType::Blog | DocumentType::News => 0.2,
        DocumentType::Other => 1.0,
    }
}

/// 0.5 if {deprecated, legacy}; 1.5 if {stable, production, recommended};
/// 0.7 if {alpha, beta, preview}; 1.2 if {comprehensive, detailed}; else 1.0.
pub fn content_multiplier(markers: &[String]) -> f64 {
    let lower: Vec<String> = markers.iter().map(|m| m.to_lowercase()).collect();
    let has = |words: &[&str]| lower.iter().any(|m| words.contains(&m.as_str()));

    if has(&["deprecated", "legacy"]) {
        0.5
    } else if has(&["stable", "production", "recommended"]) {
        1.5
    } else if has(&["alpha", "beta", "preview"]) {
        0.7
    } else if has(&["comprehensive", "detailed"]) {
        1.2
    } else {
        1.0
    }
}

/// 1.3 for {latest, stable}; 0.6 for {alpha, beta, rc}; 1.2 for major
/// version >= 3.
pub fn version_multiplier(version: Option<&str>) -> f64 {
    let Some(v) = version else { return 1.0 };
    let lower = v.to_lowercase();
    if lower == "latest" || lower == "stable" {
        return 1.3;
    }
    if ["alpha", "beta", "rc"].iter().any(|marker| lower.contains(marker)) {
        return 0.6;
    }
    if let Some(major) = parse_major_version(&lower) {
        if major >= 3 {
            return 1.2;
        }
    }
    1.0
}

fn parse_major_version(version: &str) -> Option<u32> {
    let digits: String = version
        .trim_start_matches('v')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// 1.2 if quality > 0.9, 0.7 if quality < 0.5, else 1.0.
pub fn quality_multiplier(quality: f64) -> f64 {
    if quality > 0.9 {
        1.2
    } else if quality < 0.5 {
        0.7
    } else {
        1.0
    }
}

/// `base_ttl × tech × type × content × version × quality`, clamped to
/// `[min_ttl_days, max_ttl_days]` (spec §4.8 step 2, §8 invariant).
#[allow(clippy::too_many_arguments)]
pub fn compute_ttl_days(
    technology: Option<&str>,
    doc_type: DocumentType,
    content_markers: &[String],
    version: Option<&str>,
    quality: f64,
    base_ttl: f64,
    min_ttl: f64,
    max_ttl: f64,
) -> f64 {
    let ttl = base_ttl
        * tech_multiplier(technology)
        * type_multiplier(doc_type)
        * content_multiplier(content_markers)
        * version_multiplier(version)
        * quality_multiplier(quality);
    ttl.clamp(min_ttl, max_ttl)
}
