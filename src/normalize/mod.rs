//! Query Normalizer (C3), spec §3, §4.7 stage 1.

use sha2::{Digest, Sha256};

use crate::types::{CacheError, CacheResult, NormalizedQuery};

const MIN_LEN: usize = 2;
const MAX_LEN: usize = 256;

/// `[\w\s\-\.,:;!?()'/@#&]` per spec §6.
fn is_permitted_char(c: char) -> bool {
    c.is_alphanumeric()
        || c == '_'
        || c.is_whitespace()
        || "-.,:;!?()'/@#&".contains(c)
}

/// Rejects malformed input per spec §4.7 stage 1: empty, length outside
/// [2, 256], or characters outside the permitted class.
pub fn validate(raw: &str) -> CacheResult<()> {
    let len = raw.chars().count();
    if len < MIN_LEN || len > MAX_LEN {
        return Err(CacheError::Validation(format!(
            "query length {} outside permitted range [{}, {}]",
            len, MIN_LEN, MAX_LEN
        )));
    }
    if let Some(bad) = raw.chars().find(|c| !is_permitted_char(*c)) {
        return Err(CacheError::Validation(format!(
            "query contains disallowed character {:?}",
            bad
        )));
    }
    Ok(())
}

/// Lowercase, trim, collapse internal whitespace, and apply a light suffix
/// stem (plural/gerund trimming): fingerprint stability only needs a
/// deterministic stem, not a full Porter stemmer.
pub fn normalize_text(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .split(' ')
        .map(stem_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn stem_word(word: &str) -> String {
    if let Some(stripped) = word.strip_suffix("ing") {
        if stripped.len() >= 3 {
            return stripped.to_string();
        }
    }
    if let Some(stripped) = word.strip_suffix("ies") {
        if stripped.len() >= 2 {
            return format!("{}y", stripped);
        }
    }
    if let Some(stripped) = word.strip_suffix("es") {
        if stripped.len() >= 3 {
            return stripped.to_string();
        }
    }
    if let Some(stripped) = word.strip_suffix('s') {
        if stripped.len() >= 3 && !word.ends_with("ss") {
            return stripped.to_string();
        }
    }
    word.to_string()
}

pub fn tokenize(normalized_text: &str) -> Vec<String> {
    normalized_text
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// SHA-256 over `normalized_text ‖ technology_hint` (GLOSSARY: Fingerprint).
/// Invariant: identical inputs always yield identical output.
pub fn fingerprint(normalized_text: &str, technology_hint: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_text.as_bytes());
    if let Some(hint) = technology_hint {
        hasher.update(hint.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Normalizes raw user input into a `NormalizedQuery`, validating first.
pub fn normalize(raw: &str, technology_hint: Option<&str>) -> CacheResult<NormalizedQuery> {
    validate(raw)?;
    let normalized_text = normalize_text(raw);
    let tokens = tokenize(&normalized_text);
    let fp = fingerprint(&normalized_text, technology_hint);
    Ok(NormalizedQuery {
        original_text: raw.to_string(),
        normalized_text,
        fingerprint: fp,
        technology_hint: technology_hint.map(|s| s.to_string()),
        tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_too_long() {
        assert!(validate("a").is_err());
        assert!(validate(&"a".repeat(257)).is_err());
        assert!(validate("ok").is_ok());
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert!(validate("react hooks <script>").is_err());
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_text("  React   Hooks Examples  ");
        let twice = normalize_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn same_text_and_hint_yield_same_fingerprint() {
        let a = normalize("react hooks", Some("react")).unwrap();
        let b = normalize("React Hooks", Some("react")).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn different_hint_yields_different_fingerprint() {
        let a = normalize("hooks", Some("react")).unwrap();
        let b = normalize("hooks", Some("vue")).unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
    }
}
