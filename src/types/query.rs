//! NormalizedQuery (spec §3).

use serde::{Deserialize, Serialize};

/// Produced once by the normalizer (C3) and consumed by every downstream
/// stage. Invariant: identical `normalized_text` + `technology_hint` always
/// yields identical `fingerprint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub original_text: String,
    pub normalized_text: String,
    pub fingerprint: String,
    pub technology_hint: Option<String>,
    pub tokens: Vec<String>,
}
