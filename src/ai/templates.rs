//! Prompt template rendering (spec §4.3).
//!
//! Rendering is pure: `render(template, vars)` always yields the same text
//! for the same inputs (spec §8 round-trip law). Complex values are
//! serialized as JSON into `{name}` slots.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::{CacheError, CacheResult, PromptTemplate};

/// Validates that every `required_variables` entry is present, then
/// substitutes `{name}` placeholders. Scalars render as their plain text;
/// complex values (objects/arrays) render as JSON.
pub fn render(template: &PromptTemplate, vars: &HashMap<String, Value>) -> CacheResult<String> {
    for required in &template.required_variables {
        if !vars.contains_key(required) {
            return Err(CacheError::Validation(format!(
                "prompt template {} missing required variable {}",
                template.template_id, required
            )));
        }
    }

    let mut text = template.template_text.clone();
    for (name, value) in vars {
        let placeholder = format!("{{{}}}", name);
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        text = text.replace(&placeholder, &rendered);
    }
    Ok(text)
}
