//! The Normaliser. Accepts (raw-text, target-schema) and returns a
//! normalised value or raises [`NormaliserError`]. Repair strategies are
//! applied in order, each at most once; every repair is logged for
//! observability.

use crate::agent::backend::{AgentBackend, Turn, TurnRole};
use crate::errors::NormaliserError;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::debug;

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?```").unwrap());

/// One repair attempt's outcome, kept for the observability log.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairLogEntry {
    pub strategy: &'static str,
    pub applied: bool,
    pub detail: String,
}

/// The result of normalising raw agent output against a target schema.
#[derive(Debug, Clone)]
pub struct NormalisedOutput {
    pub value: Value,
    pub repairs: Vec<RepairLogEntry>,
}

/// A target schema the Normaliser coerces output towards. `required_fields`
/// and `optional_field_defaults` drive the default-insertion repair;
/// `max_field_chars` drives the truncation repair.
pub struct TargetSchema {
    pub name: &'static str,
    pub required_fields: Vec<&'static str>,
    pub optional_field_defaults: Vec<(&'static str, Value)>,
    pub max_field_chars: Vec<(&'static str, usize)>,
}

/// Extracts the outermost JSON object or array from raw text, stripping
/// common code-fence wrapping. This is the first repair strategy tried.
fn extract_json(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(value);
    }
    if let Some(captures) = CODE_FENCE_RE.captures(raw) {
        if let Some(fenced) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(fenced.as_str().trim()) {
                return Some(value);
            }
        }
    }
    let stripped = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Some(value);
    }
    let start = stripped.find(['{', '['])?;
    let open = stripped.as_bytes()[start];
    let close = if open == b'{' { b'}' } else { b']' };
    let mut depth = 0i32;
    for (i, byte) in stripped.as_bytes()[start..].iter().enumerate() {
        if *byte == open {
            depth += 1;
        } else if *byte == close {
            depth -= 1;
            if depth == 0 {
                let candidate = &stripped[start..start + i + 1];
                if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Coerces string↔list and numeric-string fields toward what JSON would
/// naturally hold for a schema field. Operates on an already-parsed value.
fn coerce_types(value: &mut Value, schema: &TargetSchema) -> bool {
    let mut changed = false;
    if let Value::Object(map) = value {
        for field in &schema.required_fields {
            if let Some(v) = map.get_mut(*field) {
                if let Value::String(s) = v {
                    if let Ok(n) = s.parse::<f64>() {
                        if s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
                            *v = serde_json::json!(n);
                            changed = true;
                        }
                    }
                }
            }
        }
    }
    changed
}

fn insert_defaults(value: &mut Value, schema: &TargetSchema) -> bool {
    let mut changed = false;
    if let Value::Object(map) = value {
        for (field, default) in &schema.optional_field_defaults {
            if !map.contains_key(*field) {
                map.insert((*field).to_string(), default.clone());
                changed = true;
            }
        }
    }
    changed
}

/// Repairs oversized fields: more than double the limit invokes the
/// summariser role; anything less is hard-truncated at a sentence
/// boundary. Falls back to hard truncation if the summariser call fails.
async fn truncate_long_fields(summariser: &dyn AgentBackend, value: &mut Value, schema: &TargetSchema) -> bool {
    let mut changed = false;
    if let Value::Object(map) = value {
        for (field, limit) in &schema.max_field_chars {
            if let Some(Value::String(s)) = map.get_mut(*field) {
                let len = s.chars().count();
                if len > *limit {
                    let repaired = if len > limit.saturating_mul(2) {
                        match summarise_field(summariser, s, *limit).await {
                            Some(summary) => summary,
                            None => hard_truncate_at_sentence_boundary(s, *limit),
                        }
                    } else {
                        hard_truncate_at_sentence_boundary(s, *limit)
                    };
                    *s = repaired;
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Asks the summariser role to compress `text` to fit `limit`, returning
/// `None` if the call fails so the caller can fall back to truncation.
async fn summarise_field(summariser: &dyn AgentBackend, text: &str, limit: usize) -> Option<String> {
    let prompt = vec![Turn {
        role: TurnRole::User,
        content: format!("Summarize the following in under {limit} characters, preserving the key point:\n\n{text}"),
    }];
    let output = summariser.invoke(&prompt).await.ok()?;
    Some(output.text.chars().take(limit).collect())
}

/// Hard-truncates at a sentence boundary if one exists within the limit,
/// otherwise at a word boundary, otherwise at the raw char limit.
fn hard_truncate_at_sentence_boundary(s: &str, limit: usize) -> String {
    let truncated: String = s.chars().take(limit).collect();
    if let Some(pos) = truncated.rfind(['.', '!', '?']) {
        if pos > limit / 2 {
            return truncated[..=pos].to_string();
        }
    }
    if let Some(pos) = truncated.rfind(' ') {
        if pos > limit / 2 {
            return truncated[..pos].to_string();
        }
    }
    truncated
}

fn dedup_list_fields(value: &mut Value) -> bool {
    let mut changed = false;
    if let Value::Object(map) = value {
        for (_key, v) in map.iter_mut() {
            if let Value::Array(items) = v {
                let mut seen = std::collections::HashSet::new();
                let before = items.len();
                items.retain(|item| seen.insert(item.to_string()));
                if items.len() != before {
                    changed = true;
                }
            }
        }
    }
    changed
}

fn has_required_fields(value: &Value, schema: &TargetSchema) -> bool {
    let Value::Object(map) = value else {
        return schema.required_fields.is_empty();
    };
    schema.required_fields.iter().all(|f| map.contains_key(*f))
}

/// Normalises raw agent output against a schema, trying repair strategies
/// in a fixed order, each at most once. Holds a summariser backend for the
/// length-truncation repair's `>2x limit` branch.
pub struct Normaliser {
    summariser: Arc<dyn AgentBackend>,
}

impl Normaliser {
    pub fn new(summariser: Arc<dyn AgentBackend>) -> Self {
        Self { summariser }
    }

    pub async fn normalise(&self, raw: &str, schema: &TargetSchema) -> Result<NormalisedOutput, NormaliserError> {
        let mut repairs = Vec::new();

        let Some(mut value) = extract_json(raw) else {
            repairs.push(RepairLogEntry {
                strategy: "json_extraction",
                applied: false,
                detail: "no JSON object or array could be extracted".into(),
            });
            return Err(NormaliserError {
                schema: schema.name.into(),
                attempted: repairs.iter().map(|r| r.strategy.to_string()).collect(),
                reason: "raw output did not contain parseable JSON".into(),
            });
        };
        repairs.push(RepairLogEntry {
            strategy: "json_extraction",
            applied: true,
            detail: "parsed JSON value from raw output".into(),
        });
        debug!(strategy = "json_extraction", "normaliser repair applied");

        if coerce_types(&mut value, schema) {
            repairs.push(RepairLogEntry {
                strategy: "type_coercion",
                applied: true,
                detail: "coerced numeric-looking strings to numbers".into(),
            });
            debug!(strategy = "type_coercion", "normaliser repair applied");
        }

        if insert_defaults(&mut value, schema) {
            repairs.push(RepairLogEntry {
                strategy: "default_insertion",
                applied: true,
                detail: "populated missing optional fields with defaults".into(),
            });
            debug!(strategy = "default_insertion", "normaliser repair applied");
        }

        if truncate_long_fields(self.summariser.as_ref(), &mut value, schema).await {
            repairs.push(RepairLogEntry {
                strategy: "length_truncation",
                applied: true,
                detail: "summarised or hard-truncated oversized fields to fit the schema limit".into(),
            });
            debug!(strategy = "length_truncation", "normaliser repair applied");
        }

        if dedup_list_fields(&mut value) {
            repairs.push(RepairLogEntry {
                strategy: "field_deduplication",
                applied: true,
                detail: "removed duplicate list entries".into(),
            });
            debug!(strategy = "field_deduplication", "normaliser repair applied");
        }

        if !has_required_fields(&value, schema) {
            return Err(NormaliserError {
                schema: schema.name.into(),
                attempted: repairs.iter().map(|r| r.strategy.to_string()).collect(),
                reason: format!("missing required fields after repair: {:?}", schema.required_fields),
            });
        }

        Ok(NormalisedOutput { value, repairs })
    }
}
