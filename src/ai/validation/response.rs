//! Response Validation
//!
//! Normalizes whatever the analysis service returned into a canonical result.
//!
//! ## Payload Location
//! The evaluation object may arrive as:
//! - A parsed JSON object
//! - A JSON string, possibly fenced or wrapped in prose
//! - A provider envelope (`choices[0].message.content`, `content[0].text`,
//!   `candidates[0].content.parts[0].text`, or a `result`/`data`/`response`/
//!   `output` field), unwrapped up to a fixed depth
//!
//! ## Guarantees
//! Validation is total: any input yields a `Validation`. Unusable responses
//! come back as `Recovered` with a zero result and the reason, so callers
//! always have something to aggregate.

use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use super::json_repair::JsonRepairer;
use crate::constants::validation::{MAX_ACCURACY, MAX_SUGGESTIONS, MAX_UNWRAP_DEPTH};

static BLOCK_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*blockquote\b").unwrap());

/// Envelope fields that may hold the payload directly
const WRAPPER_FIELDS: [&str; 4] = ["result", "data", "response", "output"];

// =============================================================================
// Canonical Result
// =============================================================================

/// Validated evaluation of one prompt or chunk.
///
/// Only the validator constructs non-zero values, so holding one means the
/// invariants below hold:
/// - `accuracy` is within 0..=100
/// - at most three suggestions, all non-empty and distinct
/// - `reword` is trimmed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalResult {
    accuracy: u8,
    suggestions: Vec<String>,
    reword: String,
}

impl CanonicalResult {
    /// Result used when a response had to be discarded
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn accuracy(&self) -> u8 {
        self.accuracy
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn reword(&self) -> &str {
        &self.reword
    }

    /// Lowercase canonical JSON form; validating it yields `self` again
    pub fn to_value(&self) -> Value {
        json!({
            "accuracy": self.accuracy,
            "suggestions": self.suggestions,
            "reword": self.reword,
        })
    }
}

// =============================================================================
// Validation Outcome
// =============================================================================

/// Why a response was replaced by the zero result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryReason {
    /// Payload contained block-quote markup
    BlockQuote,
    /// No string-typed rewording
    MissingReword,
    /// Anything else structurally wrong
    Malformed(String),
}

impl fmt::Display for RecoveryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryReason::BlockQuote => write!(f, "response contains block-quote markup"),
            RecoveryReason::MissingReword => write!(f, "response has no string reword"),
            RecoveryReason::Malformed(detail) => write!(f, "malformed response: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Canonical(CanonicalResult),
    Recovered {
        result: CanonicalResult,
        reason: RecoveryReason,
    },
}

impl Validation {
    fn recovered(reason: RecoveryReason) -> Self {
        Validation::Recovered {
            result: CanonicalResult::zero(),
            reason,
        }
    }

    pub fn result(&self) -> &CanonicalResult {
        match self {
            Validation::Canonical(result) | Validation::Recovered { result, .. } => result,
        }
    }

    pub fn into_result(self) -> CanonicalResult {
        match self {
            Validation::Canonical(result) | Validation::Recovered { result, .. } => result,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Validation::Recovered { .. })
    }

    pub fn reason(&self) -> Option<&RecoveryReason> {
        match self {
            Validation::Canonical(_) => None,
            Validation::Recovered { reason, .. } => Some(reason),
        }
    }
}

// =============================================================================
// Validator
// =============================================================================

/// Validate a raw service response with the default validator
pub fn validate(raw: &Value) -> Validation {
    ResponseValidator::new().validate(raw)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseValidator {
    repairer: JsonRepairer,
}

impl ResponseValidator {
    pub fn new() -> Self {
        Self {
            repairer: JsonRepairer::new(),
        }
    }

    pub fn validate(&self, raw: &Value) -> Validation {
        if contains_block_quote(raw) {
            return Validation::recovered(RecoveryReason::BlockQuote);
        }

        let payload = match self.locate(raw, 0) {
            Ok(payload) => payload,
            Err(detail) => return Validation::recovered(RecoveryReason::Malformed(detail)),
        };

        let reword = match lookup(&payload, "Optimization", "Reword", "reword") {
            Some(Value::String(reword)) => reword.trim().to_string(),
            _ => return Validation::recovered(RecoveryReason::MissingReword),
        };

        let accuracy = lookup(&payload, "Evaluation", "Accuracy", "accuracy")
            .map(parse_accuracy)
            .unwrap_or(0);

        let suggestions = match lookup(&payload, "Evaluation", "Suggestions", "suggestions") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => normalize_suggestions(items),
            Some(other) => {
                return Validation::recovered(RecoveryReason::Malformed(format!(
                    "suggestions must be an array, got {}",
                    type_name(other)
                )));
            }
        };

        Validation::Canonical(CanonicalResult {
            accuracy,
            suggestions,
            reword,
        })
    }

    /// Find the evaluation object inside `value`
    fn locate(&self, value: &Value, depth: usize) -> Result<Map<String, Value>, String> {
        if depth > MAX_UNWRAP_DEPTH {
            return Err("response nested too deeply".to_string());
        }

        match value {
            Value::Object(map) => {
                if is_payload(map) {
                    return Ok(map.clone());
                }
                match envelope_inner(map) {
                    Some(inner) => self.locate(inner, depth + 1),
                    None => Err("object has no evaluation fields".to_string()),
                }
            }
            Value::String(text) => match self.repairer.parse_or_repair(text) {
                Some((parsed, _)) if !parsed.is_string() => self.locate(&parsed, depth + 1),
                _ => Err("text holds no JSON object".to_string()),
            },
            other => Err(format!("expected object or string, got {}", type_name(other))),
        }
    }
}

fn contains_block_quote(raw: &Value) -> bool {
    match raw {
        Value::String(text) => BLOCK_QUOTE.is_match(text),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
        other => BLOCK_QUOTE.is_match(&other.to_string()),
    }
}

fn is_payload(map: &Map<String, Value>) -> bool {
    ["Evaluation", "Optimization", "accuracy", "suggestions", "reword"]
        .iter()
        .any(|key| map.contains_key(*key))
}

/// Inner value of a known provider envelope
fn envelope_inner(map: &Map<String, Value>) -> Option<&Value> {
    let openai = map
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"));
    let anthropic = map
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("text"));
    let gemini = map
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"));

    openai
        .or(anthropic)
        .or(gemini)
        .or_else(|| WRAPPER_FIELDS.iter().find_map(|key| map.get(*key)))
}

/// Read `outer.inner`, falling back to the lowercase canonical `flat` key
fn lookup<'a>(
    payload: &'a Map<String, Value>,
    outer: &str,
    inner: &str,
    flat: &str,
) -> Option<&'a Value> {
    payload
        .get(outer)
        .and_then(|section| section.get(inner))
        .or_else(|| payload.get(flat))
}

fn parse_accuracy(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };

    match raw {
        // f64::round rounds half away from zero
        Some(n) if n.is_finite() => n.clamp(0.0, f64::from(MAX_ACCURACY)).round() as u8,
        _ => 0,
    }
}

fn normalize_suggestions(items: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .take(MAX_SUGGESTIONS)
        .filter_map(|item| item.as_str())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
