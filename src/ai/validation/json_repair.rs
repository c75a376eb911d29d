//! JSON Repair
//!
//! Recovers a JSON document from text-shaped service output.
//!
//! Handles the usual model output issues:
//! - Markdown code fence wrapping (```json ... ```)
//! - Trailing commas
//! - Missing closing braces/brackets from truncated output
//! - JSON embedded in explanatory prose

use serde_json::Value;
use tracing::debug;

/// JSON repair strategies, tried from least to most invasive
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRepairer;

impl JsonRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Parse JSON out of a model's text output.
    ///
    /// Returns the value and whether any repair was needed, or `None` when
    /// the text holds no recoverable JSON document.
    pub fn parse_or_repair(&self, raw: &str) -> Option<(Value, bool)> {
        let cleaned = preprocess(raw);
        if cleaned.is_empty() {
            return None;
        }

        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Some((value, false));
        }

        let repaired = balance_brackets(&fix_trailing_commas(&cleaned));
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            debug!("JSON repaired (trailing commas / unbalanced brackets)");
            return Some((value, true));
        }

        let embedded = extract_embedded(&cleaned)?;
        let value = serde_json::from_str::<Value>(&embedded)
            .or_else(|_| serde_json::from_str::<Value>(&fix_trailing_commas(&embedded)))
            .ok()?;
        debug!("JSON extracted from mixed content");
        Some((value, true))
    }
}

/// Trim, drop a BOM, and strip markdown code fences
fn preprocess(raw: &str) -> String {
    let mut s = raw.trim().trim_start_matches('\u{feff}').trim();

    if s.starts_with("```")
        && let Some(first_newline) = s.find('\n')
    {
        s = &s[first_newline + 1..];
        if let Some(stripped) = s.trim_end().strip_suffix("```") {
            s = stripped;
        }
    }

    s.trim().to_string()
}

/// Drop commas that directly precede `]` or `}` outside strings
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        result.push(ch);
    }

    result
}

/// Close an unterminated string and any unclosed containers, innermost first
fn balance_brackets(s: &str) -> String {
    let mut open: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => open.push('}'),
            '[' if !in_string => open.push(']'),
            '}' | ']' if !in_string => {
                open.pop();
            }
            _ => {}
        }
    }

    let mut result = s.to_string();
    if in_string {
        result.push('"');
    }
    while let Some(closer) = open.pop() {
        result.push(closer);
    }
    result
}

/// First balanced `{...}` or `[...]` span in mixed content
fn extract_embedded(s: &str) -> Option<String> {
    let start = s.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(s[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_json(content: &str) -> Option<(Value, bool)> {
        JsonRepairer::new().parse_or_repair(content)
    }

    #[test]
    fn test_parse_valid_json() {
        let (value, repaired) = extract_json(r#"{"key": "value"}"#).unwrap();
        assert!(!repaired);
        assert_eq!(value["key"], "value");
    }

    #[test]
    fn test_strip_code_fences() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        let (value, repaired) = extract_json(input).unwrap();
        assert!(!repaired);
        assert_eq!(value["key"], "value");
    }

    #[test]
    fn test_fix_trailing_comma() {
        let input = r#"{"Suggestions": ["a", "b",]}"#;
        let (value, repaired) = extract_json(input).unwrap();
        assert!(repaired);
        assert_eq!(value["Suggestions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_trailing_comma_inside_string_is_kept() {
        let input = r#"{"Reword": "a, ]", "x": 1,}"#;
        let (value, _) = extract_json(input).unwrap();
        assert_eq!(value["Reword"], "a, ]");
    }

    #[test]
    fn test_balance_truncated_output() {
        let input = r#"{"Evaluation": {"Accuracy": 80, "Suggestions": ["be specific"#;
        let (value, repaired) = extract_json(input).unwrap();
        assert!(repaired);
        assert_eq!(value["Evaluation"]["Suggestions"][0], "be specific");
    }

    #[test]
    fn test_extract_from_mixed() {
        let input = "Here is my evaluation:\n{\"Optimization\": {\"Reword\": \"Hi\"}}\nThanks!";
        let (value, repaired) = extract_json(input).unwrap();
        assert!(repaired);
        assert_eq!(value["Optimization"]["Reword"], "Hi");
    }

    #[test]
    fn test_plain_prose_yields_none() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("   ").is_none());
    }
}
