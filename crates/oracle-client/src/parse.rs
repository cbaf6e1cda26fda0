//! Boundary validation for untyped oracle output.
//!
//! Models answer in prose-wrapped JSON more often than not: fenced
//! code blocks, leading commentary, trailing notes. These helpers
//! strip the wrapping and extract the first JSON payload; anything
//! that still fails to parse is rejected so the caller can fall
//! through to the next tier.

use serde_json::Value;

/// Remove Markdown code fences (```json ... ```), keeping the body.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    trimmed
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse the text as a JSON object, falling back to the outermost
/// `{...}` span embedded in mixed content.
pub fn extract_object(text: &str) -> Option<Value> {
    let cleaned = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        if value.is_object() {
            return Some(value);
        }
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&cleaned[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// Parse the text as a JSON array, falling back to the outermost
/// `[...]` span embedded in mixed content.
pub fn extract_array(text: &str) -> Option<Value> {
    let cleaned = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        if value.is_array() {
            return Some(value);
        }
    }
    let start = cleaned.find('[')?;
    let end = cleaned.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&cleaned[start..=end])
        .ok()
        .filter(Value::is_array)
}

/// Collect an array of strings, dropping non-string entries.
pub fn string_array(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        let fenced = "```json\n[\"#a\", \"#b\"]\n```";
        assert_eq!(strip_code_fences(fenced), "[\"#a\", \"#b\"]");
        assert_eq!(strip_code_fences("  plain "), "plain");
    }

    #[test]
    fn extracts_embedded_object() {
        let mixed = "Sure! Here is the plan:\n{\"selector\": \".x\", \"priority\": 1}\nHope it helps.";
        let value = extract_object(mixed).unwrap();
        assert_eq!(value["selector"], ".x");
    }

    #[test]
    fn extracts_embedded_array() {
        let mixed = "The selectors are [\"#buy\", \".checkout-btn\"] as requested.";
        let value = extract_array(mixed).unwrap();
        assert_eq!(string_array(&value), vec!["#buy", ".checkout-btn"]);
    }

    #[test]
    fn rejects_non_json() {
        assert!(extract_object("no braces here").is_none());
        assert!(extract_array("not a list").is_none());
        assert!(extract_object("{broken").is_none());
    }

    #[test]
    fn string_array_drops_non_strings() {
        let value: Value = serde_json::from_str("[\"#a\", 7, null, \"#b\"]").unwrap();
        assert_eq!(string_array(&value), vec!["#a", "#b"]);
    }
}
