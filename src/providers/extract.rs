use regex::Regex;
use serde_json::Value;

/// Pull a JSON document out of a model response.
///
/// Providers are asked for strict JSON, but models routinely wrap the payload
/// in a markdown fence or surrounding prose. Extraction is attempted in order:
/// 1. the whole body parses as JSON
/// 2. a ```json fenced block parses
/// 3. the outermost `{...}` or `[...]` bracket span parses
///
/// The first parse that succeeds wins; `None` means no strategy produced JSON.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    if let Some(value) = extract_fenced(trimmed) {
        return Some(value);
    }
    extract_bracketed(trimmed)
}

fn extract_fenced(text: &str) -> Option<Value> {
    let re = Regex::new(r"(?s)```(?:json)?\s*(.+?)```").ok()?;
    for cap in re.captures_iter(text) {
        if let Some(inner) = cap.get(1) {
            if let Ok(value) = serde_json::from_str(inner.as_str().trim()) {
                return Some(value);
            }
        }
    }
    None
}

fn extract_bracketed(text: &str) -> Option<Value> {
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&text[start..=end]) {
                    return Some(value);
                }
            }
        }
    }
    None
}
