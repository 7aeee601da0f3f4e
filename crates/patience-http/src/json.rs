//! Tolerant JSON body extraction.
//!
//! Output is rarely a bare JSON document: it's usually interleaved with
//! curl's progress meter, shell prompts, or log lines. This module hunts
//! for the first balanced `{ ... }` substring rather than assuming the
//! whole text parses.

use std::time::Duration;

use serde_json::Value;

/// Hints extracted from a JSON response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonHints {
    /// Top-level or `rate_limit.limit`.
    pub limit: Option<u64>,
    /// Top-level or `rate_limit.remaining`.
    pub remaining: Option<u64>,
    /// `retry_after` / `retry_after_seconds` / `error.retry_after`.
    pub retry_after: Option<Duration>,
}

/// Finds the first balanced, quote-aware `{ ... }` substring in `text`.
fn find_first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return text.get(start..end);
                }
            }
            _ => {}
        }
    }
    None
}

fn as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_f64().map(|f| f.max(0.0) as u64))
}

fn as_duration_seconds(value: &Value) -> Option<Duration> {
    as_u64(value).map(Duration::from_secs)
}

/// Extracts rate-limit hints from the first JSON object found in `text`.
pub fn extract_json(text: &str) -> JsonHints {
    let mut hints = JsonHints::default();

    let Some(candidate) = find_first_json_object(text) else {
        return hints;
    };
    let Ok(value) = serde_json::from_str::<Value>(candidate) else {
        return hints;
    };

    hints.limit = value.get("limit").and_then(as_u64).or_else(|| {
        value.get("rate_limit").and_then(|rl| rl.get("limit")).and_then(as_u64)
    });
    hints.remaining = value.get("remaining").and_then(as_u64).or_else(|| {
        value.get("rate_limit").and_then(|rl| rl.get("remaining")).and_then(as_u64)
    });
    hints.retry_after = value
        .get("retry_after")
        .and_then(as_duration_seconds)
        .or_else(|| value.get("retry_after_seconds").and_then(as_duration_seconds))
        .or_else(|| value.get("error").and_then(|e| e.get("retry_after")).and_then(as_duration_seconds));

    hints
}
