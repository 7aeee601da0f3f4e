//! Combines header and JSON extraction into a `RetryHint`.

use std::time::{Duration, Instant};

use patience_core::{FactSource, HintSource, RetryHint};

use crate::headers::extract_headers;
use crate::json::extract_json;
use crate::resource::identify_resource;

/// No more than this many bytes of combined stdout+stderr are analyzed, so
/// the parser never allocates proportional to a multi-megabyte capture.
pub const MAX_ANALYZED_BYTES: usize = 50 * 1024;

/// A conservative default delay used when no explicit hint is present but
/// the output strongly suggests a rate limit was hit.
const INFERRED_DELAY: Duration = Duration::from_secs(1);

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Extracts HTTP-aware retry hints from a captured attempt.
pub struct RetryHintParser {
    max_delay: Duration,
}

impl RetryHintParser {
    /// Builds a parser that clamps any derived delay to `max_delay`.
    pub fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }

    /// Parses `stdout`/`stderr` (only the first [`MAX_ANALYZED_BYTES`] of
    /// their concatenation) for retry hints.
    pub fn parse(&self, stdout: &str, stderr: &str, exit_code: i32, _argv: &[String]) -> RetryHint {
        let combined = format!("{stdout}\n{stderr}");
        let analyzed = truncate_at_char_boundary(&combined, MAX_ANALYZED_BYTES);

        let header_hints = extract_headers(analyzed);
        let json_hints = extract_json(analyzed);

        let mut hint = RetryHint::default();

        if let Some(delay) = header_hints.retry_after {
            hint.delay = Some(delay);
            hint.source = HintSource::ResponseHeader;
        } else if let Some(delay) = json_hints.retry_after {
            hint.delay = Some(delay);
            hint.source = HintSource::JsonBody;
        }

        hint.limit = header_hints.limit.or(json_hints.limit);
        hint.remaining = header_hints.remaining.or(json_hints.remaining);
        if hint.source == HintSource::None && (header_hints.limit.is_some() || header_hints.remaining.is_some()) {
            hint.source = HintSource::ResponseHeader;
        } else if hint.source == HintSource::None && (json_hints.limit.is_some() || json_hints.remaining.is_some()) {
            hint.source = HintSource::JsonBody;
        }

        if hint.delay.is_none() && hint.source == HintSource::None && looks_rate_limited(analyzed, exit_code) {
            hint.delay = Some(INFERRED_DELAY);
            hint.source = HintSource::Inferred;
        }

        if let Some(window_secs) = header_hints.window_seconds {
            hint.reset_at = Some(Instant::now() + Duration::from_secs(window_secs));
        }

        if let Some(delay) = hint.delay {
            hint.delay = Some(delay.min(self.max_delay));
        }

        hint
    }
}

fn looks_rate_limited(text: &str, exit_code: i32) -> bool {
    let text_lower = text.to_ascii_lowercase();
    text_lower.contains("429") || text_lower.contains("too many requests") || exit_code == 429
}

/// A discovery-store candidate distilled from one attempt's output, richer
/// than `RetryHint`.
#[derive(Debug, Clone)]
pub struct CandidateFact {
    /// Resource identifier from argv.
    pub resource_id: String,
    /// The observed limit, if advertised.
    pub limit: Option<u64>,
    /// The observed remaining quota, if advertised.
    pub remaining: Option<u64>,
    /// The observed window, if advertised.
    pub window: Option<Duration>,
    /// Source of the strongest signal found.
    pub source: FactSource,
    /// `true` if this observation looked like a 429.
    pub is_429: bool,
}

/// Builds a discovery-store candidate from a captured attempt, or `None` if
/// nothing rate-limit-shaped was found.
pub fn extract_candidate_fact(
    stdout: &str,
    stderr: &str,
    exit_code: i32,
    argv: &[String],
) -> Option<CandidateFact> {
    let combined = format!("{stdout}\n{stderr}");
    let analyzed = truncate_at_char_boundary(&combined, MAX_ANALYZED_BYTES);

    let header_hints = extract_headers(analyzed);
    let json_hints = extract_json(analyzed);
    let is_429 = looks_rate_limited(analyzed, exit_code);

    let limit = header_hints.limit.or(json_hints.limit);
    let remaining = header_hints.remaining.or(json_hints.remaining);
    let window = header_hints.window_seconds.map(Duration::from_secs);

    if limit.is_none() && remaining.is_none() && !is_429 && !header_hints.vendor_header_seen {
        return None;
    }

    let source = if header_hints.limit.is_some() || header_hints.remaining.is_some() || header_hints.vendor_header_seen
    {
        FactSource::HttpHeader
    } else if json_hints.limit.is_some() || json_hints.remaining.is_some() {
        FactSource::JsonBody
    } else {
        FactSource::Learned
    };

    Some(CandidateFact {
        resource_id: identify_resource(argv),
        limit,
        remaining,
        window,
        source,
        is_429,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_header_becomes_hint_delay() {
        let parser = RetryHintParser::new(Duration::from_secs(60));
        let hint = parser.parse(
            "HTTP/1.1 429 Too Many Requests\r\nRetry-After: 2\r\n\r\n",
            "",
            22,
            &["curl".to_string()],
        );
        assert_eq!(hint.delay, Some(Duration::from_secs(2)));
        assert_eq!(hint.source, HintSource::ResponseHeader);
    }

    #[test]
    fn delay_is_clamped_to_max_delay() {
        let parser = RetryHintParser::new(Duration::from_millis(500));
        let hint = parser.parse("Retry-After: 10\r\n", "", 1, &["curl".to_string()]);
        assert_eq!(hint.delay, Some(Duration::from_millis(500)));
    }

    #[test]
    fn falls_back_to_json_retry_after() {
        let parser = RetryHintParser::new(Duration::from_secs(60));
        let hint = parser.parse(r#"{"retry_after_seconds": 7}"#, "", 1, &["curl".to_string()]);
        assert_eq!(hint.delay, Some(Duration::from_secs(7)));
        assert_eq!(hint.source, HintSource::JsonBody);
    }

    #[test]
    fn no_signal_yields_none_source() {
        let parser = RetryHintParser::new(Duration::from_secs(60));
        let hint = parser.parse("ok", "", 0, &["curl".to_string()]);
        assert_eq!(hint.source, HintSource::None);
        assert!(hint.delay.is_none());
    }

    #[test]
    fn candidate_fact_requires_a_signal() {
        assert!(extract_candidate_fact("ok", "", 0, &["curl".to_string()]).is_none());
        let candidate =
            extract_candidate_fact("X-RateLimit-Limit: 60\r\nX-RateLimit-Remaining: 0\r\n", "", 0, &["curl".to_string()])
                .unwrap();
        assert_eq!(candidate.limit, Some(60));
        assert_eq!(candidate.source, FactSource::HttpHeader);
    }
}
