//! Case-insensitive header extraction.

use std::time::Duration;

use chrono::Utc;

/// Header-derived hints, prior to being combined with JSON-body hints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderHints {
    /// `X-RateLimit-Limit` / `x-rate-limit-limit` / `RateLimit-Limit`.
    pub limit: Option<u64>,
    /// `X-RateLimit-Remaining` / `x-rate-limit-remaining` /
    /// `X-Goog-Quota-Remaining` / `X-MS-RateLimit-Remaining-*`.
    pub remaining: Option<u64>,
    /// The window, in seconds, a `RateLimit-Policy` `;w=` encodes.
    pub window_seconds: Option<u64>,
    /// Seconds-from-now or resolved HTTP-date from `Retry-After`.
    pub retry_after: Option<Duration>,
    /// Present if a vendor-specific rate-limit header was seen at all
    /// (AWS, Docker, GCP, Kubernetes), even without a parseable value.
    /// Used by the discovery store to tag a candidate fact's source.
    pub vendor_header_seen: bool,
}

fn parse_retry_after_value(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    // HTTP-date form, e.g. "Wed, 21 Oct 2015 07:28:00 GMT".
    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let now = Utc::now();
    let delta = when.with_timezone(&Utc).signed_duration_since(now);
    delta.to_std().ok()
}

/// Parses `;w=<seconds>` out of a `RateLimit-Policy`/`RateLimit-Limit` value
/// such as `"100;w=60"`.
fn parse_window_param(value: &str) -> Option<u64> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("w="))
        .and_then(|s| s.parse::<u64>().ok())
}

fn leading_u64(value: &str) -> Option<u64> {
    let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Scans `text` for header-shaped `Name: value` lines (case-insensitive
/// names) and extracts `Retry-After` and the vendor rate-limit headers.
pub fn extract_headers(text: &str) -> HeaderHints {
    let mut hints = HeaderHints::default();

    for line in text.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }

        match name.as_str() {
            "x-ratelimit-limit" | "x-rate-limit-limit" | "ratelimit-limit" => {
                hints.limit = hints.limit.or_else(|| leading_u64(value));
                hints.window_seconds = hints.window_seconds.or_else(|| parse_window_param(value));
            }
            "x-ratelimit-remaining" | "x-rate-limit-remaining" | "x-goog-quota-remaining" => {
                hints.remaining = hints.remaining.or_else(|| value.parse().ok());
            }
            "ratelimit-policy" => {
                hints.limit = hints.limit.or_else(|| leading_u64(value));
                hints.window_seconds = hints.window_seconds.or_else(|| parse_window_param(value));
            }
            "x-ratelimit-reset" | "x-rate-limit-reset" => {
                // Reset times are epoch seconds or seconds-from-now depending
                // on vendor; callers combine this with `remaining`/`limit`
                // rather than relying on it alone.
            }
            "x-goog-quota-limit" => {
                hints.limit = hints.limit.or_else(|| leading_u64(value));
            }
            "retry-after" => {
                hints.retry_after = hints.retry_after.or_else(|| parse_retry_after_value(value));
            }
            "x-amzn-requestid" | "x-amzn-errortype" | "x-amzn-ratelimit-limit" => {
                hints.vendor_header_seen = true;
                if name == "x-amzn-ratelimit-limit" {
                    hints.limit = hints.limit.or_else(|| leading_u64(value));
                }
            }
            "docker-ratelimit-source" => {
                hints.vendor_header_seen = true;
            }
            _ if name.starts_with("x-ms-ratelimit-remaining-") => {
                hints.vendor_header_seen = true;
                hints.remaining = hints.remaining.or_else(|| leading_u64(value));
            }
            _ if name.starts_with("x-kubernetes-pf-") => {
                hints.vendor_header_seen = true;
            }
            _ => {}
        }
    }

    hints
}
