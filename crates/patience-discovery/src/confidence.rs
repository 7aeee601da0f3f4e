//! Confidence computation and `ShouldUpdate` merge policy.

use chrono::{DateTime, Utc};
use patience_core::FactSource;

/// `c = base(source) * obs/(obs+10) * (0.5 + 0.5*success_ratio) * recency_decay`,
/// clamped to `[0, 1]`.
pub fn compute_confidence(
    source: FactSource,
    observation_count: u64,
    success_count: u64,
    failure_count: u64,
    last_seen: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let base = source.base_confidence();
    let obs = observation_count as f64;
    let obs_factor = obs / (obs + 10.0);
    let total = success_count + failure_count;
    let success_ratio = if total == 0 { 1.0 } else { success_count as f64 / total as f64 };
    let success_factor = 0.5 + 0.5 * success_ratio;
    let days_since = (now - last_seen).num_seconds().max(0) as f64 / 86_400.0;
    let recency_decay = 1.0 / (1.0 + days_since / 7.0);

    (base * obs_factor * success_factor * recency_decay).clamp(0.0, 1.0)
}

/// Entries with confidence below this MUST NOT drive scheduling
/// decisions.
pub const MIN_USABLE_CONFIDENCE: f64 = 0.3;

/// Decides whether a new observation should replace an existing entry.
///
/// True iff the new observation has strictly higher confidence, the
/// existing entry is expired (> 7 days without observation), or the new
/// observation comes from a strictly higher-priority source.
pub fn should_update(
    existing_confidence: f64,
    existing_source: FactSource,
    existing_expired: bool,
    new_confidence: f64,
    new_source: FactSource,
) -> bool {
    if existing_expired {
        return true;
    }
    if new_source > existing_source {
        return true;
    }
    new_confidence > existing_confidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn confidence_stays_within_unit_interval() {
        let now = Utc::now();
        let c = compute_confidence(FactSource::Manual, 1000, 900, 100, now, now);
        assert!((0.0..=1.0).contains(&c));
    }

    #[test]
    fn confidence_decays_with_staleness() {
        let now = Utc::now();
        let fresh = compute_confidence(FactSource::HttpHeader, 50, 50, 0, now, now);
        let stale = compute_confidence(FactSource::HttpHeader, 50, 50, 0, now - ChronoDuration::days(14), now);
        assert!(stale < fresh);
    }

    #[test]
    fn higher_priority_source_always_updates() {
        assert!(should_update(0.9, FactSource::Learned, false, 0.4, FactSource::Manual));
    }

    #[test]
    fn expired_entry_always_updates() {
        assert!(should_update(0.95, FactSource::Manual, true, 0.1, FactSource::Learned));
    }

    #[test]
    fn same_priority_requires_strictly_higher_confidence() {
        assert!(!should_update(0.7, FactSource::HttpHeader, false, 0.7, FactSource::HttpHeader));
        assert!(should_update(0.7, FactSource::HttpHeader, false, 0.71, FactSource::HttpHeader));
    }
}
