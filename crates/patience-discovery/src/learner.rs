//! The 429 learner: on observing a 429, inspects preceding
//! `learning_data` entries across candidate windows and, where the
//! smallest window containing both successes and failures yields a
//! usable-confidence estimate, writes a `Learned` fact.

use std::time::Duration;

use chrono::{DateTime, Utc};
use patience_core::FactSource;

use crate::confidence::{compute_confidence, MIN_USABLE_CONFIDENCE};
use crate::error::DiscoveryError;
use crate::store::DiscoveryStore;

/// Candidate lookback windows, smallest first.
pub const CANDIDATE_WINDOWS: &[Duration] = &[
    Duration::from_secs(60),
    Duration::from_secs(5 * 60),
    Duration::from_secs(15 * 60),
    Duration::from_secs(60 * 60),
    Duration::from_secs(24 * 60 * 60),
];

/// A limit estimate the learner is prepared to write, or `None` if no
/// window yielded a usable-confidence estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedEstimate {
    /// `⌈1.2 * successful_in_window⌉`.
    pub limit: u64,
    /// The candidate window the estimate was drawn from.
    pub window: Duration,
    /// The confidence the estimate would be written with.
    pub confidence: f64,
}

/// Inspects `learning_data` for `resource_id` across [`CANDIDATE_WINDOWS`]
/// and estimates a limit from the smallest window containing both
/// successful and failing observations.
pub fn learn_from_429(
    store: &DiscoveryStore,
    resource_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<LearnedEstimate>, DiscoveryError> {
    for &window in CANDIDATE_WINDOWS {
        let entries = store.learning_entries_within(resource_id, window, now)?;
        let successes = entries.iter().filter(|e| e.success).count() as u64;
        let failures = entries.iter().filter(|e| !e.success).count() as u64;
        if successes == 0 || failures == 0 {
            continue;
        }

        let limit = (successes as f64 * 1.2).ceil() as u64;
        let confidence = compute_confidence(FactSource::Learned, entries.len() as u64, successes, failures, now, now);
        if confidence < MIN_USABLE_CONFIDENCE {
            continue;
        }
        return Ok(Some(LearnedEstimate { limit, window, confidence }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LearningEntry;

    fn entry(now: DateTime<Utc>, offset_secs: i64, success: bool) -> LearningEntry {
        LearningEntry {
            resource_id: "r".to_string(),
            request_time: now + chrono::Duration::seconds(offset_secs),
            response_code: if success { 200 } else { 429 },
            success,
            response_time: Duration::from_millis(50),
            command: "curl".to_string(),
            host: "h".to_string(),
            path: "p".to_string(),
        }
    }

    #[test]
    fn returns_none_without_mixed_outcomes() {
        let store = DiscoveryStore::open_in_memory(Duration::from_secs(7 * 86_400)).unwrap();
        let now = Utc::now();
        for i in 0..5 {
            store.record_learning_entry(&entry(now, -i, true)).unwrap();
        }
        assert_eq!(learn_from_429(&store, "r", now).unwrap(), None);
    }

    #[test]
    fn estimates_limit_from_smallest_mixed_window() {
        let store = DiscoveryStore::open_in_memory(Duration::from_secs(7 * 86_400)).unwrap();
        let now = Utc::now();
        for i in 0..20 {
            store.record_learning_entry(&entry(now, -i, true)).unwrap();
        }
        store.record_learning_entry(&entry(now, 0, false)).unwrap();

        let estimate = learn_from_429(&store, "r", now).unwrap().unwrap();
        assert_eq!(estimate.limit, 24);
        assert_eq!(estimate.window, Duration::from_secs(60));
    }
}
