//! Rate-limit discovery and daemon ledger types.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a `RateLimitFact` observation came from. Ordered by priority:
/// `Manual > HttpHeader > JsonBody > Learned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FactSource {
    /// Inferred from prior 429 observations by the Learner.
    Learned,
    /// Parsed from a JSON response body.
    JsonBody,
    /// Parsed from an HTTP response header.
    HttpHeader,
    /// Explicitly configured by the operator.
    Manual,
}

impl FactSource {
    /// The base confidence contributed by this source.
    pub fn base_confidence(self) -> f64 {
        match self {
            FactSource::Manual => 1.0,
            FactSource::HttpHeader => 0.9,
            FactSource::JsonBody => 0.8,
            FactSource::Learned => 0.6,
        }
    }
}

/// A learned or observed per-resource rate limit.
#[derive(Debug, Clone)]
pub struct RateLimitFact {
    /// Logical resource identifier (e.g. `"api.github.com/repos/*"`).
    pub resource_id: String,
    /// The host this fact was observed on.
    pub host: String,
    /// The normalized path this fact was observed on.
    pub path: String,
    /// Requests allowed per `window`.
    pub limit: u64,
    /// The sliding window duration the limit applies to.
    pub window: Duration,
    /// Remaining quota as of `last_seen`.
    pub remaining: u64,
    /// When the window is expected to reset.
    pub reset_time: DateTime<Utc>,
    /// Provenance of the most recent merge.
    pub source: FactSource,
    /// Normalized trust score in `[0, 1]`.
    pub confidence: f64,
    /// When this fact was last observed or merged.
    pub last_seen: DateTime<Utc>,
    /// Total number of observations merged into this fact.
    pub observation_count: u64,
    /// Observations that ended in a non-429 success.
    pub success_count: u64,
    /// Observations that ended in a 429.
    pub failure_count: u64,
    /// The most recent 429 observation, if any.
    pub last_429: Option<DateTime<Utc>>,
}

impl RateLimitFact {
    /// The minimum confidence at or above which a fact may be used to drive
    /// scheduling decisions.
    pub const MIN_USABLE_CONFIDENCE: f64 = 0.3;

    /// Entries older than this without a new observation are expired.
    pub const EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

    /// `true` once `last_seen` is older than [`Self::EXPIRY`].
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.last_seen);
        age.to_std().map(|d| d > Self::EXPIRY).unwrap_or(false)
    }

    /// `true` if this fact currently crosses the usability threshold.
    pub fn is_usable(&self) -> bool {
        self.confidence >= Self::MIN_USABLE_CONFIDENCE
    }
}

/// A single planned attempt time, owned by the daemon's per-resource window
/// ledger.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledRequest {
    /// Unique id for this ledger entry.
    pub id: Uuid,
    /// The resource this entry is scheduled against.
    pub scheduled_at: Instant,
    /// When this entry is pruned from the ledger regardless of outcome.
    pub expires_at: Instant,
}

impl ScheduledRequest {
    /// Builds a new scheduled request with the ledger's 1-hour expiry bound
    ///.
    pub fn new(scheduled_at: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheduled_at,
            expires_at: scheduled_at + Duration::from_secs(3600),
        }
    }
}
