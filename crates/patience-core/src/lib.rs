//! Shared data model and error taxonomy for the `patience` retry supervisor.
//!
//! This crate has no async runtime or I/O dependencies of its own; every
//! other crate in the workspace builds on the types defined here, the same
//! role `tower-resilience-core` plays for the tower-resilience middleware
//! stack.

pub mod error;
pub mod ratelimit;
pub mod types;

pub use error::{PatienceError, Result};
pub use ratelimit::{FactSource, RateLimitFact, ScheduledRequest};
pub use types::{
    AttemptIndex, AttemptMetric, BackoffContext, CapturedOutput, CommandInvocation,
    ConditionResult, HintSource, Outcome, RetryHint, RunMetrics, RunResult, RunStats,
};
