//! Backoff strategy construction errors.

use thiserror::Error;

/// Strategy constructors validate `base ≥ 0`, `max ≥ 0`, `mult > 0`, and
/// any strategy-specific constraints, returning this error
/// instead of panicking on invalid configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackoffConfigError {
    /// `mult` was not strictly positive.
    #[error("multiplier must be > 0, got {0}")]
    NonPositiveMultiplier(f64),
    /// `Polynomial`'s `exp` was negative.
    #[error("exponent must be >= 0, got {0}")]
    NegativeExponent(f64),
    /// `Polynomial`'s `base` was not strictly positive.
    #[error("base must be > 0, got {0:?}")]
    NonPositiveBase(std::time::Duration),
    /// `base` exceeded `max`.
    #[error("base ({base:?}) must be <= max ({max:?})")]
    BaseExceedsMax {
        /// The offending base delay.
        base: std::time::Duration,
        /// The configured cap.
        max: std::time::Duration,
    },
    /// A strategy requiring a non-empty list (e.g. `retry_offsets`) was
    /// given an empty one.
    #[error("{0} must not be empty")]
    EmptyList(&'static str),
    /// `Adaptive`'s `learning_rate` was outside `(0.0, 1.0]`.
    #[error("learning_rate must be in (0.0, 1.0], got {0}")]
    InvalidLearningRate(f64),
    /// `Adaptive`'s `memory_window` was zero.
    #[error("memory_window must be > 0")]
    ZeroMemoryWindow,
}
