//! Condition evaluator construction errors.

use thiserror::Error;

/// A success/failure pattern failed to compile. Reported at construction
/// time so a bad regex never reaches the attempt loop.
#[derive(Debug, Error, Clone)]
pub enum ConditionConfigError {
    /// `success_pattern` did not compile.
    #[error("invalid success pattern {pattern:?}: {source}")]
    InvalidSuccessPattern {
        /// The pattern text as supplied.
        pattern: String,
        /// The underlying regex error, rendered, since `regex::Error`
        /// is not `Clone`.
        source: String,
    },
    /// `failure_pattern` did not compile.
    #[error("invalid failure pattern {pattern:?}: {source}")]
    InvalidFailurePattern {
        /// The pattern text as supplied.
        pattern: String,
        /// The underlying regex error, rendered.
        source: String,
    },
}
