//! Success/failure classification for one attempt: exit code
//! plus optional success/failure regular expressions, evaluated with
//! strict precedence (failure, then success, then exit code).

mod error;
mod evaluator;

pub use error::ConditionConfigError;
pub use evaluator::ConditionEvaluator;
