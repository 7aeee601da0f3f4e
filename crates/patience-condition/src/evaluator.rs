//! The success/failure condition evaluator.

use regex::RegexBuilder;

use patience_core::ConditionResult;

use crate::error::ConditionConfigError;

/// Classifies an attempt's exit code and output against optional
/// success/failure patterns, with failure taking precedence over
/// success, and success over bare exit-code inspection.
#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    success_pattern: Option<regex::Regex>,
    failure_pattern: Option<regex::Regex>,
}

impl ConditionEvaluator {
    /// Compiles `success_pattern`/`failure_pattern` (case-sensitivity
    /// controlled by `case_insensitive` via the matcher's own flag, not
    /// by rewriting the pattern text) and reports a compile error
    /// immediately rather than at evaluation time.
    pub fn new(
        success_pattern: Option<&str>,
        failure_pattern: Option<&str>,
        case_insensitive: bool,
    ) -> Result<Self, ConditionConfigError> {
        let success_pattern = success_pattern
            .map(|pattern| compile(pattern, case_insensitive))
            .transpose()
            .map_err(|source| ConditionConfigError::InvalidSuccessPattern {
                pattern: success_pattern.unwrap_or_default().to_string(),
                source,
            })?;
        let failure_pattern = failure_pattern
            .map(|pattern| compile(pattern, case_insensitive))
            .transpose()
            .map_err(|source| ConditionConfigError::InvalidFailurePattern {
                pattern: failure_pattern.unwrap_or_default().to_string(),
                source,
            })?;
        Ok(Self { success_pattern, failure_pattern })
    }

    /// Classifies one attempt:
    /// failure pattern, then success pattern, then exit code.
    pub fn eval(&self, exit_code: i32, stdout: &str, stderr: &str) -> ConditionResult {
        if let Some(failure) = &self.failure_pattern {
            if failure.is_match(stdout) || failure.is_match(stderr) {
                return ConditionResult::HardFailure("failure pattern matched".to_string());
            }
        }
        if let Some(success) = &self.success_pattern {
            if success.is_match(stdout) || success.is_match(stderr) {
                return ConditionResult::Success("success pattern matched".to_string());
            }
        }
        if exit_code == 0 {
            return ConditionResult::Success("exit code 0".to_string());
        }
        ConditionResult::Retryable(format!("exit code {exit_code}"))
    }
}

fn compile(pattern: &str, case_insensitive: bool) -> Result<regex::Regex, String> {
    RegexBuilder::new(pattern).case_insensitive(case_insensitive).build().map_err(|e| e.to_string())
}
