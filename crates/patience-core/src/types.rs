//! Core data model.

use std::fmt;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

/// A 1-based, monotone-within-a-run attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptIndex(NonZeroU32);

impl AttemptIndex {
    /// The first attempt of a run.
    pub const FIRST: AttemptIndex = AttemptIndex(match NonZeroU32::new(1) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Wraps a raw 1-based attempt number. Returns `None` for `0`.
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(AttemptIndex)
    }

    /// The next attempt index, saturating rather than overflowing.
    pub fn next(self) -> Self {
        AttemptIndex(NonZeroU32::new(self.0.get().saturating_add(1)).unwrap_or(self.0))
    }

    /// The raw 1-based value.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for AttemptIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered, non-empty argv plus an optional per-attempt deadline.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    argv: Vec<String>,
    /// `None` disables the per-attempt deadline.
    pub deadline: Option<Duration>,
}

impl CommandInvocation {
    /// Builds a new invocation. Fails if `argv` is empty.
    pub fn new(argv: Vec<String>, deadline: Option<Duration>) -> Result<Self, String> {
        if argv.is_empty() {
            return Err("command invocation requires at least one argv token".to_string());
        }
        Ok(Self { argv, deadline })
    }

    /// The program name (`argv[0]`).
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// The arguments after the program name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// The full argv, program included.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// The captured, size-bounded stdout/stderr tail plus exit status of one
/// attempt. Always delivered to the Condition Evaluator, even on timeout.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    /// `-1` on spawn failure or timeout.
    pub exit_code: i32,
    /// Tail of stdout, capped at the configured buffer size.
    pub stdout: String,
    /// Tail of stderr, capped at the configured buffer size.
    pub stderr: String,
    /// `true` if stdout was truncated because the buffer cap was hit.
    pub stdout_truncated: bool,
    /// `true` if stderr was truncated because the buffer cap was hit.
    pub stderr_truncated: bool,
    /// `true` if the per-attempt deadline fired and the child was killed.
    pub timed_out: bool,
}

impl CapturedOutput {
    /// Builds a synthetic captured output for a deadline expiry: exit code
    /// `-1`, `timed_out = true`, buffers containing whatever was captured
    /// before cancellation.
    pub fn timed_out(stdout: String, stderr: String, stdout_truncated: bool, stderr_truncated: bool) -> Self {
        Self {
            exit_code: -1,
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            timed_out: true,
        }
    }
}

/// The outcome of classifying one attempt's `CapturedOutput`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionResult {
    /// The attempt succeeded; the driver stops retrying.
    Success(String),
    /// The attempt failed but may be retried.
    Retryable(String),
    /// The attempt failed in a way known to be permanent; the driver MUST
    /// NOT retry further.
    HardFailure(String),
}

impl ConditionResult {
    /// The human-readable reason carried by any variant.
    pub fn reason(&self) -> &str {
        match self {
            ConditionResult::Success(r) => r,
            ConditionResult::Retryable(r) => r,
            ConditionResult::HardFailure(r) => r,
        }
    }

    /// `true` for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, ConditionResult::Success(_))
    }

    /// `true` for `HardFailure`.
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, ConditionResult::HardFailure(_))
    }
}

/// Context a backoff strategy's `delay` call may consult.
#[derive(Debug, Clone)]
pub struct BackoffContext<'a> {
    /// The attempt about to be delayed before (1-based).
    pub attempt: AttemptIndex,
    /// The delay used before the previous attempt, if any.
    pub previous_delay: Option<Duration>,
    /// The most recently captured output, if any.
    pub last_output: Option<&'a CapturedOutput>,
}

/// Where a `RetryHint` was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintSource {
    /// Extracted from an HTTP response header.
    ResponseHeader,
    /// Extracted from a JSON response body.
    JsonBody,
    /// No explicit hint found; a conservative value was inferred.
    Inferred,
    /// No hint could be derived.
    None,
}

/// A retry hint extracted from a captured response.
#[derive(Debug, Clone, Default)]
pub struct RetryHint {
    /// The suggested delay before the next attempt.
    pub delay: Option<Duration>,
    /// When the resource's window is expected to reset.
    pub reset_at: Option<Instant>,
    /// Remaining quota, if advertised.
    pub remaining: Option<u64>,
    /// The resource's limit, if advertised.
    pub limit: Option<u64>,
    /// Provenance of this hint.
    pub source: HintSource,
}

impl Default for HintSource {
    fn default() -> Self {
        HintSource::None
    }
}

/// The outcome of one run, as returned to the CLI.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Whether the run ultimately succeeded.
    pub success: bool,
    /// How many attempts were made.
    pub attempt_count: u32,
    /// The last attempt's exit code (`-1` rendered as `255` by the CLI on
    /// timeout).
    pub exit_code: i32,
    /// Whether the final attempt timed out.
    pub timed_out: bool,
    /// The final reason string, part of the CLI's external contract.
    pub reason: String,
    /// Rolling counters accumulated across the run.
    pub stats: RunStats,
    /// Attempt-level and summary metrics for the metrics sink.
    pub metrics: RunMetrics,
}

/// Per-run rolling counters.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Number of attempts made so far.
    pub attempts: u32,
    /// Number of attempts classified `Success`.
    pub successful_runs: u32,
    /// Number of attempts classified `Retryable` or `HardFailure`.
    pub failed_runs: u32,
    /// Wall-clock time spent across all attempts and delays.
    pub total_duration: Duration,
    /// The most recent classification reason.
    pub final_reason: Option<String>,
    /// The terminal outcome of the run.
    pub outcome: Outcome,
}

/// The terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    /// No attempt has completed yet.
    #[default]
    Pending,
    /// The run ended in `Success`.
    Succeeded,
    /// The run ran out of attempts.
    Exhausted,
    /// A failure pattern matched.
    HardFailed,
}

/// A single attempt's contribution to `RunMetrics`.
#[derive(Debug, Clone)]
pub struct AttemptMetric {
    /// Which attempt this is.
    pub attempt: AttemptIndex,
    /// How long the attempt took, including process wait.
    pub duration: Duration,
    /// The attempt's exit code.
    pub exit_code: i32,
    /// Whether the attempt was classified `Success`.
    pub success: bool,
}

/// Attempt-level plus whole-run metrics emitted asynchronously to the
/// daemon.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Per-attempt entries in attempt order.
    pub attempts: Vec<AttemptMetric>,
    /// Whether the run as a whole succeeded.
    pub success: bool,
    /// Total wall-clock duration of the run.
    pub total_duration: Duration,
}
