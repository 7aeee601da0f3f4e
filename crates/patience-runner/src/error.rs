//! Child runner errors.

use thiserror::Error;

/// Errors the runner cannot recover from internally. A spawn failure is
/// the only one the retry driver surfaces as a `Run` error;
/// every other outcome, including a timeout, is represented as a normal
/// `CapturedOutput`.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The child process could not be started at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that failed to launch.
        program: String,
        /// The underlying IO error.
        source: std::io::Error,
    },
}
