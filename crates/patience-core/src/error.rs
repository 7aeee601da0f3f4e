//! Unified error taxonomy for the patience workspace.
//!
//! Not a type hierarchy: every subsystem maps its own failures into one of
//! these variants so the driver and CLI can match on a single type instead
//! of writing a `From` impl per crate, the same role
//! `tower_resilience_core::ResilienceError<E>` plays.

use thiserror::Error;

/// The unified result type used across the workspace's library crates.
pub type Result<T> = std::result::Result<T, PatienceError>;

/// Error taxonomy for the whole workspace.
///
/// `Config` and `PatternCompile` are always terminal before the attempt loop
/// begins; the rest are recovered at the retry driver boundary whenever
/// possible.
#[derive(Debug, Error, Clone)]
pub enum PatienceError {
    /// Invalid flag/file/env combination, reported at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A success or failure regex failed to compile.
    #[error("invalid pattern: {0}")]
    PatternCompile(String),

    /// The child process could not be started.
    #[error("failed to spawn child process: {0}")]
    Spawn(String),

    /// The per-attempt deadline fired before the child exited.
    #[error("attempt timed out")]
    Timeout,

    /// A failure pattern matched; retries are suppressed.
    #[error("failure pattern matched")]
    HardFailure(String),

    /// The coordination daemon did not respond in time or refused the
    /// connection; the driver disables coordination and proceeds locally.
    #[error("coordination daemon unavailable: {0}")]
    DaemonUnavailable(String),

    /// The discovery store could not persist an observation. Non-fatal.
    #[error("discovery store write failed: {0}")]
    DiscoveryWrite(String),
}

impl PatienceError {
    /// True for errors that are terminal before the attempt loop begins.
    pub fn is_terminal_before_attempts(&self) -> bool {
        matches!(self, PatienceError::Config(_) | PatienceError::PatternCompile(_))
    }

    /// True for errors the driver boundary recovers from rather than
    /// propagating to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PatienceError::DaemonUnavailable(_) | PatienceError::DiscoveryWrite(_)
        )
    }
}
