//! Discovery store errors. A `DiscoveryWriteError` is non-fatal to the
//! retry driver; it is logged and execution continues.

use thiserror::Error;

/// Failures from the rate-limit discovery store.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The connection pool could not hand out a connection.
    #[error("failed to acquire database connection: {0}")]
    Pool(#[from] r2d2::Error),
    /// A query or schema statement failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
