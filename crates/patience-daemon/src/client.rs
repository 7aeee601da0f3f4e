//! The coordination daemon client: RPCs carry a
//! (typically 5s) deadline; on timeout or connection failure the caller
//! falls back to local-only mode with a warning rather than failing the
//! run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::protocol::{read_frame, write_frame, Request, Response};

/// The client's view of one RPC failure. The driver treats every variant
/// as non-fatal: disable coordination for the remainder of the run and
/// proceed locally.
#[derive(Debug, Error)]
pub enum DaemonUnavailable {
    /// The socket could not be connected within the timeout.
    #[error("could not connect to daemon at {path}: {source}")]
    Connect {
        /// The socket path that was attempted.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },
    /// The RPC did not complete within the deadline.
    #[error("daemon RPC timed out after {0:?}")]
    Timeout(Duration),
    /// The connection failed mid-RPC.
    #[error("daemon RPC failed: {0}")]
    Io(#[from] std::io::Error),
    /// The daemon answered with an unexpected response variant.
    #[error("unexpected daemon response")]
    UnexpectedResponse,
}

/// Answer to a `Schedule` RPC, with `wait_until` expressed as a relative
/// duration from the moment the client issued the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleAnswer {
    /// Whether the candidate time is admissible now.
    pub can_schedule: bool,
    /// How long the caller should wait before the candidate time would
    /// become admissible.
    pub wait: Duration,
}

/// A short-lived connection to the coordination daemon. One connection
/// per RPC: the socket is small, local, and cheap to reopen, and this
/// avoids holding a long-lived connection across a sleeping retry loop.
pub struct DaemonClient {
    socket_path: PathBuf,
    deadline: Duration,
}

impl DaemonClient {
    /// `deadline` bounds every individual RPC.
    pub fn new(socket_path: PathBuf, deadline: Duration) -> Self {
        Self { socket_path, deadline }
    }

    async fn connect(&self) -> Result<UnixStream, DaemonUnavailable> {
        timeout(self.deadline, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| DaemonUnavailable::Timeout(self.deadline))?
            .map_err(|source| DaemonUnavailable::Connect { path: self.socket_path.clone(), source })
    }

    async fn roundtrip(&self, request: Request) -> Result<Response, DaemonUnavailable> {
        let mut stream = self.connect().await?;
        timeout(self.deadline, async {
            write_frame(&mut stream, &request).await?;
            read_frame(&mut stream).await
        })
        .await
        .map_err(|_| DaemonUnavailable::Timeout(self.deadline))?
        .map_err(DaemonUnavailable::from)
    }

    /// Asks whether `resource_id` can admit another attempt right now.
    pub async fn can_schedule(&self, resource_id: &str, limit: u64, window: Duration) -> Result<ScheduleAnswer, DaemonUnavailable> {
        let response = self
            .roundtrip(Request::Schedule {
                resource_id: resource_id.to_string(),
                limit,
                window_ms: window.as_millis() as u64,
            })
            .await?;
        match response {
            Response::Scheduled { can_schedule, wait_ms, .. } => {
                Ok(ScheduleAnswer { can_schedule, wait: Duration::from_millis(wait_ms) })
            }
            _ => Err(DaemonUnavailable::UnexpectedResponse),
        }
    }

    /// Registers the planned retry schedule; failures here are non-fatal for the caller
    /// by contract, but are still surfaced so the driver can log them.
    pub async fn register_scheduled(&self, resource_id: &str, offsets: &[Duration]) -> Result<usize, DaemonUnavailable> {
        let offsets_ms = offsets.iter().map(|d| d.as_millis() as u64).collect();
        let response = self.roundtrip(Request::Register { resource_id: resource_id.to_string(), offsets_ms }).await?;
        match response {
            Response::Registered { accepted } => Ok(accepted),
            _ => Err(DaemonUnavailable::UnexpectedResponse),
        }
    }

    /// Checks admission and registers `offsets` for `resource_id` in a
    /// single RPC, so the two are one critical section on the daemon
    /// side rather than two connections a concurrent caller could
    /// interleave between.
    pub async fn schedule_and_register(
        &self,
        resource_id: &str,
        limit: u64,
        window: Duration,
        offsets: &[Duration],
    ) -> Result<(ScheduleAnswer, usize), DaemonUnavailable> {
        let offsets_ms = offsets.iter().map(|d| d.as_millis() as u64).collect();
        let response = self
            .roundtrip(Request::ScheduleAndRegister {
                resource_id: resource_id.to_string(),
                limit,
                window_ms: window.as_millis() as u64,
                offsets_ms,
            })
            .await?;
        match response {
            Response::ScheduleRegistered { can_schedule, wait_ms, accepted, .. } => {
                Ok((ScheduleAnswer { can_schedule, wait: Duration::from_millis(wait_ms) }, accepted))
            }
            _ => Err(DaemonUnavailable::UnexpectedResponse),
        }
    }

    /// Fire-and-forget run metrics submission.
    pub async fn send_metrics(&self, payload: serde_json::Value) -> Result<(), DaemonUnavailable> {
        self.roundtrip(Request::Metrics { payload }).await.map(|_| ())
    }

    /// A cheap liveness check, used by `--daemon-auto-start` to decide
    /// whether a spawn is needed.
    pub async fn ping(&self) -> bool {
        matches!(self.roundtrip(Request::Ping).await, Ok(Response::Pong))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_missing_socket_is_reported_as_unavailable() {
        let client = DaemonClient::new(PathBuf::from("/tmp/patience-nonexistent-test.sock"), Duration::from_millis(200));
        let result = client.can_schedule("r", 1, Duration::from_secs(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ping_against_missing_socket_returns_false_not_panic() {
        let client = DaemonClient::new(PathBuf::from("/tmp/patience-nonexistent-test.sock"), Duration::from_millis(200));
        assert!(!client.ping().await);
    }
}
