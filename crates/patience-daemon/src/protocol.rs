//! The daemon wire protocol: length-delimited frames, each a
//! JSON object tagged by `op`/`status`, rather than a raw JSON blob read
//! until EOF.

use std::io;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// No single frame may exceed this many bytes.
pub const MAX_FRAME_BYTES: u32 = 1024 * 1024;

/// A request frame, tagged by `op`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// `CanSchedule`: would admitting a request for `resource_id` now
    /// violate the rate-limit inequality?
    Schedule {
        /// The resource being scheduled against.
        resource_id: String,
        /// The rate limit for `resource_id`.
        limit: u64,
        /// The window, in milliseconds.
        window_ms: u64,
    },
    /// `RegisterScheduled`: the client's full planned retry schedule,
    /// expressed as offsets (in milliseconds) from "now" at the daemon.
    Register {
        /// The resource the schedule is for.
        resource_id: String,
        /// Millisecond offsets from receipt time, one per planned
        /// attempt.
        offsets_ms: Vec<u64>,
    },
    /// `SendMetrics`: fire-and-forget run summary.
    Metrics {
        /// Opaque, pre-serialized run metrics payload.
        payload: serde_json::Value,
    },
    /// Liveness probe.
    Ping,
    /// `CanSchedule` followed by `RegisterScheduled` against the same
    /// resource, evaluated and applied under a single ledger lock so two
    /// clients racing on `resource_id` cannot both be admitted before
    /// either registers.
    ScheduleAndRegister {
        /// The resource being scheduled against.
        resource_id: String,
        /// The rate limit for `resource_id`.
        limit: u64,
        /// The window, in milliseconds.
        window_ms: u64,
        /// Millisecond offsets from receipt time, one per planned
        /// attempt, registered regardless of the admission verdict (the
        /// caller sleeps on a negative verdict instead of not
        /// registering).
        offsets_ms: Vec<u64>,
    },
}

/// A response frame, tagged by `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Answer to `Schedule`.
    Scheduled {
        /// Whether the candidate time is admissible now.
        can_schedule: bool,
        /// If not admissible, how long to wait before retrying the
        /// question.
        wait_ms: u64,
        /// A short human-readable reason.
        reason: String,
    },
    /// Answer to `Register`.
    Registered {
        /// How many of the offered entries the ledger accepted.
        accepted: usize,
    },
    /// Answer to `Metrics`.
    MetricsAck,
    /// Answer to `Ping`.
    Pong,
    /// Answer to `ScheduleAndRegister`.
    ScheduleRegistered {
        /// Whether the candidate time was admissible at check time.
        can_schedule: bool,
        /// If not admissible, how long to wait before the schedule would
        /// have been.
        wait_ms: u64,
        /// A short human-readable reason.
        reason: String,
        /// How many of the offered offsets the ledger accepted.
        accepted: usize,
    },
    /// The request could not be served.
    Error {
        /// A short human-readable message.
        message: String,
    },
}

/// Reads one length-delimited frame and decodes it as `T`.
pub async fn read_frame<T, R>(reader: &mut R) -> io::Result<T>
where
    T: for<'de> Deserialize<'de>,
    R: AsyncReadExt + Unpin,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("frame of {len} bytes exceeds limit")));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    serde_json::from_slice(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Encodes `value` as JSON and writes it as one length-delimited frame.
pub async fn write_frame<T, W>(writer: &mut W, value: &T) -> io::Result<()>
where
    T: Serialize,
    W: AsyncWriteExt + Unpin,
{
    let body = serde_json::to_vec(value)?;
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}
