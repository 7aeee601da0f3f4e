//! Out-of-process coordination for the patience retry supervisor:
//! a UNIX-socket daemon that tracks in-flight and planned
//! attempts per resource so multiple independent `patience` invocations
//! don't collectively blow through a shared rate limit, plus the client
//! used to talk to it.
//!
//! The daemon is optional end to end: every [`client::DaemonClient`]
//! failure is non-fatal, and callers that never start a daemon simply
//! run in local-only mode.

mod auto_start;
mod client;
mod ledger;
pub mod pidfile;
mod protocol;
mod server;

#[cfg(feature = "http-admin")]
mod admin;

pub use auto_start::ensure_running;
pub use client::{DaemonClient, DaemonUnavailable, ScheduleAnswer};
pub use ledger::{Admission, WindowLedger, DEFAULT_MAX_ENTRIES};
pub use pidfile::PidFileGuard;
pub use protocol::{read_frame, write_frame, Request, Response, MAX_FRAME_BYTES};
pub use server::{Daemon, DaemonConfig};

#[cfg(feature = "http-admin")]
pub use admin::router as admin_router;
