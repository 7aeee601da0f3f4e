//! The coordination daemon service: a UNIX-socket server
//! that owns the window ledger and answers `Schedule`/`Register`/
//! `Metrics`/`Ping` requests, one task per connection, grounded in the
//! claim-loop daemon shape the pack's `fusillade` daemon uses (a
//! long-lived `Arc<Self>::run` spawning per-unit-of-work tasks).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};
use tokio::net::{UnixListener, UnixStream};

use crate::ledger::WindowLedger;
use crate::pidfile::PidFileGuard;
use crate::protocol::{read_frame, write_frame, Request, Response};

/// How often the ledger sweeper runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for one daemon instance.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// UNIX-domain socket path.
    pub socket_path: PathBuf,
    /// PID file path.
    pub pid_path: PathBuf,
    /// Ledger entry cap.
    pub max_ledger_entries: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/patience-daemon.sock"),
            pid_path: PathBuf::from("/tmp/retry-daemon.pid"),
            max_ledger_entries: crate::ledger::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// The running coordination daemon.
pub struct Daemon {
    config: DaemonConfig,
    ledger: Arc<WindowLedger>,
    _pid_guard: PidFileGuard,
}

impl Daemon {
    /// Claims the PID file and binds the socket, but does not yet serve
    /// connections.
    pub fn bind(config: DaemonConfig) -> std::io::Result<(Self, UnixListener)> {
        let pid_guard = PidFileGuard::acquire(&config.pid_path)?;
        if config.socket_path.exists() {
            std::fs::remove_file(&config.socket_path)?;
        }
        let listener = UnixListener::bind(&config.socket_path)?;
        set_socket_permissions(&config.socket_path)?;

        let ledger = Arc::new(WindowLedger::new(config.max_ledger_entries));
        Ok((Self { config, ledger, _pid_guard: pid_guard }, listener))
    }

    /// The ledger, for embedding an admin HTTP surface alongside the
    /// socket server.
    pub fn ledger(&self) -> Arc<WindowLedger> {
        self.ledger.clone()
    }

    /// Runs the accept loop and the sweeper until cancelled. Each
    /// connection is handled by its own task; unrelated resources never
    /// contend on the ledger.
    pub async fn serve(self: Arc<Self>, listener: UnixListener) {
        let sweeper_ledger = self.ledger.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                sweeper_ledger.sweep(Instant::now());

                #[cfg(feature = "metrics")]
                metrics::gauge!("patience_daemon.ledger_entries").set(sweeper_ledger.total_entries() as f64);
            }
        });

        #[cfg(feature = "tracing")]
        info!(socket = %self.config.socket_path.display(), "daemon listening");

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let ledger = self.ledger.clone();
                    tokio::spawn(async move {
                        if let Err(_err) = handle_connection(stream, ledger).await {
                            #[cfg(feature = "tracing")]
                            warn!(error = %_err, "connection handling failed");
                        }
                    });
                }
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    warn!(error = %_err, "accept failed");
                }
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, ledger: Arc<WindowLedger>) -> std::io::Result<()> {
    loop {
        let request: Request = match read_frame(&mut stream).await {
            Ok(request) => request,
            Err(_) => return Ok(()),
        };
        let response = handle_request(&ledger, request);
        write_frame(&mut stream, &response).await?;
    }
}

fn handle_request(ledger: &WindowLedger, request: Request) -> Response {
    match request {
        Request::Schedule { resource_id, limit, window_ms } => {
            let now = Instant::now();
            let admission = ledger.can_schedule(&resource_id, limit, Duration::from_millis(window_ms), now);
            let wait_ms = admission.wait_until.saturating_duration_since(now).as_millis() as u64;

            #[cfg(feature = "metrics")]
            metrics::counter!(
                "patience_daemon.schedule_requests",
                "granted" => if admission.can_schedule { "true" } else { "false" }
            )
            .increment(1);

            Response::Scheduled {
                can_schedule: admission.can_schedule,
                wait_ms,
                reason: if admission.can_schedule {
                    "admissible".to_string()
                } else {
                    "would exceed rate limit within window".to_string()
                },
            }
        }
        Request::Register { resource_id, offsets_ms } => {
            let now = Instant::now();
            let scheduled_ats: Vec<Instant> = offsets_ms.into_iter().map(|ms| now + Duration::from_millis(ms)).collect();
            let accepted = ledger.register(&resource_id, &scheduled_ats);
            Response::Registered { accepted }
        }
        Request::ScheduleAndRegister { resource_id, limit, window_ms, offsets_ms } => {
            let now = Instant::now();
            let scheduled_ats: Vec<Instant> = offsets_ms.into_iter().map(|ms| now + Duration::from_millis(ms)).collect();
            let (admission, accepted) =
                ledger.schedule_and_register(&resource_id, limit, Duration::from_millis(window_ms), now, &scheduled_ats);
            let wait_ms = admission.wait_until.saturating_duration_since(now).as_millis() as u64;

            #[cfg(feature = "metrics")]
            metrics::counter!(
                "patience_daemon.schedule_requests",
                "granted" => if admission.can_schedule { "true" } else { "false" }
            )
            .increment(1);

            Response::ScheduleRegistered {
                can_schedule: admission.can_schedule,
                wait_ms,
                reason: if admission.can_schedule {
                    "admissible".to_string()
                } else {
                    "would exceed rate limit within window".to_string()
                },
                accepted,
            }
        }
        Request::Metrics { payload: _ } => {
            #[cfg(feature = "tracing")]
            debug!("received run metrics");
            Response::MetricsAck
        }
        Request::Ping => Response::Pong,
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> DaemonConfig {
        DaemonConfig {
            socket_path: dir.path().join("d.sock"),
            pid_path: dir.path().join("d.pid"),
            max_ledger_entries: crate::ledger::DEFAULT_MAX_ENTRIES,
        }
    }

    #[tokio::test]
    async fn ping_returns_pong_over_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, listener) = Daemon::bind(config_in(&dir)).unwrap();
        let daemon = Arc::new(daemon);
        let socket_path = dir.path().join("d.sock");
        tokio::spawn(daemon.serve(listener));

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        write_frame(&mut stream, &Request::Ping).await.unwrap();
        let response: Response = read_frame(&mut stream).await.unwrap();
        assert_eq!(response, Response::Pong);
    }

    #[tokio::test]
    async fn schedule_then_register_is_reflected_in_later_schedule_calls() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, listener) = Daemon::bind(config_in(&dir)).unwrap();
        let daemon = Arc::new(daemon);
        let socket_path = dir.path().join("d.sock");
        tokio::spawn(daemon.serve(listener));

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        write_frame(&mut stream, &Request::Schedule { resource_id: "r".to_string(), limit: 1, window_ms: 1000 })
            .await
            .unwrap();
        let response: Response = read_frame(&mut stream).await.unwrap();
        assert_eq!(response, Response::Scheduled { can_schedule: true, wait_ms: 0, reason: "admissible".to_string() });

        write_frame(&mut stream, &Request::Register { resource_id: "r".to_string(), offsets_ms: vec![0] }).await.unwrap();
        let response: Response = read_frame(&mut stream).await.unwrap();
        assert_eq!(response, Response::Registered { accepted: 1 });

        write_frame(&mut stream, &Request::Schedule { resource_id: "r".to_string(), limit: 1, window_ms: 1000 })
            .await
            .unwrap();
        let response: Response = read_frame(&mut stream).await.unwrap();
        match response {
            Response::Scheduled { can_schedule, .. } => assert!(!can_schedule),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn schedule_and_register_admits_and_registers_in_one_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, listener) = Daemon::bind(config_in(&dir)).unwrap();
        let daemon = Arc::new(daemon);
        let socket_path = dir.path().join("d.sock");
        tokio::spawn(daemon.serve(listener));

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        write_frame(
            &mut stream,
            &Request::ScheduleAndRegister { resource_id: "r".to_string(), limit: 1, window_ms: 1000, offsets_ms: vec![0] },
        )
        .await
        .unwrap();
        let first: Response = read_frame(&mut stream).await.unwrap();
        match first {
            Response::ScheduleRegistered { can_schedule, accepted, .. } => {
                assert!(can_schedule);
                assert_eq!(accepted, 1);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        write_frame(
            &mut stream,
            &Request::ScheduleAndRegister { resource_id: "r".to_string(), limit: 1, window_ms: 1000, offsets_ms: vec![0] },
        )
        .await
        .unwrap();
        let second: Response = read_frame(&mut stream).await.unwrap();
        match second {
            Response::ScheduleRegistered { can_schedule, .. } => {
                assert!(!can_schedule, "the first registration should already fill the limit-1 window");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
