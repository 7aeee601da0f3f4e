//! The `--daemon-foreground` mode: this binary relaunches
//! itself as the coordination daemon when `--daemon-auto-start` can't
//! reach one, since [`patience_daemon::ensure_running`] spawns
//! `daemon_exe --daemon-foreground ...` pointed at its own executable path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use patience_daemon::{Daemon, DaemonConfig};

use crate::cli::CommonArgs;

/// Runs the coordination daemon in the foreground until it receives
/// `SIGINT`/`SIGTERM` equivalent (`ctrl_c`), then exits cleanly, dropping
/// the PID-file guard.
pub async fn run_foreground(common: &CommonArgs) -> std::io::Result<()> {
    let socket_path = common.daemon_socket.clone().unwrap_or_else(|| PathBuf::from("/tmp/patience-daemon.sock"));
    let pid_path = common.daemon_pid_file.clone().unwrap_or_else(|| PathBuf::from("/tmp/retry-daemon.pid"));

    let config = DaemonConfig { socket_path, pid_path, max_ledger_entries: patience_daemon::DEFAULT_MAX_ENTRIES };
    let (daemon, listener) = Daemon::bind(config)?;
    let daemon = Arc::new(daemon);

    if let Some(addr) = &common.daemon_http {
        spawn_admin_surface(daemon.clone(), addr).await?;
    }

    tokio::select! {
        _ = daemon.clone().serve(listener) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal, stopping daemon");
        }
    }
    Ok(())
}

async fn spawn_admin_surface(daemon: Arc<Daemon>, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let router = patience_daemon::admin_router(daemon.ledger());
    tracing::info!(addr = %addr, "admin HTTP surface listening");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::warn!(error = %err, "admin HTTP surface exited");
        }
    });
    Ok(())
}

/// Builds a daemon client and, if `--daemon-auto-start` was requested,
/// ensures a daemon is reachable before returning it, using this same
/// binary's own executable path as the one to relaunch.
pub async fn connect_if_requested(
    daemon_enabled: bool,
    auto_start: bool,
    socket_path: &std::path::Path,
    rpc_deadline: Duration,
) -> Option<Arc<patience_daemon::DaemonClient>> {
    if !daemon_enabled {
        return None;
    }

    if auto_start {
        let Ok(exe) = std::env::current_exe() else {
            tracing::warn!("could not determine own executable path for daemon auto-start");
            return None;
        };
        let pid_path = socket_path.with_extension("pid");
        let reachable = patience_daemon::ensure_running(&exe, socket_path, &pid_path, rpc_deadline).await;
        if !reachable {
            tracing::warn!("daemon auto-start failed, proceeding in local-only mode");
            return None;
        }
    }

    Some(Arc::new(patience_daemon::DaemonClient::new(socket_path.to_path_buf(), rpc_deadline)))
}
