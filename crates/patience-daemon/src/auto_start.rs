//! `--daemon-auto-start`:
//! when a client cannot reach the configured socket, spawn a detached
//! daemon child pointed at the same socket and retry the connection with
//! a short bounded backoff before giving up and falling back to
//! local-only mode.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::client::DaemonClient;

/// How many times to re-poll the socket after spawning, and how long to
/// wait between polls, before giving up on the freshly spawned daemon.
const SPAWN_POLL_ATTEMPTS: u32 = 10;
const SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns `daemon_exe daemon-args... ` detached from the current process
/// group and session, so it outlives the CLI invocation that started it.
#[cfg(unix)]
fn spawn_detached(daemon_exe: &Path, socket_path: &Path, pid_path: &Path) -> std::io::Result<()> {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new(daemon_exe);
    command
        .arg("--daemon-foreground")
        .arg("--daemon-socket")
        .arg(socket_path)
        .arg("--daemon-pid-file")
        .arg(pid_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // Detach into a new session so the daemon is not killed when the
    // spawning CLI's process group receives a signal.
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    command.spawn()?;
    Ok(())
}

#[cfg(not(unix))]
fn spawn_detached(daemon_exe: &Path, socket_path: &Path, pid_path: &Path) -> std::io::Result<()> {
    Command::new(daemon_exe)
        .arg("--daemon-foreground")
        .arg("--daemon-socket")
        .arg(socket_path)
        .arg("--daemon-pid-file")
        .arg(pid_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

/// Attempts to bring up a daemon at `socket_path` if one is not already
/// listening there, then waits (with bounded polling) for it to become
/// reachable. Returns `true` if the daemon answered a ping by the time
/// polling gave up.
pub async fn ensure_running(daemon_exe: &Path, socket_path: &Path, pid_path: &Path, rpc_deadline: Duration) -> bool {
    let client = DaemonClient::new(socket_path.to_path_buf(), rpc_deadline);
    if client.ping().await {
        return true;
    }

    #[cfg(feature = "tracing")]
    tracing::info!(socket = %socket_path.display(), "no daemon reachable, attempting auto-start");

    if let Err(_err) = spawn_detached(daemon_exe, socket_path, pid_path) {
        #[cfg(feature = "tracing")]
        tracing::warn!(error = %_err, "failed to spawn daemon process");
        return false;
    }

    for _ in 0..SPAWN_POLL_ATTEMPTS {
        tokio::time::sleep(SPAWN_POLL_INTERVAL).await;
        if client.ping().await {
            return true;
        }
    }
    false
}
