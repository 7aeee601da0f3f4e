//! PID file lifecycle: refuse to start if another live PID
//! is present, write our own PID on start, remove it on clean shutdown.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns `Ok(())` if no other live daemon holds `path`, removing a
/// stale PID file if the process it names is gone.
pub fn check_not_running(path: &Path) -> io::Result<()> {
    let Ok(contents) = fs::read_to_string(path) else {
        return Ok(());
    };
    let Ok(pid) = contents.trim().parse::<i32>() else {
        fs::remove_file(path).ok();
        return Ok(());
    };
    if process_is_alive(pid) {
        return Err(io::Error::new(io::ErrorKind::AlreadyExists, format!("daemon already running (pid {pid})")));
    }
    fs::remove_file(path).ok();
    Ok(())
}

/// Writes the current process's PID (ASCII decimal, trailing newline)
/// to `path`.
pub fn write(path: &Path) -> io::Result<()> {
    let pid = std::process::id();
    fs::write(path, format!("{pid}\n"))
}

/// Removes the PID file. Best-effort: a missing file is not an error.
pub fn remove(path: &Path) {
    fs::remove_file(path).ok();
}

fn process_is_alive(pid: i32) -> bool {
    // signal 0 performs no action but still validates the pid exists
    // and is visible to this process.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Guard that removes the PID file on drop, so a panicking daemon still
/// cleans up on unwind.
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    /// Checks for a live daemon, then claims `path` for this process.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        check_not_running(path)?;
        write(path)?;
        Ok(Self { path: path.to_path_buf() })
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        remove(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_current_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        let guard = PidFileGuard::acquire(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim().parse::<u32>().unwrap(), std::process::id());
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn stale_pid_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        fs::write(&path, "999999999\n").unwrap();
        let guard = PidFileGuard::acquire(&path).unwrap();
        drop(guard);
    }

    #[test]
    fn garbage_pid_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        fs::write(&path, "not-a-pid\n").unwrap();
        let guard = PidFileGuard::acquire(&path).unwrap();
        drop(guard);
    }
}
