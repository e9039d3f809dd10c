//! PID file handling (§6): written on daemonize, removed on clean exit; a
//! second instance detects a live PID via a `kill(pid, 0)`-style liveness
//! check and aborts startup rather than racing the first instance.

use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum PidFileError {
    AlreadyRunning(u32),
    Io(String),
}

impl std::fmt::Display for PidFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PidFileError::AlreadyRunning(pid) => {
                write!(f, "another instance appears to be running (pid {pid})")
            }
            PidFileError::Io(s) => write!(f, "pid file error: {s}"),
        }
    }
}

impl std::error::Error for PidFileError {}

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claim `path`: if it names a still-alive process, refuse to start.
    /// A pid file naming a dead process is considered stale and overwritten.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, PidFileError> {
        let path = path.as_ref().to_path_buf();
        if let Ok(existing) = std::fs::read_to_string(&path) {
            if let Ok(pid) = existing.trim().parse::<u32>() {
                if process_is_alive(pid) {
                    return Err(PidFileError::AlreadyRunning(pid));
                }
            }
        }
        std::fs::write(&path, std::process::id().to_string())
            .map_err(|e| PidFileError::Io(format!("writing '{}': {e}", path.display())))?;
        Ok(Self { path })
    }

    /// Remove the pid file on clean shutdown.
    pub fn release(self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    // signal 0 performs no delivery but still validates the target exists
    // and is visible to this process, exactly pilight's liveness check.
    unsafe { libc_kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
extern "C" {
    #[link_name = "kill"]
    fn libc_kill(pid: i32, sig: i32) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_current_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.pid");
        let guard = PidFile::acquire(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.trim().parse::<u32>().unwrap(), std::process::id());
        guard.release();
        assert!(!path.exists());
    }

    #[test]
    fn stale_pid_file_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.pid");
        // pid 1 exists on a real system but is never this process, so this
        // only verifies the overwrite path when the recorded pid is bogus.
        std::fs::write(&path, "999999999").unwrap();
        let guard = PidFile::acquire(&path).unwrap();
        guard.release();
    }
}
