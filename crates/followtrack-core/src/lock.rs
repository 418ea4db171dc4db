//! Single-instance guard for the poll process.
//!
//! The lock is a small JSON file naming the holder's PID. A second poller
//! that finds a live holder gives up immediately; a file left behind by a
//! dead process (or one that cannot be parsed) is reclaimed.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    created_at_rfc3339: String,
    operation: String,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("{operation} already in progress: lock {path} held by pid {pid} since {since}")]
    Held {
        operation: String,
        path: String,
        pid: u32,
        since: String,
    },

    #[error("lock file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode lock file: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct PollLock {
    path: PathBuf,
    released: bool,
}

impl PollLock {
    /// Take the lock at `path` for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Held`] when a live process owns the lock, or
    /// [`LockError::Io`] when the file cannot be inspected or created.
    pub fn acquire(path: &Path, operation: &str) -> Result<Self, LockError> {
        let io_err = |source: std::io::Error| LockError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        if path.exists() {
            let contents = fs::read_to_string(path).map_err(io_err)?;
            match serde_json::from_str::<LockInfo>(&contents) {
                Ok(info) if pid_is_alive(info.pid) => {
                    return Err(LockError::Held {
                        operation: info.operation,
                        path: path.display().to_string(),
                        pid: info.pid,
                        since: info.created_at_rfc3339,
                    });
                }
                Ok(info) => {
                    tracing::warn!(
                        pid = info.pid,
                        path = %path.display(),
                        "reclaiming lock left by a dead process"
                    );
                    fs::remove_file(path).map_err(io_err)?;
                }
                Err(_) => {
                    tracing::warn!(path = %path.display(), "reclaiming unreadable lock file");
                    fs::remove_file(path).map_err(io_err)?;
                }
            }
        }

        let info = LockInfo {
            pid: std::process::id(),
            created_at_rfc3339: Utc::now().to_rfc3339(),
            operation: operation.to_owned(),
        };
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)
            .map_err(io_err)?;
        file.write_all(serde_json::to_string_pretty(&info)?.as_bytes())
            .map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Io`] if the file exists but cannot be removed.
    pub fn release(mut self) -> Result<(), LockError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|source| LockError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for PollLock {
    fn drop(&mut self) {
        if !self.released && self.path.exists() {
            let _ = fs::remove_file(&self.path);
            self.released = true;
        }
    }
}

/// Signal 0 checks that the process exists without delivering anything. `EPERM`
/// means it exists under another user.
#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // 0 would address our own process group.
    if raw == 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}
