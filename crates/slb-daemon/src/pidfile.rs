//! Pidfile handling with a liveness probe.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{DaemonError, DaemonResult};

/// An acquired pidfile. Removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Acquire the pidfile at `path`.
    ///
    /// Refuses when the file names a live process (signal-0 probe);
    /// replaces a stale file left by a dead one.
    ///
    /// # Errors
    ///
    /// [`DaemonError::AlreadyRunning`] when another daemon is alive, or an
    /// I/O error writing the file.
    pub fn acquire(path: &Path) -> DaemonResult<Self> {
        if let Ok(contents) = std::fs::read_to_string(path) {
            if let Ok(pid) = contents.trim().parse::<i32>() {
                if pid_alive(pid) {
                    return Err(DaemonError::AlreadyRunning { pid });
                }
                warn!(pid, path = %path.display(), "removing stale pidfile");
            }
            let _ = std::fs::remove_file(path);
        }

        std::fs::write(path, std::process::id().to_string())?;
        debug!(path = %path.display(), "pidfile acquired");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// The pidfile's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove pidfile");
        }
    }
}

fn pid_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slb.pid");

        {
            let pidfile = PidFile::acquire(&path).unwrap();
            assert!(pidfile.path().exists());
            let written: i32 = std::fs::read_to_string(&path).unwrap().trim().parse().unwrap();
            assert_eq!(written, i32::try_from(std::process::id()).unwrap());
        }
        // Dropped: removed.
        assert!(!path.exists());
    }

    #[test]
    fn test_live_process_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slb.pid");
        // Our own pid is certainly alive.
        std::fs::write(&path, std::process::id().to_string()).unwrap();

        let err = PidFile::acquire(&path).unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning { .. }));
    }

    #[test]
    fn test_stale_pidfile_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slb.pid");
        // A pid that cannot be alive (pid_max on Linux is well below this).
        std::fs::write(&path, "999999999").unwrap();

        let pidfile = PidFile::acquire(&path).unwrap();
        assert!(pidfile.path().exists());
    }

    #[test]
    fn test_garbage_pidfile_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slb.pid");
        std::fs::write(&path, "not-a-pid").unwrap();

        assert!(PidFile::acquire(&path).is_ok());
    }
}
