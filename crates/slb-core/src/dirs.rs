//! Filesystem layout for SLB state.
//!
//! State splits across two roots:
//!
//! - [`SlbHome`], the global root (`$SLB_HOME` or `~/.slb/`): socket and
//!   pidfile fallback directory, daemon logs, global config, and the
//!   fallback database for commands issued outside any project.
//! - [`ProjectDir`], the per-project root (`<project>/.slb/`): the project
//!   database, one execution log per request, rollback captures, and
//!   project config.
//!
//! ```text
//! ~/.slb/                       run/  logs/  slb.db/  config.toml
//! <project>/.slb/               slb.db/  logs/<request_id>.log  rollback/  config.toml
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Markers that identify a project root during the upward search.
const PROJECT_MARKERS: [&str; 2] = [".slb", ".git"];

/// Global SLB state root (`$SLB_HOME` or `~/.slb/`).
#[derive(Debug, Clone)]
pub struct SlbHome {
    root: PathBuf,
}

impl SlbHome {
    /// Resolve the global root: `$SLB_HOME` when set (absolute paths
    /// only), else `$HOME/.slb`.
    ///
    /// # Errors
    ///
    /// Returns an error for a relative `$SLB_HOME`, or when neither
    /// variable is usable.
    pub fn resolve() -> io::Result<Self> {
        if let Some(custom) = std::env::var_os("SLB_HOME") {
            let root = PathBuf::from(custom);
            return if root.is_absolute() {
                Ok(Self { root })
            } else {
                Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "SLB_HOME must be absolute",
                ))
            };
        }

        std::env::var_os("HOME")
            .map(|home| Self {
                root: PathBuf::from(home).join(".slb"),
            })
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "HOME is not set (and SLB_HOME is unset)",
                )
            })
    }

    /// Create from an explicit path (useful for testing).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the tree, owner-only.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created or secured.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [self.root.clone(), self.run_dir(), self.logs_dir()] {
            create_private_dir(&dir)?;
        }
        Ok(())
    }

    /// Root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runtime directory fallback for sockets and pidfiles (`~/.slb/run/`).
    #[must_use]
    pub fn run_dir(&self) -> PathBuf {
        self.root.join("run")
    }

    /// Logs directory (`~/.slb/logs/`).
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Fallback database directory for out-of-project commands.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.root.join("slb.db")
    }

    /// Path to the global configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}

/// Per-project state root (`<project>/.slb/`).
#[derive(Debug, Clone)]
pub struct ProjectDir {
    /// The project root (parent of `.slb/`).
    project_root: PathBuf,
}

impl ProjectDir {
    /// Resolve the project for `start_dir`: `$SLB_PROJECT` wins when set,
    /// else the marker search of [`ProjectDir::detect`].
    #[must_use]
    pub fn resolve(start_dir: &Path) -> Self {
        std::env::var_os("SLB_PROJECT").map_or_else(
            || Self::detect(start_dir),
            |project| Self {
                project_root: PathBuf::from(project),
            },
        )
    }

    /// Find the project root: the nearest ancestor of `start_dir`
    /// (itself included) containing a `.slb` or `.git` entry, falling
    /// back to `start_dir`.
    #[must_use]
    pub fn detect(start_dir: &Path) -> Self {
        let start = absolutize(start_dir);
        let project_root = start
            .ancestors()
            .find(|dir| PROJECT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
            .map_or_else(|| start.clone(), Path::to_path_buf);
        Self { project_root }
    }

    /// Create from an explicit project root (useful for testing).
    #[must_use]
    pub fn from_path(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Create the `.slb/` tree.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [self.logs_dir(), self.rollback_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Project root directory (parent of `.slb/`).
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.project_root
    }

    /// The `.slb/` directory itself.
    #[must_use]
    pub fn dot_slb(&self) -> PathBuf {
        self.project_root.join(".slb")
    }

    /// Project database directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.dot_slb().join("slb.db")
    }

    /// Execution logs directory.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.dot_slb().join("logs")
    }

    /// Execution log path for one request.
    #[must_use]
    pub fn request_log_path(&self, request_id: &str) -> PathBuf {
        self.logs_dir().join(format!("{request_id}.log"))
    }

    /// Rollback captures directory.
    #[must_use]
    pub fn rollback_dir(&self) -> PathBuf {
        self.dot_slb().join("rollback")
    }

    /// Path to the project configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dot_slb().join("config.toml")
    }
}

/// Create a directory (and parents) with mode `0700`.
fn create_private_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Anchor a possibly-relative path to the current working directory.
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_from_path_accessors() {
        let home = SlbHome::from_path("/tmp/test-slb");
        assert_eq!(home.root(), Path::new("/tmp/test-slb"));
        assert_eq!(home.run_dir(), PathBuf::from("/tmp/test-slb/run"));
        assert_eq!(home.db_path(), PathBuf::from("/tmp/test-slb/slb.db"));
        assert_eq!(home.config_path(), PathBuf::from("/tmp/test-slb/config.toml"));
    }

    #[cfg(unix)]
    #[test]
    fn test_home_ensure_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let home = SlbHome::from_path(dir.path());
        home.ensure().unwrap();

        for created in [home.root().to_path_buf(), home.run_dir(), home.logs_dir()] {
            let perms = std::fs::metadata(&created).unwrap().permissions();
            assert_eq!(perms.mode() & 0o777, 0o700, "{}", created.display());
        }
    }

    #[test]
    fn test_project_detect_with_dot_slb() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".slb")).unwrap();
        let sub = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&sub).unwrap();

        let project = ProjectDir::detect(&sub);
        assert_eq!(project.root(), dir.path());
    }

    #[test]
    fn test_project_detect_with_git() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let sub = dir.path().join("src");
        std::fs::create_dir_all(&sub).unwrap();

        let project = ProjectDir::detect(&sub);
        assert_eq!(project.root(), dir.path());
    }

    #[test]
    fn test_project_detect_start_dir_itself_wins() {
        // The search includes start_dir before any ancestor.
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("workspace");
        std::fs::create_dir_all(nested.join(".slb")).unwrap();

        let project = ProjectDir::detect(&nested);
        assert_eq!(project.root(), nested);
    }

    #[test]
    fn test_project_paths() {
        let project = ProjectDir::from_path("/work/demo");
        assert_eq!(project.db_path(), PathBuf::from("/work/demo/.slb/slb.db"));
        assert_eq!(
            project.request_log_path("abc"),
            PathBuf::from("/work/demo/.slb/logs/abc.log")
        );
    }

    #[test]
    fn test_project_ensure() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir::from_path(dir.path());
        project.ensure().unwrap();
        assert!(project.logs_dir().exists());
        assert!(project.rollback_dir().exists());
    }
}
