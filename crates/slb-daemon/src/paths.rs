//! Deterministic socket and pidfile paths.
//!
//! Sockets live in the user's runtime directory (`$XDG_RUNTIME_DIR/slb/`,
//! falling back to `~/.slb/run/`), named by a hash of the project path so
//! every project gets a stable, collision-free address.

use std::io;
use std::path::{Path, PathBuf};

use slb_core::dirs::SlbHome;
use slb_crypto::ContentHash;

/// Resolve (and create) the runtime directory for sockets and pidfiles.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or secured.
pub fn runtime_dir() -> io::Result<PathBuf> {
    let dir = if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg).join("slb")
    } else {
        let home = SlbHome::resolve()?;
        home.ensure()?;
        home.run_dir()
    };
    std::fs::create_dir_all(&dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(dir)
}

/// Short stable tag for a project path.
fn project_tag(project: &Path) -> String {
    ContentHash::digest("slb-socket", &[project.display().to_string().as_bytes()]).short()
}

/// The daemon socket path for a project.
///
/// # Errors
///
/// Returns an error if the runtime directory cannot be prepared.
pub fn socket_path(project: &Path) -> io::Result<PathBuf> {
    Ok(runtime_dir()?.join(format!("slb-{}.sock", project_tag(project))))
}

/// The daemon pidfile path for a project; sits beside the socket.
///
/// # Errors
///
/// Returns an error if the runtime directory cannot be prepared.
pub fn pidfile_path(project: &Path) -> io::Result<PathBuf> {
    Ok(runtime_dir()?.join(format!("slb-{}.pid", project_tag(project))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_stable_and_distinct() {
        let a = project_tag(Path::new("/work/demo"));
        let b = project_tag(Path::new("/work/demo"));
        let c = project_tag(Path::new("/work/other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_socket_and_pidfile_share_stem() {
        // Both paths derive from the same tag.
        let sock = socket_path(Path::new("/work/demo")).unwrap();
        let pid = pidfile_path(Path::new("/work/demo")).unwrap();
        assert_eq!(sock.with_extension("pid"), pid);
    }
}
