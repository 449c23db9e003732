//! Resolving the path of the running executable.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LaunchError, Result};

/// Canonical, symlink-free path of the running executable.
///
/// Asks the OS first. When that fails, falls back to the invocation name:
/// a name containing a separator is canonicalised directly, a bare name is
/// looked up on `PATH`.
pub fn resolve_executable(argv0: Option<&OsStr>) -> Result<PathBuf> {
    match std::env::current_exe().and_then(dunce::canonicalize) {
        Ok(path) => Ok(path),
        Err(e) => {
            debug!(error = %e, "OS executable lookup failed, falling back to argv[0]");
            let argv0 = argv0.ok_or_else(|| LaunchError::Executable(e.to_string()))?;
            from_invocation(argv0)
        }
    }
}

/// Resolve an invocation name the way a shell would have found it.
pub fn from_invocation(argv0: &OsStr) -> Result<PathBuf> {
    let name = Path::new(argv0);
    let found = if name.components().count() > 1 {
        name.to_path_buf()
    } else {
        which::which(argv0).map_err(|e| {
            LaunchError::Executable(format!("{} not found on PATH: {}", name.display(), e))
        })?
    };
    dunce::canonicalize(&found)
        .map_err(|e| LaunchError::Executable(format!("{}: {}", found.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_current_executable() {
        let path = resolve_executable(None).unwrap();
        assert!(path.is_absolute());
        assert!(path.is_file());
    }

    #[test]
    fn test_invocation_with_separator() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("app");
        std::fs::write(&exe, b"").unwrap();
        let resolved = from_invocation(exe.as_os_str()).unwrap();
        assert_eq!(resolved, dunce::canonicalize(&exe).unwrap());
    }

    #[test]
    fn test_invocation_not_found() {
        assert!(matches!(
            from_invocation(OsStr::new("bootpack-surely-not-installed-anywhere")),
            Err(LaunchError::Executable(_))
        ));
    }
}
